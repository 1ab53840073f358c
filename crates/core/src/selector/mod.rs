//! Next-track policy shared by manual skips and auto-advance.

use rand::Rng;

/// Direction of a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn delta(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

/// Resolves the index to play after `current` in a playlist of `len` tracks.
///
/// With `shuffle` on, any index in `[0, len)` is drawn uniformly, including
/// `current` itself. Otherwise the index steps by one and wraps at both
/// ends. Returns `None` for an empty playlist.
pub fn select_next<R: Rng + ?Sized>(
    current: usize,
    len: usize,
    direction: Direction,
    shuffle: bool,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }

    if shuffle {
        return Some(rng.gen_range(0..len));
    }

    Some(wrap_index(current as isize + direction.delta(), len))
}

/// Wraps any signed index into `[0, len)`. `len` must be non-zero.
pub fn wrap_index(index: isize, len: usize) -> usize {
    index.rem_euclid(len as isize) as usize
}
