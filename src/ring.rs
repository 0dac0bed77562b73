//! The identifier circle: ids live in `[0, 2^m)` and every interval test
//! walks clockwise, wrapping through zero.

use crate::error::{Error, Result};

pub const DEFAULT_BITS: u32 = 8;
pub const MAX_BITS: u32 = 63;

/// Size of the identifier space. Fixed for the whole deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSpace {
    bits: u32,
}

impl IdSpace {
    pub fn new(bits: u32) -> Result<Self> {
        if bits == 0 || bits > MAX_BITS {
            return Err(Error::Parse(format!(
                "identifier bits must be in [1, {}], got {}",
                MAX_BITS, bits
            )));
        }
        Ok(IdSpace { bits })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn size(&self) -> u64 {
        1u64 << self.bits
    }

    pub fn wrap(&self, value: u64) -> u64 {
        value & (self.size() - 1)
    }

    pub fn contains(&self, key: u64) -> bool {
        key < self.size()
    }

    pub fn check_key(&self, key: u64) -> Result<u64> {
        if self.contains(key) {
            Ok(key)
        } else {
            Err(Error::Validation(format!(
                "key {} outside identifier space [0, {})",
                key,
                self.size()
            )))
        }
    }
}

impl Default for IdSpace {
    fn default() -> Self {
        IdSpace { bits: DEFAULT_BITS }
    }
}

/// `x ∈ (a, b]` walking clockwise. `a == b` spans the whole ring.
pub fn in_open_closed(x: u64, a: u64, b: u64) -> bool {
    if a < b {
        a < x && x <= b
    } else if a > b {
        x > a || x <= b
    } else {
        true
    }
}

/// `x ∈ [a, b)` walking clockwise. `a == b` is empty.
pub fn in_closed_open(x: u64, a: u64, b: u64) -> bool {
    if a < b {
        a <= x && x < b
    } else if a > b {
        x >= a || x < b
    } else {
        false
    }
}

/// The member responsible for `key`: the smallest id at or above it, or the
/// smallest id overall when the key lies past every member.
pub fn owner_of(key: u64, members: &[u64]) -> Option<u64> {
    members
        .iter()
        .copied()
        .filter(|id| *id >= key)
        .min()
        .or_else(|| members.iter().copied().min())
}
