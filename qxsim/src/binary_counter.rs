use std::fmt;

/// Incrementable bit pattern over at most 64 bits, used to walk subsets of
/// basis states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryCounter {
    value: u64,
    bits: u32,
    exhausted: bool,
}

impl BinaryCounter {
    pub const MAX_BITS: u32 = 64;

    pub fn new(bits: u32) -> Self {
        assert!(bits <= Self::MAX_BITS, "binary counter holds at most 64 bits");
        Self {
            value: 0,
            bits,
            exhausted: false,
        }
    }

    pub fn with_value(bits: u32, value: u64) -> Self {
        let mut counter = Self::new(bits);
        counter.assign(value);
        counter
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn assign(&mut self, value: u64) {
        self.value = value & self.mask();
        self.exhausted = false;
    }

    pub fn set(&mut self, bit: u32) {
        debug_assert!(bit < self.bits);
        self.value |= 1u64 << bit;
    }

    pub fn unset(&mut self, bit: u32) {
        debug_assert!(bit < self.bits);
        self.value &= !(1u64 << bit);
    }

    pub fn test(&self, bit: u32) -> bool {
        bit < self.bits && (self.value >> bit) & 1 == 1
    }

    pub fn reset(&mut self) {
        self.value = 0;
        self.exhausted = false;
    }

    /// Advances to the next pattern, wrapping to zero past the top.
    pub fn increment(&mut self) {
        self.value = self.value.wrapping_add(1) & self.mask();
    }

    /// Returns the pattern with a zero spliced in at `bit`, shifting the
    /// higher bits up by one. Used to address the half of a register where a
    /// given qubit has a fixed value.
    pub fn spread(&self, bit: u32) -> u64 {
        let low = self.value & ((1u64 << bit) - 1);
        let high = self.value >> bit;
        (high << (bit + 1)) | low
    }

    fn mask(&self) -> u64 {
        if self.bits == Self::MAX_BITS {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }
}

impl Iterator for BinaryCounter {
    type Item = u64;

    /// Yields the current value and advances, stopping after the all-ones
    /// pattern instead of wrapping.
    fn next(&mut self) -> Option<u64> {
        if self.exhausted {
            return None;
        }
        let current = self.value;
        if current == self.mask() {
            self.exhausted = true;
        } else {
            self.value += 1;
        }
        Some(current)
    }
}

impl fmt::Display for BinaryCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ ")?;
        for b in (0..self.bits).rev() {
            write!(f, "{}", if self.test(b) { '1' } else { '0' })?;
        }
        write!(f, " : {}]", self.value)
    }
}
