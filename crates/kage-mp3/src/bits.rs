/// MSB-first bit cursor over a byte slice.
///
/// Reads past the end of the slice yield zero bits, so a corrupt length
/// field degrades into silence instead of a panic.
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current position in bits from the start of the slice.
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn bit(&mut self) -> bool {
        let byte = self.data.get(self.pos >> 3).copied().unwrap_or(0);
        let bit = (byte >> (7 - (self.pos & 7))) & 1;
        self.pos += 1;
        bit != 0
    }

    /// Reads `n <= 32` bits as an unsigned big-endian integer.
    pub(crate) fn bits(&mut self, n: u32) -> u32 {
        debug_assert!(n <= 32);
        (0..n).fold(0, |acc, _| (acc << 1) | u32::from(self.bit()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_msb_first() {
        let mut r = BitReader::new(&[0b1010_0000, 0xff]);
        assert!(r.bit());
        assert!(!r.bit());
        assert_eq!(r.bits(2), 0b10);
        assert_eq!(r.bits(8), 0b0000_1111);
        assert_eq!(r.position(), 12);
    }

    #[test]
    fn past_end_reads_zero() {
        let mut r = BitReader::new(&[0xff]);
        r.set_position(4);
        assert_eq!(r.bits(8), 0b1111_0000);
        assert_eq!(r.bits(12), 0);
        assert_eq!(r.position(), 24);
    }
}
