/// Main data retained for frames whose data starts in earlier frames.
const CAPACITY: usize = 2048;

/// The bit reservoir carried between frames.
#[derive(Debug, Default)]
pub(crate) struct Reservoir {
    bytes: Vec<u8>,
}

impl Reservoir {
    /// Assembles the main data of a frame from the last `begin` stored
    /// bytes followed by `fresh`, then stores `fresh`.
    ///
    /// Returns `None` when fewer than `begin` bytes are stored, which
    /// happens at the start of a stream or right after a seek; the fresh
    /// bytes are still kept for the frames that follow.
    pub(crate) fn assemble(&mut self, begin: usize, fresh: &[u8]) -> Option<Vec<u8>> {
        let data = (begin <= self.bytes.len()).then(|| {
            let mut data = Vec::with_capacity(begin + fresh.len());
            data.extend_from_slice(&self.bytes[self.bytes.len() - begin..]);
            data.extend_from_slice(fresh);
            data
        });
        self.bytes.extend_from_slice(fresh);
        if self.bytes.len() > CAPACITY {
            self.bytes.drain(..self.bytes.len() - CAPACITY);
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underflow_keeps_bytes() {
        let mut r = Reservoir::default();
        assert_eq!(r.assemble(2, &[1, 2, 3]), None);
        assert_eq!(r.assemble(2, &[4]), Some(vec![2, 3, 4]));
        assert_eq!(r.assemble(0, &[5, 6]), Some(vec![5, 6]));
    }

    #[test]
    fn capacity_is_bounded() {
        let mut r = Reservoir::default();
        for _ in 0..10 {
            r.assemble(0, &[7; 400]);
        }
        assert_eq!(r.bytes.len(), CAPACITY);
        assert!(r.assemble(511, &[]).is_some());
    }
}
