/// Scalefactor band boundaries for one sample rate, in frequency lines.
pub(crate) struct Bands {
    pub(crate) long: [usize; 23],
    /// Boundaries of one short window; multiply by three for granule lines.
    pub(crate) short: [usize; 14],
}

/// Indexed by the header's sample rate index (44.1, 48 and 32 kHz).
pub(crate) static BANDS: [Bands; 3] = [
    Bands {
        long: [
            0, 4, 8, 12, 16, 20, 24, 30, 36, 44, 52, 62, 74, 90, 110, 134, 162, 196, 238, 288, 342,
            418, 576,
        ],
        short: [0, 4, 8, 12, 16, 22, 30, 40, 52, 66, 84, 106, 136, 192],
    },
    Bands {
        long: [
            0, 4, 8, 12, 16, 20, 24, 30, 36, 42, 50, 60, 72, 88, 106, 128, 156, 190, 230, 276, 330,
            384, 576,
        ],
        short: [0, 4, 8, 12, 16, 22, 28, 38, 50, 64, 80, 100, 126, 192],
    },
    Bands {
        long: [
            0, 4, 8, 12, 16, 20, 24, 30, 36, 44, 54, 66, 82, 102, 126, 156, 194, 240, 296, 364, 448,
            550, 576,
        ],
        short: [0, 4, 8, 12, 16, 22, 30, 42, 58, 78, 104, 138, 180, 192],
    },
];
