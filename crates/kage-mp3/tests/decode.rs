use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom};

use kage_mp3::{BYTES_PER_FRAME, Decoder, Mp3Error};

/// MSB-first bit writer for synthesizing frames.
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    len: usize,
}

impl BitWriter {
    fn put(&mut self, value: u32, bits: u32) {
        for i in (0..bits).rev() {
            if self.len % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 == 1 {
                *self.bytes.last_mut().unwrap() |= 0x80 >> (self.len % 8);
            }
            self.len += 1;
        }
    }

    fn padded(mut self, size: usize) -> Vec<u8> {
        assert!(self.bytes.len() <= size);
        self.bytes.resize(size, 0);
        self.bytes
    }
}

#[derive(Clone, Copy)]
struct FrameSpec {
    mono: bool,
    crc: bool,
    main_data_begin: u32,
    /// Codes a single nonzero line in the first channel of both granules.
    tone: bool,
}

const SILENT: FrameSpec = FrameSpec {
    mono: false,
    crc: false,
    main_data_begin: 0,
    tone: false,
};

fn granule(w: &mut BitWriter, part2_3_length: u32, big_values: u32, table: u32) {
    w.put(part2_3_length, 12);
    w.put(big_values, 9);
    w.put(210, 8); // global gain
    w.put(0, 4); // scalefac_compress
    w.put(0, 1); // window switching
    w.put(table, 5);
    w.put(0, 10); // remaining table selects
    w.put(0, 4 + 3); // region counts
    w.put(0, 3); // preflag, scalefac_scale, count1 table
}

/// Builds a 417-byte MPEG-1 Layer III frame at 128 kbit/s and 44.1 kHz.
fn frame(spec: FrameSpec) -> Vec<u8> {
    let channels = if spec.mono { 1 } else { 2 };
    let mut out = vec![
        0xff,
        if spec.crc { 0xfa } else { 0xfb },
        0x90,
        if spec.mono { 0xc0 } else { 0x00 },
    ];
    if spec.crc {
        out.extend([0, 0]);
    }
    let side_size = if spec.mono { 17 } else { 32 };

    let mut side = BitWriter::default();
    side.put(spec.main_data_begin, 9);
    side.put(0, if spec.mono { 5 } else { 3 });
    side.put(0, 4 * channels);
    let mut main = BitWriter::default();
    for _ in 0..2 {
        for ch in 0..channels {
            if spec.tone && ch == 0 {
                // Table 1: '01' codes (1, 0), then a positive sign bit.
                granule(&mut side, 3, 1, 1);
                main.put(0b010, 3);
            } else {
                granule(&mut side, 0, 0, 0);
            }
        }
    }
    out.extend(side.padded(side_size));
    let main_size = 417 - out.len();
    out.extend(main.padded(main_size));
    assert_eq!(out.len(), 417);
    out
}

fn stream(specs: &[FrameSpec]) -> Vec<u8> {
    specs.iter().flat_map(|&spec| frame(spec)).collect()
}

fn decode_all(data: &[u8]) -> Vec<u8> {
    let mut decoder = Decoder::new(data).unwrap();
    let mut pcm = Vec::new();
    decoder.read_to_end(&mut pcm).unwrap();
    pcm
}

fn tone() -> FrameSpec {
    FrameSpec {
        tone: true,
        ..SILENT
    }
}

#[test]
fn silent_frames_decode_to_silence() {
    let data = stream(&[SILENT; 3]);
    let mut decoder = Decoder::new(&data[..]).unwrap();
    assert_eq!(decoder.sample_rate(), 44_100);
    assert_eq!(decoder.length(), None);
    let mut pcm = Vec::new();
    decoder.read_to_end(&mut pcm).unwrap();
    assert_eq!(pcm.len(), 3 * BYTES_PER_FRAME);
    assert!(pcm.iter().all(|&b| b == 0));
}

#[test]
fn frame_size_law() {
    assert_eq!(BYTES_PER_FRAME, 2 * 576 * 2 * 2);
    for n in 1..4 {
        let data = stream(&vec![tone(); n]);
        assert_eq!(decode_all(&data).len(), n * BYTES_PER_FRAME);
    }
}

#[test]
fn tone_lands_in_left_channel() {
    let pcm = decode_all(&stream(&[tone(), tone()]));
    assert!(pcm.chunks(4).any(|s| s[..2] != [0, 0]));
    assert!(pcm.chunks(4).all(|s| s[2..] == [0, 0]));
}

#[test]
fn mono_is_duplicated() {
    let spec = FrameSpec {
        mono: true,
        ..tone()
    };
    let pcm = decode_all(&stream(&[spec, spec]));
    assert_eq!(pcm.len(), 2 * BYTES_PER_FRAME);
    assert!(pcm.chunks(4).any(|s| s[..2] != [0, 0]));
    assert!(pcm.chunks(4).all(|s| s[..2] == s[2..]));
}

#[test]
fn crc_bytes_are_skipped() {
    let with_crc = FrameSpec {
        crc: true,
        ..tone()
    };
    assert_eq!(
        decode_all(&stream(&[with_crc, with_crc])),
        decode_all(&stream(&[tone(), tone()]))
    );
}

#[test]
fn resyncs_after_garbage() {
    let clean = stream(&[tone(), tone()]);
    let mut data = b"ID3 junk\xff\x00".to_vec();
    data.extend(frame(tone()));
    data.extend([0x12, 0x34, 0xff]);
    data.extend(frame(tone()));
    assert_eq!(decode_all(&data), decode_all(&clean));
}

#[test]
fn layer_one_is_rejected() {
    let mut data = frame(SILENT);
    data[1] = 0xff;
    assert!(matches!(
        Decoder::new(&data[..]),
        Err(Mp3Error::UnsupportedLayer(1))
    ));
}

#[test]
fn input_without_frames_is_rejected() {
    assert!(matches!(Decoder::new(&[][..]), Err(Mp3Error::NoFrames)));
    assert!(matches!(
        Decoder::new(&[0u8; 100][..]),
        Err(Mp3Error::NoFrames)
    ));
}

#[test]
fn truncated_frame_is_an_error() {
    let mut data = stream(&[SILENT, SILENT]);
    data.truncate(417 + 200);
    let mut decoder = Decoder::new(&data[..]).unwrap();
    let mut pcm = Vec::new();
    let err = decoder.read_to_end(&mut pcm).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
}

#[test]
fn reservoir_underflow_decodes_silence() {
    let spec = FrameSpec {
        main_data_begin: 10,
        ..SILENT
    };
    let pcm = decode_all(&stream(&[spec, spec]));
    assert_eq!(pcm.len(), 2 * BYTES_PER_FRAME);
    assert!(pcm[..BYTES_PER_FRAME].iter().all(|&b| b == 0));
}

#[test]
fn seekable_length_and_rewind() {
    let data = stream(&[tone(), tone(), tone()]);
    let mut decoder = Decoder::new_seekable(Cursor::new(data)).unwrap();
    assert_eq!(decoder.length(), Some(3 * BYTES_PER_FRAME as u64));

    let mut first = Vec::new();
    decoder.read_to_end(&mut first).unwrap();
    assert_eq!(first.len(), 3 * BYTES_PER_FRAME);

    assert_eq!(decoder.seek(SeekFrom::Start(0)).unwrap(), 0);
    let mut second = Vec::new();
    decoder.read_to_end(&mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn seek_into_second_frame() {
    let data = stream(&[tone(), tone(), tone()]);
    let straight = decode_all(&data);

    let mut decoder = Decoder::new_seekable(Cursor::new(data)).unwrap();
    let target = BYTES_PER_FRAME as u64 + 100;
    assert_eq!(decoder.seek(SeekFrom::Start(target)).unwrap(), target);
    let mut rest = Vec::new();
    decoder.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, straight[target as usize..]);

    assert_eq!(decoder.seek(SeekFrom::End(0)).unwrap(), 3 * BYTES_PER_FRAME as u64);
    let mut buf = [0u8; 16];
    assert_eq!(decoder.read(&mut buf).unwrap(), 0);
    assert!(decoder.seek(SeekFrom::Current(-1_000_000)).is_err());
}

#[test]
fn seek_past_end_clamps_to_length() {
    let data = stream(&[tone(), tone(), tone()]);
    let straight = decode_all(&data);
    let end = 3 * BYTES_PER_FRAME as u64;

    let mut decoder = Decoder::new_seekable(Cursor::new(data)).unwrap();
    assert_eq!(decoder.seek(SeekFrom::Start(10 * end)).unwrap(), end);
    assert_eq!(decoder.stream_position().unwrap(), end);
    let mut buf = [0u8; 16];
    assert_eq!(decoder.read(&mut buf).unwrap(), 0);

    let back = decoder.seek(SeekFrom::Current(-(BYTES_PER_FRAME as i64))).unwrap();
    assert_eq!(back, end - BYTES_PER_FRAME as u64);
    let mut rest = Vec::new();
    decoder.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, straight[back as usize..]);
}

#[test]
fn streaming_decoder_cannot_seek() {
    let data = stream(&[SILENT, SILENT]);
    let mut decoder = Decoder::new(Cursor::new(data)).unwrap();
    let err = decoder.seek(SeekFrom::Start(5000)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}
