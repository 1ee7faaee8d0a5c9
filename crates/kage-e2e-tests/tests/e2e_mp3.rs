//! Decoding synthesized MPEG-1 Layer III streams.

mod common;

use std::io::{Cursor, Read, Seek, SeekFrom};

use common::stereo_frame;
use kage_mp3::{BYTES_PER_FRAME, Decoder, Mp3Error};

fn decode(data: Vec<u8>) -> Vec<u8> {
    let mut decoder = Decoder::new_seekable(Cursor::new(data)).unwrap();
    let mut pcm = Vec::new();
    decoder.read_to_end(&mut pcm).unwrap();
    pcm
}

fn channel(pcm: &[u8], ch: usize) -> Vec<i16> {
    pcm.chunks_exact(4)
        .map(|s| i16::from_le_bytes([s[2 * ch], s[2 * ch + 1]]))
        .collect()
}

#[test]
fn round_trip() {
    let n = 5;
    let data: Vec<u8> = (0..n)
        .flat_map(|_| stereo_frame(0, Some(false), Some(true)))
        .collect();
    let mut decoder = Decoder::new_seekable(Cursor::new(data)).unwrap();
    assert_eq!(decoder.sample_rate(), 44_100);
    assert_eq!(decoder.length(), Some((n * BYTES_PER_FRAME) as u64));

    let mut first = Vec::new();
    decoder.read_to_end(&mut first).unwrap();
    assert_eq!(first.len(), n * BYTES_PER_FRAME);

    decoder.seek(SeekFrom::Start(0)).unwrap();
    let mut second = Vec::new();
    decoder.read_to_end(&mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn invalid_first_header_is_an_error() {
    let mut data = stereo_frame(0, None, None);
    // Layer II header bits.
    data[1] = 0xfd;
    assert!(matches!(
        Decoder::new(Cursor::new(data)),
        Err(Mp3Error::UnsupportedLayer(2))
    ));
}

#[test]
fn mid_side_steers_between_channels() {
    // Plain joint stereo without tools: both channels carry the tone.
    let pcm = decode(stereo_frame(0, Some(false), Some(true)).repeat(2));
    assert!(channel(&pcm, 0).iter().any(|&s| s != 0));
    assert!(channel(&pcm, 1).iter().any(|&s| s != 0));

    // Mid/side: equal mid and side put everything on the left.
    let pcm = decode(stereo_frame(2, Some(false), Some(false)).repeat(2));
    assert!(channel(&pcm, 0).iter().any(|&s| s != 0));
    assert!(channel(&pcm, 1).iter().all(|&s| s == 0));

    // Mid/side with opposite signs puts everything on the right.
    let pcm = decode(stereo_frame(2, Some(false), Some(true)).repeat(2));
    assert!(channel(&pcm, 0).iter().all(|&s| s == 0));
    assert!(channel(&pcm, 1).iter().any(|&s| s != 0));
}

#[test]
fn intensity_moves_left_into_right() {
    // Position 0 of an empty right channel gives the right channel the
    // full left signal and silences the left.
    let pcm = decode(stereo_frame(1, Some(false), None).repeat(2));
    assert!(channel(&pcm, 0).iter().all(|&s| s == 0));
    assert!(channel(&pcm, 1).iter().any(|&s| s != 0));
}

#[test]
fn mirrored_channels_decode_mirrored() {
    let pcm = decode(stereo_frame(0, Some(false), Some(true)).repeat(3));
    let (left, right) = (channel(&pcm, 0), channel(&pcm, 1));
    for (l, r) in left.iter().zip(&right) {
        assert!((i32::from(*l) + i32::from(*r)).abs() <= 1, "{l} {r}");
    }
}
