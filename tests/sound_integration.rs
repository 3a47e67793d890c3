//! Sound codec integration tests
//!
//! These tests drive the WAV codec through files on disk and through the
//! registry, the way an application would.

use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::time::Duration;

use proptest::prelude::*;
use rstest::rstest;

use sound_codec::sound::wav::{self, Format, WavDecoder, WavEncoder};
use sound_codec::sound::{
    CodecError, Form, Registry, SampleCodec, SampleKind, SampleRate, SeekableSource, Sink,
    SniffReader, Source,
};

/// Deterministic channel-major test signal in [-1, 1)
fn signal(channels: usize, frames: usize) -> Vec<f64> {
    let mut v = Vec::with_capacity(channels * frames);
    for c in 0..channels {
        for f in 0..frames {
            let x = ((f * 37 + c * 101) % 509) as f64 / 509.0;
            v.push(x * 2.0 - 1.0);
        }
    }
    v
}

fn encode_to_vec(format: Format, samples: &[f64]) -> Vec<u8> {
    let mut enc = WavEncoder::new(format, Cursor::new(Vec::new())).unwrap();
    enc.send(samples).unwrap();
    enc.finish().unwrap().into_inner()
}

fn decode_all<S: Source + ?Sized>(src: &mut S, batch: usize) -> Vec<Vec<f64>> {
    let channels = src.channels();
    let mut out = vec![Vec::new(); channels];
    let mut buf = vec![0.0; batch * channels];
    loop {
        match src.receive(&mut buf) {
            Ok(n) => {
                for (c, chan) in out.iter_mut().enumerate() {
                    chan.extend_from_slice(&buf[c * n..c * n + n]);
                }
            }
            Err(e) if e.is_end_of_stream() => return out,
            Err(e) => panic!("decode failed: {}", e),
        }
    }
}

#[rstest]
fn test_round_trip_through_file(
    #[values(
        SampleCodec::U8,
        SampleCodec::S16LE,
        SampleCodec::S24LE,
        SampleCodec::S32LE,
        SampleCodec::F32LE
    )]
    codec: SampleCodec,
    #[values(1, 2, 3)] channels: usize,
    #[values(0, 1, 1023, 1024, 2500)] frames: usize,
) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("round_trip.wav");
    let rate = SampleRate::new(22050).unwrap();
    let format = Format::from_form(Form::new(channels, rate), codec).unwrap();
    let input = signal(channels, frames);

    let mut enc = WavEncoder::new(format, File::create(&path).unwrap()).unwrap();
    enc.send(&input).unwrap();
    enc.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    let riff_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    assert_eq!(riff_len as usize, bytes.len() - 8);

    let mut dec = wav::load(&path).unwrap();
    assert_eq!(dec.format().codec(), codec);
    assert_eq!(dec.frames(), frames as u64);
    assert_eq!(Source::sample_rate(&dec), rate);

    let output = decode_all(&mut dec, 700);
    let bound = codec.quantization_error() * 2.0;
    for c in 0..channels {
        assert_eq!(output[c].len(), frames);
        for f in 0..frames {
            let want = input[c * frames + f];
            let got = output[c][f];
            assert!(
                (want - got).abs() <= bound,
                "{} ch{} frame{}: {} vs {}",
                codec,
                c,
                f,
                want,
                got
            );
        }
    }
}

#[test]
fn test_float_round_trip_is_exact_to_f32() {
    let input: Vec<f64> = signal(2, 300).iter().map(|&v| v as f32 as f64).collect();
    let bytes = encode_to_vec(Format::new(2, SampleRate::CD, SampleCodec::F32LE).unwrap(), &input);
    let mut dec = WavDecoder::open(&bytes[..]).unwrap();
    let out = decode_all(&mut dec, 64);
    assert_eq!(out.concat(), input);
}

#[test]
fn test_full_scale_clamps() {
    let bytes = encode_to_vec(
        Format::new(1, SampleRate::CD, SampleCodec::S16LE).unwrap(),
        &[1.0, -1.0, 3.0],
    );
    let mut dec = WavDecoder::open(&bytes[..]).unwrap();
    let out = decode_all(&mut dec, 8);
    assert_eq!(out[0], vec![32767.0 / 32768.0, -1.0, 32767.0 / 32768.0]);
}

#[test]
fn test_duration_is_exact() {
    let rate = SampleRate::new(44100).unwrap();
    let frames = 44100 * 3 + 441;
    let bytes = encode_to_vec(
        Format::new(1, rate, SampleCodec::U8).unwrap(),
        &vec![0.0; frames],
    );
    let dec = WavDecoder::open_seekable(Cursor::new(bytes)).unwrap();
    assert_eq!(dec.duration(), Duration::from_millis(3010));
    assert_eq!(dec.when(), Duration::ZERO);
}

#[test]
fn test_seek_matches_linear_decode() {
    let frames = 3000;
    let input = signal(2, frames);
    let bytes = encode_to_vec(Format::new(2, SampleRate::CD, SampleCodec::S16LE).unwrap(), &input);

    let mut linear = WavDecoder::open(&bytes[..]).unwrap();
    let all = decode_all(&mut linear, 1024);

    let mut dec = WavDecoder::open_seekable(Cursor::new(bytes)).unwrap();
    let mut one = [0.0; 2];
    for frame in [0u64, 2999, 1024, 1023, 1500, 7, 2048, 2047, 0] {
        dec.seek(frame).unwrap();
        assert_eq!(dec.receive(&mut one).unwrap(), 1);
        assert_eq!(one[0], all[0][frame as usize]);
        assert_eq!(one[1], all[1][frame as usize]);
        assert_eq!(dec.position(), frame + 1);
    }
}

#[rstest]
fn test_linear_decode_ends_at_frames(
    #[values(1, 1023, 1025, 2500)] frames: usize,
    #[values(7, 1024)] batch: usize,
) {
    let bytes = encode_to_vec(
        Format::new(2, SampleRate::CD, SampleCodec::S16LE).unwrap(),
        &signal(2, frames),
    );
    let mut dec = WavDecoder::open_seekable(Cursor::new(bytes)).unwrap();
    let all = decode_all(&mut dec, batch);
    assert_eq!(all[0].len(), frames);
    assert_eq!(dec.position(), dec.frames());
    assert_eq!(dec.when(), dec.duration());
}

#[test]
fn test_seek_to_end_after_reading_last_window() {
    let frames = 2500;
    let bytes = encode_to_vec(
        Format::new(1, SampleRate::CD, SampleCodec::S16LE).unwrap(),
        &signal(1, frames),
    );
    let mut dec = WavDecoder::open_seekable(Cursor::new(bytes)).unwrap();
    let mut one = [0.0; 1];
    dec.seek(2400).unwrap();
    assert_eq!(dec.receive(&mut one).unwrap(), 1);

    dec.seek(frames as u64).unwrap();
    assert_eq!(dec.position(), dec.frames());
    assert_eq!(dec.when(), dec.duration());
    assert!(matches!(dec.receive(&mut one), Err(CodecError::EndOfStream)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_seek_consistency(
        frames in 1usize..600,
        buffer_frames in 1usize..80,
        targets in proptest::collection::vec(0usize..600, 1..12),
    ) {
        let input = signal(1, frames);
        let bytes = encode_to_vec(Format::new(1, SampleRate::CD, SampleCodec::S24LE).unwrap(), &input);
        let mut linear = WavDecoder::open(&bytes[..]).unwrap();
        let all = decode_all(&mut linear, 50);

        let mut dec = WavDecoder::open_seekable_with(Cursor::new(bytes), buffer_frames).unwrap();
        let mut one = [0.0; 1];
        for t in targets {
            // frames itself is a valid target: the end of the stream
            let t = t % (frames + 1);
            dec.seek(t as u64).unwrap();
            prop_assert_eq!(dec.position(), t as u64);
            if t == frames {
                let ended = matches!(dec.receive(&mut one), Err(CodecError::EndOfStream));
                prop_assert!(ended);
            } else {
                prop_assert_eq!(dec.receive(&mut one).unwrap(), 1);
                prop_assert_eq!(one[0], all[0][t]);
                prop_assert_eq!(dec.position(), t as u64 + 1);
            }
            prop_assert!(dec.position() <= dec.frames());
        }
    }

    #[test]
    fn prop_misaligned_buffers_rejected(channels in 2usize..6, len in 1usize..64) {
        prop_assume!(len % channels != 0);
        let format = Format::new(channels as u16, SampleRate::CD, SampleCodec::S16LE).unwrap();
        let bytes = encode_to_vec(format, &signal(channels, 10));

        let mut dec = WavDecoder::open_seekable(Cursor::new(bytes)).unwrap();
        let mut buf = vec![0.0; len];
        let rejected = matches!(dec.receive(&mut buf), Err(CodecError::ChannelAlignment { .. }));
        prop_assert!(rejected);
        prop_assert_eq!(dec.position(), 0);

        let mut enc = WavEncoder::new(format, Cursor::new(Vec::new())).unwrap();
        let rejected = matches!(enc.send(&buf), Err(CodecError::ChannelAlignment { .. }));
        prop_assert!(rejected);
        prop_assert_eq!(enc.frames(), 0);
    }
}

#[test]
fn test_short_final_batch_is_dense() {
    let input = signal(3, 10);
    let bytes = encode_to_vec(Format::new(3, SampleRate::CD, SampleCodec::S32LE).unwrap(), &input);
    let mut dec = WavDecoder::open(&bytes[..]).unwrap();
    let mut buf = vec![f64::NAN; 3 * 8];
    assert_eq!(dec.receive(&mut buf).unwrap(), 8);
    assert_eq!(dec.receive(&mut buf).unwrap(), 2);
    for c in 0..3 {
        for f in 0..2 {
            let want = input[c * 10 + 8 + f];
            assert!((buf[c * 2 + f] - want).abs() <= SampleCodec::S32LE.quantization_error() * 2.0);
        }
    }
    assert!(matches!(dec.receive(&mut buf), Err(CodecError::EndOfStream)));
}

#[test]
fn test_sniff_does_not_consume() {
    let input = signal(2, 100);
    let bytes = encode_to_vec(Format::new(2, SampleRate::CD, SampleCodec::S16LE).unwrap(), &input);
    let registry = Registry::with_defaults().unwrap();

    let mut reader = SniffReader::new(Cursor::new(bytes.clone()));
    let desc = registry.resolve_by_sniff(&mut reader, None).unwrap();
    assert_eq!(desc.name(), "wav");
    let mut sniffed = desc.open_seeking_decoder(reader).unwrap();

    let mut plain = WavDecoder::open_seekable(Cursor::new(bytes)).unwrap();
    assert_eq!(decode_all(sniffed.as_mut(), 33), decode_all(&mut plain, 33));
}

#[test]
fn test_registry_streaming_decoder() {
    let input = signal(1, 50);
    let bytes = encode_to_vec(Format::new(1, SampleRate::CD, SampleCodec::U8).unwrap(), &input);
    let registry = Registry::with_defaults().unwrap();
    let desc = registry.resolve_by_extension(".WAV", None).unwrap();
    let mut src = desc.open_decoder(Cursor::new(bytes)).unwrap();
    assert_eq!(src.sample_kind(), SampleKind::Codec(SampleCodec::U8));
    assert_eq!(decode_all(src.as_mut(), 16)[0].len(), 50);
    src.close().unwrap();
}

#[test]
fn test_registry_encoder_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.wave");
    let registry = Registry::with_defaults().unwrap();
    let desc = registry.resolve_by_path(&path, None).unwrap();

    let mut sink: Box<dyn Sink> = desc
        .open_encoder(File::create(&path).unwrap(), Form::stereo_cd(), SampleKind::Any)
        .unwrap();
    sink.send(&signal(2, 20)).unwrap();
    sink.close().unwrap();
    drop(sink);

    let dec = wav::load(&path).unwrap();
    assert_eq!(dec.format().codec(), SampleCodec::S16LE);
    assert_eq!(dec.frames(), 20);
}

#[test]
fn test_unsupported_operation() {
    let registry = Registry::with_defaults().unwrap();
    let desc = registry.resolve_by_extension("wav", None).unwrap();
    let result = desc.open_random_access(Cursor::new(Vec::new()), Form::mono_cd(), SampleKind::Any);
    assert!(matches!(result, Err(CodecError::UnsupportedOperation(_))));
}

#[test]
fn test_bad_magic_reads_no_chunks() {
    let mut bytes = encode_to_vec(Format::mono_cd(), &[0.0; 4]);
    bytes[8..12].copy_from_slice(b"AVI ");
    let mut cursor = Cursor::new(bytes);
    assert!(matches!(
        WavDecoder::open_seekable(&mut cursor),
        Err(CodecError::BadMagic { .. })
    ));
    // only the container header was consumed
    assert_eq!(cursor.stream_position().unwrap(), 12);
}

#[test]
fn test_skips_chunks_before_and_after_data() {
    let input = signal(1, 9);
    let plain = encode_to_vec(Format::new(1, SampleRate::CD, SampleCodec::U8).unwrap(), &input);

    // container header, an odd LIST chunk, then the rest of the file, then a trailer
    let mut bytes = plain[..12].to_vec();
    bytes.extend_from_slice(b"LIST\x03\0\0\0abc\0");
    bytes.extend_from_slice(&plain[12..]);
    bytes.extend_from_slice(b"id3 \x02\0\0\0xy");
    let total = (bytes.len() - 8) as u32;
    bytes[4..8].copy_from_slice(&total.to_le_bytes());

    let mut streaming = WavDecoder::open(&bytes[..]).unwrap();
    let mut seeking = WavDecoder::open_seekable(Cursor::new(bytes.clone())).unwrap();
    let want = decode_all(&mut WavDecoder::open(&plain[..]).unwrap(), 4);
    assert_eq!(decode_all(&mut streaming, 4), want);
    assert_eq!(decode_all(&mut seeking, 4), want);
}

#[test]
fn test_save_copies_source() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("src.wav");
    let dst_path = dir.path().join("dst.wav");
    let input = signal(2, 1500);

    let mut enc = WavEncoder::new(
        Format::new(2, SampleRate::CD, SampleCodec::S16LE).unwrap(),
        File::create(&src_path).unwrap(),
    )
    .unwrap();
    enc.send(&input).unwrap();
    enc.close().unwrap();
    drop(enc);

    let mut src = wav::load(&src_path).unwrap();
    src.seek(500).unwrap();
    let written = wav::save(&mut src, &dst_path, SampleCodec::F32LE).unwrap();
    assert_eq!(written, 1000);

    let mut dst = wav::load(&dst_path).unwrap();
    assert_eq!(dst.format().codec(), SampleCodec::F32LE);
    let out = decode_all(&mut dst, 256);
    let mut orig = wav::load(&src_path).unwrap();
    let all = decode_all(&mut orig, 256);
    assert_eq!(out[0], all[0][500..].to_vec());
    assert_eq!(out[1], all[1][500..].to_vec());
}

#[test]
fn test_encoder_appends_after_existing_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefixed.bin");
    let mut file = File::create(&path).unwrap();
    file.write_all(b"PREFIX").unwrap();

    let mut enc = WavEncoder::new(Format::mono_cd(), file).unwrap();
    enc.send(&[0.5, -0.5]).unwrap();
    enc.close().unwrap();
    drop(enc);

    let mut file = File::open(&path).unwrap();
    let mut prefix = [0u8; 6];
    file.read_exact(&mut prefix).unwrap();
    assert_eq!(&prefix, b"PREFIX");
    file.seek(SeekFrom::Start(6)).unwrap();
    let mut dec = WavDecoder::open_seekable(file).unwrap();
    assert_eq!(decode_all(&mut dec, 4)[0].len(), 2);
    dec.seek(1).unwrap();
    let mut one = [0.0];
    dec.receive(&mut one).unwrap();
    assert_eq!(one[0], -0.5);
}
