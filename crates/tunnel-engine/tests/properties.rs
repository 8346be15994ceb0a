//! Property tests for the ring buffer and the built-in effects.

use proptest::prelude::*;
use std::collections::VecDeque;
use std::time::Duration;
use tunnel_engine::{EffectKind, FrameBlock, RingBuffer};

/// Parameters for `kind`, scaled from unit values into sensible ranges.
fn scaled_params(kind: EffectKind, t: [f32; 3]) -> Vec<(&'static str, f32)> {
    match kind {
        EffectKind::Gain => vec![("gain_db", -24.0 + 48.0 * t[0])],
        EffectKind::Distortion => vec![("intensity", 10.0 * t[0]), ("mix", t[1])],
        EffectKind::Echo => vec![("delay_ms", 1.0 + 300.0 * t[0]), ("feedback", 0.9 * t[1])],
        EffectKind::Tremolo => vec![("rate_hz", 20.0 * t[0]), ("depth", t[1])],
        EffectKind::Reverb => vec![("room_size", t[0]), ("damping", t[1]), ("mix", t[2])],
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Occupancy never exceeds capacity and a drain returns the newest
    /// `capacity` frames in write order.
    #[test]
    fn ring_keeps_newest_frames_in_order(
        capacity in 1usize..32,
        channels in 1u16..3,
        writes in prop::collection::vec(0usize..40, 1..12),
    ) {
        let ring = RingBuffer::new(capacity, channels).unwrap();
        let mut model: VecDeque<f32> = VecDeque::new();
        let mut next = 0.0f32;
        let ch = channels as usize;

        for frames in writes {
            let data: Vec<f32> = (0..frames * ch).map(|_| { next += 1.0; next }).collect();
            ring.write_interleaved(&data).unwrap();
            model.extend(data);
            while model.len() > capacity * ch {
                model.pop_front();
            }
            prop_assert!(ring.available() <= capacity);
            prop_assert_eq!(ring.available() * ch, model.len());
        }

        let out = ring.read(capacity, false, None);
        prop_assert_eq!(out.channels(), channels);
        let expected = model.iter().copied().collect::<Vec<_>>();
        prop_assert_eq!(out.samples(), expected.as_slice());
        prop_assert_eq!(ring.available(), 0);
    }

    /// Interleaved reads and writes never lose or duplicate frames while the
    /// ring has room.
    #[test]
    fn ring_is_fifo_below_capacity(chunks in prop::collection::vec((1usize..8, 1usize..8), 1..20)) {
        let ring = RingBuffer::new(16, 1).unwrap();
        let mut written = 0.0f32;
        let mut expected = 0.0f32;
        for (w, r) in chunks {
            let room = 16 - ring.available();
            let w = w.min(room);
            let data: Vec<f32> = (0..w).map(|_| { written += 1.0; written }).collect();
            ring.write_interleaved(&data).unwrap();

            let got = ring.read(r, true, Some(Duration::ZERO));
            for &s in got.samples() {
                expected += 1.0;
                prop_assert_eq!(s, expected);
            }
        }
    }

    /// Every built-in effect stays finite on in-range input; all but gain and
    /// tremolo also stay within [-1, 1], and tremolo never amplifies.
    #[test]
    fn effects_stay_finite_and_bounded(
        kind_idx in 0usize..5,
        t in prop::array::uniform3(0.0f32..=1.0f32),
        input in prop::collection::vec(-1.0f32..=1.0f32, 2..256),
        sample_rate in prop::sample::select(vec![8000u32, 22050, 44100]),
    ) {
        let kind = EffectKind::ALL[kind_idx];
        let mut fx = kind.create_with(&scaled_params(kind, t)).unwrap();
        let frames = input.len() / 2;
        let samples = input[..frames * 2].to_vec();

        for _ in 0..4 {
            let mut block = FrameBlock::new(samples.clone(), 2).unwrap();
            fx.process(&mut block, sample_rate);
            for (out, inp) in block.samples().iter().zip(&samples) {
                prop_assert!(out.is_finite(), "{} produced {}", kind, out);
                match kind {
                    EffectKind::Gain => {}
                    EffectKind::Tremolo => prop_assert!(out.abs() <= inp.abs() + 1e-6),
                    _ => prop_assert!(out.abs() <= 1.0, "{} produced {}", kind, out),
                }
            }
        }
    }
}
