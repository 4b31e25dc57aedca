//! Segment splicer — non-destructive region replacement with crossfades.
//!
//! `splice` cuts a track into head `[0, start)`, a discarded middle
//! `[start, end)`, and tail `[end, duration)`, then rebuilds it as
//! head ⧺ replacement ⧺ tail. Each junction where both sides are non-empty
//! is blended with an equal-power crossfade; an empty side gets a straight
//! boundary. Inputs are borrowed immutably, so a failed call leaves the
//! caller's track exactly as it was.
//!
//! Crossfade length arithmetic follows overlap-append semantics: a junction
//! overlaps the two pieces, so each fade shortens the result by one fade
//! window.

use crate::audio::pcm::{Track, FORMAT};
use crate::{Error, Result};

/// Replace `[start_s, end_s)` of `track` with `replacement`.
///
/// The fade window silently clamps to the shorter adjacent piece — a short
/// replacement never errors and never loses audio of the longer piece
/// outside the overlap window. The tail-side fade is additionally capped at
/// the replacement's length, so when the replacement is shorter than two
/// windows the fades overlap *inside* the replacement instead of eroding
/// surviving head audio.
pub fn splice(
    track: &Track,
    replacement: &Track,
    start_s: f64,
    end_s: f64,
    crossfade_ms: u32,
) -> Result<Track> {
    if start_s > end_s {
        return Err(Error::Splice(format!(
            "region start {start_s}s is after region end {end_s}s"
        )));
    }
    let duration = track.duration_s();
    if start_s > duration {
        return Err(Error::Splice(format!(
            "region start {start_s}s is beyond the track end at {duration:.2}s"
        )));
    }

    let ch = FORMAT.channels as usize;
    let start = FORMAT.frame_at(start_s.max(0.0)).min(track.frames());
    let end = FORMAT.frame_at(end_s).min(track.frames());

    let head = &track.samples()[..start * ch];
    let tail = &track.samples()[end * ch..];
    let fade = FORMAT.frames_for_ms(crossfade_ms);

    tracing::debug!(
        start_s,
        end_s,
        crossfade_ms,
        head_frames = start,
        tail_frames = track.frames() - end,
        replacement_frames = replacement.frames(),
        "splicing"
    );

    let mix = append_crossfade(head, replacement.samples(), fade);

    let tail_fade = if replacement.is_empty() {
        fade
    } else {
        fade.min(replacement.frames())
    };
    let merged = append_crossfade(&mix, tail, tail_fade);

    Ok(Track::from_samples(merged))
}

/// Append `b` to `a`, overlapping the last `fade` frames of `a` with the
/// first `fade` frames of `b` under an equal-power curve.
///
/// `fade` clamps to the shorter of the two pieces; zero (or an empty side)
/// degenerates to plain concatenation.
fn append_crossfade(a: &[i16], b: &[i16], fade: usize) -> Vec<i16> {
    let ch = FORMAT.channels as usize;
    let a_frames = a.len() / ch;
    let b_frames = b.len() / ch;
    let fade = fade.min(a_frames).min(b_frames);

    if fade == 0 {
        let mut out = Vec::with_capacity(a.len() + b.len());
        out.extend_from_slice(a);
        out.extend_from_slice(b);
        return out;
    }

    let mut out = Vec::with_capacity(a.len() + b.len() - fade * ch);
    out.extend_from_slice(&a[..(a_frames - fade) * ch]);

    for i in 0..fade {
        // Sample gains at the window midpoint so the curve is symmetric.
        let t = (i as f32 + 0.5) / fade as f32;
        let gain_out = (std::f32::consts::FRAC_PI_2 * t).cos();
        let gain_in = (std::f32::consts::FRAC_PI_2 * t).sin();
        for c in 0..ch {
            let sa = a[(a_frames - fade + i) * ch + c] as f32;
            let sb = b[i * ch + c] as f32;
            let mixed = (sa * gain_out + sb * gain_in).round();
            out.push(mixed.clamp(i16::MIN as f32, i16::MAX as f32) as i16);
        }
    }

    out.extend_from_slice(&b[fade * ch..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Track whose sample values encode the frame index, so any shifted or
    /// blended byte is detectable.
    fn indexed_track(seconds: f64) -> Track {
        let frames = FORMAT.frame_at(seconds);
        let mut samples = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            samples.push((i % 30_000) as i16);
            samples.push(((i + 7) % 30_000) as i16);
        }
        Track::from_samples(samples)
    }

    fn constant_track(seconds: f64, value: i16) -> Track {
        let frames = FORMAT.frame_at(seconds);
        Track::from_samples(vec![value; frames * 2])
    }

    #[test]
    fn test_non_destructive_boundaries() {
        let track = indexed_track(20.0);
        let replacement = constant_track(6.0, 1000);
        let out = splice(&track, &replacement, 5.0, 10.0, 1000).unwrap();

        // 20s - 5s region + 6s clip - two 1s fade overlaps = 19s.
        assert_eq!(out.frames(), FORMAT.frame_at(19.0));

        // Everything before start - crossfade is byte-identical.
        let ch = FORMAT.channels as usize;
        let head_guard = FORMAT.frame_at(4.0) * ch;
        assert_eq!(&out.samples()[..head_guard], &track.samples()[..head_guard]);

        // Everything after end + crossfade (original timeline) survives at
        // the end of the new timeline.
        let tail_guard = FORMAT.frame_at(9.0) * ch; // 20s - 11s
        assert_eq!(
            &out.samples()[out.samples().len() - tail_guard..],
            &track.samples()[track.samples().len() - tail_guard..],
        );
    }

    #[test]
    fn test_empty_head_is_a_straight_boundary() {
        let track = indexed_track(10.0);
        let replacement = constant_track(4.0, -2000);
        let out = splice(&track, &replacement, 0.0, 4.0, 1000).unwrap();

        // No fade on the left: the replacement's opening frames are exact.
        let ch = FORMAT.channels as usize;
        let unfaded = (replacement.frames() - FORMAT.frames_for_ms(1000)) * ch;
        assert_eq!(&out.samples()[..unfaded], &replacement.samples()[..unfaded]);
        assert_eq!(out.frames(), FORMAT.frame_at(9.0));
    }

    #[test]
    fn test_empty_tail_is_a_straight_boundary() {
        let track = indexed_track(10.0);
        let replacement = constant_track(4.0, 2000);
        let out = splice(&track, &replacement, 6.0, 10.0, 1000).unwrap();

        // No fade on the right: the replacement's closing frames are exact.
        let ch = FORMAT.channels as usize;
        let unfaded = (replacement.frames() - FORMAT.frames_for_ms(1000)) * ch;
        assert_eq!(
            &out.samples()[out.samples().len() - unfaded..],
            &replacement.samples()[replacement.samples().len() - unfaded..],
        );
        assert_eq!(out.frames(), FORMAT.frame_at(9.0));
    }

    #[test]
    fn test_zero_crossfade_concatenates_exactly() {
        let track = indexed_track(8.0);
        let replacement = constant_track(2.0, 123);
        let out = splice(&track, &replacement, 2.0, 4.0, 0).unwrap();
        assert_eq!(out.frames(), track.frames());

        let ch = FORMAT.channels as usize;
        let start = FORMAT.frame_at(2.0) * ch;
        let end = FORMAT.frame_at(4.0) * ch;
        assert_eq!(&out.samples()[..start], &track.samples()[..start]);
        assert_eq!(&out.samples()[start..end], replacement.samples());
        assert_eq!(&out.samples()[end..], &track.samples()[end..]);
    }

    #[test]
    fn test_short_replacement_clamps_both_fades() {
        let track = indexed_track(20.0);
        // Half a second of clip against two full-second fade windows.
        let replacement = constant_track(0.5, 400);
        let out = splice(&track, &replacement, 5.0, 10.0, 1000).unwrap();

        // Each fade clamps to the 0.5s clip: 20 - 5 + 0.5 - 0.5 - 0.5.
        assert_eq!(out.frames(), FORMAT.frame_at(14.5));

        // Surviving audio outside the fade windows is untouched.
        let ch = FORMAT.channels as usize;
        let head_guard = FORMAT.frame_at(4.5) * ch;
        assert_eq!(&out.samples()[..head_guard], &track.samples()[..head_guard]);
        let tail_guard = FORMAT.frame_at(9.5) * ch;
        assert_eq!(
            &out.samples()[out.samples().len() - tail_guard..],
            &track.samples()[track.samples().len() - tail_guard..],
        );
    }

    #[test]
    fn test_invalid_bounds_are_rejected() {
        let track = indexed_track(10.0);
        let replacement = constant_track(1.0, 5);

        match splice(&track, &replacement, 6.0, 3.0, 500) {
            Err(Error::Splice(_)) => {}
            other => panic!("expected splice error, got {other:?}"),
        }
        match splice(&track, &replacement, 12.0, 14.0, 500) {
            Err(Error::Splice(_)) => {}
            other => panic!("expected splice error, got {other:?}"),
        }
    }

    #[test]
    fn test_end_clamped_to_track_duration() {
        let track = indexed_track(10.0);
        let replacement = constant_track(3.0, 9);
        // end_s past the track just means "to the end".
        let out = splice(&track, &replacement, 8.0, 12.0, 0).unwrap();
        assert_eq!(out.frames(), FORMAT.frame_at(11.0));
    }
}
