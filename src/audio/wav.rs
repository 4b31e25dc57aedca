//! WAV container I/O at the fixed 24 kHz stereo 16-bit format.

use std::path::Path;

use crate::audio::pcm::{Track, FORMAT};
use crate::{Error, Result};

/// Write a track as a WAV file at `path`.
///
/// The header is finalized before returning, so a successful call always
/// leaves a complete container behind. On any failure the partial file is
/// removed — downstream readers never see a half-written header presented
/// as a valid artifact.
pub fn write_wav(path: impl AsRef<Path>, track: &Track) -> Result<()> {
    let path = path.as_ref();
    match write_inner(path, track) {
        Ok(()) => Ok(()),
        Err(error) => {
            let _ = std::fs::remove_file(path);
            Err(error)
        }
    }
}

fn write_inner(path: &Path, track: &Track) -> Result<()> {
    let spec = hound::WavSpec {
        channels: FORMAT.channels,
        sample_rate: FORMAT.sample_rate,
        bits_per_sample: 8 * FORMAT.sample_width,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in track.samples() {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Read a WAV file written at the fixed format.
///
/// A container with any other sample rate, channel count, or sample format
/// is rejected rather than silently resampled.
pub fn read_wav(path: impl AsRef<Path>) -> Result<Track> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate != FORMAT.sample_rate
        || spec.channels != FORMAT.channels
        || spec.bits_per_sample != 8 * FORMAT.sample_width
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(Error::Persistence(format!(
            "unexpected WAV spec {}Hz/{}ch/{}bit (want {}Hz/{}ch/{}bit int)",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            FORMAT.sample_rate,
            FORMAT.channels,
            8 * FORMAT.sample_width,
        )));
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Track::from_samples(samples))
}
