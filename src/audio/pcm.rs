//! Fixed linear-PCM format and the in-memory track buffer.
//!
//! Every track in the system shares one sample format: 24 kHz, stereo,
//! 16-bit little-endian, interleaved. Time↔offset conversion is an affine
//! function of that format; all of the byte math lives here so nothing
//! else in the crate has to do it.

/// Sample layout shared by every buffer in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Bytes per sample per channel.
    pub sample_width: u16,
}

/// The system-wide fixed format: 24 kHz, 2 channels, 2-byte samples.
pub const FORMAT: PcmFormat = PcmFormat {
    sample_rate: 24_000,
    channels: 2,
    sample_width: 2,
};

impl PcmFormat {
    /// Bytes per interleaved frame (one sample for every channel).
    pub const fn frame_bytes(&self) -> usize {
        self.channels as usize * self.sample_width as usize
    }

    /// Bytes per second of audio.
    pub const fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.frame_bytes()
    }

    /// Byte count covering `duration_s` seconds, rounded up.
    pub fn bytes_for(&self, duration_s: f64) -> usize {
        (self.bytes_per_second() as f64 * duration_s).ceil() as usize
    }

    /// Frame index of a point in time.
    pub fn frame_at(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate as f64).round() as usize
    }

    /// Frame count of a window given in milliseconds.
    pub fn frames_for_ms(&self, ms: u32) -> usize {
        (self.sample_rate as u64 * ms as u64 / 1000) as usize
    }

    /// Duration in seconds of `byte_len` bytes of PCM.
    pub fn duration_of(&self, byte_len: usize) -> f64 {
        byte_len as f64 / self.bytes_per_second() as f64
    }
}

/// An in-memory audio track at [`FORMAT`].
///
/// Holds interleaved samples; always a whole number of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    samples: Vec<i16>,
}

impl Track {
    /// Wrap interleaved samples. A trailing partial frame is dropped.
    pub fn from_samples(mut samples: Vec<i16>) -> Self {
        let ch = FORMAT.channels as usize;
        samples.truncate(samples.len() / ch * ch);
        Self { samples }
    }

    /// Decode little-endian PCM bytes.
    ///
    /// Trailing bytes that do not fill a whole frame are dropped, never
    /// zero-padded, so downstream writers always see whole frames.
    pub fn from_pcm_bytes(bytes: &[u8]) -> Self {
        let usable = bytes.len() / FORMAT.frame_bytes() * FORMAT.frame_bytes();
        let samples = bytes[..usable]
            .chunks_exact(FORMAT.sample_width as usize)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self { samples }
    }

    /// Encode as little-endian PCM bytes.
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * FORMAT.sample_width as usize);
        for &s in &self.samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of frames (per-channel sample count).
    pub fn frames(&self) -> usize {
        self.samples.len() / FORMAT.channels as usize
    }

    /// Duration in seconds.
    pub fn duration_s(&self) -> f64 {
        self.frames() as f64 / FORMAT.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
