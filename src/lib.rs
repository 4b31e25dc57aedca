//! Iterative music editing over the Lyria realtime streaming service.
//!
//! Streams PCM audio from the `models/lyria-realtime-exp` bidirectional
//! session into fixed-format tracks (24 kHz stereo, 16-bit), and supports
//! non-destructive region editing: split a track into regions, regenerate a
//! region as a candidate clip, commit the candidate back into the working
//! track under equal-power crossfades, export the result as WAV.
//!
//! ## Data flow
//!
//! ```text
//! prompt ──→ collector (WebSocket session, base64 PCM chunks)
//!                 │ raw PCM bytes
//!                 ▼
//!           audio::Track ───→ audio::wav (artifact I/O)
//!                 │
//!                 ▼
//!        session::EditSession ───→ audio::splice (crossfade commit)
//! ```
//!
//! ## Modules
//!
//! - [`audio`] — fixed PCM format, track buffer, WAV I/O, segment splicer
//! - [`collector`] — duration-bounded streaming session against the service
//! - [`session`] — edit-session state machine (split / regenerate / commit)
//! - [`config`] — backend endpoint and credentials

pub mod audio;
pub mod collector;
pub mod config;
pub mod session;

mod error;

pub use error::{Error, Result};
