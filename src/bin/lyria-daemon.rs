//! Lyria Studio daemon — Unix socket, line-delimited JSON.
//!
//! Keeps one edit session resident. Each client connection sends JSON
//! command lines and receives one JSON response line per command; the
//! connection stays open for the whole editing conversation.
//!
//! # Socket path
//!
//! Default: `/tmp/lyria-studio.sock`. Override with `--socket`.
//!
//! # Protocol
//!
//! **Commands** (one JSON line each):
//! ```json
//! {"op":"generate","prompt":"warm synthwave","duration_s":15,"bpm":104,"density":0.5}
//! {"op":"load","path":"/tmp/track_1712.wav"}
//! {"op":"split","n":4}
//! {"op":"regenerate","region":2,"prompt":"half-time breakdown","bpm":90,"density":0.6,"crossfade_s":3.0}
//! {"op":"commit","crossfade_ms":3000}
//! {"op":"finalize"}
//! ```
//!
//! **Response on success** (one JSON line):
//! ```json
//! {"ok":true,"state":"segmented","regions":[{"id":1,"start_s":0.0,"end_s":5.0,"name":"Section 1"}]}
//! ```
//!
//! **Response on error** (one JSON line):
//! ```json
//! {"ok":false,"error":"splice: region start 6s is after region end 3s"}
//! ```
//!
//! A command that needs the edit session while a generation is in flight is
//! answered with a busy error instead of queueing behind it.
//!
//! # Example (shell)
//!
//! ```sh
//! echo '{"op":"generate","prompt":"ambient piano","duration_s":20}' \
//!   | socat - UNIX-CONNECT:/tmp/lyria-studio.sock
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
    sync::Mutex,
};

use lyria_studio::audio::{self, Track};
use lyria_studio::collector::{GenerationRequest, Generator, LyriaClient};
use lyria_studio::session::{EditSession, Region, SessionState};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "lyria-daemon",
    about = "Lyria Studio daemon — resident edit session, Unix socket JSON interface"
)]
struct Args {
    /// Unix socket path to listen on.
    #[arg(long, default_value = "/tmp/lyria-studio.sock")]
    socket: PathBuf,
}

// ── Wire types ───────────────────────────────────────────────────────────────

fn default_duration() -> f64 {
    15.0
}

fn default_bpm() -> u32 {
    90
}

fn default_guidance() -> f64 {
    7.0
}

fn default_density() -> f64 {
    0.5
}

fn default_crossfade_s() -> f64 {
    3.0
}

fn default_crossfade_ms() -> u32 {
    3000
}

/// One command received over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command {
    /// Generate a standalone track (outside the edit session).
    Generate {
        prompt: String,
        #[serde(default = "default_duration")]
        duration_s: f64,
        #[serde(default = "default_bpm")]
        bpm: u32,
        #[serde(default = "default_guidance")]
        guidance: f64,
        #[serde(default = "default_density")]
        density: f64,
        /// Output path. `null` or absent = auto-generated in the spool dir.
        #[serde(default)]
        output: Option<String>,
    },
    /// Load a WAV file as the session's source track.
    Load { path: String },
    /// Partition the working track into `n` equal regions.
    Split { n: usize },
    /// Generate a candidate clip for a region.
    Regenerate {
        region: usize,
        prompt: String,
        #[serde(default = "default_bpm")]
        bpm: u32,
        #[serde(default = "default_guidance")]
        guidance: f64,
        #[serde(default = "default_density")]
        density: f64,
        #[serde(default = "default_crossfade_s")]
        crossfade_s: f64,
    },
    /// Splice the candidate into the working track.
    Commit {
        #[serde(default = "default_crossfade_ms")]
        crossfade_ms: u32,
    },
    /// Export the working track as the session artifact.
    Finalize {
        /// Output path. `null` or absent = `<source>_edited_<ts>.wav`.
        #[serde(default)]
        output: Option<String>,
    },
}

/// Response sent back to the client.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Response {
    Ok {
        ok: bool, // always true
        state: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_s: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        regions: Option<Vec<Region>>,
    },
    Err {
        ok: bool, // always false
        error: String,
    },
}

impl Response {
    fn ok_duration(state: SessionState, duration_s: f64) -> Self {
        Self::Ok {
            ok: true,
            state: state.as_str().to_string(),
            path: None,
            duration_s: Some(duration_s),
            regions: None,
        }
    }

    fn ok_path(state: SessionState, path: String, duration_s: f64) -> Self {
        Self::Ok {
            ok: true,
            state: state.as_str().to_string(),
            path: Some(path),
            duration_s: Some(duration_s),
            regions: None,
        }
    }

    fn ok_regions(state: SessionState, regions: Vec<Region>) -> Self {
        Self::Ok {
            ok: true,
            state: state.as_str().to_string(),
            path: None,
            duration_s: None,
            regions: Some(regions),
        }
    }

    fn err(msg: impl Into<String>) -> Self {
        Self::Err {
            ok: false,
            error: msg.into(),
        }
    }
}

// ── Studio state ─────────────────────────────────────────────────────────────

/// Session plus the path it was loaded from (for finalize naming).
struct StudioState {
    session: EditSession<Arc<LyriaClient>>,
    loaded_path: Option<PathBuf>,
}

struct Studio {
    client: Arc<LyriaClient>,
    state: Mutex<StudioState>,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Spool directory for auto-named artifacts, `/tmp` as a fallback.
fn spool_dir() -> PathBuf {
    let spool = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("lyria-studio/spool");
    if std::fs::create_dir_all(&spool).is_ok() {
        spool
    } else {
        PathBuf::from("/tmp")
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Fail fast on missing credentials, before binding the socket.
    let client = Arc::new(LyriaClient::from_env()?);

    // Remove stale socket file if present.
    if args.socket.exists() {
        std::fs::remove_file(&args.socket)?;
    }

    let listener = UnixListener::bind(&args.socket)?;
    tracing::info!("Listening on {:?}", args.socket);

    let studio = Arc::new(Studio {
        client: client.clone(),
        state: Mutex::new(StudioState {
            session: EditSession::new(client),
            loaded_path: None,
        }),
    });

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let studio = studio.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, studio).await {
                        tracing::warn!("connection error: {e}");
                    }
                });
            }
            Err(e) => {
                tracing::error!("accept error: {e}");
            }
        }
    }
}

// ── Connection handler ───────────────────────────────────────────────────────

async fn handle_connection(stream: UnixStream, studio: Arc<Studio>) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = process_command(&line, &studio).await;
        send_response(&mut writer, response).await?;
    }
    Ok(())
}

async fn process_command(line: &str, studio: &Studio) -> Response {
    let command: Command = match serde_json::from_str(line) {
        Ok(c) => c,
        Err(e) => return Response::err(format!("invalid JSON command: {e}")),
    };

    match command {
        Command::Generate {
            prompt,
            duration_s,
            bpm,
            guidance,
            density,
            output,
        } => {
            let request = GenerationRequest {
                prompt,
                duration_s,
                bpm,
                guidance,
                density,
            };
            if let Err(e) = request.validate() {
                return Response::err(e.to_string());
            }

            let output = output
                .map(PathBuf::from)
                .unwrap_or_else(|| spool_dir().join(format!("track_{}.wav", now_millis())));
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        return Response::err(format!("could not create output directory: {e}"));
                    }
                }
            }

            tracing::info!(prompt = %request.prompt, duration_s, output = %output.display(), "generating");

            let pcm = match studio.client.generate(&request).await {
                Ok(pcm) => pcm,
                Err(e) => return Response::err(format!("generation failed: {e}")),
            };
            let track = Track::from_pcm_bytes(&pcm);
            if let Err(e) = audio::write_wav(&output, &track) {
                return Response::err(format!("failed to write audio file: {e}"));
            }

            tracing::info!(output = %output.display(), "done");
            Response::ok_path(
                SessionState::Empty,
                output.to_string_lossy().into_owned(),
                track.duration_s(),
            )
        }

        // Everything below needs the edit session. A generation in flight
        // holds the lock, so a concurrent command gets an explicit busy
        // answer instead of queueing behind it.
        session_command => {
            let mut state = match studio.state.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    return Response::err("session is busy — a generation is in flight");
                }
            };

            match session_command {
                Command::Generate { .. } => unreachable!("handled above"),

                Command::Load { path } => {
                    let track = match audio::read_wav(&path) {
                        Ok(track) => track,
                        Err(e) => return Response::err(format!("failed to load track: {e}")),
                    };
                    let duration_s = track.duration_s();
                    if let Err(e) = state.session.load(track) {
                        return Response::err(e.to_string());
                    }
                    state.loaded_path = Some(PathBuf::from(&path));
                    Response::ok_path(state.session.state(), path, duration_s)
                }

                Command::Split { n } => match state.session.split(n) {
                    Ok(regions) => {
                        let regions = regions.to_vec();
                        Response::ok_regions(state.session.state(), regions)
                    }
                    Err(e) => Response::err(e.to_string()),
                },

                Command::Regenerate {
                    region,
                    prompt,
                    bpm,
                    guidance,
                    density,
                    crossfade_s,
                } => {
                    match state
                        .session
                        .regenerate(region, &prompt, bpm, guidance, density, crossfade_s)
                        .await
                    {
                        Ok(candidate) => {
                            let duration_s = candidate.track.duration_s();
                            Response::ok_duration(state.session.state(), duration_s)
                        }
                        Err(e) => Response::err(e.to_string()),
                    }
                }

                Command::Commit { crossfade_ms } => match state.session.commit(crossfade_ms) {
                    Ok(()) => {
                        let duration_s = state
                            .session
                            .working()
                            .map(|t| t.duration_s())
                            .unwrap_or(0.0);
                        Response::ok_duration(state.session.state(), duration_s)
                    }
                    Err(e) => Response::err(e.to_string()),
                },

                Command::Finalize { output } => {
                    let output = output
                        .map(PathBuf::from)
                        .unwrap_or_else(|| master_path(state.loaded_path.as_deref()));
                    match state.session.finalize(&output) {
                        Ok(path) => {
                            let duration_s = state
                                .session
                                .working()
                                .map(|t| t.duration_s())
                                .unwrap_or(0.0);
                            Response::ok_path(
                                state.session.state(),
                                path.to_string_lossy().into_owned(),
                                duration_s,
                            )
                        }
                        Err(e) => Response::err(e.to_string()),
                    }
                }
            }
        }
    }
}

/// Default artifact path for finalize: next to the source track, named
/// `<stem>_edited_<secs>.wav` (a previous `_edited` suffix is stripped so
/// repeated sessions do not stack suffixes).
fn master_path(loaded: Option<&std::path::Path>) -> PathBuf {
    let secs = now_millis() / 1000;
    match loaded {
        Some(path) => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("track");
            let clean = stem.split("_edited").next().unwrap_or(stem);
            let name = format!("{clean}_edited_{secs}.wav");
            match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
                _ => PathBuf::from(name),
            }
        }
        None => spool_dir().join(format!("master_{secs}.wav")),
    }
}

async fn send_response(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    response: Response,
) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(&response)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    Ok(())
}
