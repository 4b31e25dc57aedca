//! Simple command-line client for the Lyria Studio daemon.
//!
//! Connects to the Unix socket, sends a JSON `generate` command, waits for
//! the response, and exits 0 on success or 1 on error.
//!
//! # Usage
//!
//! ```sh
//! lyria-client \
//!   --prompt "warm analog synthwave, night drive" \
//!   --duration 15 \
//!   --bpm 104
//!
//! # With an explicit output path:
//! lyria-client --prompt "ambient piano" --output /tmp/piano.wav
//! ```

use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    time::timeout,
};

#[derive(Parser)]
#[command(
    name = "lyria-client",
    about = "Send a generation command to the Lyria Studio daemon"
)]
struct Args {
    /// Text description of the music: style, mood, instruments
    #[arg(long, short = 'p')]
    prompt: String,

    /// Target duration in seconds (default: 15)
    #[arg(long, short = 'd', default_value = "15.0")]
    duration: f64,

    /// Tempo in beats per minute (default: 90)
    #[arg(long, default_value = "90")]
    bpm: u32,

    /// Prompt adherence strength (default: 7.0)
    #[arg(long, default_value = "7.0")]
    guidance: f64,

    /// Note density 0–1 (default: 0.5)
    #[arg(long, default_value = "0.5")]
    density: f64,

    /// Output WAV path (omit for an auto-generated spool path)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Socket path (default: /tmp/lyria-studio.sock)
    #[arg(long, default_value = "/tmp/lyria-studio.sock")]
    socket: PathBuf,

    /// Timeout in seconds to wait for generation (default: 300)
    #[arg(long, default_value = "300")]
    timeout_secs: u64,
}

#[derive(Serialize)]
struct GenerateCommand {
    op: &'static str,
    prompt: String,
    duration_s: f64,
    bpm: u32,
    guidance: f64,
    density: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Response {
    Success(SuccessResponse),
    Error(ErrorResponse),
}

#[derive(Deserialize)]
struct SuccessResponse {
    ok: bool,
    path: Option<String>,
    duration_s: Option<f64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[allow(dead_code)]
    ok: bool,
    error: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let command = GenerateCommand {
        op: "generate",
        prompt: args.prompt,
        duration_s: args.duration,
        bpm: args.bpm,
        guidance: args.guidance,
        density: args.density,
        output: args.output.map(|p| p.to_string_lossy().into_owned()),
    };
    let command_line = serde_json::to_string(&command)? + "\n";

    let stream = timeout(Duration::from_secs(10), UnixStream::connect(&args.socket))
        .await
        .context("timed out connecting to daemon socket")?
        .with_context(|| format!("failed to connect to {}", args.socket.display()))?;

    let (reader, mut writer) = stream.into_split();

    writer
        .write_all(command_line.as_bytes())
        .await
        .context("failed to send command")?;
    writer.flush().await?;
    // Signal EOF so the daemon knows we're done writing.
    drop(writer);

    let mut reader = BufReader::new(reader);
    let mut response_line = String::new();

    timeout(
        Duration::from_secs(args.timeout_secs),
        reader.read_line(&mut response_line),
    )
    .await
    .context("timed out waiting for daemon response")?
    .context("failed to read response")?;

    if response_line.is_empty() {
        bail!("daemon closed connection without sending a response");
    }

    let response: Response =
        serde_json::from_str(response_line.trim()).context("failed to parse daemon response")?;

    match response {
        Response::Success(r) if r.ok => {
            if let Some(path) = r.path {
                if let Some(duration) = r.duration_s {
                    eprintln!("generated {duration:.1}s of audio → {path}");
                } else {
                    eprintln!("done → {path}");
                }
                println!("{path}");
            } else {
                eprintln!("ok");
            }
            Ok(())
        }
        Response::Success(r) => {
            bail!("daemon returned ok=false without error field (raw: {:?})", r.path);
        }
        Response::Error(r) => {
            bail!("generation failed: {}", r.error);
        }
    }
}
