//! Lyria Studio CLI — one-shot music generation.
//!
//! Streams a clip from the realtime service and writes it as a WAV file.
//! Prints a one-line JSON summary to stdout on success:
//!
//! ```json
//! {"path":"/tmp/track.wav","duration_s":15.0,"sample_rate":24000,"channels":2}
//! ```
//!
//! Exit code 0 on success, non-zero on error. Requires `GOOGLE_API_KEY`.

use std::path::PathBuf;

use clap::Parser;
use lyria_studio::audio::{self, Track, FORMAT};
use lyria_studio::collector::{GenerationRequest, Generator, LyriaClient};

#[derive(Parser, Debug)]
#[command(
    name = "lyria-studio",
    about = "Generate a music clip via the Lyria realtime service",
    long_about = "Stream a music clip from the Lyria realtime service until the requested\n\
                  duration is collected, then write it as a 24kHz stereo WAV file.\n\
                  A JSON summary line is printed to stdout."
)]
struct Args {
    /// Text description of the music: style, mood, instruments.
    #[arg(long, short = 'p')]
    prompt: String,

    /// Target duration in seconds.
    #[arg(long, short = 'd', default_value_t = 15.0)]
    duration: f64,

    /// Tempo in beats per minute (20–400).
    #[arg(long, default_value_t = 90)]
    bpm: u32,

    /// Prompt adherence strength.
    #[arg(long, default_value_t = 7.0)]
    guidance: f64,

    /// Note density (0–1).
    #[arg(long, default_value_t = 0.5)]
    density: f64,

    /// Output WAV path.
    #[arg(long, short = 'o')]
    output: PathBuf,
}

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

    // Ensure output directory exists
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let client = LyriaClient::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let request = GenerationRequest {
        prompt: args.prompt,
        duration_s: args.duration,
        bpm: args.bpm,
        guidance: args.guidance,
        density: args.density,
    };
    request.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing::info!("Collecting {:.1}s of audio...", request.duration_s);

    let pcm = client
        .generate(&request)
        .await
        .map_err(|e| anyhow::anyhow!("generation failed: {e}"))?;

    let track = Track::from_pcm_bytes(&pcm);
    audio::write_wav(&args.output, &track)
        .map_err(|e| anyhow::anyhow!("failed to write audio: {e}"))?;

    // Print machine-readable summary to stdout for the caller
    println!(
        r#"{{"path":"{path}","duration_s":{duration:.1},"sample_rate":{sr},"channels":{ch}}}"#,
        path = args.output.display(),
        duration = track.duration_s(),
        sr = FORMAT.sample_rate,
        ch = FORMAT.channels,
    );

    Ok(())
}
