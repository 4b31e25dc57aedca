//! Streaming collector for the realtime music service.
//!
//! Drives one duration-bounded BidiGenerateMusic session: announce the model
//! and wait for the ack, send the weighted prompt and the musical
//! configuration, start playback, then accumulate base64 PCM chunks until
//! the byte target for the requested duration is reached and stop playback.
//!
//! The transport is behind the [`MusicSession`] trait so the loop can be
//! driven by a scripted session in tests; [`WsSession`] is the real
//! WebSocket implementation.
//!
//! Outbound messages are snake_case; inbound messages arrive camelCase.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::audio::FORMAT;
use crate::config::BackendConfig;
use crate::{Error, Result};

/// Parameters of one generation. Immutable once issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Text description of the music: style, mood, instruments.
    pub prompt: String,

    /// Target duration in seconds. The collected buffer may slightly
    /// overshoot; overshoot is retained, not trimmed.
    pub duration_s: f64,

    /// Tempo in beats per minute (20–400).
    pub bpm: u32,

    /// Prompt adherence strength.
    pub guidance: f64,

    /// Note density (0–1).
    pub density: f64,
}

impl GenerationRequest {
    /// Fail fast on invalid parameters, before any session is opened.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::Config("prompt must not be empty".into()));
        }
        if !(self.duration_s > 0.0) {
            return Err(Error::Config(format!(
                "duration must be positive, got {}",
                self.duration_s
            )));
        }
        if !(20..=400).contains(&self.bpm) {
            return Err(Error::Config(format!(
                "bpm must be between 20 and 400, got {}",
                self.bpm
            )));
        }
        if !(0.0..=1.0).contains(&self.density) {
            return Err(Error::Config(format!(
                "density must be between 0 and 1, got {}",
                self.density
            )));
        }
        Ok(())
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SetupMessage<'a> {
    setup: Setup<'a>,
}

#[derive(Serialize)]
struct Setup<'a> {
    model: &'a str,
}

#[derive(Serialize)]
struct PromptMessage<'a> {
    client_content: ClientContent<'a>,
}

#[derive(Serialize)]
struct ClientContent<'a> {
    weighted_prompts: Vec<WeightedPrompt<'a>>,
}

#[derive(Serialize)]
struct WeightedPrompt<'a> {
    text: &'a str,
    weight: f64,
}

#[derive(Serialize)]
struct ConfigMessage {
    music_generation_config: MusicGenerationConfig,
}

/// Musical parameters. The wire contract wants bpm as a formatted string.
#[derive(Serialize)]
struct MusicGenerationConfig {
    bpm: String,
    guidance: f64,
    density: f64,
}

#[derive(Serialize)]
struct PlaybackMessage {
    playback_control: PlaybackControl,
}

#[derive(Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum PlaybackControl {
    Play,
    Stop,
}

/// One inbound message. Unknown fields are ignored; a message may carry
/// zero or more audio chunks.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    #[serde(default)]
    #[allow(dead_code)]
    setup_complete: Option<serde_json::Value>,

    #[serde(default)]
    server_content: Option<ServerContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    audio_chunks: Vec<AudioChunk>,
}

#[derive(Debug, Deserialize)]
struct AudioChunk {
    data: String,
}

// ── Transport seam ───────────────────────────────────────────────────────────

/// A bidirectional text-message session with the generative service.
///
/// The collector only needs ordered text frames in both directions; tests
/// substitute a scripted implementation.
#[async_trait]
pub trait MusicSession: Send {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Receive the next text frame. `None` means the peer closed the stream.
    async fn recv(&mut self) -> Result<Option<String>>;
}

/// Real session over a TLS WebSocket.
pub struct WsSession {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsSession {
    /// Open the bidirectional session described by `config`.
    pub async fn connect(config: &BackendConfig) -> Result<Self> {
        tracing::info!(endpoint = %config.redacted().host, "connecting");
        let (inner, _response) = connect_async(config.ws_url()).await?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl MusicSession for WsSession {
    async fn send(&mut self, text: String) -> Result<()> {
        self.inner.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        while let Some(frame) = self.inner.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Close(_) => return Ok(None),
                // Ping/pong/binary frames carry no music messages.
                _ => continue,
            }
        }
        Ok(None)
    }
}

// ── Collection loop ──────────────────────────────────────────────────────────

/// Stream audio for `request` over `session` until the byte target is met.
///
/// Returns the raw PCM buffer. Any transport error, malformed message, or
/// a stream that ends before the target is a failure — a partial buffer is
/// never returned as success, and nothing further is sent on the session
/// after a failure.
pub async fn collect<S: MusicSession>(
    session: &mut S,
    request: &GenerationRequest,
    model: &str,
) -> Result<Vec<u8>> {
    request.validate()?;

    // Handshake: announce the model, wait for the ack frame.
    send_json(session, &SetupMessage { setup: Setup { model } }).await?;
    let ack = session
        .recv()
        .await?
        .ok_or_else(|| Error::Transport("stream closed during setup handshake".into()))?;
    let _: ServerMessage = serde_json::from_str(&ack)
        .map_err(|e| Error::Transport(format!("malformed setup ack: {e}")))?;

    send_json(
        session,
        &PromptMessage {
            client_content: ClientContent {
                weighted_prompts: vec![WeightedPrompt {
                    text: &request.prompt,
                    weight: 1.0,
                }],
            },
        },
    )
    .await?;
    send_json(
        session,
        &ConfigMessage {
            music_generation_config: MusicGenerationConfig {
                bpm: request.bpm.to_string(),
                guidance: request.guidance,
                density: request.density,
            },
        },
    )
    .await?;
    send_json(
        session,
        &PlaybackMessage {
            playback_control: PlaybackControl::Play,
        },
    )
    .await?;

    let target_bytes = FORMAT.bytes_for(request.duration_s);
    let mut pcm: Vec<u8> = Vec::with_capacity(target_bytes);

    tracing::info!(
        duration_s = request.duration_s,
        target_bytes,
        "playback started, collecting"
    );

    while let Some(raw) = session.recv().await? {
        let message: ServerMessage = serde_json::from_str(&raw)
            .map_err(|e| Error::Transport(format!("malformed server message: {e}")))?;
        let Some(content) = message.server_content else {
            continue;
        };

        for chunk in &content.audio_chunks {
            let bytes = BASE64_STANDARD.decode(&chunk.data)?;
            pcm.extend_from_slice(&bytes);

            if pcm.len() >= target_bytes {
                send_json(
                    session,
                    &PlaybackMessage {
                        playback_control: PlaybackControl::Stop,
                    },
                )
                .await?;
                tracing::info!(collected = pcm.len(), "byte target reached, playback stopped");
                return Ok(pcm);
            }
        }
    }

    Err(Error::Transport(format!(
        "stream ended after {} of {} bytes",
        pcm.len(),
        target_bytes
    )))
}

async fn send_json<S: MusicSession, T: Serialize>(session: &mut S, message: &T) -> Result<()> {
    session.send(serde_json::to_string(message)?).await
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Seam between the edit session and the generation transport.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a PCM buffer of at least the requested duration.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>> {
        (**self).generate(request).await
    }
}

/// Connects to the Lyria service and runs one collection per request.
pub struct LyriaClient {
    config: BackendConfig,
}

impl LyriaClient {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    /// Build a client from the environment (`GOOGLE_API_KEY`).
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(BackendConfig::from_env()?))
    }
}

#[async_trait]
impl Generator for LyriaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>> {
        // Validate before opening the session.
        request.validate()?;
        let mut session = WsSession::connect(&self.config).await?;
        collect(&mut session, request, &self.config.model).await
    }
}
