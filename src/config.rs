//! Backend endpoint configuration.
//!
//! The generative service is addressed by a fixed model identifier over a
//! bidirectional WebSocket. Credentials come from the `GOOGLE_API_KEY`
//! environment variable; a missing key fails fast, before any session is
//! opened.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default service host.
pub const DEFAULT_HOST: &str = "generativelanguage.googleapis.com";

/// Fixed model identifier for realtime music generation.
pub const MODEL_ID: &str = "models/lyria-realtime-exp";

/// Connection parameters for the generative backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// API key, sent as a query parameter.
    pub api_key: String,

    /// Service host.
    pub host: String,

    /// Model identifier announced in the setup handshake.
    pub model: String,
}

impl BackendConfig {
    /// Build a config from the environment.
    ///
    /// Reads `GOOGLE_API_KEY`; host and model use the fixed defaults.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| Error::Config("GOOGLE_API_KEY not found in environment".into()))?;
        if api_key.trim().is_empty() {
            return Err(Error::Config("GOOGLE_API_KEY is empty".into()));
        }
        Ok(Self {
            api_key,
            host: DEFAULT_HOST.to_string(),
            model: MODEL_ID.to_string(),
        })
    }

    /// The wss endpoint for the bidirectional music session.
    pub fn ws_url(&self) -> String {
        format!(
            "wss://{}/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateMusic?key={}",
            self.host, self.api_key
        )
    }

    /// Copy with the key replaced, for logging.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: "***".to_string(),
            ..self.clone()
        }
    }
}
