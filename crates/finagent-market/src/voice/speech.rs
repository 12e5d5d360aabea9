//! Speech recognition and synthesis over the OpenAI audio endpoints

use crate::error::{MarketError, Result};
use async_trait::async_trait;
use finagent_llm::providers::OpenAIConfig;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_STT_MODEL: &str = "whisper-1";
const DEFAULT_TTS_MODEL: &str = "tts-1";
const DEFAULT_VOICE: &str = "alloy";

/// Converts recorded audio to text
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a WAV payload
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String>;
}

/// Converts text to audio
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` as a WAV payload
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[derive(Deserialize)]
struct Transcription {
    text: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Client for `/audio/transcriptions` and `/audio/speech`
#[derive(Debug, Clone)]
pub struct OpenAISpeech {
    client: Client,
    config: OpenAIConfig,
    stt_model: String,
    tts_model: String,
    voice: String,
}

impl OpenAISpeech {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            stt_model: DEFAULT_STT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env()?)
    }

    pub fn with_stt_model(mut self, model: impl Into<String>) -> Self {
        self.stt_model = model.into();
        self
    }

    pub fn with_tts_model(mut self, model: impl Into<String>) -> Self {
        self.tts_model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MarketError::Speech(format!("HTTP {status}: {body}")))
    }
}

#[async_trait]
impl SpeechToText for OpenAISpeech {
    #[instrument(skip(self, wav), fields(bytes = wav.len(), model = %self.stt_model))]
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        let file = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.stt_model.clone())
            .part("file", file);

        let response = self
            .client
            .post(self.config.endpoint("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let transcription: Transcription = Self::check(response).await?.json().await?;
        debug!(chars = transcription.text.len(), "Received transcription");
        Ok(transcription.text)
    }
}

#[async_trait]
impl TextToSpeech for OpenAISpeech {
    #[instrument(skip(self, text), fields(chars = text.len(), model = %self.tts_model))]
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let body = SpeechRequest {
            model: &self.tts_model,
            input: text,
            voice: &self.voice,
            response_format: "wav",
        };

        let response = self
            .client
            .post(self.config.endpoint("audio/speech"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let audio = Self::check(response).await?.bytes().await?;
        debug!(bytes = audio.len(), "Received synthesized speech");
        Ok(audio.to_vec())
    }
}
