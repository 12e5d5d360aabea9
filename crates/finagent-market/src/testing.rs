//! Hand-written fakes for the cross-crate seams

use crate::error::{MarketError, Result};
use crate::voice::{AudioOutput, SpeechToText, TextToSpeech};
use async_trait::async_trait;
use finagent_llm::{
    CompletionRequest, CompletionResponse, EmbeddingProvider, LLMError, LLMProvider, Message,
    StopReason, TokenUsage,
};
use std::sync::Mutex;

/// LLM that returns a canned reply and records every request
pub(crate) struct FakeLlm {
    reply: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeLlm {
    pub(crate) fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for FakeLlm {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> finagent_llm::Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request);
        match &self.reply {
            Some(text) => Ok(CompletionResponse {
                message: Message::assistant(text.clone()),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            }),
            None => Err(LLMError::RequestFailed("fake outage".to_string())),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Bag-of-words embedder: each word bumps one hashed bucket
pub(crate) struct FakeEmbedder {
    dimension: usize,
    fail: bool,
    fail_on: Option<String>,
}

impl FakeEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
            fail_on: None,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            dimension: 8,
            fail: true,
            fail_on: None,
        }
    }

    /// Fails any batch containing `word`
    pub(crate) fn failing_on(dimension: usize, word: impl Into<String>) -> Self {
        Self {
            dimension,
            fail: false,
            fail_on: Some(word.into()),
        }
    }

    pub(crate) fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(usize::from(b)));
            vector[bucket % self.dimension] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, texts: Vec<String>) -> finagent_llm::Result<Vec<Vec<f32>>> {
        let poisoned = self
            .fail_on
            .as_deref()
            .is_some_and(|word| texts.iter().any(|text| text.contains(word)));
        if self.fail || poisoned {
            return Err(LLMError::RequestFailed("fake outage".to_string()));
        }
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Speech backend with a fixed transcript and a fixed synthesized payload
pub(crate) struct FakeSpeech {
    transcript: Option<String>,
    audio: Option<Vec<u8>>,
}

impl FakeSpeech {
    pub(crate) fn new(transcript: impl Into<String>, audio: Vec<u8>) -> Self {
        Self {
            transcript: Some(transcript.into()),
            audio: Some(audio),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            transcript: None,
            audio: None,
        }
    }
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn transcribe(&self, _wav: Vec<u8>) -> Result<String> {
        self.transcript
            .clone()
            .ok_or_else(|| MarketError::Speech("fake transcription failure".to_string()))
    }
}

#[async_trait]
impl TextToSpeech for FakeSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        self.audio
            .clone()
            .ok_or_else(|| MarketError::Speech("fake synthesis failure".to_string()))
    }
}

/// Output that keeps every payload it was asked to play
#[derive(Default)]
pub(crate) struct RecordingOutput {
    played: Mutex<Vec<Vec<u8>>>,
}

impl RecordingOutput {
    pub(crate) fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioOutput for RecordingOutput {
    fn play(&self, wav: &[u8]) -> Result<()> {
        self.played.lock().unwrap().push(wav.to_vec());
        Ok(())
    }
}
