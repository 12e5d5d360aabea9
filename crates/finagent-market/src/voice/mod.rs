//! Voice input and output
//!
//! [`VoiceAgent`] ties a speech-to-text backend, a text-to-speech backend and
//! an audio sink together. Playback happens on a detached thread; callers
//! poll [`VoiceAgent::is_speaking`] instead of awaiting it.

#[cfg(feature = "audio-io")]
pub mod capture;
pub mod output;
pub mod speech;
pub mod wav;

pub use output::{AudioOutput, NullOutput, default_output};
pub use speech::{OpenAISpeech, SpeechToText, TextToSpeech};

use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{error, info, warn};

pub const DEFAULT_LISTEN_DURATION: Duration = Duration::from_secs(5);
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_CHANNELS: u16 = 1;

const QUIET_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sets the speaking flag back when playback ends, including on panic
struct PlaybackGuard(Arc<AtomicBool>);

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct VoiceAgent {
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    output: Arc<dyn AudioOutput>,
    /// `true` when no playback is in progress
    speech_done: Arc<AtomicBool>,
}

impl VoiceAgent {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
        output: Arc<dyn AudioOutput>,
    ) -> Self {
        Self {
            stt,
            tts,
            output,
            speech_done: Arc::new(AtomicBool::new(true)),
        }
    }

    /// OpenAI for both directions, playing through [`default_output`]
    pub fn openai(speech: OpenAISpeech) -> Self {
        let speech = Arc::new(speech);
        Self::new(speech.clone(), speech, default_output())
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::openai(OpenAISpeech::from_env()?))
    }

    /// Transcript of a WAV payload, or an empty string on failure
    pub async fn transcribe_audio(&self, audio: Vec<u8>) -> String {
        match self.stt.transcribe(audio).await {
            Ok(text) => {
                let text = text.trim().to_string();
                info!("Transcribed text: {text}");
                text
            }
            Err(e) => {
                error!("Error transcribing audio: {e}");
                String::new()
            }
        }
    }

    /// Synthesized WAV for `text`, or `None` on failure
    pub async fn synthesize(&self, text: &str) -> Option<Vec<u8>> {
        match self.tts.synthesize(text).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                error!("TTS Error: {e}");
                None
            }
        }
    }

    /// Synthesize and play `text` on a background thread
    ///
    /// The returned handle may be dropped; [`VoiceAgent::is_speaking`]
    /// reports progress either way.
    pub fn speak_text(&self, text: impl Into<String>) -> JoinHandle<()> {
        let text = text.into();
        let tts = Arc::clone(&self.tts);
        let output = Arc::clone(&self.output);
        let guard = self.begin_playback();
        let runtime = Handle::try_current().ok();

        std::thread::spawn(move || {
            let _guard = guard;
            let result = block_on_synthesis(runtime, tts.as_ref(), &text)
                .and_then(|audio| output.play(&audio));
            if let Err(e) = result {
                error!("TTS Error: {e}");
            }
        })
    }

    /// Play already synthesized audio on a background thread
    pub fn play_in_background(&self, audio: Vec<u8>) -> JoinHandle<()> {
        let output = Arc::clone(&self.output);
        let guard = self.begin_playback();

        std::thread::spawn(move || {
            let _guard = guard;
            if let Err(e) = output.play(&audio) {
                error!("Playback error: {e}");
            }
        })
    }

    pub fn is_speaking(&self) -> bool {
        !self.speech_done.load(Ordering::SeqCst)
    }

    /// Wait for playback to finish; `false` if `timeout` elapsed first
    pub async fn wait_until_quiet(&self, timeout: Duration) -> bool {
        let wait = async {
            while self.is_speaking() {
                tokio::time::sleep(QUIET_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Record from the microphone and return 16-bit PCM WAV bytes
    ///
    /// Empty on any failure, and always empty without the `audio-io` feature.
    pub async fn listen_microphone(
        &self,
        duration: Duration,
        sample_rate: u32,
        channels: u16,
    ) -> Vec<u8> {
        #[cfg(feature = "audio-io")]
        {
            let recording = tokio::task::spawn_blocking(move || {
                let samples = capture::record(duration, sample_rate, channels)?;
                wav::encode_wav(&samples, sample_rate, channels)
            })
            .await;

            match recording {
                Ok(Ok(audio)) => audio,
                Ok(Err(e)) => {
                    error!("Error recording audio: {e}");
                    Vec::new()
                }
                Err(e) => {
                    error!("Recording task failed: {e}");
                    Vec::new()
                }
            }
        }
        #[cfg(not(feature = "audio-io"))]
        {
            warn!(
                seconds = duration.as_secs_f32(),
                sample_rate, channels, "Microphone capture needs the audio-io feature"
            );
            Vec::new()
        }
    }

    /// Listen, transcribe, echo the text back and speak it
    pub async fn process_microphone_input(&self, duration: Duration) -> Option<String> {
        self.process_microphone_input_with(duration, |text| async move {
            format!("You said: {text}")
        })
        .await
    }

    /// Listen, transcribe, hand the text to `callback` and speak its reply
    ///
    /// `None` when nothing was recorded or nothing was understood.
    pub async fn process_microphone_input_with<F, Fut>(
        &self,
        duration: Duration,
        callback: F,
    ) -> Option<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = String>,
    {
        let audio = self
            .listen_microphone(duration, DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)
            .await;
        if audio.is_empty() {
            warn!("No audio captured");
            return None;
        }

        let text = self.transcribe_audio(audio).await;
        if text.is_empty() {
            warn!("Nothing recognized in the recording");
            return None;
        }

        let response = callback(text).await;
        self.speak_text(response.clone());
        Some(response)
    }

    fn begin_playback(&self) -> PlaybackGuard {
        self.speech_done.store(false, Ordering::SeqCst);
        PlaybackGuard(Arc::clone(&self.speech_done))
    }
}

/// Drive a synthesis future from a plain thread
///
/// A multi-threaded caller runtime is reused; otherwise a private
/// current-thread runtime is built for the call.
fn block_on_synthesis(
    runtime: Option<Handle>,
    tts: &dyn TextToSpeech,
    text: &str,
) -> Result<Vec<u8>> {
    match runtime {
        Some(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            handle.block_on(tts.synthesize(text))
        }
        _ => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(tts.synthesize(text)),
    }
}
