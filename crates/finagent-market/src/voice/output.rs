//! Audio playback

use crate::error::Result;
use std::sync::Arc;
use tracing::debug;

/// Blocking playback of a WAV payload
pub trait AudioOutput: Send + Sync {
    /// Play `wav` to completion
    fn play(&self, wav: &[u8]) -> Result<()>;
}

/// Output that discards audio; used when no sound device is compiled in
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn play(&self, wav: &[u8]) -> Result<()> {
        debug!(
            bytes = wav.len(),
            seconds = super::wav::wav_duration(wav).map(|d| d.as_secs_f32()),
            "Discarding audio, no output device"
        );
        Ok(())
    }
}

/// Default output device through rodio
#[cfg(feature = "audio-io")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioOutput;

#[cfg(feature = "audio-io")]
impl AudioOutput for RodioOutput {
    fn play(&self, wav: &[u8]) -> Result<()> {
        use crate::error::MarketError;
        use rodio::{Decoder, OutputStream, Sink};
        use std::io::Cursor;

        let (_stream, handle) = OutputStream::try_default()
            .map_err(|e| MarketError::Audio(format!("No output device: {e}")))?;
        let sink =
            Sink::try_new(&handle).map_err(|e| MarketError::Audio(format!("Playback failed: {e}")))?;
        let source = Decoder::new(Cursor::new(wav.to_vec()))
            .map_err(|e| MarketError::Audio(format!("Undecodable audio: {e}")))?;

        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}

/// Rodio when built with `audio-io`, otherwise [`NullOutput`]
pub fn default_output() -> Arc<dyn AudioOutput> {
    #[cfg(feature = "audio-io")]
    {
        Arc::new(RodioOutput)
    }
    #[cfg(not(feature = "audio-io"))]
    {
        Arc::new(NullOutput)
    }
}
