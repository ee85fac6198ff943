//! Capability interface to the physical audio sink (codec/DMA layer).

use thiserror::Error;

/// Error returned when the sink refuses an `init` or `deinit` command.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("audio sink rejected the command")]
pub struct SinkFault;

/// Playback command issued alongside a buffer region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioCommand {
    /// Begin playback; issued once, over the first half-buffer, when the
    /// ring has been filled end to end for the first time.
    Start,
    /// Continue playback with a drift-corrected chunk.
    Play,
}

/// Direction tag attached to periodic transfer completions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferDirection {
    /// Host-to-device audio (playback path).
    Out,
    /// Device-to-host audio (capture path).
    In,
}

/// The five operations the streaming engine needs from the audio hardware.
///
/// Exactly one implementation exists per device, so the engine takes the
/// sink as a generic parameter and dispatches statically. Tests bridge it
/// to an in-memory recorder.
pub trait AudioSink {
    /// Bring up the hardware for `sample_rate_hz` at `volume`.
    fn init(&mut self, sample_rate_hz: u32, volume: u8, options: u32) -> Result<(), SinkFault>;

    /// Release the hardware.
    fn deinit(&mut self, options: u32) -> Result<(), SinkFault>;

    /// Apply the mute byte received through the class control path.
    fn mute_control(&mut self, mute: u8);

    /// One isochronous transfer finished; `audio` is the freshly received
    /// (or transmitted) region at its final location in the stream buffer.
    fn periodic_transfer_complete(&mut self, audio: &[u8], direction: TransferDirection);

    /// Hand a buffer region to the playback engine.
    fn audio_command(&mut self, audio: &[u8], command: AudioCommand);
}

/// Sink that accepts every command and discards the audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn init(&mut self, _sample_rate_hz: u32, _volume: u8, _options: u32) -> Result<(), SinkFault> {
        Ok(())
    }

    fn deinit(&mut self, _options: u32) -> Result<(), SinkFault> {
        Ok(())
    }

    fn mute_control(&mut self, _mute: u8) {}

    fn periodic_transfer_complete(&mut self, _audio: &[u8], _direction: TransferDirection) {}

    fn audio_command(&mut self, _audio: &[u8], _command: AudioCommand) {}
}
