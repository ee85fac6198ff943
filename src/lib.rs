#![deny(missing_docs)]

//! Streaming data path of a USB isochronous audio device.
//!
//! Isochronous OUT packets arriving at the USB frame rate are written into
//! a half-buffered [`ring::StreamBuffer`]; a Start-of-Frame-paced sync
//! event drains buffered audio toward an [`sink::AudioSink`], with a small
//! per-tick [`drift`] correction cancelling the rate mismatch between the
//! host's packet cadence and the local audio clock. The [`AudioClass`]
//! engine ties the two interrupt-driven paths together: every entry point
//! is lock-free and bounded-time, suitable for invocation from interrupt
//! context by the transport layer that owns endpoint scheduling and
//! control-transfer dispatch.

use std::sync::Once;

use tracing::{debug, trace};

use crate::config::{DEFAULT_VOLUME, DeviceSpeed, StreamConfig};
use crate::control::{
    CLEAR_FEATURE, ControlState, GET_CUR, GET_INTERFACE, GET_STATUS, MAX_ALT_SETTING,
    MAX_CONTROL_PACKET, RequestKind, SET_CUR, SET_INTERFACE, SetupReply, SetupRequest,
};
use crate::drift::{Correction, DriftCompensator};
use crate::ring::StreamBuffer;
use crate::sink::{AudioCommand, AudioSink, TransferDirection};

/// Stream configuration and transport-facing constants.
pub mod config;
/// Developer console: host simulator and ratatui monitor.
pub mod console;
/// Control requests and staged SET_CUR state.
pub mod control;
/// Per-tick drift compensation.
pub mod drift;
/// Half-buffered stream ring.
pub mod ring;
/// Audio sink capability interface.
pub mod sink;

#[cfg(test)]
mod tests;

static TRACING_INIT: Once = Once::new();

/// Install the default `tracing` subscriber once, for binaries and tests.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });
}

/// Error enumeration surfaced across the class API.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioClassError {
    /// Entry point invoked before `init` (or after `deinit`). The call had
    /// no side effects; the endpoint is currently unconfigured.
    #[error("audio interface is not initialized")]
    Uninitialized,
    /// Ring or session state could not be obtained; init fails and the
    /// device stays unconfigured.
    #[error("audio buffer allocation failed")]
    AllocationFailure,
    /// Control request this class does not implement; the transport stalls
    /// the control endpoint.
    #[error("unsupported control request")]
    UnsupportedRequest,
    /// Alternate-setting index outside the supported range; same stall
    /// path as an unsupported request.
    #[error("alternate setting out of range")]
    MalformedSelector,
    /// The sink refused an init or deinit command.
    #[error("audio sink rejected the command")]
    SinkRejected,
}

/// Playback-offset phase driven by the external synchronization source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOffset {
    /// Playback has not been armed yet; the start command is still owed.
    Unknown,
    /// Steady state; nothing owed to the sink.
    None,
    /// The caller observed a full-buffer playback boundary; the next tick
    /// hands the sink a corrected chunk.
    Full,
}

/// Lifecycle phase of the streaming engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamPhase {
    /// No active session.
    #[default]
    Idle,
    /// Endpoint open, first reception pending.
    Armed,
    /// Receiving packets, buffer not yet primed.
    Filling,
    /// Primed; frame ticks deliver corrected chunks.
    Steady,
}

/// Diagnostics snapshot used by tooling and the developer console.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamStatus {
    /// Lifecycle phase.
    pub phase: StreamPhase,
    /// Active alternate setting of the streaming interface.
    pub alt_setting: u8,
    /// Ring capacity in bytes.
    pub capacity: usize,
    /// Bytes per isochronous OUT packet.
    pub out_packet_size: usize,
    /// Current write cursor.
    pub write_cursor: usize,
    /// Current read cursor.
    pub read_cursor: usize,
    /// Wrap-aware write-ahead gap as a fraction of the capacity.
    pub buffer_fill: f32,
    /// Whether the read side has been enabled by the first midpoint fill.
    pub read_enabled: bool,
    /// Corrected delivery size computed on the most recent tick.
    pub last_chunk: usize,
    /// Packets ingested since init.
    pub packets_received: u64,
    /// Sync ticks observed since init.
    pub sync_ticks: u64,
    /// Ticks that shrank the delivery to let the write cursor catch up.
    pub shrink_corrections: u64,
    /// Ticks that grew the delivery to let the read cursor catch up.
    pub grow_corrections: u64,
}

/// Per-session state owned by the engine for the lifetime of one active
/// configuration.
struct Session {
    config: StreamConfig,
    service_interval: u8,
    ring: StreamBuffer,
    drift: DriftCompensator,
    control: ControlState,
    offset: SyncOffset,
    alt_setting: u8,
    last_chunk: usize,
    packets_received: u64,
    sync_ticks: u64,
    shrink_corrections: u64,
    grow_corrections: u64,
}

/// Streaming engine for one USB audio streaming interface.
///
/// Owns the ring buffer and stream state between `init` and `deinit`; the
/// sink is reached through static dispatch since exactly one implementation
/// exists per device. Two interrupt sources drive the engine: the
/// isochronous OUT completion ([`AudioClass::data_out`], write-cursor
/// owner) and the frame-tick source ([`AudioClass::sync`], read-cursor
/// owner). Neither path blocks, allocates, or takes a lock.
pub struct AudioClass<S: AudioSink> {
    sink: S,
    session: Option<Session>,
}

impl<S: AudioSink> AudioClass<S> {
    /// Create an engine bound to `sink`. Nothing is allocated until
    /// [`AudioClass::init`].
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            session: None,
        }
    }

    /// Borrow the sink, e.g. for diagnostics.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> StreamPhase {
        match &self.session {
            None => StreamPhase::Idle,
            Some(session) if session.packets_received == 0 => StreamPhase::Armed,
            Some(session) if !session.ring.is_primed() => StreamPhase::Filling,
            Some(_) => StreamPhase::Steady,
        }
    }

    /// Open a streaming session: validate `config`, allocate the ring and
    /// bring up the sink.
    ///
    /// On failure the device is left unconfigured and no session exists.
    /// An already-active session is torn down first so the sink sees a
    /// balanced init/deinit sequence.
    pub fn init(&mut self, config: StreamConfig, speed: DeviceSpeed) -> Result<(), AudioClassError> {
        self.deinit()?;
        config.validate()?;
        let ring = StreamBuffer::new(config.capacity())?;
        self.sink
            .init(config.sample_rate_hz, DEFAULT_VOLUME, 0)
            .map_err(|_| AudioClassError::SinkRejected)?;
        let service_interval = config.service_interval(speed);
        debug!(
            capacity = config.capacity(),
            packet = config.out_packet_size(),
            service_interval,
            "audio_init"
        );
        self.session = Some(Session {
            drift: DriftCompensator::new(config.capacity(), config.out_packet_size()),
            config,
            service_interval,
            ring,
            control: ControlState::new(),
            offset: SyncOffset::Unknown,
            alt_setting: 0,
            last_chunk: 0,
            packets_received: 0,
            sync_ticks: 0,
            shrink_corrections: 0,
            grow_corrections: 0,
        });
        Ok(())
    }

    /// Tear down the session and release the sink.
    ///
    /// Idempotent: a second call in a row is a no-op and the sink sees
    /// exactly one `deinit`. Callable from non-interrupt context; every
    /// entry point invoked afterwards observes [`AudioClassError::Uninitialized`].
    pub fn deinit(&mut self) -> Result<(), AudioClassError> {
        if self.session.take().is_some() {
            debug!("audio_deinit");
            self.sink
                .deinit(0)
                .map_err(|_| AudioClassError::SinkRejected)?;
        }
        Ok(())
    }

    /// Isochronous OUT completion: ingest one received packet.
    ///
    /// Packets for a foreign endpoint and malformed lengths are dropped
    /// without effect — losing one packet beats corrupting the ring from
    /// interrupt context. Returns the ring offset at which the endpoint
    /// must be re-armed for the next reception.
    pub fn data_out(&mut self, endpoint: u8, packet: &[u8]) -> Result<usize, AudioClassError> {
        let session = self.session.as_mut().ok_or(AudioClassError::Uninitialized)?;
        let wr = session.ring.write_cursor();
        if endpoint != session.config.out_endpoint {
            return Ok(wr);
        }
        if packet.len() > session.config.out_packet_size()
            || wr + packet.len() > session.ring.capacity()
        {
            trace!(len = packet.len(), "dropping malformed audio packet");
            return Ok(wr);
        }

        // The sink must see the received bytes at their final buffer
        // location; the write cursor advances only after delivery.
        let staged = session.ring.stage(packet);
        self.sink
            .periodic_transfer_complete(staged, TransferDirection::Out);
        let wr = session.ring.advance_write(packet.len());
        session.packets_received += 1;

        if wr == 0 && session.offset == SyncOffset::Unknown {
            let half = session.ring.half();
            self.sink
                .audio_command(session.ring.region(0, half), AudioCommand::Start);
            session.offset = SyncOffset::None;
            debug!(half, "playback armed");
        }
        if !session.ring.is_primed() && wr >= session.ring.half() {
            session.ring.mark_primed();
            debug!(write_cursor = wr, "read side enabled");
        }
        Ok(wr)
    }

    /// Frame-tick synchronization event from the Start-of-Frame source.
    ///
    /// `offset` is [`SyncOffset::Full`] when the caller has observed a
    /// full-buffer playback boundary. Before the first midpoint fill the
    /// tick is recorded but nothing is delivered, and until the first wrap
    /// arms playback the offset phase is left untouched. Otherwise the
    /// cursors are sampled once, the drift-corrected chunk for this tick is
    /// computed from that snapshot, the read cursor advances by the nominal
    /// half, and on `Full` the chunk at offset zero is handed to the sink.
    pub fn sync(&mut self, offset: SyncOffset) -> Result<(), AudioClassError> {
        let session = self.session.as_mut().ok_or(AudioClassError::Uninitialized)?;
        // Until the first wrap arms playback the phase stays Unknown; a
        // tick must not erase the pending start.
        if session.offset != SyncOffset::Unknown {
            session.offset = offset;
        }
        session.sync_ticks += 1;
        if !session.ring.is_primed() {
            return Ok(());
        }

        let (write_cursor, read_cursor) = session.ring.snapshot();
        let (chunk, correction) = session.drift.corrected_chunk(write_cursor, read_cursor);
        match correction {
            Correction::Shrink => session.shrink_corrections += 1,
            Correction::Grow => session.grow_corrections += 1,
            Correction::None => {}
        }
        session.ring.advance_read(session.drift.base());
        session.last_chunk = chunk;
        trace!(write_cursor, read_cursor, chunk, "sync_tick");

        if session.offset == SyncOffset::Full {
            self.sink
                .audio_command(session.ring.region(0, chunk), AudioCommand::Play);
            session.offset = SyncOffset::None;
        }
        Ok(())
    }

    /// Dispatch a SETUP request addressed to this interface.
    ///
    /// Handles the audio-class GET_CUR/SET_CUR pair and the standard
    /// interface requests; anything else is reported for the transport's
    /// stall path.
    pub fn setup(&mut self, request: &SetupRequest) -> Result<SetupReply, AudioClassError> {
        let session = self.session.as_mut().ok_or(AudioClassError::Uninitialized)?;
        match request.kind() {
            RequestKind::Class => match request.request {
                GET_CUR => {
                    // Mute reads always answer the unmuted default; no
                    // control state is persisted for GET.
                    let len = (request.length as usize).min(MAX_CONTROL_PACKET);
                    Ok(SetupReply::In(vec![0; len]))
                }
                SET_CUR => {
                    if request.length == 0 {
                        return Ok(SetupReply::Ack);
                    }
                    let len = session
                        .control
                        .stage_set_current(request.unit(), request.length as usize);
                    Ok(SetupReply::Out(len))
                }
                _ => Err(AudioClassError::UnsupportedRequest),
            },
            RequestKind::Standard => match request.request {
                GET_STATUS => Ok(SetupReply::In(vec![0, 0])),
                GET_INTERFACE => Ok(SetupReply::In(vec![session.alt_setting])),
                SET_INTERFACE => {
                    if request.value > u16::from(MAX_ALT_SETTING) {
                        return Err(AudioClassError::MalformedSelector);
                    }
                    session.alt_setting = request.value as u8;
                    debug!(alt_setting = session.alt_setting, "set_interface");
                    Ok(SetupReply::Ack)
                }
                CLEAR_FEATURE => Ok(SetupReply::Ack),
                _ => Err(AudioClassError::UnsupportedRequest),
            },
            RequestKind::Other => Err(AudioClassError::UnsupportedRequest),
        }
    }

    /// EP0 data-stage completion for a staged class write.
    ///
    /// When the staged SET_CUR addressed the output-mute feature unit, the
    /// received byte goes to the sink's mute control exactly once and the
    /// pending command is cleared.
    pub fn ep0_rx_ready(&mut self, data: &[u8]) -> Result<(), AudioClassError> {
        let session = self.session.as_mut().ok_or(AudioClassError::Uninitialized)?;
        if let Some(mute) = session.control.commit_set_current(data) {
            debug!(mute, "mute_control");
            self.sink.mute_control(mute);
        }
        Ok(())
    }

    /// EP0 transmit completion. Only OUT control data is processed.
    pub fn ep0_tx_ready(&mut self) -> Result<(), AudioClassError> {
        self.require_session()
    }

    /// Isochronous IN completion. Only OUT data is processed.
    pub fn data_in(&mut self, _endpoint: u8) -> Result<(), AudioClassError> {
        self.require_session()
    }

    /// Start-of-Frame hook; pacing happens through [`AudioClass::sync`].
    pub fn sof(&mut self) -> Result<(), AudioClassError> {
        self.require_session()
    }

    /// Incomplete isochronous IN frame; nothing to recover at this layer.
    pub fn iso_in_incomplete(&mut self, _endpoint: u8) -> Result<(), AudioClassError> {
        self.require_session()
    }

    /// Incomplete isochronous OUT frame; the next packet overwrites the
    /// staged region in place.
    pub fn iso_out_incomplete(&mut self, _endpoint: u8) -> Result<(), AudioClassError> {
        self.require_session()
    }

    /// Whether a staged control command is awaiting its data stage.
    pub fn control_pending(&self) -> bool {
        self.session
            .as_ref()
            .map(|session| session.control.is_pending())
            .unwrap_or(false)
    }

    /// Service interval resolved for the active session, if any.
    pub fn service_interval(&self) -> Option<u8> {
        self.session.as_ref().map(|session| session.service_interval)
    }

    /// Diagnostics snapshot; cheap enough to poll from tooling.
    pub fn status(&self) -> StreamStatus {
        let Some(session) = &self.session else {
            return StreamStatus::default();
        };
        let (write_cursor, read_cursor) = session.ring.snapshot();
        let capacity = session.ring.capacity();
        let gap = if write_cursor >= read_cursor {
            write_cursor - read_cursor
        } else {
            capacity - (read_cursor - write_cursor)
        };
        StreamStatus {
            phase: self.phase(),
            alt_setting: session.alt_setting,
            capacity,
            out_packet_size: session.config.out_packet_size(),
            write_cursor,
            read_cursor,
            buffer_fill: gap as f32 / capacity as f32,
            read_enabled: session.ring.is_primed(),
            last_chunk: session.last_chunk,
            packets_received: session.packets_received,
            sync_ticks: session.sync_ticks,
            shrink_corrections: session.shrink_corrections,
            grow_corrections: session.grow_corrections,
        }
    }

    fn require_session(&self) -> Result<(), AudioClassError> {
        if self.session.is_some() {
            Ok(())
        } else {
            Err(AudioClassError::Uninitialized)
        }
    }
}
