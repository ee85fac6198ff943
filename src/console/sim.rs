//! Simulated USB host driving a complete streaming session for the
//! developer console.

use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;

use crate::config::{DeviceSpeed, StreamConfig};
use crate::control::{OUT_FEATURE_UNIT, SET_CUR, SetupRequest};
use crate::sink::{AudioCommand, AudioSink, SinkFault, TransferDirection};
use crate::{AudioClass, AudioClassError, StreamStatus, SyncOffset};

const EVENT_LOG_DEPTH: usize = 12;
const STATUS_PERIOD_FRAMES: u64 = 50;
const SIM_TONE_HZ: f32 = 440.0;

/// Mute control selector carried in the high byte of `wValue`.
const MUTE_SELECTOR: u16 = 0x01;

/// Sink used by the simulator: tracks consumption and keeps a short log of
/// playback commands.
pub struct MonitorSink {
    started: bool,
    mute: u8,
    played_bytes: u64,
    events: VecDeque<String>,
}

impl MonitorSink {
    fn new() -> Self {
        Self {
            started: false,
            mute: 0,
            played_bytes: 0,
            events: VecDeque::with_capacity(EVENT_LOG_DEPTH),
        }
    }

    fn push_event(&mut self, event: String) {
        if self.events.len() == EVENT_LOG_DEPTH {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

impl AudioSink for MonitorSink {
    fn init(&mut self, sample_rate_hz: u32, volume: u8, _options: u32) -> Result<(), SinkFault> {
        self.push_event(format!("sink init {sample_rate_hz} Hz, volume {volume}"));
        Ok(())
    }

    fn deinit(&mut self, _options: u32) -> Result<(), SinkFault> {
        self.started = false;
        self.push_event("sink deinit".to_string());
        Ok(())
    }

    fn mute_control(&mut self, mute: u8) {
        self.mute = mute;
        self.push_event(format!("mute_control 0x{mute:02X}"));
    }

    fn periodic_transfer_complete(&mut self, _audio: &[u8], _direction: TransferDirection) {}

    fn audio_command(&mut self, audio: &[u8], command: AudioCommand) {
        self.played_bytes += audio.len() as u64;
        match command {
            AudioCommand::Start => {
                self.started = true;
                self.push_event(format!("start {} B", audio.len()));
            }
            AudioCommand::Play => self.push_event(format!("play {} B", audio.len())),
        }
    }
}

/// One status message from the host thread to the console UI.
pub struct StatusFrame {
    /// Engine diagnostics snapshot.
    pub status: StreamStatus,
    /// Recent sink activity, oldest first.
    pub events: Vec<String>,
    /// Last mute byte the sink received.
    pub mute: u8,
    /// Total bytes the simulated DAC has consumed.
    pub played_bytes: u64,
    /// Clock skew currently applied to the simulated DAC, in ppm.
    pub skew_ppm: i64,
}

/// Simulated USB host driving a complete streaming session.
///
/// One thread plays the host: every millisecond frame it delivers a sine
/// packet on the OUT endpoint and advances a skewed DAC clock; each
/// half-buffer the DAC finishes becomes a sync event, `Full` on the
/// full-buffer boundary. Mute toggles go through the real SET_CUR path.
pub struct HostSimulator {
    engine: Arc<Mutex<AudioClass<MonitorSink>>>,
    config: StreamConfig,
    skew_ppm: Arc<AtomicI64>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HostSimulator {
    /// Bring up an engine with `config` and start the host thread,
    /// returning the simulator plus its status feed.
    pub fn start(
        config: StreamConfig,
        skew_ppm: i64,
    ) -> Result<(Self, Receiver<StatusFrame>), AudioClassError> {
        let mut engine = AudioClass::new(MonitorSink::new());
        engine.init(config, DeviceSpeed::Full)?;
        let engine = Arc::new(Mutex::new(engine));
        let skew = Arc::new(AtomicI64::new(skew_ppm));
        let running = Arc::new(AtomicBool::new(true));
        let (status_tx, status_rx) = bounded(4);

        let handle = thread::spawn({
            let engine = engine.clone();
            let skew = skew.clone();
            let running = running.clone();
            move || run_host(engine, config, skew, running, status_tx)
        });

        Ok((
            Self {
                engine,
                config,
                skew_ppm: skew,
                running,
                handle: Some(handle),
            },
            status_rx,
        ))
    }

    /// Configuration of the simulated session.
    pub fn config(&self) -> StreamConfig {
        self.config
    }

    /// Flip the output mute through the class control path. Returns the
    /// byte that was sent.
    pub fn toggle_mute(&self) -> u8 {
        let mut engine = self.engine.lock();
        let next = if engine.sink().mute == 0 { 1 } else { 0 };
        let request = SetupRequest {
            request_type: 0x21,
            request: SET_CUR,
            value: MUTE_SELECTOR << 8,
            index: u16::from(OUT_FEATURE_UNIT) << 8,
            length: 1,
        };
        if engine.setup(&request).is_ok() {
            let _ = engine.ep0_rx_ready(&[next]);
        }
        next
    }

    /// Nudge the simulated DAC clock. Returns the new skew in ppm.
    pub fn adjust_skew(&self, delta_ppm: i64) -> i64 {
        self.skew_ppm.fetch_add(delta_ppm, Ordering::Relaxed) + delta_ppm
    }

    /// Stop the host thread and tear the session down.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HostSimulator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_host(
    engine: Arc<Mutex<AudioClass<MonitorSink>>>,
    config: StreamConfig,
    skew: Arc<AtomicI64>,
    running: Arc<AtomicBool>,
    status_tx: Sender<StatusFrame>,
) {
    let packet_size = config.out_packet_size();
    let half = config.half() as f64;
    let mut packet = vec![0u8; packet_size];
    let mut phase = 0.0f32;
    let mut dac_position = 0.0f64;
    let mut half_boundaries = 0u64;
    let mut frame = 0u64;

    while running.load(Ordering::Relaxed) {
        fill_sine_packet(&mut packet, &mut phase, &config);
        {
            let mut engine = engine.lock();
            let _ = engine.data_out(config.out_endpoint, &packet);

            if engine.sink().started {
                let rate = 1.0 + skew.load(Ordering::Relaxed) as f64 / 1_000_000.0;
                dac_position += packet_size as f64 * rate;
                while dac_position >= half {
                    dac_position -= half;
                    half_boundaries += 1;
                    let offset = if half_boundaries % 2 == 0 {
                        SyncOffset::Full
                    } else {
                        SyncOffset::None
                    };
                    let _ = engine.sync(offset);
                }
            }

            frame += 1;
            if frame % STATUS_PERIOD_FRAMES == 0 {
                let sink = engine.sink();
                let update = StatusFrame {
                    status: engine.status(),
                    events: sink.events.iter().cloned().collect(),
                    mute: sink.mute,
                    played_bytes: sink.played_bytes,
                    skew_ppm: skew.load(Ordering::Relaxed),
                };
                let _ = status_tx.try_send(update);
            }
        }
        thread::sleep(Duration::from_millis(1));
    }

    let _ = engine.lock().deinit();
}

fn fill_sine_packet(packet: &mut [u8], phase: &mut f32, config: &StreamConfig) {
    let frame_size = (config.channels * config.bytes_per_sample) as usize;
    let step = SIM_TONE_HZ / config.sample_rate_hz as f32;
    for frame in packet.chunks_exact_mut(frame_size) {
        let sample = ((*phase * TAU).sin() * 0.5 * f32::from(i16::MAX)) as i16;
        let bytes = sample.to_le_bytes();
        for channel in frame.chunks_exact_mut(2) {
            channel.copy_from_slice(&bytes);
        }
        *phase = (*phase + step).fract();
    }
}
