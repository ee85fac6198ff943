use usb_audio_kit::config::{DeviceSpeed, StreamConfig};
use usb_audio_kit::control::{GET_CUR, SetupRequest};
use usb_audio_kit::sink::{AudioCommand, AudioSink, SinkFault, TransferDirection};
use usb_audio_kit::{AudioClass, AudioClassError, StreamPhase, SyncOffset};

#[derive(Default)]
struct CountingSink {
    inits: u32,
    deinits: u32,
    mutes: u32,
    transfers: u32,
    commands: Vec<(AudioCommand, usize)>,
}

impl AudioSink for CountingSink {
    fn init(&mut self, _sample_rate_hz: u32, _volume: u8, _options: u32) -> Result<(), SinkFault> {
        self.inits += 1;
        Ok(())
    }

    fn deinit(&mut self, _options: u32) -> Result<(), SinkFault> {
        self.deinits += 1;
        Ok(())
    }

    fn mute_control(&mut self, _mute: u8) {
        self.mutes += 1;
    }

    fn periodic_transfer_complete(&mut self, _audio: &[u8], _direction: TransferDirection) {
        self.transfers += 1;
    }

    fn audio_command(&mut self, audio: &[u8], command: AudioCommand) {
        self.commands.push((command, audio.len()));
    }
}

fn configured_engine() -> (AudioClass<CountingSink>, StreamConfig) {
    let config = StreamConfig::default();
    let mut engine = AudioClass::new(CountingSink::default());
    engine.init(config, DeviceSpeed::Full).expect("init");
    (engine, config)
}

#[test]
fn uninitialized_entry_points_are_inert() {
    let mut engine = AudioClass::new(CountingSink::default());
    let packet = vec![0u8; 192];
    let request = SetupRequest {
        request_type: 0xA1,
        request: GET_CUR,
        value: 0x0100,
        index: 0x0200,
        length: 1,
    };

    assert_eq!(
        engine.data_out(0x01, &packet),
        Err(AudioClassError::Uninitialized)
    );
    assert_eq!(
        engine.sync(SyncOffset::Full),
        Err(AudioClassError::Uninitialized)
    );
    assert_eq!(engine.setup(&request), Err(AudioClassError::Uninitialized));
    assert_eq!(
        engine.ep0_rx_ready(&[0x01]),
        Err(AudioClassError::Uninitialized)
    );
    assert_eq!(engine.sof(), Err(AudioClassError::Uninitialized));
    assert_eq!(engine.data_in(0x81), Err(AudioClassError::Uninitialized));
    assert_eq!(engine.ep0_tx_ready(), Err(AudioClassError::Uninitialized));
    assert_eq!(
        engine.iso_in_incomplete(0x81),
        Err(AudioClassError::Uninitialized)
    );
    assert_eq!(
        engine.iso_out_incomplete(0x01),
        Err(AudioClassError::Uninitialized)
    );

    // Failing entry points had no side effects anywhere.
    assert_eq!(engine.phase(), StreamPhase::Idle);
    let sink = engine.sink();
    assert_eq!(sink.inits, 0);
    assert_eq!(sink.deinits, 0);
    assert_eq!(sink.mutes, 0);
    assert_eq!(sink.transfers, 0);
    assert!(sink.commands.is_empty());

    // De-init without a session is the documented no-op.
    assert_eq!(engine.deinit(), Ok(()));
    assert_eq!(engine.sink().deinits, 0);
}

#[test]
fn foreign_endpoint_and_malformed_packets_are_dropped() {
    let (mut engine, config) = configured_engine();
    let packet = vec![0u8; config.out_packet_size()];

    // Wrong endpoint: ignored, cursor untouched.
    assert_eq!(engine.data_out(0x02, &packet), Ok(0));
    assert_eq!(engine.sink().transfers, 0);

    // Oversized packet: dropped rather than corrupting the ring.
    let oversized = vec![0u8; config.out_packet_size() + 1];
    assert_eq!(engine.data_out(config.out_endpoint, &oversized), Ok(0));
    assert_eq!(engine.sink().transfers, 0);

    assert_eq!(
        engine.data_out(config.out_endpoint, &packet),
        Ok(config.out_packet_size())
    );
    assert_eq!(engine.sink().transfers, 1);
}

#[test]
fn deinit_is_idempotent_and_allows_reinit() {
    let (mut engine, config) = configured_engine();
    let packet = vec![0u8; config.out_packet_size()];
    engine.data_out(config.out_endpoint, &packet).expect("packet");

    engine.deinit().expect("deinit");
    assert_eq!(engine.sink().deinits, 1);
    engine.deinit().expect("second deinit");
    assert_eq!(engine.sink().deinits, 1);

    assert_eq!(
        engine.data_out(config.out_endpoint, &packet),
        Err(AudioClassError::Uninitialized)
    );

    engine.init(config, DeviceSpeed::Full).expect("reinit");
    assert_eq!(engine.sink().inits, 2);
    assert_eq!(engine.phase(), StreamPhase::Armed);
    assert_eq!(engine.status().packets_received, 0);
}

#[test]
fn start_command_is_issued_exactly_once() {
    let (mut engine, config) = configured_engine();
    let packet = vec![0u8; config.out_packet_size()];

    // Two full ring revolutions.
    for _ in 0..8 {
        engine.data_out(config.out_endpoint, &packet).expect("packet");
    }

    let starts: Vec<_> = engine
        .sink()
        .commands
        .iter()
        .filter(|(command, _)| *command == AudioCommand::Start)
        .collect();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].1, config.half());
    assert_eq!(engine.phase(), StreamPhase::Steady);
}

#[test]
fn ticks_before_the_midpoint_fill_do_not_deliver() {
    let (mut engine, config) = configured_engine();
    let packet = vec![0u8; config.out_packet_size()];
    engine.data_out(config.out_endpoint, &packet).expect("packet");

    engine.sync(SyncOffset::Full).expect("tick");
    assert!(engine.sink().commands.is_empty());
    let status = engine.status();
    assert_eq!(status.read_cursor, 0);
    assert_eq!(status.sync_ticks, 1);
    assert_eq!(status.last_chunk, 0);
}

#[test]
fn ticks_before_the_first_wrap_leave_playback_unarmed() {
    let (mut engine, config) = configured_engine();
    let packet = vec![0u8; config.out_packet_size()];
    engine.data_out(config.out_endpoint, &packet).expect("packet");
    engine.data_out(config.out_endpoint, &packet).expect("packet");

    // Primed but not yet wrapped: the tick computes its chunk from the
    // (384, 0) snapshot, yet a Full boundary cannot play anything before
    // the start command has been issued.
    engine.sync(SyncOffset::Full).expect("tick");
    assert_eq!(engine.status().last_chunk, config.half());
    assert!(engine.sink().commands.is_empty());

    // The pending start survives the tick and fires on the first wrap.
    engine.data_out(config.out_endpoint, &packet).expect("packet");
    engine.data_out(config.out_endpoint, &packet).expect("packet");
    assert_eq!(engine.sink().commands, vec![(AudioCommand::Start, config.half())]);
}

#[test]
fn converging_cursors_shrink_the_delivered_chunk() {
    let (mut engine, config) = configured_engine();
    let packet = vec![0u8; config.out_packet_size()];

    // One full revolution: write cursor back at zero, playback armed.
    for _ in 0..4 {
        engine.data_out(config.out_endpoint, &packet).expect("packet");
    }

    // Snapshot (0, 0): converged cursors, the chunk shrinks by the quantum
    // so the write side can catch up.
    engine.sync(SyncOffset::Full).expect("tick");
    let status = engine.status();
    assert_eq!(status.last_chunk, config.half() - 4);
    assert_eq!(status.shrink_corrections, 1);
    assert_eq!(status.grow_corrections, 0);
    assert_eq!(status.read_cursor, config.half());
    assert_eq!(
        engine.sink().commands,
        vec![
            (AudioCommand::Start, config.half()),
            (AudioCommand::Play, config.half() - 4),
        ]
    );
}
