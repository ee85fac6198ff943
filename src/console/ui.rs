//! Ratatui-based monitor for a simulated streaming session.

use std::error::Error;
use std::io::stdout;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEvent};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap};

use crate::config::StreamConfig;
use crate::console::sim::{HostSimulator, StatusFrame};

const SKEW_STEP_PPM: i64 = 100;

#[derive(Default)]
struct AppState {
    frame: Option<StatusFrame>,
    message: Option<String>,
    last_update: Option<Instant>,
}

/// Run the stream monitor over a freshly started simulated session.
pub fn run(config: StreamConfig, skew_ppm: i64) -> Result<(), Box<dyn Error>> {
    let (mut sim, status_rx) = HostSimulator::start(config, skew_ppm)?;

    setup_terminal()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut app = AppState::default();
    loop {
        terminal.draw(|frame| draw(frame, &sim, &app))?;

        if let Some(update) = try_recv_latest(&status_rx) {
            app.frame = Some(update);
            app.last_update = Some(Instant::now());
        }

        if event::poll(Duration::from_millis(10))? {
            if let CEvent::Key(key) = event::read()? {
                if handle_key(&sim, &mut app, key) {
                    break;
                }
            }
        }
    }

    restore_terminal()?;
    sim.stop();
    Ok(())
}

fn setup_terminal() -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    Ok(())
}

fn restore_terminal() -> Result<(), Box<dyn Error>> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

fn try_recv_latest<T>(rx: &Receiver<T>) -> Option<T> {
    let mut last = None;
    while let Ok(value) = rx.try_recv() {
        last = Some(value);
    }
    last
}

fn handle_key(sim: &HostSimulator, app: &mut AppState, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('m') => {
            let mute = sim.toggle_mute();
            app.message = Some(if mute != 0 {
                "Output muted".to_string()
            } else {
                "Output unmuted".to_string()
            });
        }
        KeyCode::Char('+') | KeyCode::Char(']') => {
            let ppm = sim.adjust_skew(SKEW_STEP_PPM);
            app.message = Some(format!("DAC skew {ppm:+} ppm"));
        }
        KeyCode::Char('-') | KeyCode::Char('[') => {
            let ppm = sim.adjust_skew(-SKEW_STEP_PPM);
            app.message = Some(format!("DAC skew {ppm:+} ppm"));
        }
        _ => {}
    }
    false
}

fn draw(frame: &mut ratatui::Frame<'_>, sim: &HostSimulator, app: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], sim, app);
    draw_fill_gauge(frame, chunks[1], app);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[2]);
    draw_counters(frame, body[0], app);
    draw_events(frame, body[1], app);

    draw_footer(frame, chunks[3], app);
}

fn draw_header(
    frame: &mut ratatui::Frame<'_>,
    area: ratatui::prelude::Rect,
    sim: &HostSimulator,
    app: &AppState,
) {
    let block = Block::default()
        .title("USB Audio Stream Monitor")
        .borders(Borders::ALL);

    let config = sim.config();
    let content = if let Some(update) = &app.frame {
        let status = &update.status;
        let latency_ms = status.capacity as f32
            / (config.sample_rate_hz * config.channels * config.bytes_per_sample) as f32
            * 1_000.0;
        let mute = if update.mute != 0 { "muted" } else { "live" };
        Paragraph::new(format!(
            "Phase: {:?}    Rate: {} Hz    Packet: {} B    Ring: {} B ({latency_ms:.1} ms)    Alt: {}    Skew: {:+} ppm    Output: {mute}",
            status.phase,
            config.sample_rate_hz,
            status.out_packet_size,
            status.capacity,
            status.alt_setting,
            update.skew_ppm,
        ))
    } else {
        Paragraph::new(Line::from(vec![Span::styled(
            "Waiting for session...",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )]))
    };

    frame.render_widget(content.block(block), area);
}

fn draw_fill_gauge(frame: &mut ratatui::Frame<'_>, area: ratatui::prelude::Rect, app: &AppState) {
    let block = Block::default().title("Buffer Fill").borders(Borders::ALL);
    let ratio = app
        .frame
        .as_ref()
        .map(|update| f64::from(update.status.buffer_fill))
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Cyan))
        .label(format!("{:.1}%", ratio * 100.0))
        .ratio(ratio);
    frame.render_widget(gauge, area);
}

fn draw_counters(frame: &mut ratatui::Frame<'_>, area: ratatui::prelude::Rect, app: &AppState) {
    let block = Block::default().title("Stream").borders(Borders::ALL);

    if let Some(update) = &app.frame {
        let status = &update.status;
        let rows = [
            ("Write cursor", format!("{}", status.write_cursor)),
            ("Read cursor", format!("{}", status.read_cursor)),
            ("Read enabled", format!("{}", status.read_enabled)),
            ("Last chunk", format!("{} B", status.last_chunk)),
            ("Packets received", format!("{}", status.packets_received)),
            ("Sync ticks", format!("{}", status.sync_ticks)),
            ("Shrink corrections", format!("{}", status.shrink_corrections)),
            ("Grow corrections", format!("{}", status.grow_corrections)),
            ("Sink consumed", format!("{} B", update.played_bytes)),
        ];
        let rows = rows
            .into_iter()
            .map(|(name, value)| Row::new(vec![Cell::from(name), Cell::from(value)]));

        let table = Table::new(rows, [Constraint::Length(20), Constraint::Min(12)])
            .block(block)
            .column_spacing(2);
        frame.render_widget(table, area);
    } else {
        frame.render_widget(Paragraph::new("").block(block), area);
    }
}

fn draw_events(frame: &mut ratatui::Frame<'_>, area: ratatui::prelude::Rect, app: &AppState) {
    let block = Block::default().title("Sink Events").borders(Borders::ALL);

    if let Some(update) = &app.frame {
        let lines: Vec<Line<'_>> = update
            .events
            .iter()
            .map(|event| Line::from(event.as_str()))
            .collect();
        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    } else {
        frame.render_widget(Paragraph::new("").block(block), area);
    }
}

fn draw_footer(frame: &mut ratatui::Frame<'_>, area: ratatui::prelude::Rect, app: &AppState) {
    let info = "m: Toggle mute  •  +/-: Adjust DAC skew  •  q: Quit";
    let mut lines = vec![Line::from(info)];
    if let Some(message) = &app.message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Green),
        )));
    }
    if let Some(updated) = app.last_update {
        let ago = updated.elapsed().as_secs_f32();
        lines.push(Line::from(Span::styled(
            format!("Last update {:.1}s ago", ago),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}
