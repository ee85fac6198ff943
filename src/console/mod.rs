//! Developer console: a simulated host session feeding the engine and a
//! ratatui monitor on top of it.

/// Host-side session simulator.
pub mod sim;
/// Ratatui-based stream monitor.
pub mod ui;
