//! Decoded control requests and the staged SET_CUR state.

/// Largest control-transfer payload the class stages over EP0.
pub const MAX_CONTROL_PACKET: usize = 64;

/// UAC1 class request: set the current value of a control.
pub const SET_CUR: u8 = 0x01;
/// UAC1 class request: get the current value of a control.
pub const GET_CUR: u8 = 0x81;

/// Standard request: device/interface status.
pub const GET_STATUS: u8 = 0x00;
/// Standard request: clear a feature flag.
pub const CLEAR_FEATURE: u8 = 0x01;
/// Standard request: query the active alternate setting.
pub const GET_INTERFACE: u8 = 0x0A;
/// Standard request: select an alternate setting.
pub const SET_INTERFACE: u8 = 0x0B;

/// Feature unit carrying the output-path mute control.
pub const OUT_FEATURE_UNIT: u8 = 0x02;

/// Highest alternate setting the streaming interface exposes
/// (0 = zero-bandwidth, 1 = operational).
pub const MAX_ALT_SETTING: u8 = 1;

const REQUEST_KIND_MASK: u8 = 0x60;
const REQUEST_KIND_STANDARD: u8 = 0x00;
const REQUEST_KIND_CLASS: u8 = 0x20;

/// Broad category of a control request, from the `bmRequestType` bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Chapter 9 standard request.
    Standard,
    /// Audio-class request.
    Class,
    /// Vendor or reserved; never handled here.
    Other,
}

/// SETUP packet fields, as decoded by the transport's control dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetupRequest {
    /// `bmRequestType`.
    pub request_type: u8,
    /// `bRequest`.
    pub request: u8,
    /// `wValue`.
    pub value: u16,
    /// `wIndex`; for class requests the high byte addresses a unit.
    pub index: u16,
    /// `wLength`.
    pub length: u16,
}

impl SetupRequest {
    /// Category of this request.
    pub fn kind(&self) -> RequestKind {
        match self.request_type & REQUEST_KIND_MASK {
            REQUEST_KIND_STANDARD => RequestKind::Standard,
            REQUEST_KIND_CLASS => RequestKind::Class,
            _ => RequestKind::Other,
        }
    }

    /// Unit id addressed by a class request (high byte of `wIndex`).
    pub fn unit(&self) -> u8 {
        (self.index >> 8) as u8
    }
}

/// What the transport must do to finish the current control transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetupReply {
    /// Transmit these bytes in the data stage.
    In(Vec<u8>),
    /// Receive this many bytes from the host, then hand them to
    /// `ep0_rx_ready`.
    Out(usize),
    /// No data stage; proceed to the status stage.
    Ack,
}

/// Pending class command staged by SETUP and consumed on data completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClassCommand {
    SetCurrent,
}

/// Staged control-transfer state for one active session.
///
/// Created empty at interface init, populated when a SET_CUR header
/// arrives, consumed and cleared exactly once when the data stage for the
/// output-mute feature unit completes. Requests for other units stay
/// pending, matching the single-control scope of this class.
#[derive(Debug)]
pub(crate) struct ControlState {
    command: Option<ClassCommand>,
    target_unit: u8,
    payload: [u8; MAX_CONTROL_PACKET],
    payload_len: usize,
}

impl ControlState {
    pub(crate) fn new() -> Self {
        Self {
            command: None,
            target_unit: 0,
            payload: [0; MAX_CONTROL_PACKET],
            payload_len: 0,
        }
    }

    /// Begin a multi-stage control write addressed to `unit`. Returns the
    /// clamped number of bytes the data stage should carry.
    pub(crate) fn stage_set_current(&mut self, unit: u8, length: usize) -> usize {
        let length = length.min(MAX_CONTROL_PACKET);
        self.command = Some(ClassCommand::SetCurrent);
        self.target_unit = unit;
        self.payload_len = length;
        length
    }

    /// Complete the data stage with the received bytes.
    ///
    /// Returns the mute byte when the staged command addressed the output
    /// feature unit; the pending command is cleared in that case and only
    /// in that case.
    pub(crate) fn commit_set_current(&mut self, data: &[u8]) -> Option<u8> {
        match self.command {
            Some(ClassCommand::SetCurrent) if self.target_unit == OUT_FEATURE_UNIT => {
                let len = data.len().min(self.payload_len);
                self.payload[..len].copy_from_slice(&data[..len]);
                let mute = self.payload[0];
                self.command = None;
                self.payload_len = 0;
                Some(mute)
            }
            _ => None,
        }
    }

    /// Whether a staged command is awaiting its data stage.
    pub(crate) fn is_pending(&self) -> bool {
        self.command.is_some()
    }
}
