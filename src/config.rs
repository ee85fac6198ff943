//! Stream configuration and the transport-facing packet constants derived
//! from it.

use crate::AudioClassError;

/// Volume handed to the sink when the interface comes up.
pub const DEFAULT_VOLUME: u8 = 70;

/// Bus speed of the active connection, as reported by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceSpeed {
    /// Full-speed operation (1 ms frames).
    Full,
    /// High-speed operation (125 us microframes).
    High,
}

/// Parameters of one audio streaming interface.
///
/// Everything the transport layer needs — packet sizes, the ring capacity,
/// endpoint addresses, service intervals — is derived from this struct at
/// configuration time. The endpoint addresses are resolved here once and
/// carried in the session rather than living in process-wide state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// PCM sample rate in Hertz.
    pub sample_rate_hz: u32,
    /// Interleaved channel count.
    pub channels: u32,
    /// Bytes per sample (16-bit PCM is 2).
    pub bytes_per_sample: u32,
    /// Number of OUT packets the ring holds. Must be even and nonzero so
    /// the half-buffer boundary falls on a packet boundary.
    pub ring_packets: u32,
    /// Address of the isochronous OUT endpoint.
    pub out_endpoint: u8,
    /// Address of the isochronous IN endpoint.
    pub in_endpoint: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48_000,
            channels: 2,
            bytes_per_sample: 2,
            ring_packets: 4,
            out_endpoint: 0x01,
            in_endpoint: 0x81,
        }
    }
}

impl StreamConfig {
    /// Size in bytes of one isochronous OUT packet (one frame of audio).
    pub fn out_packet_size(&self) -> usize {
        (self.sample_rate_hz * self.channels * self.bytes_per_sample / 1000) as usize
    }

    /// Size in bytes of one isochronous IN packet.
    pub fn in_packet_size(&self) -> usize {
        self.out_packet_size()
    }

    /// Total ring capacity in bytes, a whole multiple of the packet size.
    pub fn capacity(&self) -> usize {
        self.out_packet_size() * self.ring_packets as usize
    }

    /// Nominal per-tick delivery: half the ring.
    pub fn half(&self) -> usize {
        self.capacity() / 2
    }

    /// Isochronous service interval for the given bus speed, in
    /// frames/microframes as encoded in the endpoint descriptor.
    pub fn service_interval(&self, speed: DeviceSpeed) -> u8 {
        match speed {
            DeviceSpeed::Full => 1,
            DeviceSpeed::High => 1,
        }
    }

    /// Check that the configuration yields a usable ring.
    ///
    /// An odd packet count would put the half-buffer boundary in the middle
    /// of a packet, so it is rejected along with zero-sized dimensions.
    pub fn validate(&self) -> Result<(), AudioClassError> {
        let sized = self.sample_rate_hz > 0
            && self.channels > 0
            && self.bytes_per_sample > 0
            && self.out_packet_size() > 0;
        if !sized || self.ring_packets < 2 || self.ring_packets % 2 != 0 {
            return Err(AudioClassError::AllocationFailure);
        }
        Ok(())
    }
}
