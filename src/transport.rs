//! Collaborator traits and buffer types for packet transmission.
//!
//! The forwarding engine decides *which* ports to target and what
//! correctionField value each relayed frame carries; actually moving
//! bytes and capturing hardware timestamps belongs to the switch
//! platform. These traits are that seam.

use bytes::BytesMut;
use std::net::SocketAddr;

use super::error::TransportError;
use super::port::VlanTag;
use super::timestamp::PtpTimestamp;

/// Identifier of a registered two-step transmit timestamp capture.
pub type TsId = u32;

/// Which outstanding registry a completion context refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    /// The outstanding Sync registry.
    Sync,
    /// The outstanding `Delay_Req` registry.
    DelayReq,
}

/// Completion context supplied at transmit time and echoed back in the
/// TX-done event, identifying the registry entry awaiting the transmit
/// timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsContext {
    /// Registry the entry lives in.
    pub registry: RegistryKind,
    /// Slot index within that registry.
    pub index: usize,
}

/// Hardware transmit mode for an event frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMsgType {
    /// Two-step event transmit: hardware captures the egress timestamp
    /// and reports it through a TX-done event.
    TwoStep,
    /// One-step event transmit: hardware updates the correctionField
    /// in-flight with the residence time (no TX-done event).
    CorrectionField,
    /// Plain transmit, no timestamp involvement.
    General,
}

/// An ingress frame being prepared for retransmission.
///
/// Holds the raw frame (encapsulation + PTP message), the hardware
/// receive timestamp captured inline at ingress, and the transmit
/// parameters the forwarder fills in before handing the buffer to
/// [`PacketTransport::tx_msg`].
#[derive(Debug)]
pub struct TxBuffer {
    /// Frame bytes: `header_len` bytes of encapsulation followed by the
    /// PTP message.
    pub frame: BytesMut,
    /// Encapsulation header length.
    pub header_len: usize,
    /// Raw hardware receive timestamp (ticks).
    pub hw_time: u64,
    /// VLAN tag for transmission.
    pub tag: VlanTag,
    /// Transmit mode.
    pub msg_type: TxMsgType,
    /// Completion context for two-step transmits.
    pub ts_done: Option<TsContext>,
}

impl TxBuffer {
    /// The PTP message bytes (encapsulation stripped).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.frame[self.header_len..]
    }

    /// Mutable access to the PTP message bytes.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.frame[self.header_len..]
    }
}

/// A freshly prepared general-message frame with encapsulation headroom.
#[derive(Debug)]
pub struct GeneralFrame {
    /// Frame bytes: `header_len` bytes of encapsulation followed by the
    /// PTP message area.
    pub data: BytesMut,
    /// Encapsulation header length.
    pub header_len: usize,
}

impl GeneralFrame {
    /// The PTP message bytes (encapsulation stripped).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[self.header_len..]
    }

    /// Mutable access to the PTP message bytes.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.header_len..]
    }
}

/// Opaque packet transmit primitives supplied by the switch platform.
///
/// All methods are synchronous and must not block; a rejected transmit
/// is reported through the `Result` and the forwarder drops the event
/// (PTP forwarding never retries — a lost event is superseded by the
/// next protocol interval).
pub trait PacketTransport {
    /// Allocate a frame for a general message toward `dst`, with room
    /// for a PTP message of `msg_len` bytes after the encapsulation
    /// header. Returns `None` when no buffer is available.
    fn prepare_general_packet(&mut self, dst: &SocketAddr, msg_len: usize)
    -> Option<GeneralFrame>;

    /// Re-shape an ingress buffer for retransmission of a PTP message of
    /// `msg_len` bytes.
    fn prepare_tx_buffer(&mut self, buffer: &mut TxBuffer, msg_len: usize);

    /// Transmit an event or general message to every port in `port_mask`.
    ///
    /// For [`TxMsgType::TwoStep`] buffers carrying a
    /// [`TsContext`], the platform must deliver exactly one TX-done
    /// event per egress port, echoing the context.
    ///
    /// # Errors
    /// [`TransportError`] when the platform rejects the transmit.
    fn tx_msg(&mut self, port_mask: u64, buffer: &mut TxBuffer) -> Result<TsId, TransportError>;

    /// Transmit a prepared general frame to every port in `port_mask`.
    ///
    /// # Errors
    /// [`TransportError`] when the platform rejects the transmit.
    fn tx_general(
        &mut self,
        port_mask: u64,
        frame: &GeneralFrame,
        tag: &VlanTag,
    ) -> Result<(), TransportError>;
}

/// Bit-exact conversion between hardware tick representations and
/// calendar time, supplied by the local-clock layer.
pub trait LocalClock {
    /// Convert a raw hardware timestamp to calendar time.
    fn time_from_ticks(&self, ticks: u64) -> PtpTimestamp;

    /// Convert a 32-bit tunneled reserved-field value back to the raw
    /// tick representation, so a timestamp relayed over an internal link
    /// round-trips exactly.
    fn hw_ticks_from_tunnel(&self, packed: u32) -> u64;
}
