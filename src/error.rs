use thiserror::Error;

pub use crate::message::PtpParseError;

/// Errors reported by the packet transport layer.
///
/// None of these escalate out of the forwarding engine: a failed
/// transmit releases the affected registry entry and the event is
/// dropped. Ingress handlers only ever report a boolean "was this
/// message forwarded".
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No transmit buffer could be allocated.
    #[error("no transmit buffer available")]
    NoBuffer,

    /// The platform rejected the transmit.
    #[error("transmit rejected for port mask {port_mask:#x}")]
    Rejected {
        /// Ports the transmit was addressed to.
        port_mask: u64,
    },

    /// Timestamp-capture resources exhausted (two-step transmits).
    #[error("no timestamp capture slot available")]
    NoTimestampSlot,
}
