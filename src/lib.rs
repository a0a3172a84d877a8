//! # ptp-tc
//!
//! An IEEE 1588 Precision Time Protocol **transparent clock** (TC)
//! forwarding engine for Ethernet switches.
//!
//! A transparent clock relays PTP event messages (Sync, `Follow_Up`,
//! `Delay_Req`, `Delay_Resp`) between switch ports without terminating
//! synchronization, measuring the time each message spent inside the
//! switch (*residence time*) and accumulating it into the message's
//! correctionField.
//!
//! ## Forwarding Flow
//!
//! ```text
//! ingress event ──> registry entry allocated ──> fan-out transmit
//!                                                     |
//!            TX-done event (per egress port) <────────┘
//!                     |
//!        residence time = egress ts − ingress ts
//!                     |
//!        Follow_Up / Delay_Resp patched and emitted
//! ```
//!
//! Hardware delivers receive timestamps inline with each ingress frame
//! and transmit timestamps asynchronously through [`TxDone`] events. The
//! engine correlates the two through two fixed-capacity outstanding
//! registries and recovers from lost completions with a periodic aging
//! sweep.
//!
//! ## Scheduling Model
//!
//! All forwarding operations run synchronously on the packet-ingress
//! thread; nothing blocks. The owner of a [`TransparentClock`] is
//! responsible for serializing ingress calls, drained [`TcEvent`]s, and
//! aging ticks — the engine assumes single-writer access and implements
//! no locking of its own.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dispatch;
/// Error types
pub mod error;
pub mod message;
pub mod port;
pub mod registry;
pub mod tc;
/// Testing utilities
pub mod testing;
pub mod timestamp;
pub mod transport;
pub mod tunnel;

#[cfg(test)]
mod tests;

// Re-exports
pub use config::TcConfig;
pub use dispatch::{AGE_TICK_PERIOD, AgeTimer, TcEvent, TxDone, event_channel};
pub use error::TransportError;
pub use message::{PortIdentity, PtpHeader, PtpMessageType, PtpParseError};
pub use port::{PortState, TcPort, VlanTag};
pub use registry::{EntryKey, Occupancy, OutstandingList};
pub use tc::TransparentClock;
pub use timestamp::{PtpTimestamp, TimeInterval};
pub use transport::{
    GeneralFrame, LocalClock, PacketTransport, RegistryKind, TsContext, TsId, TxBuffer, TxMsgType,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        PortIdentity, PortState, PtpHeader, PtpMessageType, PtpTimestamp, TcConfig, TcEvent,
        TcPort, TimeInterval, TransparentClock, TxBuffer, TxDone, event_channel,
    };
}
