//! Transparent clock configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::dispatch::AGE_TICK_PERIOD;

/// Configuration of one transparent clock instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcConfig {
    /// Whether this clock operates in two-step mode.
    ///
    /// In one-step mode no outstanding-request tracking happens at all;
    /// residence-time compensation is delegated to the hardware's
    /// correction-field transmit mode.
    pub two_step: bool,
    /// Capacity of each outstanding registry. Fixed for the lifetime of
    /// the instance; the forwarding path never allocates beyond it.
    pub max_outstanding_records: usize,
    /// Destination address used when building fresh general-message
    /// frames (the PTP primary multicast address).
    pub primary_address: SocketAddr,
    /// Period of the aging sweep started by
    /// [`crate::TransparentClock::enable`].
    pub age_tick_period: Duration,
}

impl Default for TcConfig {
    fn default() -> Self {
        Self {
            two_step: true,
            max_outstanding_records: 16,
            // 224.0.1.129 is the IPv4 PTP primary multicast group.
            primary_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(224, 0, 1, 129)), 319),
            age_tick_period: AGE_TICK_PERIOD,
        }
    }
}
