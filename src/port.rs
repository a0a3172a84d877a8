//! Transparent clock port table.
//!
//! One [`TcPort`] per switch port participating in PTP forwarding. Ports
//! are identified by 1-based port numbers; bit `n-1` of a port mask
//! addresses port `n`. Internal (stacking) ports lack per-hop hardware
//! TX-done notifications and are served by the reserved-field timestamp
//! tunnel instead.

use serde::{Deserialize, Serialize};

use super::timestamp::TimeInterval;

/// Forwarding state of a TC port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortState {
    /// Port does not participate in PTP forwarding.
    Disabled,
    /// End-to-end transparent forwarding (delay request-response mechanism).
    E2eTransparent,
    /// Peer-to-peer transparent forwarding (peer delay mechanism).
    P2pTransparent,
}

/// VLAN tag applied to frames transmitted on a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VlanTag {
    /// Tag protocol identifier (0 = untagged).
    pub tpid: u16,
    /// VLAN ID.
    pub vid: u16,
    /// Priority code point.
    pub pcp: u8,
}

/// A single port of the transparent clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcPort {
    /// 1-based port number.
    pub number: u16,
    /// Forwarding state.
    pub state: PortState,
    /// Whether this port connects to another unit in the same stack.
    pub internal: bool,
    /// Configured delay asymmetry compensation for this port.
    pub delay_asymmetry: TimeInterval,
    /// Measured peer mean path delay (zero in E2E configurations).
    pub peer_mean_path_delay: TimeInterval,
    /// VLAN tag for frames transmitted on this port.
    pub tag: VlanTag,
}

impl TcPort {
    /// Create an external E2E transparent port with no compensation.
    #[must_use]
    pub fn new(number: u16) -> Self {
        Self {
            number,
            state: PortState::E2eTransparent,
            internal: false,
            delay_asymmetry: TimeInterval::ZERO,
            peer_mean_path_delay: TimeInterval::ZERO,
            tag: VlanTag::default(),
        }
    }

    /// Whether this port participates in forwarding.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != PortState::Disabled
    }

    /// The single-bit port mask addressing this port.
    #[must_use]
    pub fn port_mask(&self) -> u64 {
        1u64 << (self.number - 1)
    }
}

/// Result of partitioning the egress port set for a fan-out.
///
/// Active ports other than the ingress port split into external ports
/// (true per-port hardware timestamping) and internal ports (reserved
/// field tunnel).
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOut {
    /// Mask of eligible external egress ports.
    pub external_mask: u64,
    /// Mask of eligible internal egress ports.
    pub internal_mask: u64,
    /// Index into the port table of the last external port seen.
    pub last_external: Option<usize>,
    /// Index into the port table of the last internal port seen.
    pub last_internal: Option<usize>,
}

impl FanOut {
    /// Partition `ports` into egress masks, excluding the ingress port.
    #[must_use]
    pub fn partition(ports: &[TcPort], rx_port: u16) -> Self {
        let mut out = Self::default();
        for (idx, port) in ports.iter().enumerate() {
            if port.number == rx_port || !port.is_active() {
                continue;
            }
            if port.internal {
                out.internal_mask |= port.port_mask();
                out.last_internal = Some(idx);
            } else {
                out.external_mask |= port.port_mask();
                out.last_external = Some(idx);
            }
        }
        out
    }
}
