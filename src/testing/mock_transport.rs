//! Mock packet transport and local clock.

use bytes::BytesMut;
use std::net::SocketAddr;

use crate::error::TransportError;
use crate::port::VlanTag;
use crate::timestamp::PtpTimestamp;
use crate::transport::{
    GeneralFrame, LocalClock, PacketTransport, TsContext, TsId, TxBuffer, TxMsgType,
};

/// A recorded `tx_msg` call.
#[derive(Debug, Clone)]
pub struct SentEvent {
    /// Ports the transmit targeted.
    pub port_mask: u64,
    /// Full frame bytes at transmit time.
    pub frame: Vec<u8>,
    /// Encapsulation length.
    pub header_len: usize,
    /// Transmit mode.
    pub msg_type: TxMsgType,
    /// Completion context, if any.
    pub ts_done: Option<TsContext>,
    /// Timestamp-capture ID returned to the caller.
    pub ts_id: TsId,
    /// VLAN tag on the buffer.
    pub tag: VlanTag,
}

/// A recorded `tx_general` call.
#[derive(Debug, Clone)]
pub struct SentGeneral {
    /// Ports the transmit targeted.
    pub port_mask: u64,
    /// Full frame bytes at transmit time.
    pub frame: Vec<u8>,
    /// Encapsulation length.
    pub header_len: usize,
    /// VLAN tag used.
    pub tag: VlanTag,
    /// Destination the frame was prepared for.
    pub dst: Option<SocketAddr>,
}

/// Scriptable in-memory [`PacketTransport`] recording every transmit.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// All `tx_msg` calls, in order.
    pub events: Vec<SentEvent>,
    /// All `tx_general` calls, in order.
    pub generals: Vec<SentGeneral>,
    /// When set, `tx_msg` fails.
    pub fail_tx_msg: bool,
    /// When set, `tx_general` fails.
    pub fail_tx_general: bool,
    /// When set, `prepare_general_packet` returns `None`.
    pub deny_general_buffers: bool,
    /// Encapsulation length of prepared general frames.
    pub encap_len: usize,
    next_ts_id: TsId,
    last_dst: Option<SocketAddr>,
}

impl MockTransport {
    /// Create a mock with a 14-byte encapsulation header.
    #[must_use]
    pub fn new() -> Self {
        Self {
            encap_len: super::TEST_ENCAP_LEN,
            ..Self::default()
        }
    }

    /// The PTP message bytes of recorded general transmit `index`.
    #[must_use]
    pub fn general_payload(&self, index: usize) -> &[u8] {
        let sent = &self.generals[index];
        &sent.frame[sent.header_len..]
    }

    /// The PTP message bytes of recorded event transmit `index`.
    #[must_use]
    pub fn event_payload(&self, index: usize) -> &[u8] {
        let sent = &self.events[index];
        &sent.frame[sent.header_len..]
    }
}

impl PacketTransport for MockTransport {
    fn prepare_general_packet(
        &mut self,
        dst: &SocketAddr,
        msg_len: usize,
    ) -> Option<GeneralFrame> {
        if self.deny_general_buffers {
            return None;
        }
        self.last_dst = Some(*dst);
        Some(GeneralFrame {
            data: BytesMut::zeroed(self.encap_len + msg_len),
            header_len: self.encap_len,
        })
    }

    fn prepare_tx_buffer(&mut self, buffer: &mut TxBuffer, msg_len: usize) {
        buffer.frame.resize(buffer.header_len + msg_len, 0);
    }

    fn tx_msg(&mut self, port_mask: u64, buffer: &mut TxBuffer) -> Result<TsId, TransportError> {
        if self.fail_tx_msg {
            return Err(TransportError::Rejected { port_mask });
        }
        let ts_id = self.next_ts_id;
        self.next_ts_id += 1;
        self.events.push(SentEvent {
            port_mask,
            frame: buffer.frame.to_vec(),
            header_len: buffer.header_len,
            msg_type: buffer.msg_type,
            ts_done: buffer.ts_done,
            ts_id,
            tag: buffer.tag,
        });
        Ok(ts_id)
    }

    fn tx_general(
        &mut self,
        port_mask: u64,
        frame: &GeneralFrame,
        tag: &VlanTag,
    ) -> Result<(), TransportError> {
        if self.fail_tx_general {
            return Err(TransportError::Rejected { port_mask });
        }
        self.generals.push(SentGeneral {
            port_mask,
            frame: frame.data.to_vec(),
            header_len: frame.header_len,
            tag: *tag,
            dst: self.last_dst,
        });
        Ok(())
    }
}

/// Mock local clock where one hardware tick is one nanosecond.
///
/// Tunneled reserved-field values are taken as ticks directly, so a
/// value embedded from `PtpTimestamp::nanoseconds` round-trips within
/// the current second.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockLocalClock;

impl LocalClock for MockLocalClock {
    fn time_from_ticks(&self, ticks: u64) -> PtpTimestamp {
        PtpTimestamp::from_nanos(i128::from(ticks))
    }

    fn hw_ticks_from_tunnel(&self, packed: u32) -> u64 {
        u64::from(packed)
    }
}
