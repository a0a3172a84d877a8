//! Testing utilities: mock transport, mock local clock, frame builders.
//!
//! Used by the crate's own tests and benches; exported so downstream
//! platform integrations can exercise their glue against the same mocks.

#![allow(clippy::missing_panics_doc)]

mod mock_transport;

pub use mock_transport::{MockLocalClock, MockTransport, SentEvent, SentGeneral};

use bytes::BytesMut;

use crate::message::{PortIdentity, PtpHeader, PtpMessageType};
use crate::timestamp::PtpTimestamp;
use crate::transport::{TxBuffer, TxMsgType};

/// Default encapsulation header length used by test frames.
pub const TEST_ENCAP_LEN: usize = 14;

/// Build an ingress [`TxBuffer`] for an event message with a 10-byte
/// timestamp body (Sync, `Follow_Up`, `Delay_Req`).
#[must_use]
pub fn event_buffer(header: &PtpHeader, origin: &PtpTimestamp, hw_time: u64) -> TxBuffer {
    let mut frame = BytesMut::zeroed(TEST_ENCAP_LEN);
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(&origin.encode_ieee1588());
    TxBuffer {
        frame,
        header_len: TEST_ENCAP_LEN,
        hw_time,
        tag: crate::port::VlanTag::default(),
        msg_type: TxMsgType::General,
        ts_done: None,
    }
}

/// Build an ingress [`TxBuffer`] for a `Delay_Resp` message.
#[must_use]
pub fn delay_resp_buffer(
    header: &PtpHeader,
    receive_timestamp: &PtpTimestamp,
    requesting: &PortIdentity,
    hw_time: u64,
) -> TxBuffer {
    assert_eq!(header.message_type, PtpMessageType::DelayResp);
    let mut frame = BytesMut::zeroed(TEST_ENCAP_LEN);
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(&receive_timestamp.encode_ieee1588());
    frame.extend_from_slice(&requesting.encode());
    TxBuffer {
        frame,
        header_len: TEST_ENCAP_LEN,
        hw_time,
        tag: crate::port::VlanTag::default(),
        msg_type: TxMsgType::General,
        ts_done: None,
    }
}
