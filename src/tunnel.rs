//! In-band timestamp tunnel for internal (stacking) ports.
//!
//! Per-hop hardware timestamping exists only on externally-facing ports.
//! When an event message is relayed across an internal stacking link, the
//! ingress timestamp travels inside the message itself: the 4-byte
//! reserved field at [`RESERVED_FOR_TS_OFFSET`] carries the packed value
//! and [`FLAG_RESERVED_TS`] signals validity. The receiving hop reads and
//! clears both, recovering the receive timestamp as if it had been
//! captured locally.
//!
//! The packed value is the nanoseconds part of the converted receive
//! time; [`crate::transport::LocalClock::hw_ticks_from_tunnel`] turns it
//! back into hardware ticks on the consuming side.

use byteorder::{BigEndian, ByteOrder};

use super::message::{self, FLAG_RESERVED_TS, RESERVED_FOR_TS_OFFSET};

/// Pack a receive-timestamp value into the reserved field and flag it valid.
pub fn embed_rx_timestamp(msg: &mut [u8], packed: u32) {
    BigEndian::write_u32(
        &mut msg[RESERVED_FOR_TS_OFFSET..RESERVED_FOR_TS_OFFSET + 4],
        packed,
    );
    message::set_flag(msg, FLAG_RESERVED_TS);
}

/// Consume a tunneled receive timestamp, if present.
///
/// Returns the packed value and clears both the flag and the reserved
/// field, or `None` when the message carries no tunneled timestamp (in
/// which case the frame is left untouched and must not be forwarded as
/// an internal-port ingress).
pub fn extract_rx_timestamp(msg: &mut [u8]) -> Option<u32> {
    if !message::has_flag(msg, FLAG_RESERVED_TS) {
        return None;
    }
    message::clear_flag(msg, FLAG_RESERVED_TS);
    let range = RESERVED_FOR_TS_OFFSET..RESERVED_FOR_TS_OFFSET + 4;
    let packed = BigEndian::read_u32(&msg[range.clone()]);
    BigEndian::write_u32(&mut msg[range], 0);
    Some(packed)
}
