//! PTP message header codec and in-place frame patch helpers.
//!
//! Implements the subset of the IEEE 1588 wire format the transparent
//! clock touches: the 34-byte common header, the event-path message
//! types, and the field-level patch operations (flags, correctionField,
//! reserved timestamp field) the forwarder applies to frames it relays.
//! Everything here is big-endian on the wire.

use byteorder::{BigEndian, ByteOrder};

use super::timestamp::{PtpTimestamp, TimeInterval};

/// PTP message type identifiers (IEEE 1588 Section 13.3.2.2).
///
/// Only the four event-path types are relayed by a transparent clock;
/// general messages (Announce, Signaling, ...) are forwarded by switch
/// hardware without this component's involvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PtpMessageType {
    /// Sync message (master → slave), carries the origin timestamp.
    Sync = 0x00,
    /// Delay request (slave → master).
    DelayReq = 0x01,
    /// Follow-up (master → slave), carries the precise origin timestamp.
    FollowUp = 0x08,
    /// Delay response (master → slave).
    DelayResp = 0x09,
}

impl PtpMessageType {
    /// Parse from the lower 4 bits of a byte.
    pub fn from_nibble(value: u8) -> Result<Self, PtpParseError> {
        match value & 0x0F {
            0x00 => Ok(Self::Sync),
            0x01 => Ok(Self::DelayReq),
            0x08 => Ok(Self::FollowUp),
            0x09 => Ok(Self::DelayResp),
            other => Err(PtpParseError::UnknownMessageType(other)),
        }
    }

    /// The deprecated-but-mandatory v2 control field value for this type.
    #[must_use]
    pub fn control_field(&self) -> u8 {
        match self {
            Self::Sync => 0x00,
            Self::DelayReq => 0x01,
            Self::FollowUp => 0x02,
            Self::DelayResp => 0x03,
        }
    }
}

impl std::fmt::Display for PtpMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "Sync"),
            Self::DelayReq => write!(f, "Delay_Req"),
            Self::FollowUp => write!(f, "Follow_Up"),
            Self::DelayResp => write!(f, "Delay_Resp"),
        }
    }
}

/// PTP port identity: 8-byte clock ID + 2-byte port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortIdentity {
    /// 8-byte clock identity (typically derived from MAC address).
    pub clock_identity: u64,
    /// Port number (1-based).
    pub port_number: u16,
}

impl PortIdentity {
    /// Create a new port identity.
    #[must_use]
    pub fn new(clock_identity: u64, port_number: u16) -> Self {
        Self {
            clock_identity,
            port_number,
        }
    }

    /// Encode as 10 bytes (8-byte clock ID + 2-byte port number, BE).
    #[must_use]
    pub fn encode(&self) -> [u8; 10] {
        let mut buf = [0u8; 10];
        buf[0..8].copy_from_slice(&self.clock_identity.to_be_bytes());
        buf[8..10].copy_from_slice(&self.port_number.to_be_bytes());
        buf
    }

    /// Decode from 10 bytes.
    #[must_use]
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < 10 {
            return None;
        }
        Some(Self {
            clock_identity: BigEndian::read_u64(&data[0..8]),
            port_number: BigEndian::read_u16(&data[8..10]),
        })
    }
}

// ===== Wire layout constants =====

/// Byte offset of the 2-byte flag field within a PTP message.
pub const FLAG_FIELD_OFFSET: usize = 6;

/// Byte offset of the 8-byte correctionField within a PTP message.
pub const CORRECTION_FIELD_OFFSET: usize = 8;

/// Byte offset of the 4-byte reserved field used by the internal-port
/// timestamp tunnel.
pub const RESERVED_FOR_TS_OFFSET: usize = 16;

/// Byte offset of the 2-byte sequenceId within a PTP message.
pub const SEQUENCE_ID_OFFSET: usize = 30;

/// Two-step flag: flag field octet 0, bit 1.
pub const FLAG_TWO_STEP: u16 = 0x0200;

/// Reserved-field-holds-timestamp flag: flag field octet 0, bit 7.
///
/// Set by the transmitting hop of an internal/stacking link to signal
/// that [`RESERVED_FOR_TS_OFFSET`] carries a packed receive timestamp;
/// cleared by the consuming hop.
pub const FLAG_RESERVED_TS: u16 = 0x8000;

/// On-wire length of a Sync message (header + 10-byte timestamp).
pub const SYNC_MESSAGE_LENGTH: usize = 44;

/// On-wire length of a `Follow_Up` message (header + 10-byte timestamp).
pub const FOLLOW_UP_MESSAGE_LENGTH: usize = 44;

/// On-wire length of a `Delay_Req` message (header + 10-byte timestamp).
pub const DELAY_REQ_MESSAGE_LENGTH: usize = 44;

/// On-wire length of a `Delay_Resp` message (header + timestamp + port identity).
pub const DELAY_RESP_MESSAGE_LENGTH: usize = 54;

/// Full IEEE 1588 PTP message header (34 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtpHeader {
    /// Transport-specific nibble (upper 4 bits of byte 0).
    pub transport_specific: u8,
    /// Message type (lower 4 bits of byte 0).
    pub message_type: PtpMessageType,
    /// PTP version (typically 2).
    pub version: u8,
    /// Total message length including header.
    pub message_length: u16,
    /// Domain number.
    pub domain_number: u8,
    /// Flags field (octet 0 in the high byte).
    pub flags: u16,
    /// Correction field (nanoseconds × 2^16, signed).
    pub correction_field: TimeInterval,
    /// Source port identity.
    pub source_port_identity: PortIdentity,
    /// Sequence ID.
    pub sequence_id: u16,
    /// Control field (deprecated in v2, but still present).
    pub control_field: u8,
    /// Log message interval.
    pub log_message_interval: i8,
}

impl PtpHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 34;

    /// Default PTP version.
    pub const PTP_VERSION_2: u8 = 2;

    /// Create a new header with sensible defaults.
    #[must_use]
    pub fn new(message_type: PtpMessageType, source: PortIdentity, sequence_id: u16) -> Self {
        let message_length = match message_type {
            PtpMessageType::DelayResp => DELAY_RESP_MESSAGE_LENGTH,
            _ => SYNC_MESSAGE_LENGTH,
        };
        Self {
            transport_specific: 0,
            message_type,
            version: Self::PTP_VERSION_2,
            message_length: message_length as u16,
            domain_number: 0,
            flags: 0,
            correction_field: TimeInterval::ZERO,
            source_port_identity: source,
            sequence_id,
            control_field: message_type.control_field(),
            log_message_interval: 0,
        }
    }

    /// Encode to 34 bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = (self.transport_specific << 4) | (self.message_type as u8 & 0x0F);
        buf[1] = self.version & 0x0F;
        BigEndian::write_u16(&mut buf[2..4], self.message_length);
        buf[4] = self.domain_number;
        // buf[5] reserved
        BigEndian::write_u16(&mut buf[FLAG_FIELD_OFFSET..8], self.flags);
        BigEndian::write_i64(&mut buf[CORRECTION_FIELD_OFFSET..16], self.correction_field.raw());
        // buf[16..20] reserved
        let port_id = self.source_port_identity.encode();
        buf[20..30].copy_from_slice(&port_id);
        BigEndian::write_u16(&mut buf[SEQUENCE_ID_OFFSET..32], self.sequence_id);
        buf[32] = self.control_field;
        buf[33] = self.log_message_interval as u8;
        buf
    }

    /// Decode from bytes.
    pub fn decode(data: &[u8]) -> Result<Self, PtpParseError> {
        if data.len() < Self::SIZE {
            return Err(PtpParseError::TooShort {
                needed: Self::SIZE,
                have: data.len(),
            });
        }
        let message_type = PtpMessageType::from_nibble(data[0])?;
        let source_port_identity =
            PortIdentity::decode(&data[20..30]).ok_or(PtpParseError::TooShort {
                needed: 30,
                have: data.len(),
            })?;
        Ok(Self {
            transport_specific: data[0] >> 4,
            message_type,
            version: data[1] & 0x0F,
            message_length: BigEndian::read_u16(&data[2..4]),
            domain_number: data[4],
            flags: BigEndian::read_u16(&data[FLAG_FIELD_OFFSET..8]),
            correction_field: TimeInterval(BigEndian::read_i64(&data[CORRECTION_FIELD_OFFSET..16])),
            source_port_identity,
            sequence_id: BigEndian::read_u16(&data[SEQUENCE_ID_OFFSET..32]),
            control_field: data[32],
            log_message_interval: data[33] as i8,
        })
    }
}

impl Default for PtpHeader {
    fn default() -> Self {
        Self::new(PtpMessageType::Sync, PortIdentity::default(), 0)
    }
}

// ===== In-place frame patch helpers =====
//
// The forwarder mutates frames it relays rather than re-encoding them;
// these helpers operate on a raw PTP message byte slice (offset 0 = first
// header byte, encapsulation already stripped by the caller).

/// Add `delta` to the message's on-wire correctionField.
///
/// The correction field is an accumulator: every transparent clock on the
/// path adds its own residence time and asymmetry to whatever is already
/// there.
pub fn update_correction_field(msg: &mut [u8], delta: TimeInterval) {
    let range = CORRECTION_FIELD_OFFSET..CORRECTION_FIELD_OFFSET + 8;
    let current = BigEndian::read_i64(&msg[range.clone()]);
    BigEndian::write_i64(&mut msg[range], current.wrapping_add(delta.raw()));
}

/// Read the 2-byte flag field.
#[must_use]
pub fn read_flags(msg: &[u8]) -> u16 {
    BigEndian::read_u16(&msg[FLAG_FIELD_OFFSET..FLAG_FIELD_OFFSET + 2])
}

/// Overwrite the 2-byte flag field.
pub fn write_flags(msg: &mut [u8], flags: u16) {
    BigEndian::write_u16(&mut msg[FLAG_FIELD_OFFSET..FLAG_FIELD_OFFSET + 2], flags);
}

/// Whether `flag` is set in the message's flag field.
#[must_use]
pub fn has_flag(msg: &[u8], flag: u16) -> bool {
    read_flags(msg) & flag != 0
}

/// Set `flag` in the message's flag field.
pub fn set_flag(msg: &mut [u8], flag: u16) {
    let flags = read_flags(msg);
    write_flags(msg, flags | flag);
}

/// Clear `flag` in the message's flag field.
pub fn clear_flag(msg: &mut [u8], flag: u16) {
    let flags = read_flags(msg);
    write_flags(msg, flags & !flag);
}

/// Read the message's sequenceId.
#[must_use]
pub fn read_sequence_id(msg: &[u8]) -> u16 {
    BigEndian::read_u16(&msg[SEQUENCE_ID_OFFSET..SEQUENCE_ID_OFFSET + 2])
}

/// Unpack the origin timestamp from a Sync/`Follow_Up`/`Delay_Req` body.
#[must_use]
pub fn unpack_origin_timestamp(msg: &[u8]) -> Option<PtpTimestamp> {
    PtpTimestamp::decode_ieee1588(msg.get(PtpHeader::SIZE..)?)
}

/// Unpack the requestingPortIdentity from a `Delay_Resp` body.
#[must_use]
pub fn unpack_requesting_port_identity(msg: &[u8]) -> Option<PortIdentity> {
    PortIdentity::decode(msg.get(PtpHeader::SIZE + 10..)?)
}

/// Build a synthesized `Follow_Up` message from a saved Sync header.
///
/// Used when a one-step Sync is relayed by a two-step transparent clock:
/// the relayed Sync gets the two-step flag and this switch generates the
/// matching `Follow_Up` itself, carrying the inbound origin timestamp and
/// the computed residence-time correction. All other header fields are
/// taken from the saved Sync header unchanged.
///
/// `buf` must hold at least [`FOLLOW_UP_MESSAGE_LENGTH`] bytes.
pub fn pack_transparent_follow_up(
    buf: &mut [u8],
    sync_header: &PtpHeader,
    origin_timestamp: &PtpTimestamp,
    correction: TimeInterval,
) {
    let mut header = *sync_header;
    header.message_type = PtpMessageType::FollowUp;
    header.message_length = FOLLOW_UP_MESSAGE_LENGTH as u16;
    header.correction_field = correction;
    header.control_field = PtpMessageType::FollowUp.control_field();
    buf[..PtpHeader::SIZE].copy_from_slice(&header.encode());
    buf[PtpHeader::SIZE..FOLLOW_UP_MESSAGE_LENGTH]
        .copy_from_slice(&origin_timestamp.encode_ieee1588());
}

/// Errors from PTP message parsing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PtpParseError {
    /// Packet too short.
    #[error("packet too short: need {needed} bytes, have {have}")]
    TooShort {
        /// Minimum bytes needed.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },
    /// Unknown message type.
    #[error("unknown PTP message type: 0x{0:02X}")]
    UnknownMessageType(u8),
}
