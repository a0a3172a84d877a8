use crate::message::{
    self, DELAY_RESP_MESSAGE_LENGTH, FLAG_RESERVED_TS, FLAG_TWO_STEP, FOLLOW_UP_MESSAGE_LENGTH,
    PortIdentity, PtpHeader, PtpMessageType, PtpParseError,
};
use crate::timestamp::{PtpTimestamp, TimeInterval};

fn sync_header(seq: u16) -> PtpHeader {
    PtpHeader::new(PtpMessageType::Sync, PortIdentity::new(0xAABB_CCDD, 3), seq)
}

// ===== Header codec =====

#[test]
fn test_header_round_trip() {
    let mut header = sync_header(77);
    header.flags = FLAG_TWO_STEP;
    header.correction_field = TimeInterval::from_nanos(1234);
    header.domain_number = 5;
    header.log_message_interval = -3;
    let wire = header.encode();
    let decoded = PtpHeader::decode(&wire).unwrap();
    assert_eq!(decoded, header);
}

#[test]
fn test_header_decode_too_short() {
    assert!(matches!(
        PtpHeader::decode(&[0u8; 20]),
        Err(PtpParseError::TooShort { .. })
    ));
}

#[test]
fn test_unknown_message_type_rejected() {
    let mut wire = sync_header(1).encode();
    wire[0] = 0x0B; // Announce: not an event-path type
    assert!(matches!(
        PtpHeader::decode(&wire),
        Err(PtpParseError::UnknownMessageType(0x0B))
    ));
}

// ===== Frame patch helpers =====

fn sync_frame(seq: u16) -> Vec<u8> {
    let mut frame = sync_header(seq).encode().to_vec();
    frame.extend_from_slice(&PtpTimestamp::new(10, 20).encode_ieee1588());
    frame
}

#[test]
fn test_update_correction_field_accumulates() {
    let mut frame = sync_frame(1);
    message::update_correction_field(&mut frame, TimeInterval::from_nanos(40));
    message::update_correction_field(&mut frame, TimeInterval::from_nanos(5));
    let header = PtpHeader::decode(&frame).unwrap();
    assert_eq!(header.correction_field, TimeInterval::from_nanos(45));
}

#[test]
fn test_update_correction_field_preserves_existing_value() {
    let mut header = sync_header(1);
    header.correction_field = TimeInterval::from_nanos(100);
    let mut frame = header.encode().to_vec();
    frame.extend_from_slice(&PtpTimestamp::ZERO.encode_ieee1588());
    message::update_correction_field(&mut frame, TimeInterval::from_nanos(-30));
    let decoded = PtpHeader::decode(&frame).unwrap();
    assert_eq!(decoded.correction_field, TimeInterval::from_nanos(70));
}

#[test]
fn test_flag_operations() {
    let mut frame = sync_frame(1);
    assert!(!message::has_flag(&frame, FLAG_TWO_STEP));
    message::set_flag(&mut frame, FLAG_TWO_STEP);
    assert!(message::has_flag(&frame, FLAG_TWO_STEP));
    message::set_flag(&mut frame, FLAG_RESERVED_TS);
    message::clear_flag(&mut frame, FLAG_TWO_STEP);
    assert!(!message::has_flag(&frame, FLAG_TWO_STEP));
    // other flags survive
    assert!(message::has_flag(&frame, FLAG_RESERVED_TS));
}

#[test]
fn test_read_sequence_id() {
    let frame = sync_frame(0xBEEF);
    assert_eq!(message::read_sequence_id(&frame), 0xBEEF);
}

#[test]
fn test_unpack_origin_timestamp() {
    let frame = sync_frame(1);
    assert_eq!(
        message::unpack_origin_timestamp(&frame),
        Some(PtpTimestamp::new(10, 20))
    );
    assert_eq!(message::unpack_origin_timestamp(&frame[..40]), None);
}

#[test]
fn test_unpack_requesting_port_identity() {
    let requesting = PortIdentity::new(0x1122, 9);
    let mut frame = PtpHeader::new(PtpMessageType::DelayResp, PortIdentity::new(0xFF, 1), 4)
        .encode()
        .to_vec();
    frame.extend_from_slice(&PtpTimestamp::new(1, 2).encode_ieee1588());
    frame.extend_from_slice(&requesting.encode());
    assert_eq!(frame.len(), DELAY_RESP_MESSAGE_LENGTH);
    assert_eq!(
        message::unpack_requesting_port_identity(&frame),
        Some(requesting)
    );
}

// ===== Transparent Follow_Up =====

#[test]
fn test_pack_transparent_follow_up() {
    let mut header = sync_header(5);
    header.domain_number = 2;
    let origin = PtpTimestamp::new(1000, 500);
    let mut buf = vec![0u8; FOLLOW_UP_MESSAGE_LENGTH];
    message::pack_transparent_follow_up(&mut buf, &header, &origin, TimeInterval::from_nanos(60));

    let packed = PtpHeader::decode(&buf).unwrap();
    assert_eq!(packed.message_type, PtpMessageType::FollowUp);
    assert_eq!(packed.message_length as usize, FOLLOW_UP_MESSAGE_LENGTH);
    assert_eq!(packed.control_field, 0x02);
    assert_eq!(packed.correction_field, TimeInterval::from_nanos(60));
    // identity of the originating Sync is preserved
    assert_eq!(packed.source_port_identity, header.source_port_identity);
    assert_eq!(packed.sequence_id, 5);
    assert_eq!(packed.domain_number, 2);
    assert_eq!(message::unpack_origin_timestamp(&buf), Some(origin));
}
