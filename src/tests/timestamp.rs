use crate::timestamp::{PtpTimestamp, TimeInterval};

// ===== PtpTimestamp =====

#[test]
fn test_to_from_nanos_round_trip() {
    let ts = PtpTimestamp::new(1234, 567_890_123);
    assert_eq!(PtpTimestamp::from_nanos(ts.to_nanos()), ts);
}

#[test]
fn test_from_nanos_negative_clamps_to_zero() {
    assert_eq!(PtpTimestamp::from_nanos(-5), PtpTimestamp::ZERO);
}

#[test]
fn test_new_clamps_nanoseconds() {
    let ts = PtpTimestamp::new(1, 2_000_000_000);
    assert_eq!(ts.nanoseconds, PtpTimestamp::NANOS_PER_SEC - 1);
}

#[test]
fn test_diff_nanos_signed() {
    let a = PtpTimestamp::new(100, 0);
    let b = PtpTimestamp::new(99, 999_999_000);
    assert_eq!(a.diff_nanos(&b), 1_000);
    assert_eq!(b.diff_nanos(&a), -1_000);
}

#[test]
fn test_wire_codec_round_trip() {
    let ts = PtpTimestamp::new(0x0000_1234_5678_9ABC, 999_999_999);
    let wire = ts.encode_ieee1588();
    assert_eq!(PtpTimestamp::decode_ieee1588(&wire), Some(ts));
}

#[test]
fn test_wire_decode_too_short() {
    assert_eq!(PtpTimestamp::decode_ieee1588(&[0u8; 9]), None);
}

#[test]
fn test_display() {
    let ts = PtpTimestamp::new(42, 7);
    assert_eq!(ts.to_string(), "42.000000007");
}

// ===== TimeInterval =====

#[test]
fn test_interval_nanos_round_trip() {
    let iv = TimeInterval::from_nanos(1_500);
    assert_eq!(iv.nanos(), 1_500);
    assert_eq!(iv.raw(), 1_500 << 16);
}

#[test]
fn test_interval_since() {
    let egress = PtpTimestamp::new(100, 140);
    let ingress = PtpTimestamp::new(100, 100);
    assert_eq!(egress.interval_since(&ingress), TimeInterval::from_nanos(40));
    assert_eq!(
        ingress.interval_since(&egress),
        TimeInterval::from_nanos(-40)
    );
}

#[test]
fn test_interval_arithmetic() {
    let a = TimeInterval::from_nanos(40);
    let b = TimeInterval::from_nanos(5);
    assert_eq!(a + b, TimeInterval::from_nanos(45));
    assert_eq!(a - b, TimeInterval::from_nanos(35));
    assert_eq!(-b, TimeInterval::from_nanos(-5));
}

#[test]
fn test_interval_add_saturates() {
    let max = TimeInterval(i64::MAX);
    assert_eq!(max + TimeInterval::from_nanos(1), max);
}

#[test]
fn test_interval_display() {
    assert_eq!(TimeInterval::from_nanos(40).to_string(), "40.0000ns");
    assert_eq!(TimeInterval::from_nanos(-5).to_string(), "-5.0000ns");
    // half a nanosecond = 0x8000 scaled
    assert_eq!(TimeInterval(0x8000).to_string(), "0.5000ns");
}
