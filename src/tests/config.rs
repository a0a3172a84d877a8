use std::time::Duration;

use crate::config::TcConfig;

#[test]
fn test_default_config() {
    let config = TcConfig::default();
    assert!(config.two_step);
    assert_eq!(config.max_outstanding_records, 16);
    assert_eq!(config.primary_address.port(), 319);
    assert_eq!(config.age_tick_period, Duration::from_secs(1));
}

#[test]
fn test_config_serde_round_trip() {
    let config = TcConfig {
        two_step: false,
        max_outstanding_records: 8,
        ..TcConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: TcConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.two_step, config.two_step);
    assert_eq!(back.max_outstanding_records, config.max_outstanding_records);
    assert_eq!(back.primary_address, config.primary_address);
    assert_eq!(back.age_tick_period, config.age_tick_period);
}
