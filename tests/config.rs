#![cfg(feature = "serde")]

use domain_xfr::base::serial::Serial;
use domain_xfr::xfr::XfrConfig;
use domain_xfr::zonetree::InMemoryConfig;

#[test]
fn xfr_config_defaults() {
    let config: XfrConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, XfrConfig::default());
    assert_eq!(config.max_message_size, 16384);
    assert_eq!(config.max_records_per_message, 500);
    assert!(!config.axfr_closing_soa);
    assert!(!config.ixfr_leading_soa);
    assert_eq!(config.max_transfer_records, None);
}

#[test]
fn xfr_config_partial() {
    let config: XfrConfig = serde_json::from_str(
        r#"{
            "max_message_size": 4096,
            "axfr_closing_soa": true,
            "max_transfer_records": 100000
        }"#,
    )
    .unwrap();
    assert_eq!(
        config,
        XfrConfig {
            max_message_size: 4096,
            axfr_closing_soa: true,
            max_transfer_records: Some(100000),
            ..Default::default()
        }
    );

    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(serde_json::from_str::<XfrConfig>(&json).unwrap(), config);
}

#[test]
fn xfr_config_rejects_bad_values() {
    assert!(serde_json::from_str::<XfrConfig>(
        r#"{ "max_records_per_message": 70000 }"#
    )
    .is_err());
    assert!(
        serde_json::from_str::<XfrConfig>(r#"{ "axfr_closing_soa": 1 }"#)
            .is_err()
    );
}

#[test]
fn store_config() {
    let config: InMemoryConfig =
        serde_json::from_str(r#"{ "max_deltas": 8 }"#).unwrap();
    assert_eq!(config.max_deltas, 8);
    assert_eq!(
        config.retained_generations,
        InMemoryConfig::default().retained_generations
    );
}

#[test]
fn serials() {
    assert_eq!(serde_json::to_string(&Serial(2024)).unwrap(), "2024");
    assert_eq!(
        serde_json::from_str::<Serial>("4294967295").unwrap(),
        Serial(u32::MAX)
    );
}
