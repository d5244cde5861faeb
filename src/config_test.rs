use super::*;
use crate::params::{MemoryParameterStore, ParamValue};

fn ov9282() -> &'static SensorIdentity {
    SensorCatalog::builtin().sensor("OV9282").unwrap()
}

#[test]
fn test_defaults_round_trip_through_store() {
    let store = MemoryParameterStore::new();
    declare_params(
        &store,
        SensorCatalog::builtin(),
        "left",
        CameraBoardSocket::CamB,
        ov9282(),
        true,
    );

    let config = PipelineConfig::load(&store, "left").unwrap();
    assert!(config.publish_raw);
    assert!(!config.low_bandwidth);
    assert!(!config.secondary_codec);
    assert!(config.lazy_publisher);
    assert_eq!(config.board_socket, CameraBoardSocket::CamB);
    assert_eq!(config.resolution, "720P");
    assert_eq!((config.width, config.height), (1280, 720));
    assert_eq!(config.fps, 30.0);
    assert_eq!(config.max_queue_size, 30);
    assert!(config.calibration_file.is_empty());
}

#[test]
fn test_file_values_win_over_defaults() {
    let store = MemoryParameterStore::from_json_str(
        r#"{"right": {"resolution": "400P", "fps": 15, "enable-secondary-codec": true}}"#,
    )
    .unwrap();
    declare_params(
        &store,
        SensorCatalog::builtin(),
        "right",
        CameraBoardSocket::CamC,
        ov9282(),
        false,
    );

    let config = PipelineConfig::load(&store, "right").unwrap();
    assert_eq!(config.resolution, "400P");
    // derived from the overridden resolution
    assert_eq!((config.width, config.height), (640, 400));
    assert_eq!(config.fps, 15.0);
    assert!(config.secondary_codec);
    assert!(!config.publish_raw);
}

#[test]
fn test_invalid_values_are_configuration_errors() {
    let cases: [(&str, ParamValue); 5] = [
        (keys::LOW_BANDWIDTH_QUALITY, ParamValue::Int(101)),
        (keys::SECONDARY_CODEC_QUALITY, ParamValue::Int(-1)),
        (keys::MAX_QUEUE_SIZE, ParamValue::Int(0)),
        (keys::BOARD_SOCKET_ID, ParamValue::Int(9)),
        (keys::FPS, ParamValue::Double(0.0)),
    ];
    for (key, value) in cases {
        let store = MemoryParameterStore::new();
        declare_params(
            &store,
            SensorCatalog::builtin(),
            "left",
            CameraBoardSocket::CamB,
            ov9282(),
            true,
        );
        store.set(&format!("left.{}", key), value);
        let err = PipelineConfig::load(&store, "left").unwrap_err();
        assert!(
            matches!(err, NodeError::Configuration(_)),
            "{} should be rejected, got {:?}",
            key,
            err
        );
    }
}

#[test]
fn test_missing_key_is_configuration_error() {
    let store = MemoryParameterStore::new();
    let err = PipelineConfig::load(&store, "left").unwrap_err();
    assert!(matches!(err, NodeError::Configuration(_)));
}
