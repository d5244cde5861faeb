use super::*;

#[test]
fn test_sensor_lookup_ignores_case() {
    let catalog = SensorCatalog::builtin();
    let sensor = catalog.sensor("ov9282").unwrap();
    assert_eq!(sensor.name, "OV9282");
    assert!(sensor.allows("400P"));
    assert!(!sensor.allows("1080P"));
    assert!(catalog.sensor("NOPE").is_none());
}

#[test]
fn test_builtin_is_shared() {
    assert!(std::ptr::eq(SensorCatalog::builtin(), SensorCatalog::builtin()));
}

#[test]
fn test_string_tables() {
    let catalog = SensorCatalog::builtin();
    assert_eq!(catalog.mono_resolution("800P"), Some(MonoResolution::The800P));
    assert_eq!(catalog.mono_resolution("1080P"), None);
    assert_eq!(catalog.socket_name(CameraBoardSocket::CamB), "left");
    assert_eq!(catalog.socket_name(CameraBoardSocket::CamC), "right");
    assert_eq!(catalog.fsync_mode("INPUT"), Some(FrameSyncMode::Input));
    assert_eq!(catalog.fsync_mode("input"), None);
    assert_eq!(
        catalog.orientation("ROTATE_180_DEG"),
        Some(ImageOrientation::Rotate180)
    );
}

#[test]
fn test_every_default_resolution_is_allowed() {
    for sensor in SensorCatalog::builtin().sensors() {
        assert!(sensor.allows(sensor.default_resolution), "{}", sensor.name);
    }
}
