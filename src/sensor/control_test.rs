use device_bus::{
    device::Device,
    pipeline::{CameraBoardSocket, FrameSyncMode, Pipeline},
};

use super::*;
use crate::{
    config::{PipelineConfig, declare_params},
    params::MemoryParameterStore,
    sensor::graph::GraphBuilder,
};

struct Fixture {
    device: Device,
    store: Arc<MemoryParameterStore>,
    control: ControlChannel,
}

fn fixture() -> Fixture {
    let catalog = SensorCatalog::builtin();
    let sensor = catalog.sensor("OV9282").unwrap();
    let store = Arc::new(MemoryParameterStore::new());
    declare_params(
        store.as_ref(),
        catalog,
        "left",
        CameraBoardSocket::CamB,
        sensor,
        true,
    );
    let config = PipelineConfig::load(store.as_ref(), "left").unwrap();
    let mut pipeline = Pipeline::new();
    let handles = GraphBuilder::new(catalog)
        .build(&mut pipeline, "left", sensor, &config)
        .unwrap();
    let device = Device::new("test", pipeline).unwrap();
    let queue = device.get_input_queue(&handles.control.stream).unwrap();
    let control = ControlChannel::new("left", store.clone(), catalog, queue);
    Fixture {
        device,
        store,
        control,
    }
}

impl Fixture {
    fn state(&self) -> device_bus::control::SensorControlState {
        self.device.control_state(CameraBoardSocket::CamB).unwrap()
    }
}

#[test]
fn test_unknown_parameter_changes_nothing() {
    let f = fixture();
    let before = f.state();

    f.control
        .apply_runtime_update(&[
            Parameter::new("left.white-balance", 4000),
            Parameter::new("right.sharpness", 3),
        ])
        .unwrap();
    assert_eq!(f.state(), before);
    assert!(!f.store.contains("left.white-balance"));
    assert_eq!(f.store.get("left.sharpness"), Some(ParamValue::Int(1)));
}

#[test]
fn test_wrong_value_type_is_ignored() {
    let f = fixture();
    let before = f.state();
    f.control
        .apply_runtime_update(&[
            Parameter::new("left.sharpness", "high"),
            Parameter::new("left.luma-denoise", -1),
            Parameter::new("left.fsync-mode", "SOMETIMES"),
        ])
        .unwrap();
    assert_eq!(f.state(), before);
}

#[test]
fn test_manual_exposure_batch_is_one_control() {
    let f = fixture();
    let applied = f.state().applied;

    f.control
        .apply_runtime_update(&[
            Parameter::new("left.set-manual-exposure", true),
            Parameter::new("left.exposure", 5000),
            Parameter::new("left.iso", 400),
        ])
        .unwrap();

    let state = f.state();
    assert!(!state.auto_exposure);
    assert_eq!((state.exposure_us, state.iso), (5000, 400));
    assert_eq!(state.applied, applied + 1);
    assert_eq!(f.store.get("left.exposure"), Some(ParamValue::Int(5000)));

    // back to auto
    f.control
        .apply_runtime_update(&[Parameter::new("set-manual-exposure", false)])
        .unwrap();
    assert!(f.state().auto_exposure);
    assert_eq!(f.state().applied, applied + 2);
}

#[test]
fn test_exposure_in_auto_mode_is_stored_not_sent() {
    let f = fixture();
    let before = f.state();
    f.control
        .apply_runtime_update(&[Parameter::new("left.exposure", 2500)])
        .unwrap();
    assert_eq!(f.state(), before);
    assert_eq!(f.store.get("left.exposure"), Some(ParamValue::Int(2500)));

    // takes effect once manual mode is switched on
    f.control
        .apply_runtime_update(&[Parameter::new("left.set-manual-exposure", true)])
        .unwrap();
    assert_eq!(f.state().exposure_us, 2500);
}

#[test]
fn test_filters_and_sync_mode() {
    let f = fixture();
    f.control
        .apply_runtime_update(&[
            Parameter::new("left.sharpness", 3),
            Parameter::new("left.luma-denoise", 2),
            Parameter::new("chroma-denoise", 0),
            Parameter::new("left.fsync-mode", "INPUT"),
        ])
        .unwrap();
    let state = f.state();
    assert_eq!(
        (state.sharpness, state.luma_denoise, state.chroma_denoise),
        (3, 2, 0)
    );
    assert_eq!(state.frame_sync_mode, FrameSyncMode::Input);
    assert_eq!(
        f.store.get("left.fsync-mode"),
        Some(ParamValue::String("INPUT".into()))
    );
}

#[test]
fn test_send_after_close_is_channel_error() {
    let f = fixture();
    f.device.close();
    let err = f
        .control
        .apply_runtime_update(&[Parameter::new("left.sharpness", 2)])
        .unwrap_err();
    assert!(err.is_channel_closed());

    // nothing to send, nothing to fail
    f.control
        .apply_runtime_update(&[Parameter::new("left.gain", 2)])
        .unwrap();
}

#[test]
fn test_runtime_sync_mode_shares_the_construction_key() {
    let f = fixture();
    f.control
        .apply_runtime_update(&[Parameter::new("left.fsync-mode", "OUTPUT")])
        .unwrap();
    let config = PipelineConfig::load(f.store.as_ref(), "left").unwrap();
    assert_eq!(config.fsync_mode, "OUTPUT");
}
