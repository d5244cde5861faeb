use device_bus::pipeline::{NodeKind, PipelineLimits};

use super::*;
use crate::{
    config::{declare_params, keys},
    params::{MemoryParameterStore, ParamValue, ParameterStore},
};

fn catalog() -> &'static SensorCatalog {
    SensorCatalog::builtin()
}

fn ov9282() -> &'static SensorIdentity {
    catalog().sensor("OV9282").unwrap()
}

fn store_with(overrides: &[(&str, ParamValue)]) -> MemoryParameterStore {
    let store = MemoryParameterStore::new();
    for (key, value) in overrides {
        store.set(&format!("left.{}", key), value.clone());
    }
    declare_params(
        &store,
        catalog(),
        "left",
        device_bus::pipeline::CameraBoardSocket::CamB,
        ov9282(),
        true,
    );
    store
}

fn config(raw: bool, low_bandwidth: bool, secondary: bool) -> PipelineConfig {
    let store = store_with(&[
        (keys::PUBLISH_RAW_TOPIC, raw.into()),
        (keys::LOW_BANDWIDTH, low_bandwidth.into()),
        (keys::ENABLE_SECONDARY_CODEC, secondary.into()),
    ]);
    PipelineConfig::load(&store, "left").unwrap()
}

fn xlink_out_names(pipeline: &Pipeline) -> Vec<String> {
    let mut names: Vec<String> = pipeline
        .xlink_out_streams()
        .iter()
        .map(|p| p.stream_name.clone())
        .collect();
    names.sort();
    names
}

fn encoders(pipeline: &Pipeline) -> Vec<VideoProfile> {
    pipeline
        .nodes()
        .iter()
        .filter_map(|n| match &n.kind {
            NodeKind::VideoEncoder(p) => Some(p.profile),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Topologies
// ---------------------------------------------------------------------------

#[test]
fn test_all_topologies_match_truth_table() {
    for raw in [false, true] {
        for low_bandwidth in [false, true] {
            for secondary in [false, true] {
                let label = format!("raw={raw} lowbw={low_bandwidth} secondary={secondary}");
                let config = config(raw, low_bandwidth, secondary);
                let mut pipeline = Pipeline::new();
                let handles = GraphBuilder::new(catalog())
                    .build(&mut pipeline, "left", ov9282(), &config)
                    .unwrap();

                let mut expected = Vec::new();
                if raw {
                    expected.push("left_mono".to_string());
                }
                if secondary {
                    expected.push("left_h264".to_string());
                }
                expected.sort();
                assert_eq!(xlink_out_names(&pipeline), expected, "{label}");
                assert_eq!(handles.raw.is_some(), raw, "{label}");
                assert_eq!(handles.secondary.is_some(), secondary, "{label}");

                // the control input always exists
                assert_eq!(handles.control.stream, "left_control", "{label}");
                assert!(pipeline.find_stream("left_control").is_some(), "{label}");

                let mut expected_encoders = Vec::new();
                if raw && low_bandwidth {
                    expected_encoders.push(VideoProfile::Mjpeg);
                }
                if secondary {
                    expected_encoders.push(VideoProfile::H264High);
                }
                assert_eq!(encoders(&pipeline), expected_encoders, "{label}");
                assert_eq!(
                    handles.raw.as_ref().and_then(|h| h.encoder).is_some(),
                    raw && low_bandwidth,
                    "{label}"
                );

                // no stage is left dangling
                for node in pipeline.nodes() {
                    match &node.kind {
                        NodeKind::XLinkOut(_) | NodeKind::VideoEncoder(_) => {
                            assert!(pipeline.is_input_linked(node.id), "{label}: {:?}", node)
                        }
                        _ => {}
                    }
                    match &node.kind {
                        NodeKind::XLinkIn(_) | NodeKind::VideoEncoder(_) => {
                            assert!(pipeline.is_output_linked(node.id), "{label}: {:?}", node)
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

#[test]
fn test_routes_reach_the_expected_streams() {
    let config = config(true, true, true);
    let mut pipeline = Pipeline::new();
    let handles = GraphBuilder::new(catalog())
        .build(&mut pipeline, "left", ov9282(), &config)
        .unwrap();

    let routes = pipeline.routes_from(&handles.camera_output());
    assert_eq!(routes.len(), 2);
    let mono = routes.iter().find(|r| r.stream_name == "left_mono").unwrap();
    let mjpeg = mono.encoder.as_ref().unwrap();
    assert_eq!(mjpeg.profile, VideoProfile::Mjpeg);
    assert_eq!(mjpeg.quality, 50);

    let h264 = routes.iter().find(|r| r.stream_name == "left_h264").unwrap();
    let enc = h264.encoder.as_ref().unwrap();
    assert_eq!(enc.profile, VideoProfile::H264High);
    assert_eq!(enc.quality, 80);
    // one keyframe per second at 30 fps
    assert_eq!(enc.keyframe_frequency, 30);
}

#[test]
fn test_secondary_stream_is_shallow_and_non_blocking() {
    let config = config(false, false, true);
    let mut pipeline = Pipeline::new();
    GraphBuilder::new(catalog())
        .build(&mut pipeline, "left", ov9282(), &config)
        .unwrap();

    let h264 = pipeline.xlink_out_streams()[0].clone();
    assert_eq!(h264.stream_name, "left_h264");
    assert_eq!(h264.queue_size, SECONDARY_QUEUE_SIZE);
    assert!(!h264.blocking);
}

#[test]
fn test_camera_properties_from_config() {
    let store = store_with(&[
        (keys::RESOLUTION, "400P".into()),
        (keys::FSYNC_MODE, "OUTPUT".into()),
        (keys::CAMERA_ORIENTATION, "ROTATE_180_DEG".into()),
        (keys::SET_MANUAL_EXPOSURE, true.into()),
        (keys::EXPOSURE, 5000.into()),
    ]);
    let config = PipelineConfig::load(&store, "left").unwrap();
    let props = GraphBuilder::new(catalog())
        .camera_properties(ov9282(), &config)
        .unwrap();

    assert_eq!(props.resolution.size(), (640, 400));
    assert_eq!(props.sync_mode, device_bus::pipeline::FrameSyncMode::Output);
    assert_eq!(
        props.orientation,
        device_bus::pipeline::ImageOrientation::Rotate180
    );
    let manual = props.initial_control.manual_exposure.unwrap();
    assert_eq!((manual.exposure_us, manual.iso), (5000, 800));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn test_invalid_sensor_settings_are_configuration_errors() {
    let cases: [(&str, ParamValue); 4] = [
        // known resolution, not offered by OV9282
        (keys::RESOLUTION, "1200P".into()),
        (keys::RESOLUTION, "nope".into()),
        (keys::FSYNC_MODE, "SOMETIMES".into()),
        (keys::CAMERA_ORIENTATION, "SIDEWAYS".into()),
    ];
    for (key, value) in cases {
        let store = store_with(&[(key, value.clone())]);
        let config = PipelineConfig::load(&store, "left").unwrap();
        let mut pipeline = Pipeline::new();
        let err = GraphBuilder::new(catalog())
            .build(&mut pipeline, "left", ov9282(), &config)
            .unwrap_err();
        assert!(
            matches!(err, NodeError::Configuration(_)),
            "{key}={value} gave {err:?}"
        );
        assert!(pipeline.nodes().is_empty(), "{key}={value}");
    }
}

#[test]
fn test_color_default_resolution_is_not_a_mono_resolution() {
    let imx378 = catalog().sensor("imx378").unwrap();
    let store = MemoryParameterStore::new();
    declare_params(
        &store,
        catalog(),
        "rgb",
        device_bus::pipeline::CameraBoardSocket::CamA,
        imx378,
        true,
    );
    let config = PipelineConfig::load(&store, "rgb").unwrap();
    let err = GraphBuilder::new(catalog())
        .build(&mut Pipeline::new(), "rgb", imx378, &config)
        .unwrap_err();
    assert!(matches!(err, NodeError::Configuration(_)));
}

#[test]
fn test_pipeline_rejection_is_resource_error() {
    let config = config(true, true, true);
    let mut pipeline = Pipeline::with_limits(PipelineLimits {
        max_nodes: 64,
        max_video_encoders: 1,
    });
    let err = GraphBuilder::new(catalog())
        .build(&mut pipeline, "left", ov9282(), &config)
        .unwrap_err();
    assert!(matches!(err, NodeError::Resource(_)), "{err:?}");
}

#[test]
fn test_duplicate_node_name_is_resource_error() {
    let config = config(true, false, false);
    let mut pipeline = Pipeline::new();
    GraphBuilder::new(catalog())
        .build(&mut pipeline, "left", ov9282(), &config)
        .unwrap();
    let err = GraphBuilder::new(catalog())
        .build(&mut pipeline, "left", ov9282(), &config)
        .unwrap_err();
    assert!(matches!(err, NodeError::Resource(_)));
}
