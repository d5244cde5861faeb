use device_bus::{
    control::CameraControl,
    message::Message,
    pipeline::{INPUT, VideoProfile, XLinkOutProperties},
    queue::QueueError,
    sim::SimulatedCamera,
};

use super::*;
use crate::{
    config::keys,
    params::{MemoryParameterStore, ParamValue},
    sensor::{
        dispatch::dispatch_test::{CountingConverter, h264, img},
        encoder::EncoderStage,
    },
};

fn catalog() -> &'static SensorCatalog {
    SensorCatalog::builtin()
}

fn store_with(overrides: &[(&str, ParamValue)]) -> Arc<MemoryParameterStore> {
    let store = Arc::new(MemoryParameterStore::new());
    for (key, value) in overrides {
        store.set(&format!("left.{}", key), value.clone());
    }
    store
}

fn build(pipeline: &mut Pipeline, store: Arc<MemoryParameterStore>) -> SensorNode {
    let sensor = catalog().sensor("OV9282").unwrap();
    SensorNode::new(
        pipeline,
        "left",
        sensor,
        CameraBoardSocket::CamB,
        store,
        catalog(),
        true,
    )
    .unwrap()
}

fn scenario_store() -> Arc<MemoryParameterStore> {
    store_with(&[
        (keys::PUBLISH_RAW_TOPIC, true.into()),
        (keys::LOW_BANDWIDTH, false.into()),
        (keys::ENABLE_SECONDARY_CODEC, true.into()),
        (keys::SECONDARY_CODEC_QUALITY, 80.into()),
        (keys::ENABLE_LAZY_PUBLISHER, true.into()),
    ])
}

// ---------------------------------------------------------------------------
// Lazy publishing end to end
// ---------------------------------------------------------------------------

#[test]
fn test_lazy_scenario_converts_only_for_subscribed_sink() {
    let mut pipeline = Pipeline::new();
    let mut node = build(&mut pipeline, scenario_store());
    let device = Device::new("test", pipeline).unwrap();
    let transport = Transport::new("oak", false);
    let conv = Arc::new(CountingConverter::default());

    node.setup_queues_with(&device, &transport, conv.clone(), conv.clone())
        .unwrap();
    assert_eq!(node.state(), NodeState::QueuesOpen);
    assert_eq!(device.opened_output_streams(), vec!["left_h264", "left_mono"]);
    assert_eq!(device.opened_input_streams(), vec!["left_control"]);

    for seq in 0..5 {
        device.emit("left_mono", img(seq, 4)).unwrap();
        device.emit("left_h264", h264(seq)).unwrap();
    }
    assert_eq!(conv.conversions(), 0);
    assert_eq!(node.stats("left_mono").unwrap().published, 0);
    assert_eq!(node.stats("left_h264").unwrap().published, 0);

    let mut images = transport.subscribe_image("oak/left/image_raw");
    device.emit("left_mono", img(5, 4)).unwrap();
    device.emit("left_h264", h264(5)).unwrap();

    assert_eq!(conv.conversions(), 1);
    assert_eq!(node.stats("left_mono").unwrap().published, 1);
    assert_eq!(node.stats("left_h264").unwrap().published, 0);
    assert_eq!(images.try_recv().unwrap().data[0], 5);
    assert!(images.try_recv().is_err());
}

#[test]
fn test_host_queues_use_configured_depth() {
    let mut pipeline = Pipeline::new();
    let mut node = build(
        &mut pipeline,
        store_with(&[
            (keys::ENABLE_SECONDARY_CODEC, true.into()),
            (keys::MAX_QUEUE_SIZE, 12.into()),
        ]),
    );
    let device = Device::new("test", pipeline).unwrap();
    node.setup_queues(&device, &Transport::new("oak", false))
        .unwrap();

    for stream in ["left_mono", "left_h264"] {
        // an open queue is handed back as is
        let queue = device.get_output_queue(stream, 1, true).unwrap();
        assert_eq!(queue.max_size(), 12, "{stream}");
        assert!(!queue.is_blocking(), "{stream}");
    }
}

#[test]
fn test_close_twice_stops_callbacks() {
    let mut pipeline = Pipeline::new();
    let mut node = build(
        &mut pipeline,
        store_with(&[(keys::ENABLE_LAZY_PUBLISHER, false.into())]),
    );
    let device = Device::new("test", pipeline).unwrap();
    let transport = Transport::new("oak", false);
    let conv = Arc::new(CountingConverter::default());
    node.setup_queues_with(&device, &transport, conv.clone(), conv.clone())
        .unwrap();

    device.emit("left_mono", img(0, 4)).unwrap();
    assert_eq!(conv.conversions(), 1);

    node.close_queues();
    node.close_queues();
    assert_eq!(node.state(), NodeState::Closed);
    assert!(device.opened_output_streams().is_empty());
    assert!(device.opened_input_streams().is_empty());

    let err = device.emit("left_mono", img(1, 4)).unwrap_err();
    assert_eq!(err, QueueError::Closed("left_mono".into()));
    assert_eq!(conv.conversions(), 1);
}

// ---------------------------------------------------------------------------
// Default converters with the simulated camera
// ---------------------------------------------------------------------------

#[test]
fn test_simulated_frames_reach_subscribers() {
    let mut pipeline = Pipeline::new();
    let mut node = build(
        &mut pipeline,
        store_with(&[(keys::ENABLE_SECONDARY_CODEC, true.into())]),
    );
    let camera = node.handles().camera;
    let device = Arc::new(Device::new("test", pipeline).unwrap());
    let transport = Transport::new("oak", false);
    node.setup_queues(&device, &transport).unwrap();

    let mut images = transport.subscribe_image("oak/left/image_raw");
    let mut infos = transport.subscribe_info("oak/left/camera_info");
    let mut packets = transport.subscribe_video("oak/left/h264");

    let mut sim = SimulatedCamera::new(Arc::clone(&device), camera).unwrap();
    assert_eq!(sim.capture(), 2);

    let image = images.try_recv().unwrap();
    assert_eq!((image.width, image.height), (1280, 720));
    assert_eq!(image.encoding, "mono8");
    assert_eq!(image.header.frame_id, "oak_left_camera_optical_frame");

    let info = infos.try_recv().unwrap();
    assert_eq!(info.header, image.header);
    assert_eq!((info.width, info.height), (1280, 720));

    let packet = packets.try_recv().unwrap();
    assert_eq!(packet.encoding, "h264");
    assert!(packet.keyframe);
    assert_eq!((packet.width, packet.height), (1280, 720));

    let calibration = node.calibration().unwrap();
    assert_eq!(calibration.header.frame_id, "oak_left_camera_optical_frame");
}

#[test]
fn test_low_bandwidth_publishes_jpeg_in_combined_mode() {
    let mut pipeline = Pipeline::new();
    let mut node = build(
        &mut pipeline,
        store_with(&[
            (keys::LOW_BANDWIDTH, true.into()),
            (keys::RESOLUTION, "400P".into()),
        ]),
    );
    let camera = node.handles().camera;
    let device = Arc::new(Device::new("test", pipeline).unwrap());
    let transport = Transport::new("oak", true);
    node.setup_queues(&device, &transport).unwrap();

    let mut images = transport.subscribe_image("oak/left/image_raw");
    let mut infos = transport.subscribe_info("oak/left/camera_info");
    SimulatedCamera::new(Arc::clone(&device), camera)
        .unwrap()
        .capture();

    let image = images.try_recv().unwrap();
    assert_eq!(image.encoding, "jpeg");
    assert_eq!((image.width, image.height), (640, 400));
    assert_eq!(&image.data[..2], &[0xFF, 0xD8]);
    assert_eq!(infos.try_recv().unwrap().width, 640);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_runtime_updates_require_open_queues() {
    let mut pipeline = Pipeline::new();
    let mut node = build(&mut pipeline, store_with(&[]));
    let device = Device::new("test", pipeline).unwrap();
    let transport = Transport::new("oak", false);

    let update = [Parameter::new("left.sharpness", 4)];
    assert!(matches!(
        node.update_params(&update),
        Err(NodeError::Lifecycle { .. })
    ));

    node.setup_queues(&device, &transport).unwrap();
    node.update_params(&update).unwrap();
    assert_eq!(
        device.control_state(CameraBoardSocket::CamB).unwrap().sharpness,
        4
    );

    node.close_queues();
    assert!(node.update_params(&update).is_err());
}

#[test]
fn test_setup_twice_is_lifecycle_error() {
    let mut pipeline = Pipeline::new();
    let mut node = build(&mut pipeline, store_with(&[]));
    let device = Device::new("test", pipeline).unwrap();
    let transport = Transport::new("oak", false);
    node.setup_queues(&device, &transport).unwrap();
    let err = node.setup_queues(&device, &transport).unwrap_err();
    assert!(matches!(err, NodeError::Lifecycle { .. }));
    assert_eq!(node.state(), NodeState::QueuesOpen);
}

#[test]
fn test_missing_calibration_file_fails_setup() {
    let mut pipeline = Pipeline::new();
    let mut node = build(
        &mut pipeline,
        store_with(&[(
            keys::CALIBRATION_FILE,
            "file:///no/such/calibration.yaml".into(),
        )]),
    );
    let device = Device::new("test", pipeline).unwrap();
    let err = node
        .setup_queues(&device, &Transport::new("oak", false))
        .unwrap_err();
    assert!(matches!(err, NodeError::Configuration(_)));
    assert_ne!(node.state(), NodeState::QueuesOpen);
    assert!(device.opened_output_streams().is_empty());
}

#[test]
fn test_failed_setup_closes_opened_queues() {
    // the node expects a secondary stream the running pipeline lacks
    let mut expected = Pipeline::new();
    let mut node = build(
        &mut expected,
        store_with(&[(keys::ENABLE_SECONDARY_CODEC, true.into())]),
    );
    let mut running = Pipeline::new();
    let _other = build(&mut running, store_with(&[]));
    let device = Device::new("test", running).unwrap();

    let err = node
        .setup_queues(&device, &Transport::new("oak", false))
        .unwrap_err();
    assert!(matches!(err, NodeError::Resource(_)), "{err:?}");
    assert!(device.opened_output_streams().is_empty());
}

#[test]
fn test_drop_closes_queues() {
    let mut pipeline = Pipeline::new();
    let mut node = build(&mut pipeline, store_with(&[]));
    let device = Device::new("test", pipeline).unwrap();
    node.setup_queues(&device, &Transport::new("oak", false))
        .unwrap();
    assert_eq!(device.opened_output_streams(), vec!["left_mono"]);
    drop(node);
    assert!(device.opened_output_streams().is_empty());
    assert!(device.opened_input_streams().is_empty());
}

#[test]
fn test_link_feeds_unencoded_camera_output() {
    let mut pipeline = Pipeline::new();
    let node = build(
        &mut pipeline,
        store_with(&[(keys::LOW_BANDWIDTH, true.into())]),
    );
    for link_type in [LinkType::Video, LinkType::Isp] {
        let enc = EncoderStage::create(&mut pipeline, 90, VideoProfile::Mjpeg).unwrap();
        node.link(&mut pipeline, enc.input(), link_type).unwrap();
        assert_eq!(
            pipeline.upstream(&enc.input()),
            Some(&node.handles().camera_output())
        );
    }
    let preview = pipeline
        .create_xlink_out(XLinkOutProperties::new("left_preview"))
        .unwrap();
    node.link(&mut pipeline, Input::new(preview, INPUT), LinkType::Preview)
        .unwrap();
    assert!(pipeline.is_input_linked(preview));

    // an input takes a single producer
    let raw_encoder = node.handles().raw.as_ref().unwrap().encoder.unwrap();
    let err = node
        .link(&mut pipeline, raw_encoder.input(), LinkType::Video)
        .unwrap_err();
    assert!(matches!(err, NodeError::Resource(_)));
}

#[test]
fn test_messages_other_than_frames_are_dropped() {
    let mut pipeline = Pipeline::new();
    let mut node = build(
        &mut pipeline,
        store_with(&[(keys::ENABLE_LAZY_PUBLISHER, false.into())]),
    );
    let device = Device::new("test", pipeline).unwrap();
    node.setup_queues(&device, &Transport::new("oak", false))
        .unwrap();
    device
        .emit(
            "left_mono",
            Message::CameraControl(CameraControl::new()),
        )
        .unwrap();
    assert_eq!(node.stats("left_mono").unwrap().dropped, 1);
}
