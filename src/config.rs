//! Per-node configuration snapshot.
//!
//! [`declare_params`] seeds the store with defaults for every key a node
//! reads; [`PipelineConfig::load`] then reads them back once, validated.

use device_bus::pipeline::CameraBoardSocket;

use crate::{
    catalog::{SensorCatalog, SensorIdentity},
    error::{NodeError, NodeResult},
    params::{ParamReader, ParameterStore},
};

pub mod keys {
    pub const PUBLISH_RAW_TOPIC: &str = "publish-raw-topic";
    pub const LOW_BANDWIDTH: &str = "low-bandwidth";
    pub const LOW_BANDWIDTH_QUALITY: &str = "low-bandwidth-quality";
    pub const ENABLE_SECONDARY_CODEC: &str = "enable-secondary-codec";
    pub const SECONDARY_CODEC_QUALITY: &str = "secondary-codec-quality";
    pub const MAX_QUEUE_SIZE: &str = "max-queue-size";
    pub const CALIBRATION_FILE: &str = "calibration-file";
    pub const BOARD_SOCKET_ID: &str = "board-socket-id";
    pub const GET_BASE_DEVICE_TIMESTAMP: &str = "get-base-device-timestamp";
    pub const UPDATE_BASE_TIME_ON_MSG: &str = "update-ros-base-time-on-msg";
    pub const ADD_EXPOSURE_OFFSET: &str = "add-exposure-offset";
    pub const EXPOSURE_OFFSET: &str = "exposure-offset";
    pub const REVERSE_STEREO_SOCKET_ORDER: &str = "reverse-stereo-socket-order";
    pub const ENABLE_LAZY_PUBLISHER: &str = "enable-lazy-publisher";

    pub const RESOLUTION: &str = "resolution";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const FPS: &str = "fps";
    pub const FSYNC_MODE: &str = "fsync-mode";
    pub const CAMERA_ORIENTATION: &str = "camera-orientation";

    // runtime-tunable
    pub const SET_MANUAL_EXPOSURE: &str = "set-manual-exposure";
    pub const EXPOSURE: &str = "exposure";
    pub const ISO: &str = "iso";
    pub const SHARPNESS: &str = "sharpness";
    pub const LUMA_DENOISE: &str = "luma-denoise";
    pub const CHROMA_DENOISE: &str = "chroma-denoise";
}

const MAX_DIMENSION: i64 = 8192;

/// Seeds `store` with the defaults of node `name`. Values already present
/// (from a parameter file) win.
pub fn declare_params(
    store: &dyn ParameterStore,
    catalog: &SensorCatalog,
    name: &str,
    socket: CameraBoardSocket,
    sensor: &SensorIdentity,
    publish: bool,
) {
    let p = ParamReader::new(store, name);
    p.declare(keys::PUBLISH_RAW_TOPIC, publish);
    p.declare(keys::BOARD_SOCKET_ID, socket.id());
    p.declare(keys::CALIBRATION_FILE, "");

    let resolution = p.declare(keys::RESOLUTION, sensor.default_resolution);
    let (width, height) = resolution
        .as_str()
        .and_then(|r| catalog.mono_resolution(r))
        .map(|r| r.size())
        .unwrap_or((0, 0));
    p.declare(keys::WIDTH, width as i64);
    p.declare(keys::HEIGHT, height as i64);
    p.declare(keys::FPS, 30.0);
    p.declare(keys::FSYNC_MODE, "OFF");
    p.declare(keys::CAMERA_ORIENTATION, "AUTO");

    p.declare(keys::LOW_BANDWIDTH, false);
    p.declare(keys::LOW_BANDWIDTH_QUALITY, 50);
    p.declare(keys::ENABLE_SECONDARY_CODEC, false);
    p.declare(keys::SECONDARY_CODEC_QUALITY, 80);
    p.declare(keys::MAX_QUEUE_SIZE, 30);

    p.declare(keys::GET_BASE_DEVICE_TIMESTAMP, false);
    p.declare(keys::UPDATE_BASE_TIME_ON_MSG, false);
    p.declare(keys::ADD_EXPOSURE_OFFSET, false);
    p.declare(keys::EXPOSURE_OFFSET, 0);
    p.declare(keys::REVERSE_STEREO_SOCKET_ORDER, false);
    p.declare(keys::ENABLE_LAZY_PUBLISHER, true);

    p.declare(keys::SET_MANUAL_EXPOSURE, false);
    p.declare(keys::EXPOSURE, 1000);
    p.declare(keys::ISO, 800);
    p.declare(keys::SHARPNESS, 1);
    p.declare(keys::LUMA_DENOISE, 1);
    p.declare(keys::CHROMA_DENOISE, 1);
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub publish_raw: bool,
    pub low_bandwidth: bool,
    pub low_bandwidth_quality: u8,
    pub secondary_codec: bool,
    pub secondary_codec_quality: u8,
    pub max_queue_size: usize,
    // empty: synthesize from the device's factory calibration
    pub calibration_file: String,
    pub board_socket: CameraBoardSocket,

    pub resolution: String,
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    pub fsync_mode: String,
    pub orientation: String,

    pub device_timestamp: bool,
    pub update_base_time_on_msg: bool,
    pub add_exposure_offset: bool,
    pub exposure_offset: i64,
    pub reverse_stereo_socket_order: bool,
    pub lazy_publisher: bool,

    pub manual_exposure: bool,
    pub exposure_us: u32,
    pub iso: u32,
    pub sharpness: u8,
    pub luma_denoise: u8,
    pub chroma_denoise: u8,
}

impl PipelineConfig {
    pub fn load(store: &dyn ParameterStore, name: &str) -> NodeResult<Self> {
        let p = ParamReader::new(store, name);

        let socket_id = p.get_int(keys::BOARD_SOCKET_ID)?;
        let board_socket = CameraBoardSocket::from_id(socket_id).ok_or_else(|| {
            NodeError::config(format!("{}: unknown board socket {}", name, socket_id))
        })?;

        let max_queue_size = p.get_int(keys::MAX_QUEUE_SIZE)?;
        if max_queue_size <= 0 {
            return Err(NodeError::config(format!(
                "{}: {} must be positive, got {}",
                name,
                keys::MAX_QUEUE_SIZE,
                max_queue_size
            )));
        }

        let fps = p.get_double(keys::FPS)?;
        if fps.is_nan() || fps <= 0.0 {
            return Err(NodeError::config(format!("{}: fps must be positive", name)));
        }

        Ok(Self {
            publish_raw: p.get_bool(keys::PUBLISH_RAW_TOPIC)?,
            low_bandwidth: p.get_bool(keys::LOW_BANDWIDTH)?,
            low_bandwidth_quality: p.get_ranged(keys::LOW_BANDWIDTH_QUALITY, 0, 100)? as u8,
            secondary_codec: p.get_bool(keys::ENABLE_SECONDARY_CODEC)?,
            secondary_codec_quality: p.get_ranged(keys::SECONDARY_CODEC_QUALITY, 0, 100)? as u8,
            max_queue_size: max_queue_size as usize,
            calibration_file: p.get_string(keys::CALIBRATION_FILE)?,
            board_socket,

            resolution: p.get_string(keys::RESOLUTION)?,
            width: p.get_ranged(keys::WIDTH, 0, MAX_DIMENSION)? as u32,
            height: p.get_ranged(keys::HEIGHT, 0, MAX_DIMENSION)? as u32,
            fps: fps as f32,
            fsync_mode: p.get_string(keys::FSYNC_MODE)?,
            orientation: p.get_string(keys::CAMERA_ORIENTATION)?,

            device_timestamp: p.get_bool(keys::GET_BASE_DEVICE_TIMESTAMP)?,
            update_base_time_on_msg: p.get_bool(keys::UPDATE_BASE_TIME_ON_MSG)?,
            add_exposure_offset: p.get_bool(keys::ADD_EXPOSURE_OFFSET)?,
            exposure_offset: p.get_ranged(keys::EXPOSURE_OFFSET, 0, 2)?,
            reverse_stereo_socket_order: p.get_bool(keys::REVERSE_STEREO_SOCKET_ORDER)?,
            lazy_publisher: p.get_bool(keys::ENABLE_LAZY_PUBLISHER)?,

            manual_exposure: p.get_bool(keys::SET_MANUAL_EXPOSURE)?,
            exposure_us: p.get_ranged(keys::EXPOSURE, 1, u32::MAX as i64)? as u32,
            iso: p.get_ranged(keys::ISO, 1, u32::MAX as i64)? as u32,
            sharpness: p.get_ranged(keys::SHARPNESS, 0, u8::MAX as i64)? as u8,
            luma_denoise: p.get_ranged(keys::LUMA_DENOISE, 0, u8::MAX as i64)? as u8,
            chroma_denoise: p.get_ranged(keys::CHROMA_DENOISE, 0, u8::MAX as i64)? as u8,
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
