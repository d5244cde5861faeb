use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use device_bus::{
    device::{Device, DeviceClock},
    message::{EncodedFrame, ExposureOffset, FrameType, ImgFrame, Message},
    pipeline::{CameraBoardSocket, VideoProfile},
};

use crate::{
    error::{DecodeError, NodeResult},
    msg::{CalibrationInfo, Header, ImageMessage, VideoPacket},
    sensor::calibration::factory_camera_info,
};

/// Turns device messages into publishable messages.
pub trait FrameConverter: Send + Sync {
    fn to_image(&self, msg: &Message) -> Result<ImageMessage, DecodeError>;

    /// `width`/`height` are reported as given; encoded frames do not carry
    /// their dimensions.
    fn to_video_packet(
        &self,
        frame: &EncodedFrame,
        width: u32,
        height: u32,
    ) -> Result<VideoPacket, DecodeError>;

    fn calibration_info(
        &self,
        device: &Device,
        socket: CameraBoardSocket,
        width: u32,
        height: u32,
    ) -> NodeResult<CalibrationInfo>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeMode {
    /// Uncompressed pixels.
    Raw,
    /// Compressed payload passed through as-is; the picture is reported with
    /// the configured size.
    Bitstream { width: u32, height: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConverterOptions {
    pub mode: DecodeMode,
    pub device_timestamp: bool,
    pub update_base_time_on_msg: bool,
    pub exposure_offset: Option<ExposureOffset>,
    pub reverse_stereo_socket_order: bool,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            mode: DecodeMode::Raw,
            device_timestamp: false,
            update_base_time_on_msg: false,
            exposure_offset: None,
            reverse_stereo_socket_order: false,
        }
    }
}

fn wall_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

fn pixel_encoding(frame_type: FrameType) -> &'static str {
    match frame_type {
        FrameType::Gray8 | FrameType::Raw8 => "mono8",
        FrameType::Nv12 => "nv12",
        FrameType::Yuv420p => "i420",
        FrameType::Bgr888i => "bgr8",
    }
}

fn check_start_code(frame: &EncodedFrame) -> Result<(), DecodeError> {
    let data = &frame.data[..];
    match frame.profile {
        VideoProfile::Mjpeg if !data.starts_with(&[0xFF, 0xD8]) => {
            Err(DecodeError::InvalidBitstream {
                profile: "MJPEG",
                reason: "missing start of image marker",
            })
        }
        VideoProfile::Mjpeg => Ok(()),
        _ if data.starts_with(&[0, 0, 0, 1]) || data.starts_with(&[0, 0, 1]) => Ok(()),
        _ => Err(DecodeError::InvalidBitstream {
            profile: "H.26x",
            reason: "missing NAL start code",
        }),
    }
}

fn video_encoding(profile: VideoProfile) -> &'static str {
    match profile {
        VideoProfile::Mjpeg => "jpeg",
        VideoProfile::H264Baseline | VideoProfile::H264High | VideoProfile::H264Main => "h264",
        VideoProfile::H265Main => "h265",
    }
}

/// Default converter.
///
/// Stamps are host wall-clock times: the device clock reading of the frame
/// plus the offset between the wall clock and the device clock, sampled at
/// construction and optionally again on every message.
pub struct ImageConverter {
    frame_id: String,
    clock: DeviceClock,
    options: ConverterOptions,
    // wall clock minus device clock, in nanoseconds
    base_offset: AtomicU64,
}

impl ImageConverter {
    pub fn new(frame_id: &str, clock: DeviceClock, options: ConverterOptions) -> Self {
        let converter = Self {
            frame_id: frame_id.to_string(),
            clock,
            options,
            base_offset: AtomicU64::new(0),
        };
        converter.update_base_time();
        converter
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    pub fn update_base_time(&self) {
        let offset = wall_clock().saturating_sub(self.clock.now());
        self.base_offset
            .store(offset.as_nanos() as u64, Ordering::Relaxed);
    }

    fn header(&self, host: Duration, device: Duration) -> Header {
        if self.options.update_base_time_on_msg {
            self.update_base_time();
        }
        let ts = if self.options.device_timestamp {
            device
        } else {
            host
        };
        Header {
            stamp: ts + Duration::from_nanos(self.base_offset.load(Ordering::Relaxed)),
            frame_id: self.frame_id.clone(),
        }
    }

    fn frame_header(&self, frame: &ImgFrame) -> Header {
        match self.options.exposure_offset {
            Some(offset) => {
                self.header(frame.timestamp_at(offset), frame.device_timestamp_at(offset))
            }
            None => self.header(frame.timestamp, frame.device_timestamp),
        }
    }

    fn encoded_header(&self, frame: &EncodedFrame) -> Header {
        match self.options.exposure_offset {
            Some(offset) => {
                self.header(frame.timestamp_at(offset), frame.device_timestamp_at(offset))
            }
            None => self.header(frame.timestamp, frame.device_timestamp),
        }
    }

    fn decode_raw(&self, frame: &ImgFrame) -> Result<ImageMessage, DecodeError> {
        let expected = frame.frame_type.frame_size(frame.width, frame.height);
        if frame.data.len() < expected {
            return Err(DecodeError::Truncated {
                expected,
                actual: frame.data.len(),
            });
        }
        Ok(ImageMessage {
            header: self.frame_header(frame),
            width: frame.width,
            height: frame.height,
            encoding: pixel_encoding(frame.frame_type).to_string(),
            step: frame.frame_type.bytes_per_pixel_row(frame.width),
            data: frame.data.slice(..expected),
        })
    }

    fn pass_through(
        &self,
        frame: &EncodedFrame,
        width: u32,
        height: u32,
    ) -> Result<ImageMessage, DecodeError> {
        if frame.profile != VideoProfile::Mjpeg {
            return Err(DecodeError::UnexpectedMessage("motion-video frame"));
        }
        check_start_code(frame)?;
        Ok(ImageMessage {
            header: self.encoded_header(frame),
            width,
            height,
            encoding: "jpeg".to_string(),
            step: 0,
            data: frame.data.clone(),
        })
    }
}

impl FrameConverter for ImageConverter {
    fn to_image(&self, msg: &Message) -> Result<ImageMessage, DecodeError> {
        match (self.options.mode, msg) {
            (DecodeMode::Raw, Message::ImgFrame(frame)) => self.decode_raw(frame),
            (DecodeMode::Bitstream { width, height }, Message::EncodedFrame(frame)) => {
                self.pass_through(frame, width, height)
            }
            (_, other) => Err(DecodeError::UnexpectedMessage(other.kind_name())),
        }
    }

    fn to_video_packet(
        &self,
        frame: &EncodedFrame,
        width: u32,
        height: u32,
    ) -> Result<VideoPacket, DecodeError> {
        check_start_code(frame)?;
        Ok(VideoPacket {
            header: self.encoded_header(frame),
            width,
            height,
            encoding: video_encoding(frame.profile).to_string(),
            keyframe: frame.is_keyframe(),
            sequence: frame.sequence,
            data: frame.data.clone(),
        })
    }

    fn calibration_info(
        &self,
        device: &Device,
        socket: CameraBoardSocket,
        width: u32,
        height: u32,
    ) -> NodeResult<CalibrationInfo> {
        let mut info = factory_camera_info(
            device.read_calibration(),
            socket,
            width,
            height,
            self.options.reverse_stereo_socket_order,
        )?;
        info.header.frame_id = self.frame_id.clone();
        Ok(info)
    }
}

#[cfg(test)]
#[path = "converter_test.rs"]
mod converter_test;
