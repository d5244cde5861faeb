use std::fmt::{Display, Formatter};
use std::time::Duration;

use bytes::Bytes;

use crate::{
    control::CameraControl,
    pipeline::{CameraBoardSocket, VideoProfile},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    Gray8,
    Raw8,
    Nv12,
    Yuv420p,
    Bgr888i,
}

impl FrameType {
    pub fn bytes_per_pixel_row(&self, width: u32) -> u32 {
        match self {
            FrameType::Gray8 | FrameType::Raw8 | FrameType::Nv12 | FrameType::Yuv420p => width,
            FrameType::Bgr888i => width * 3,
        }
    }

    /// Total payload size for a frame of the given dimensions.
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            FrameType::Gray8 | FrameType::Raw8 => w * h,
            FrameType::Nv12 | FrameType::Yuv420p => w * h + w * h / 2,
            FrameType::Bgr888i => w * h * 3,
        }
    }
}

/// Which instant of the exposure window a frame timestamp refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExposureOffset {
    Start,
    Middle,
    End,
}

impl ExposureOffset {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(Self::Start),
            1 => Some(Self::Middle),
            2 => Some(Self::End),
            _ => None,
        }
    }
}

fn offset_timestamp(ts: Duration, exposure: Duration, offset: ExposureOffset) -> Duration {
    // device timestamps mark the end of exposure
    match offset {
        ExposureOffset::Start => ts.saturating_sub(exposure),
        ExposureOffset::Middle => ts.saturating_sub(exposure / 2),
        ExposureOffset::End => ts,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImgFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub frame_type: FrameType,
    pub sequence: u64,
    // host-synced steady clock
    pub timestamp: Duration,
    // device clock
    pub device_timestamp: Duration,
    pub exposure: Duration,
    pub socket: CameraBoardSocket,
}

impl ImgFrame {
    pub fn timestamp_at(&self, offset: ExposureOffset) -> Duration {
        offset_timestamp(self.timestamp, self.exposure, offset)
    }

    pub fn device_timestamp_at(&self, offset: ExposureOffset) -> Duration {
        offset_timestamp(self.device_timestamp, self.exposure, offset)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodedFrameKind {
    I,
    P,
    Unknown,
}

/// Output of an on-device encoder. The container does not carry the picture
/// dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedFrame {
    pub data: Bytes,
    pub profile: VideoProfile,
    pub kind: EncodedFrameKind,
    pub quality: u8,
    pub sequence: u64,
    pub timestamp: Duration,
    pub device_timestamp: Duration,
    pub exposure: Duration,
    pub socket: CameraBoardSocket,
}

impl EncodedFrame {
    pub fn timestamp_at(&self, offset: ExposureOffset) -> Duration {
        offset_timestamp(self.timestamp, self.exposure, offset)
    }

    pub fn device_timestamp_at(&self, offset: ExposureOffset) -> Duration {
        offset_timestamp(self.device_timestamp, self.exposure, offset)
    }

    pub fn is_keyframe(&self) -> bool {
        self.kind == EncodedFrameKind::I
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    ImgFrame(ImgFrame),
    EncodedFrame(EncodedFrame),
    CameraControl(CameraControl),
}

impl Message {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Message::ImgFrame(_) => "ImgFrame",
            Message::EncodedFrame(_) => "EncodedFrame",
            Message::CameraControl(_) => "CameraControl",
        }
    }

    pub fn sequence(&self) -> Option<u64> {
        match self {
            Message::ImgFrame(f) => Some(f.sequence),
            Message::EncodedFrame(f) => Some(f.sequence),
            Message::CameraControl(_) => None,
        }
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Message::ImgFrame(frame) => write!(
                f,
                "ImgFrame {{ seq: {}, {}x{}, data: {} }}",
                frame.sequence,
                frame.width,
                frame.height,
                frame.data.len()
            ),
            Message::EncodedFrame(frame) => write!(
                f,
                "EncodedFrame {{ seq: {}, profile: {:?}, data: {} }}",
                frame.sequence,
                frame.profile,
                frame.data.len()
            ),
            Message::CameraControl(ctrl) => write!(f, "CameraControl {:?}", ctrl),
        }
    }
}

impl From<ImgFrame> for Message {
    fn from(frame: ImgFrame) -> Self {
        Message::ImgFrame(frame)
    }
}

impl From<EncodedFrame> for Message {
    fn from(frame: EncodedFrame) -> Self {
        Message::EncodedFrame(frame)
    }
}

impl From<CameraControl> for Message {
    fn from(ctrl: CameraControl) -> Self {
        Message::CameraControl(ctrl)
    }
}
