//! Messages published by sensor nodes.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    // wall-clock time since the Unix epoch
    pub stamp: Duration,
    pub frame_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageMessage {
    pub header: Header,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    // bytes per row, 0 for compressed payloads
    pub step: u32,
    pub data: Bytes,
}

impl ImageMessage {
    pub fn is_compressed(&self) -> bool {
        self.step == 0
    }
}

/// One encoded access unit of the secondary video stream.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoPacket {
    pub header: Header,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub keyframe: bool,
    pub sequence: u64,
    pub data: Bytes,
}

/// Camera intrinsics in the layout of a camera-info record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationInfo {
    #[serde(default)]
    pub header: Header,
    pub width: u32,
    pub height: u32,
    pub distortion_model: String,
    pub d: Vec<f64>,
    pub k: [f64; 9],
    pub r: [f64; 9],
    pub p: [f64; 12],
}

impl CalibrationInfo {
    pub fn fx(&self) -> f64 {
        self.k[0]
    }

    pub fn fy(&self) -> f64 {
        self.k[4]
    }

    /// Copy stamped for one frame.
    pub fn stamped(&self, header: &Header) -> Self {
        Self {
            header: header.clone(),
            ..self.clone()
        }
    }
}
