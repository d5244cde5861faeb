use std::collections::HashMap;

use crate::pipeline::CameraBoardSocket;

/// Factory calibration of a single camera, at the resolution it was
/// calibrated with.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraData {
    pub width: u32,
    pub height: u32,
    // row-major 3x3
    pub intrinsics: [f64; 9],
    pub distortion: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Extrinsics {
    pub to_socket: CameraBoardSocket,
    // centimeters
    pub translation: [f64; 3],
}

/// Calibration EEPROM contents as read from the device.
#[derive(Clone, Debug, Default)]
pub struct CalibrationHandler {
    cameras: HashMap<CameraBoardSocket, CameraData>,
    extrinsics: HashMap<CameraBoardSocket, Extrinsics>,
    stereo_left: Option<CameraBoardSocket>,
    stereo_right: Option<CameraBoardSocket>,
}

impl CalibrationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera(mut self, socket: CameraBoardSocket, data: CameraData) -> Self {
        self.cameras.insert(socket, data);
        self
    }

    pub fn with_extrinsics(mut self, from: CameraBoardSocket, extrinsics: Extrinsics) -> Self {
        self.extrinsics.insert(from, extrinsics);
        self
    }

    pub fn with_stereo_pair(mut self, left: CameraBoardSocket, right: CameraBoardSocket) -> Self {
        self.stereo_left = Some(left);
        self.stereo_right = Some(right);
        self
    }

    pub fn camera_data(&self, socket: CameraBoardSocket) -> Option<&CameraData> {
        self.cameras.get(&socket)
    }

    /// Intrinsics rescaled to the requested output size. A zero width or
    /// height keeps the calibrated size.
    pub fn camera_intrinsics(
        &self,
        socket: CameraBoardSocket,
        width: u32,
        height: u32,
    ) -> anyhow::Result<[f64; 9]> {
        let data = self
            .camera_data(socket)
            .ok_or(anyhow::anyhow!("no factory calibration for {:?}", socket))?;
        let sx = if width == 0 {
            1.0
        } else {
            width as f64 / data.width as f64
        };
        let sy = if height == 0 {
            1.0
        } else {
            height as f64 / data.height as f64
        };
        let mut k = data.intrinsics;
        k[0] *= sx;
        k[2] *= sx;
        k[4] *= sy;
        k[5] *= sy;
        Ok(k)
    }

    pub fn distortion_coefficients(&self, socket: CameraBoardSocket) -> anyhow::Result<Vec<f64>> {
        self.camera_data(socket)
            .map(|d| d.distortion.clone())
            .ok_or(anyhow::anyhow!("no factory calibration for {:?}", socket))
    }

    pub fn stereo_left(&self) -> Option<CameraBoardSocket> {
        self.stereo_left
    }

    pub fn stereo_right(&self) -> Option<CameraBoardSocket> {
        self.stereo_right
    }

    /// Baseline between the two stereo sockets, in meters.
    pub fn baseline(&self) -> Option<f64> {
        let left = self.stereo_left?;
        let right = self.stereo_right?;
        let t = self
            .extrinsics
            .get(&left)
            .filter(|e| e.to_socket == right)
            .map(|e| e.translation)
            .or_else(|| {
                self.extrinsics
                    .get(&right)
                    .filter(|e| e.to_socket == left)
                    .map(|e| e.translation)
            })?;
        let cm = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
        Some(cm / 100.0)
    }

    /// Factory data of a typical stereo module: color camera on CAM_A,
    /// global-shutter mono pair on CAM_B/CAM_C with a 7.5 cm baseline.
    pub fn stereo_module() -> Self {
        let mono = |cx: f64| CameraData {
            width: 1280,
            height: 800,
            intrinsics: [800.0, 0.0, cx, 0.0, 800.0, 400.0, 0.0, 0.0, 1.0],
            distortion: vec![0.0; 14],
        };
        Self::new()
            .with_camera(
                CameraBoardSocket::CamA,
                CameraData {
                    width: 1920,
                    height: 1080,
                    intrinsics: [1500.0, 0.0, 960.0, 0.0, 1500.0, 540.0, 0.0, 0.0, 1.0],
                    distortion: vec![0.0; 14],
                },
            )
            .with_camera(CameraBoardSocket::CamB, mono(638.5))
            .with_camera(CameraBoardSocket::CamC, mono(641.5))
            .with_extrinsics(
                CameraBoardSocket::CamB,
                Extrinsics {
                    to_socket: CameraBoardSocket::CamC,
                    translation: [-7.5, 0.0, 0.0],
                },
            )
            .with_stereo_pair(CameraBoardSocket::CamB, CameraBoardSocket::CamC)
    }
}
