//! Camera-info records: loaded from a calibration file or synthesized from
//! the device's factory calibration.

use std::path::Path;

use device_bus::{calibration::CalibrationHandler, pipeline::CameraBoardSocket};
use serde::Deserialize;

use crate::{
    error::{NodeError, NodeResult},
    msg::{CalibrationInfo, Header},
};

const IDENTITY: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Deserialize)]
struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    fn checked<const N: usize>(&self, field: &str) -> NodeResult<[f64; N]> {
        if self.rows * self.cols != N || self.data.len() != N {
            return Err(NodeError::config(format!(
                "{} must hold {} values, got {}x{} with {}",
                field,
                N,
                self.rows,
                self.cols,
                self.data.len()
            )));
        }
        let mut out = [0.0; N];
        out.copy_from_slice(&self.data);
        Ok(out)
    }
}

#[derive(Debug, Deserialize)]
struct CameraInfoFile {
    image_width: u32,
    image_height: u32,
    #[serde(default)]
    camera_name: Option<String>,
    camera_matrix: Matrix,
    #[serde(default = "default_distortion_model")]
    distortion_model: String,
    distortion_coefficients: Matrix,
    #[serde(default)]
    rectification_matrix: Option<Matrix>,
    #[serde(default)]
    projection_matrix: Option<Matrix>,
}

fn default_distortion_model() -> String {
    "plumb_bob".to_string()
}

/// Projection matrix of an unrectified camera: `[K | t]` with `t = (tx, 0, 0)`.
fn projection(k: &[f64; 9], tx: f64) -> [f64; 12] {
    [
        k[0], k[1], k[2], tx, //
        k[3], k[4], k[5], 0.0, //
        k[6], k[7], k[8], 0.0,
    ]
}

/// Parses a YAML camera-info document.
pub fn parse_camera_info(yaml: &str, frame_id: &str) -> NodeResult<CalibrationInfo> {
    let file: CameraInfoFile = serde_yaml::from_str(yaml)
        .map_err(|e| NodeError::config(format!("invalid calibration file: {}", e)))?;
    let k = file.camera_matrix.checked::<9>("camera_matrix")?;
    let r = match &file.rectification_matrix {
        Some(m) => m.checked::<9>("rectification_matrix")?,
        None => IDENTITY,
    };
    let p = match &file.projection_matrix {
        Some(m) => m.checked::<12>("projection_matrix")?,
        None => projection(&k, 0.0),
    };
    if file.distortion_coefficients.data.len()
        != file.distortion_coefficients.rows * file.distortion_coefficients.cols
    {
        return Err(NodeError::config(
            "distortion_coefficients size does not match rows x cols",
        ));
    }
    if let Some(name) = &file.camera_name {
        log::debug!("loaded calibration of camera {}", name);
    }
    Ok(CalibrationInfo {
        header: Header {
            frame_id: frame_id.to_string(),
            ..Default::default()
        },
        width: file.image_width,
        height: file.image_height,
        distortion_model: file.distortion_model,
        d: file.distortion_coefficients.data,
        k,
        r,
        p,
    })
}

/// Loads a camera-info file. Accepts plain paths and `file://` URLs.
pub fn load_camera_info(url: &str, frame_id: &str) -> NodeResult<CalibrationInfo> {
    let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
    let yaml = std::fs::read_to_string(path).map_err(|e| {
        NodeError::config(format!("cannot read calibration {}: {}", path.display(), e))
    })?;
    let info = parse_camera_info(&yaml, frame_id)?;
    log::info!(
        "calibration loaded from {} ({}x{})",
        path.display(),
        info.width,
        info.height
    );
    Ok(info)
}

/// Camera info of `socket` at `width` x `height` from factory data.
///
/// The right camera of the stereo pair gets `Tx = -fx * baseline` in its
/// projection; with `reverse_stereo_order` the left one does.
pub fn factory_camera_info(
    calib: &CalibrationHandler,
    socket: CameraBoardSocket,
    width: u32,
    height: u32,
    reverse_stereo_order: bool,
) -> NodeResult<CalibrationInfo> {
    let k = calib
        .camera_intrinsics(socket, width, height)
        .map_err(NodeError::Resource)?;
    let mut d = calib
        .distortion_coefficients(socket)
        .map_err(NodeError::Resource)?;
    let distortion_model = if d.len() > 5 {
        // k1..k6, p1, p2 are what a rational model carries
        d.truncate(8);
        "rational_polynomial"
    } else {
        "plumb_bob"
    };

    let translated = if reverse_stereo_order {
        calib.stereo_left()
    } else {
        calib.stereo_right()
    };
    let tx = match (translated == Some(socket), calib.baseline()) {
        (true, Some(baseline)) => -k[0] * baseline,
        _ => 0.0,
    };

    let (width, height) = match calib.camera_data(socket) {
        Some(data) if width == 0 || height == 0 => (data.width, data.height),
        _ => (width, height),
    };
    Ok(CalibrationInfo {
        header: Header::default(),
        width,
        height,
        distortion_model: distortion_model.to_string(),
        d,
        k,
        r: IDENTITY,
        p: projection(&k, tx),
    })
}

#[cfg(test)]
#[path = "calibration_test.rs"]
mod calibration_test;
