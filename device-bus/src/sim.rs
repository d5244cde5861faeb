use std::{sync::Arc, time::Duration};

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::sync::CancellationToken;

use crate::{
    device::Device,
    message::{EncodedFrame, EncodedFrameKind, FrameType, ImgFrame, Message},
    pipeline::{MonoCameraProperties, NodeId, NodeKind, OUT, Output, Route, VideoProfile},
    queue::QueueError,
};

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
const NAL_START: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Synthetic sensor standing in for a camera stage: produces a moving
/// gradient and pushes it through every route leaving the camera output.
pub struct SimulatedCamera {
    device: Arc<Device>,
    props: MonoCameraProperties,
    routes: Vec<Route>,
    sequence: u64,
}

impl SimulatedCamera {
    pub fn new(device: Arc<Device>, camera: NodeId) -> anyhow::Result<Self> {
        let props = match device.pipeline().node(camera).map(|n| &n.kind) {
            Some(NodeKind::MonoCamera(p)) => p.clone(),
            Some(other) => {
                anyhow::bail!("node#{} is a {}, not a camera", camera, other.type_name())
            }
            None => anyhow::bail!("node#{} does not exist", camera),
        };
        let routes = device.pipeline().routes_from(&Output::new(camera, OUT));
        Ok(Self {
            device,
            props,
            routes,
            sequence: 0,
        })
    }

    pub fn props(&self) -> &MonoCameraProperties {
        &self.props
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.props.fps.max(1.0))
    }

    /// Captures one frame and emits it on every route. Returns how many
    /// streams accepted it; streams the host has not opened are skipped.
    pub fn capture(&mut self) -> usize {
        let frame = self.next_frame();
        let mut delivered = 0;
        for route in self.routes.iter() {
            let msg = match &route.encoder {
                None => Message::ImgFrame(frame.clone()),
                Some(enc) => Message::EncodedFrame(encode(
                    &frame,
                    enc.profile,
                    enc.quality,
                    enc.keyframe_frequency,
                )),
            };
            match self.device.emit(&route.stream_name, msg) {
                Ok(()) => delivered += 1,
                Err(QueueError::NotOpen(_)) => {}
                Err(e) => log::trace!("sim camera: {}", e),
            }
        }
        delivered
    }

    fn next_frame(&mut self) -> ImgFrame {
        let (width, height) = self.props.resolution.size();
        let seq = self.sequence;
        self.sequence += 1;

        let mut data = BytesMut::with_capacity(FrameType::Gray8.frame_size(width, height));
        for y in 0..height {
            for x in 0..width {
                data.put_u8((x + y).wrapping_add(seq as u32) as u8);
            }
        }

        let exposure = self
            .device
            .control_state(self.props.board_socket)
            .map(|s| Duration::from_micros(s.exposure_us as u64))
            .unwrap_or(Duration::from_millis(20));
        let now = self.device.clock().now();
        ImgFrame {
            data: data.freeze(),
            width,
            height,
            frame_type: FrameType::Gray8,
            sequence: seq,
            timestamp: now,
            device_timestamp: now,
            exposure,
            socket: self.props.board_socket,
        }
    }
}

/// Fake bitstream with the container markers of the profile; the payload is
/// a sample of the source pixels.
fn encode(
    frame: &ImgFrame,
    profile: VideoProfile,
    quality: u8,
    keyframe_frequency: u32,
) -> EncodedFrame {
    let sample = frame.data.len().min(64 + quality as usize);
    let mut data = BytesMut::with_capacity(sample + 8);
    let kind = match profile {
        VideoProfile::Mjpeg => {
            data.put_slice(&JPEG_SOI);
            data.put_slice(&frame.data[..sample]);
            data.put_slice(&JPEG_EOI);
            EncodedFrameKind::I
        }
        _ => {
            data.put_slice(&NAL_START);
            data.put_slice(&frame.data[..sample]);
            if keyframe_frequency > 0 && frame.sequence % keyframe_frequency as u64 == 0 {
                EncodedFrameKind::I
            } else {
                EncodedFrameKind::P
            }
        }
    };
    EncodedFrame {
        data: Bytes::from(data),
        profile,
        kind,
        quality,
        sequence: frame.sequence,
        timestamp: frame.timestamp,
        device_timestamp: frame.device_timestamp,
        exposure: frame.exposure,
        socket: frame.socket,
    }
}

/// Drives a [`SimulatedCamera`] at its configured frame rate on the tokio
/// runtime until cancelled.
pub struct CameraTask {
    cancel: CancellationToken,
}

impl CameraTask {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    pub fn get_cancel(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn start(&self, mut camera: SimulatedCamera) {
        let cancel = self.cancel.clone();
        let mut interval = tokio::time::interval(camera.frame_interval());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        camera.capture();
                    }
                }
            }
            log::debug!("sim camera stopped after {} frames", camera.sequence);
        });
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Default for CameraTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CameraTask {
    fn drop(&mut self) {
        self.stop();
    }
}
