use device_bus::{
    control::CameraControl,
    pipeline::{
        INPUT, INPUT_CONTROL, Input, MonoCameraProperties, NodeId, OUT, Output, Pipeline,
        VideoProfile, XLinkInProperties, XLinkOutProperties,
    },
};

use crate::{
    catalog::{SensorCatalog, SensorIdentity},
    config::PipelineConfig,
    error::{NodeError, NodeResult},
    sensor::encoder::EncoderStage,
};

pub const SECONDARY_QUEUE_SIZE: usize = 2;

/// Host-facing end of the graph: the link stage and, when the stream is
/// encoded on the device, the encoder feeding it.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamHandle {
    pub stream: String,
    pub xlink: NodeId,
    pub encoder: Option<EncoderStage>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphHandles {
    pub camera: NodeId,
    pub raw: Option<StreamHandle>,
    pub secondary: Option<StreamHandle>,
    pub control: StreamHandle,
}

impl GraphHandles {
    pub fn camera_output(&self) -> Output {
        Output::new(self.camera, OUT)
    }

    /// Device → host streams, raw first.
    pub fn output_streams(&self) -> Vec<&str> {
        self.raw
            .iter()
            .chain(self.secondary.iter())
            .map(|h| h.stream.as_str())
            .collect()
    }
}

pub fn raw_stream_name(name: &str) -> String {
    format!("{}_mono", name)
}

pub fn secondary_stream_name(name: &str) -> String {
    format!("{}_h264", name)
}

pub fn control_stream_name(name: &str) -> String {
    format!("{}_control", name)
}

fn resource(e: anyhow::Error) -> NodeError {
    NodeError::Resource(e)
}

/// Decides the topology of one mono sensor and adds it to a pipeline.
pub struct GraphBuilder<'c> {
    catalog: &'c SensorCatalog,
}

impl<'c> GraphBuilder<'c> {
    pub fn new(catalog: &'c SensorCatalog) -> Self {
        Self { catalog }
    }

    /// Validates the configured sensor settings into camera properties.
    pub fn camera_properties(
        &self,
        sensor: &SensorIdentity,
        config: &PipelineConfig,
    ) -> NodeResult<MonoCameraProperties> {
        if !sensor.allows(&config.resolution) {
            return Err(NodeError::config(format!(
                "resolution {} is not supported by {} (allowed: {})",
                config.resolution,
                sensor.name,
                sensor.allowed_resolutions.join(", ")
            )));
        }
        let resolution = self.catalog.mono_resolution(&config.resolution).ok_or_else(|| {
            NodeError::config(format!("{} is not a mono resolution", config.resolution))
        })?;
        let sync_mode = self.catalog.fsync_mode(&config.fsync_mode).ok_or_else(|| {
            NodeError::config(format!("unknown fsync mode {}", config.fsync_mode))
        })?;
        let orientation = self.catalog.orientation(&config.orientation).ok_or_else(|| {
            NodeError::config(format!("unknown camera orientation {}", config.orientation))
        })?;

        let mut initial_control = CameraControl::new();
        if config.manual_exposure {
            initial_control.set_manual_exposure(config.exposure_us, config.iso);
        }
        initial_control
            .set_sharpness(config.sharpness)
            .set_luma_denoise(config.luma_denoise)
            .set_chroma_denoise(config.chroma_denoise);

        Ok(MonoCameraProperties {
            board_socket: config.board_socket,
            resolution,
            fps: config.fps,
            orientation,
            sync_mode,
            initial_control,
        })
    }

    pub fn build(
        &self,
        pipeline: &mut Pipeline,
        name: &str,
        sensor: &SensorIdentity,
        config: &PipelineConfig,
    ) -> NodeResult<GraphHandles> {
        if config.max_queue_size == 0 {
            return Err(NodeError::config("max-queue-size must be positive"));
        }
        let props = self.camera_properties(sensor, config)?;
        let camera = pipeline.create_mono_camera(props).map_err(resource)?;
        let source = Output::new(camera, OUT);

        let raw = if config.publish_raw {
            let stream = raw_stream_name(name);
            let xlink = pipeline
                .create_xlink_out(XLinkOutProperties::new(&stream))
                .map_err(resource)?;
            let encoder = if config.low_bandwidth {
                let enc = EncoderStage::create(
                    pipeline,
                    config.low_bandwidth_quality as i64,
                    VideoProfile::Mjpeg,
                )?;
                pipeline.link(source.clone(), enc.input()).map_err(resource)?;
                pipeline
                    .link(enc.bitstream(), Input::new(xlink, INPUT))
                    .map_err(resource)?;
                Some(enc)
            } else {
                pipeline
                    .link(source.clone(), Input::new(xlink, INPUT))
                    .map_err(resource)?;
                None
            };
            Some(StreamHandle {
                stream,
                xlink,
                encoder,
            })
        } else {
            None
        };

        let secondary = if config.secondary_codec {
            let stream = secondary_stream_name(name);
            let enc = EncoderStage::create(
                pipeline,
                config.secondary_codec_quality as i64,
                VideoProfile::H264High,
            )?;
            // one keyframe per second
            enc.set_keyframe_frequency(pipeline, config.fps.round() as u32)?;
            let xlink = pipeline
                .create_xlink_out(XLinkOutProperties {
                    stream_name: stream.clone(),
                    queue_size: SECONDARY_QUEUE_SIZE,
                    blocking: false,
                })
                .map_err(resource)?;
            pipeline.link(source.clone(), enc.input()).map_err(resource)?;
            pipeline
                .link(enc.bitstream(), Input::new(xlink, INPUT))
                .map_err(resource)?;
            Some(StreamHandle {
                stream,
                xlink,
                encoder: Some(enc),
            })
        } else {
            None
        };

        let control_stream = control_stream_name(name);
        let xin = pipeline
            .create_xlink_in(XLinkInProperties {
                stream_name: control_stream.clone(),
            })
            .map_err(resource)?;
        pipeline
            .link(Output::new(xin, OUT), Input::new(camera, INPUT_CONTROL))
            .map_err(resource)?;

        let handles = GraphHandles {
            camera,
            raw,
            secondary,
            control: StreamHandle {
                stream: control_stream,
                xlink: xin,
                encoder: None,
            },
        };
        log::info!(
            "{}: {} on {:?} at {} {}fps, streams [{}]",
            name,
            sensor.name,
            config.board_socket,
            config.resolution,
            config.fps,
            handles.output_streams().join(", ")
        );
        Ok(handles)
    }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;
