use device_bus::pipeline::{
    BITSTREAM, INPUT, Input, NodeId, NodeKind, Output, Pipeline, VideoEncoderProperties,
    VideoProfile,
};

use crate::error::{NodeError, NodeResult};

/// Handle of an encoder stage inside a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderStage {
    pub node: NodeId,
    pub profile: VideoProfile,
}

impl EncoderStage {
    /// Creates a compression stage. `quality` (0..=100) is handed to the
    /// encoder unchanged.
    pub fn create(pipeline: &mut Pipeline, quality: i64, profile: VideoProfile) -> NodeResult<Self> {
        if !(0..=100).contains(&quality) {
            return Err(NodeError::config(format!(
                "encoder quality {} is outside 0..=100",
                quality
            )));
        }
        let node = pipeline
            .create_video_encoder(VideoEncoderProperties {
                profile,
                quality: quality as u8,
                ..Default::default()
            })
            .map_err(NodeError::Resource)?;
        log::debug!("created {:?} encoder node#{} (quality {})", profile, node, quality);
        Ok(Self { node, profile })
    }

    pub fn input(&self) -> Input {
        Input::new(self.node, INPUT)
    }

    pub fn bitstream(&self) -> Output {
        Output::new(self.node, BITSTREAM)
    }

    /// Distance between intra frames. Rejected for still-image profiles.
    pub fn set_keyframe_frequency(&self, pipeline: &mut Pipeline, frames: u32) -> NodeResult<()> {
        if !self.profile.is_video() {
            return Err(NodeError::config(format!(
                "{:?} encoder has no keyframe frequency",
                self.profile
            )));
        }
        match pipeline.node_mut(self.node).map(|n| &mut n.kind) {
            Some(NodeKind::VideoEncoder(props)) => {
                props.keyframe_frequency = frames.max(1);
                Ok(())
            }
            _ => Err(NodeError::Resource(anyhow::anyhow!(
                "node#{} is not an encoder",
                self.node
            ))),
        }
    }

    pub fn properties<'a>(&self, pipeline: &'a Pipeline) -> Option<&'a VideoEncoderProperties> {
        match pipeline.node(self.node).map(|n| &n.kind) {
            Some(NodeKind::VideoEncoder(props)) => Some(props),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "encoder_test.rs"]
mod encoder_test;
