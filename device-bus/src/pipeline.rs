use std::fmt::{Display, Formatter};

use crate::control::CameraControl;

pub type NodeId = usize;

pub const OUT: &str = "out";
pub const INPUT: &str = "input";
pub const INPUT_CONTROL: &str = "inputControl";
pub const BITSTREAM: &str = "bitstream";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CameraBoardSocket {
    Auto,
    CamA,
    CamB,
    CamC,
    CamD,
    CamE,
}

impl CameraBoardSocket {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            -1 => Some(Self::Auto),
            0 => Some(Self::CamA),
            1 => Some(Self::CamB),
            2 => Some(Self::CamC),
            3 => Some(Self::CamD),
            4 => Some(Self::CamE),
            _ => None,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Auto => -1,
            Self::CamA => 0,
            Self::CamB => 1,
            Self::CamC => 2,
            Self::CamD => 3,
            Self::CamE => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MonoResolution {
    The400P,
    The480P,
    The720P,
    The800P,
    The1200P,
}

impl MonoResolution {
    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::The400P => (640, 400),
            Self::The480P => (640, 480),
            Self::The720P => (1280, 720),
            Self::The800P => (1280, 800),
            Self::The1200P => (1920, 1200),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameSyncMode {
    Off,
    Output,
    Input,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageOrientation {
    Auto,
    Normal,
    HorizontalMirror,
    VerticalFlip,
    Rotate180,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VideoProfile {
    Mjpeg,
    H264Baseline,
    H264High,
    H264Main,
    H265Main,
}

impl VideoProfile {
    /// Motion-video profiles carry inter frames; MJPEG is a sequence of stills.
    pub fn is_video(&self) -> bool {
        !matches!(self, Self::Mjpeg)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MonoCameraProperties {
    pub board_socket: CameraBoardSocket,
    pub resolution: MonoResolution,
    pub fps: f32,
    pub orientation: ImageOrientation,
    pub sync_mode: FrameSyncMode,
    // applied once when the device boots
    pub initial_control: CameraControl,
}

impl Default for MonoCameraProperties {
    fn default() -> Self {
        Self {
            board_socket: CameraBoardSocket::Auto,
            resolution: MonoResolution::The720P,
            fps: 30.0,
            orientation: ImageOrientation::Auto,
            sync_mode: FrameSyncMode::Off,
            initial_control: CameraControl::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VideoEncoderProperties {
    pub profile: VideoProfile,
    // 0..=100, handed to the encoder as-is
    pub quality: u8,
    pub keyframe_frequency: u32,
}

impl Default for VideoEncoderProperties {
    fn default() -> Self {
        Self {
            profile: VideoProfile::Mjpeg,
            quality: 80,
            keyframe_frequency: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct XLinkOutProperties {
    pub stream_name: String,
    pub queue_size: usize,
    pub blocking: bool,
}

impl XLinkOutProperties {
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            queue_size: 8,
            blocking: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct XLinkInProperties {
    pub stream_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    MonoCamera(MonoCameraProperties),
    VideoEncoder(VideoEncoderProperties),
    XLinkOut(XLinkOutProperties),
    XLinkIn(XLinkInProperties),
}

impl NodeKind {
    pub fn outputs(&self) -> &'static [&'static str] {
        match self {
            NodeKind::MonoCamera(_) => &[OUT],
            NodeKind::VideoEncoder(_) => &[BITSTREAM],
            NodeKind::XLinkOut(_) => &[],
            NodeKind::XLinkIn(_) => &[OUT],
        }
    }

    pub fn inputs(&self) -> &'static [&'static str] {
        match self {
            NodeKind::MonoCamera(_) => &[INPUT_CONTROL],
            NodeKind::VideoEncoder(_) => &[INPUT],
            NodeKind::XLinkOut(_) => &[INPUT],
            NodeKind::XLinkIn(_) => &[],
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::MonoCamera(_) => "MonoCamera",
            NodeKind::VideoEncoder(_) => "VideoEncoder",
            NodeKind::XLinkOut(_) => "XLinkOut",
            NodeKind::XLinkIn(_) => "XLinkIn",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Output {
    pub node: NodeId,
    pub name: &'static str,
}

impl Output {
    pub fn new(node: NodeId, name: &'static str) -> Self {
        Self { node, name }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Input {
    pub node: NodeId,
    pub name: &'static str,
}

impl Input {
    pub fn new(node: NodeId, name: &'static str) -> Self {
        Self { node, name }
    }
}

impl Display for Output {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}.{}", self.node, self.name)
    }
}

impl Display for Input {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}.{}", self.node, self.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub out: Output,
    pub input: Input,
}

/// Hardware budget of the device. Stage creation beyond it is rejected.
#[derive(Clone, Copy, Debug)]
pub struct PipelineLimits {
    pub max_nodes: usize,
    pub max_video_encoders: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_nodes: 64,
            max_video_encoders: 3,
        }
    }
}

/// Where frames leaving a stage output end up on the host side.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub stream_name: String,
    pub encoder: Option<VideoEncoderProperties>,
}

#[derive(Debug, Default)]
pub struct Pipeline {
    nodes: Vec<Node>,
    links: Vec<Link>,
    limits: PipelineLimits,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: PipelineLimits) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            limits,
        }
    }

    pub fn create_mono_camera(&mut self, props: MonoCameraProperties) -> anyhow::Result<NodeId> {
        self.create(NodeKind::MonoCamera(props))
    }

    pub fn create_video_encoder(
        &mut self,
        props: VideoEncoderProperties,
    ) -> anyhow::Result<NodeId> {
        let encoders = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::VideoEncoder(_)))
            .count();
        if encoders >= self.limits.max_video_encoders {
            anyhow::bail!(
                "video encoder limit reached ({} of {})",
                encoders,
                self.limits.max_video_encoders
            );
        }
        self.create(NodeKind::VideoEncoder(props))
    }

    pub fn create_xlink_out(&mut self, props: XLinkOutProperties) -> anyhow::Result<NodeId> {
        if self.find_stream(&props.stream_name).is_some() {
            anyhow::bail!("stream name already in use: {}", props.stream_name);
        }
        self.create(NodeKind::XLinkOut(props))
    }

    pub fn create_xlink_in(&mut self, props: XLinkInProperties) -> anyhow::Result<NodeId> {
        if self.find_stream(&props.stream_name).is_some() {
            anyhow::bail!("stream name already in use: {}", props.stream_name);
        }
        self.create(NodeKind::XLinkIn(props))
    }

    fn create(&mut self, kind: NodeKind) -> anyhow::Result<NodeId> {
        if self.nodes.len() >= self.limits.max_nodes {
            anyhow::bail!(
                "cannot create {}: node limit {} reached",
                kind.type_name(),
                self.limits.max_nodes
            );
        }
        let id = self.nodes.len();
        log::trace!("pipeline: create {} as node#{}", kind.type_name(), id);
        self.nodes.push(Node { id, kind });
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Connects a stage output to a stage input. An output may fan out to
    /// several inputs; an input accepts a single producer.
    pub fn link(&mut self, out: Output, input: Input) -> anyhow::Result<()> {
        let producer = self
            .node(out.node)
            .ok_or(anyhow::anyhow!("link source {} does not exist", out))?;
        if !producer.kind.outputs().contains(&out.name) {
            anyhow::bail!("{} has no output named {}", producer.kind.type_name(), out.name);
        }
        let consumer = self
            .node(input.node)
            .ok_or(anyhow::anyhow!("link target {} does not exist", input))?;
        if !consumer.kind.inputs().contains(&input.name) {
            anyhow::bail!("{} has no input named {}", consumer.kind.type_name(), input.name);
        }
        if self.links.iter().any(|l| l.input == input) {
            anyhow::bail!("input {} is already linked", input);
        }
        self.links.push(Link { out, input });
        Ok(())
    }

    pub fn is_output_linked(&self, node: NodeId) -> bool {
        self.links.iter().any(|l| l.out.node == node)
    }

    pub fn is_input_linked(&self, node: NodeId) -> bool {
        self.links.iter().any(|l| l.input.node == node)
    }

    pub fn downstream<'a>(&'a self, out: &'a Output) -> impl Iterator<Item = &'a Input> + 'a {
        self.links
            .iter()
            .filter(move |l| &l.out == out)
            .map(|l| &l.input)
    }

    pub fn upstream(&self, input: &Input) -> Option<&Output> {
        self.links.iter().find(|l| &l.input == input).map(|l| &l.out)
    }

    pub fn find_stream(&self, stream_name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| match &n.kind {
            NodeKind::XLinkOut(p) => p.stream_name == stream_name,
            NodeKind::XLinkIn(p) => p.stream_name == stream_name,
            _ => false,
        })
    }

    pub fn xlink_out_streams(&self) -> Vec<&XLinkOutProperties> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::XLinkOut(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Follows the links from a stage output down to host streams, passing
    /// through at most one encoder.
    pub fn routes_from(&self, out: &Output) -> Vec<Route> {
        let mut routes = Vec::new();
        for input in self.downstream(out) {
            let Some(node) = self.node(input.node) else {
                continue;
            };
            match &node.kind {
                NodeKind::XLinkOut(p) => routes.push(Route {
                    stream_name: p.stream_name.clone(),
                    encoder: None,
                }),
                NodeKind::VideoEncoder(enc) => {
                    let bitstream = Output::new(node.id, BITSTREAM);
                    for next in self.downstream(&bitstream) {
                        if let Some(NodeKind::XLinkOut(p)) = self.node(next.node).map(|n| &n.kind) {
                            routes.push(Route {
                                stream_name: p.stream_name.clone(),
                                encoder: Some(enc.clone()),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        routes
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
