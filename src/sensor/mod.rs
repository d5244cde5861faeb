//! Mono sensor node: graph construction, queue dispatch and runtime control.
//!
//! Data Flow:
//! ```text
//!                        ┌─► [MJPEG encoder]? ─► <name>_mono ─► QueueDispatcher ─► image_raw + camera_info
//!                        │    (low-bandwidth)
//! MonoCamera (source) ───┤
//!        ▲               └─► [H.264 encoder] ──► <name>_h264 ─► QueueDispatcher ─► h264
//!        │                                        (depth 2, non-blocking)
//!        └──── <name>_control ◄── ControlChannel ◄── runtime parameter updates
//! ```
//!
//! 1. [`GraphBuilder`] turns a [`PipelineConfig`](crate::config::PipelineConfig)
//!    into stages and links; nothing runs yet.
//! 2. [`SensorNode::setup_queues`] opens one device queue per built output
//!    stream and registers a [`QueueDispatcher`] on each.
//! 3. With lazy publishing on, a frame whose sink has no subscriber is
//!    dropped before conversion.

pub mod calibration;
pub mod control;
pub mod converter;
pub mod dispatch;
pub mod encoder;
pub mod graph;
pub mod node;

pub use control::ControlChannel;
pub use converter::{DecodeMode, FrameConverter, ImageConverter};
pub use dispatch::{DispatchStats, FrameHandler, PublishMode, QueueDispatcher};
pub use encoder::EncoderStage;
pub use graph::{GraphBuilder, GraphHandles};
pub use node::{LinkType, NodeState, SensorNode};
