use device_bus::queue::QueueError;
use thiserror::Error;

/// Why a single frame could not be turned into a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame payload truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid {profile} bitstream: {reason}")]
    InvalidBitstream {
        profile: &'static str,
        reason: &'static str,
    },

    #[error("converter cannot handle {0} in this mode")]
    UnexpectedMessage(&'static str),
}

#[derive(Debug, Error)]
pub enum NodeError {
    /// Missing or invalid parameter. Fatal at build time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The pipeline or device refused to create a stage or queue.
    #[error("resource error: {0:#}")]
    Resource(#[source] anyhow::Error),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("channel error: {0}")]
    Channel(#[from] QueueError),

    #[error("node {node} is {actual}, operation requires {expected}")]
    Lifecycle {
        node: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl NodeError {
    pub fn config(msg: impl Into<String>) -> Self {
        NodeError::Configuration(msg.into())
    }

    pub fn is_channel_closed(&self) -> bool {
        matches!(self, NodeError::Channel(QueueError::Closed(_)))
    }
}

pub type NodeResult<T> = std::result::Result<T, NodeError>;
