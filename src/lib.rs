pub mod catalog;
pub mod config;
pub mod error;
pub mod msg;
pub mod params;
pub mod sensor;
pub mod transport;

pub use error::{DecodeError, NodeError, NodeResult};
pub use sensor::SensorNode;
