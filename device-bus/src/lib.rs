#![allow(dead_code)]

//! Device-side runtime for an on-device processing pipeline: a stage graph
//! (cameras, encoders, host links), the bounded queues the host reads from
//! and writes to, factory calibration and the sensor control state.

pub mod calibration;
pub mod control;
pub mod device;
pub mod message;
pub mod pipeline;
pub mod queue;
pub mod sim;
