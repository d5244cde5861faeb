use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use crate::{
    calibration::CalibrationHandler,
    control::SensorControlState,
    message::Message,
    pipeline::{CameraBoardSocket, INPUT_CONTROL, NodeKind, OUT, Output, Pipeline},
    queue::{DataInputQueue, DataOutputQueue, QueueError},
};

const INPUT_QUEUE_SIZE: usize = 8;

/// Steady clock shared by the device and the host; frame timestamps are
/// offsets from its origin.
#[derive(Clone, Copy, Debug)]
pub struct DeviceClock {
    origin: Instant,
}

impl DeviceClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Default for DeviceClock {
    fn default() -> Self {
        Self::new()
    }
}

type ControlMap = Arc<Mutex<HashMap<CameraBoardSocket, SensorControlState>>>;

/// A booted device running one pipeline. Host queues are opened by stream
/// name and must correspond to an XLinkOut / XLinkIn stage of the pipeline.
pub struct Device {
    id: String,
    pipeline: Pipeline,
    calibration: CalibrationHandler,
    clock: DeviceClock,
    output_queues: Mutex<HashMap<String, Arc<DataOutputQueue>>>,
    input_queues: Mutex<HashMap<String, Arc<DataInputQueue>>>,
    controls: ControlMap,
}

impl Device {
    pub fn new(id: &str, pipeline: Pipeline) -> anyhow::Result<Self> {
        Self::with_calibration(id, pipeline, CalibrationHandler::stereo_module())
    }

    pub fn with_calibration(
        id: &str,
        pipeline: Pipeline,
        calibration: CalibrationHandler,
    ) -> anyhow::Result<Self> {
        let mut controls = HashMap::new();
        for node in pipeline.nodes() {
            match &node.kind {
                NodeKind::XLinkOut(p) if !pipeline.is_input_linked(node.id) => {
                    anyhow::bail!("stream {} has no producer", p.stream_name);
                }
                NodeKind::XLinkIn(p) if !pipeline.is_output_linked(node.id) => {
                    anyhow::bail!("stream {} has no consumer", p.stream_name);
                }
                NodeKind::MonoCamera(p) => {
                    let mut state = SensorControlState {
                        frame_sync_mode: p.sync_mode,
                        ..Default::default()
                    };
                    if !p.initial_control.is_empty() {
                        state.apply(&p.initial_control);
                    }
                    controls.insert(p.board_socket, state);
                }
                _ => {}
            }
        }
        log::info!(
            "device {}: pipeline with {} nodes, {} links",
            id,
            pipeline.nodes().len(),
            pipeline.links().len()
        );
        Ok(Self {
            id: id.to_string(),
            pipeline,
            calibration,
            clock: DeviceClock::new(),
            output_queues: Mutex::new(HashMap::new()),
            input_queues: Mutex::new(HashMap::new()),
            controls: Arc::new(Mutex::new(controls)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn clock(&self) -> DeviceClock {
        self.clock
    }

    pub fn read_calibration(&self) -> &CalibrationHandler {
        &self.calibration
    }

    /// Opens (or returns the already open) host queue of an XLinkOut stream.
    pub fn get_output_queue(
        &self,
        name: &str,
        max_size: usize,
        blocking: bool,
    ) -> anyhow::Result<Arc<DataOutputQueue>> {
        match self.pipeline.find_stream(name).map(|n| &n.kind) {
            Some(NodeKind::XLinkOut(_)) => {}
            Some(_) => anyhow::bail!("stream {} is not an output stream", name),
            None => anyhow::bail!("stream {} does not exist in the pipeline", name),
        }
        let mut queues = self
            .output_queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = queues.get(name).filter(|q| !q.is_closed()) {
            return Ok(Arc::clone(queue));
        }
        let queue = Arc::new(DataOutputQueue::new(name, max_size, blocking));
        queues.insert(name.to_string(), Arc::clone(&queue));
        log::debug!(
            "device {}: opened output queue {} (size {}, blocking {})",
            self.id,
            name,
            max_size,
            blocking
        );
        Ok(queue)
    }

    /// Opens the host queue of an XLinkIn stream. Control messages sent on it
    /// are applied to the camera whose control input the stream feeds.
    pub fn get_input_queue(&self, name: &str) -> anyhow::Result<Arc<DataInputQueue>> {
        let node = self
            .pipeline
            .find_stream(name)
            .ok_or(anyhow::anyhow!("stream {} does not exist in the pipeline", name))?;
        if !matches!(node.kind, NodeKind::XLinkIn(_)) {
            anyhow::bail!("stream {} is not an input stream", name);
        }
        let mut queues = self
            .input_queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = queues.get(name).filter(|q| !q.is_closed()) {
            return Ok(Arc::clone(queue));
        }

        let out = Output::new(node.id, OUT);
        let target = self
            .pipeline
            .downstream(&out)
            .filter(|input| input.name == INPUT_CONTROL)
            .find_map(|input| match self.pipeline.node(input.node).map(|n| &n.kind) {
                Some(NodeKind::MonoCamera(p)) => Some(p.board_socket),
                _ => None,
            });

        let queue = Arc::new(DataInputQueue::new(name, INPUT_QUEUE_SIZE));
        if let Some(socket) = target {
            let controls = Arc::clone(&self.controls);
            let stream = name.to_string();
            queue.bind(Arc::new(move |msg: &Message| match msg {
                Message::CameraControl(ctrl) => {
                    let mut controls = controls.lock().unwrap_or_else(PoisonError::into_inner);
                    controls.entry(socket).or_default().apply(ctrl);
                }
                other => log::warn!("{}: ignoring {} on control input", stream, other.kind_name()),
            }));
        }
        queues.insert(name.to_string(), Arc::clone(&queue));
        log::debug!("device {}: opened input queue {}", self.id, name);
        Ok(queue)
    }

    pub fn control_state(&self, socket: CameraBoardSocket) -> Option<SensorControlState> {
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&socket)
            .cloned()
    }

    /// Device side: deliver a message to the host queue of a stream.
    pub fn emit(&self, stream: &str, msg: Message) -> Result<(), QueueError> {
        let queue = self
            .output_queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(stream)
            .cloned()
            .ok_or(QueueError::NotOpen(stream.to_string()))?;
        queue.push(msg)
    }

    pub fn opened_output_streams(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .output_queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, q)| !q.is_closed())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn opened_input_streams(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .input_queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, q)| !q.is_closed())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn close(&self) {
        let outputs: Vec<Arc<DataOutputQueue>> = self
            .output_queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for queue in outputs {
            queue.close();
        }
        let inputs: Vec<Arc<DataInputQueue>> = self
            .input_queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for queue in inputs {
            queue.close();
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "device_test.rs"]
mod device_test;
