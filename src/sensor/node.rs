use std::sync::Arc;

use device_bus::{
    device::Device,
    message::ExposureOffset,
    pipeline::{CameraBoardSocket, Input, Pipeline},
    queue::DataOutputQueue,
};

use crate::{
    catalog::{SensorCatalog, SensorIdentity},
    config::{PipelineConfig, declare_params},
    error::{NodeError, NodeResult},
    msg::CalibrationInfo,
    params::{Parameter, ParameterStore},
    sensor::{
        calibration::load_camera_info,
        control::ControlChannel,
        converter::{ConverterOptions, DecodeMode, FrameConverter, ImageConverter},
        dispatch::{DispatchChannel, FrameHandler, PublishMode, QueueDispatcher, StatsSnapshot},
        graph::{GraphBuilder, GraphHandles},
    },
    transport::Transport,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Constructed,
    QueuesOpen,
    Closed,
}

impl NodeState {
    pub fn name(&self) -> &'static str {
        match self {
            NodeState::Constructed => "constructed",
            NodeState::QueuesOpen => "queues open",
            NodeState::Closed => "closed",
        }
    }
}

/// Topology selector of a downstream consumer. Every variant is fed from
/// the un-encoded camera output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkType {
    Video,
    Isp,
    Preview,
}

/// One mono camera of the device, from graph construction to teardown.
pub struct SensorNode {
    name: String,
    sensor: SensorIdentity,
    catalog: &'static SensorCatalog,
    store: Arc<dyn ParameterStore>,
    config: PipelineConfig,
    handles: GraphHandles,
    state: NodeState,
    channels: Vec<DispatchChannel>,
    control: Option<ControlChannel>,
    calibration: Option<Arc<CalibrationInfo>>,
}

impl SensorNode {
    /// Declares the node's parameters, snapshots them and adds the node's
    /// stages to `pipeline`.
    pub fn new(
        pipeline: &mut Pipeline,
        name: &str,
        sensor: &SensorIdentity,
        socket: CameraBoardSocket,
        store: Arc<dyn ParameterStore>,
        catalog: &'static SensorCatalog,
        publish: bool,
    ) -> NodeResult<Self> {
        log::info!("creating node {} ({} on {:?})", name, sensor.name, socket);
        declare_params(store.as_ref(), catalog, name, socket, sensor, publish);
        let config = PipelineConfig::load(store.as_ref(), name)?;
        let handles = GraphBuilder::new(catalog).build(pipeline, name, sensor, &config)?;
        Ok(Self {
            name: name.to_string(),
            sensor: sensor.clone(),
            catalog,
            store,
            config,
            handles,
            state: NodeState::Constructed,
            channels: Vec::new(),
            control: None,
            calibration: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sensor(&self) -> &SensorIdentity {
        &self.sensor
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn handles(&self) -> &GraphHandles {
        &self.handles
    }

    pub fn calibration(&self) -> Option<Arc<CalibrationInfo>> {
        self.calibration.clone()
    }

    pub fn stats(&self, stream: &str) -> Option<StatsSnapshot> {
        self.channels
            .iter()
            .find(|c| c.stream() == stream)
            .map(|c| c.stats())
    }

    /// `<node>_<socket>_camera_optical_frame`
    pub fn frame_id(&self, transport: &Transport) -> String {
        format!(
            "{}_{}_camera_optical_frame",
            transport.node_name(),
            self.catalog.socket_name(self.config.board_socket)
        )
    }

    fn converter_options(&self, mode: DecodeMode) -> ConverterOptions {
        let exposure_offset = if self.config.add_exposure_offset {
            ExposureOffset::from_id(self.config.exposure_offset)
        } else {
            None
        };
        ConverterOptions {
            mode,
            device_timestamp: self.config.device_timestamp,
            update_base_time_on_msg: self.config.update_base_time_on_msg,
            exposure_offset,
            reverse_stereo_socket_order: self.config.reverse_stereo_socket_order,
        }
    }

    /// Opens the device queues of the built streams with the default
    /// converters.
    pub fn setup_queues(&mut self, device: &Device, transport: &Transport) -> NodeResult<()> {
        let frame_id = self.frame_id(transport);
        let size = DecodeMode::Bitstream {
            width: self.config.width,
            height: self.config.height,
        };
        let raw_mode = if self.config.low_bandwidth {
            size
        } else {
            DecodeMode::Raw
        };
        let raw = ImageConverter::new(&frame_id, device.clock(), self.converter_options(raw_mode));
        let video = ImageConverter::new(&frame_id, device.clock(), self.converter_options(size));
        self.setup_queues_with(device, transport, Arc::new(raw), Arc::new(video))
    }

    /// Like [`setup_queues`](Self::setup_queues) with caller-supplied
    /// converters for the raw and the secondary stream.
    pub fn setup_queues_with(
        &mut self,
        device: &Device,
        transport: &Transport,
        raw: Arc<dyn FrameConverter>,
        video: Arc<dyn FrameConverter>,
    ) -> NodeResult<()> {
        if self.state != NodeState::Constructed {
            return Err(NodeError::Lifecycle {
                node: self.name.clone(),
                expected: NodeState::Constructed.name(),
                actual: self.state.name(),
            });
        }
        if let Err(e) = self.open_queues(device, transport, raw, video) {
            log::error!("{}: queue setup failed: {}", self.name, e);
            self.close_queues();
            return Err(e);
        }
        self.state = NodeState::QueuesOpen;
        log::info!(
            "{}: queues open [{}]",
            self.name,
            self.handles.output_streams().join(", ")
        );
        Ok(())
    }

    fn resolve_calibration(
        &self,
        device: &Device,
        transport: &Transport,
        converter: &dyn FrameConverter,
    ) -> NodeResult<CalibrationInfo> {
        let frame_id = self.frame_id(transport);
        let mut info = if self.config.calibration_file.is_empty() {
            converter.calibration_info(
                device,
                self.config.board_socket,
                self.config.width,
                self.config.height,
            )?
        } else {
            load_camera_info(&self.config.calibration_file, &frame_id)?
        };
        info.header.frame_id = frame_id;
        Ok(info)
    }

    fn open_queues(
        &mut self,
        device: &Device,
        transport: &Transport,
        raw: Arc<dyn FrameConverter>,
        video: Arc<dyn FrameConverter>,
    ) -> NodeResult<()> {
        let base = transport.base_topic(&self.name);
        let lazy = self.config.lazy_publisher;

        if let Some(handle) = &self.handles.raw {
            let info = Arc::new(self.resolve_calibration(device, transport, raw.as_ref())?);
            self.calibration = Some(Arc::clone(&info));
            let publish = if transport.intra_process_enabled() {
                PublishMode::Combined {
                    camera: transport.camera_publisher(&base),
                }
            } else {
                PublishMode::Split {
                    image: transport.image_publisher(&format!("{}/image_raw", base)),
                    info: transport.info_publisher(&format!("{}/camera_info", base)),
                }
            };
            let dispatcher = QueueDispatcher::new(
                &handle.stream,
                lazy,
                raw,
                FrameHandler::Camera { publish, info },
            );
            let queue = device
                .get_output_queue(&handle.stream, self.config.max_queue_size, false)
                .map_err(NodeError::Resource)?;
            let stream = handle.stream.clone();
            self.activate(stream, queue, dispatcher)?;
        }

        if let Some(handle) = &self.handles.secondary {
            let dispatcher = QueueDispatcher::new(
                &handle.stream,
                lazy,
                video,
                FrameHandler::Video {
                    sink: transport.video_publisher(&format!("{}/h264", base)),
                    width: self.config.width,
                    height: self.config.height,
                },
            );
            let queue = device
                .get_output_queue(&handle.stream, self.config.max_queue_size, false)
                .map_err(NodeError::Resource)?;
            let stream = handle.stream.clone();
            self.activate(stream, queue, dispatcher)?;
        }

        let queue = device
            .get_input_queue(&self.handles.control.stream)
            .map_err(NodeError::Resource)?;
        self.control = Some(ControlChannel::new(
            &self.name,
            Arc::clone(&self.store),
            self.catalog,
            queue,
        ));
        Ok(())
    }

    fn activate(
        &mut self,
        stream: String,
        queue: Arc<DataOutputQueue>,
        dispatcher: QueueDispatcher,
    ) -> NodeResult<()> {
        let mut channel = DispatchChannel::new(dispatcher);
        if let Err(e) = channel.activate(Arc::clone(&queue)) {
            queue.close();
            return Err(e);
        }
        log::debug!("{}: stream {} active", self.name, stream);
        self.channels.push(channel);
        Ok(())
    }

    /// Closes every queue the node opened. Blocks while a frame of the
    /// queue being closed is dispatched. Safe in any state and more than
    /// once.
    pub fn close_queues(&mut self) {
        if self.state == NodeState::Closed {
            return;
        }
        for channel in self.channels.iter_mut() {
            channel.close();
        }
        if let Some(control) = self.control.take() {
            control.close();
        }
        if self.state == NodeState::QueuesOpen {
            log::info!("{}: queues closed", self.name);
        }
        self.state = NodeState::Closed;
    }

    /// Feeds the un-encoded camera output into a downstream stage.
    pub fn link(&self, pipeline: &mut Pipeline, input: Input, link_type: LinkType) -> NodeResult<()> {
        log::debug!("{}: linking {:?} output to {}", self.name, link_type, input);
        pipeline
            .link(self.handles.camera_output(), input)
            .map_err(NodeError::Resource)
    }

    /// Runtime parameter update; the only change accepted while running.
    pub fn update_params(&self, params: &[Parameter]) -> NodeResult<()> {
        match (&self.control, self.state) {
            (Some(control), NodeState::QueuesOpen) => control.apply_runtime_update(params),
            _ => Err(NodeError::Lifecycle {
                node: self.name.clone(),
                expected: NodeState::QueuesOpen.name(),
                actual: self.state.name(),
            }),
        }
    }
}

impl Drop for SensorNode {
    fn drop(&mut self) {
        self.close_queues();
    }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
