use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use device_bus::{
    message::Message,
    queue::{CallbackId, DataOutputQueue},
};

use crate::{
    error::{DecodeError, NodeError, NodeResult},
    msg::{CalibrationInfo, ImageMessage, VideoPacket},
    sensor::converter::FrameConverter,
    transport::{CameraPublisher, Publisher},
};

pub enum PublishMode {
    /// Image and camera info on two independent publishers.
    Split {
        image: Publisher<ImageMessage>,
        info: Publisher<Arc<CalibrationInfo>>,
    },
    /// One call delivers both.
    Combined { camera: CameraPublisher },
}

/// What a channel does with its frames. Chosen once when the channel is set
/// up.
pub enum FrameHandler {
    Camera {
        publish: PublishMode,
        info: Arc<CalibrationInfo>,
    },
    /// Dimensions are the configured ones; encoded frames do not report
    /// theirs.
    Video {
        sink: Publisher<VideoPacket>,
        width: u32,
        height: u32,
    },
}

impl FrameHandler {
    pub fn has_subscribers(&self) -> bool {
        match self {
            FrameHandler::Camera {
                publish: PublishMode::Split { image, info },
                ..
            } => image.has_subscribers() || info.has_subscribers(),
            FrameHandler::Camera {
                publish: PublishMode::Combined { camera },
                ..
            } => camera.has_subscribers(),
            FrameHandler::Video { sink, .. } => sink.has_subscribers(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FrameHandler::Camera {
                publish: PublishMode::Split { .. },
                ..
            } => "camera/split",
            FrameHandler::Camera {
                publish: PublishMode::Combined { .. },
                ..
            } => "camera/combined",
            FrameHandler::Video { .. } => "video",
        }
    }
}

#[derive(Debug, Default)]
pub struct DispatchStats {
    received: AtomicU64,
    skipped: AtomicU64,
    converted: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    // no subscriber, conversion skipped
    pub skipped: u64,
    pub converted: u64,
    pub published: u64,
    // decode failures
    pub dropped: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            converted: self.converted.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Per-frame work of one output channel: subscriber check, conversion,
/// publish. Runs on the thread that delivers the frame.
pub struct QueueDispatcher {
    stream: String,
    lazy: bool,
    converter: Arc<dyn FrameConverter>,
    handler: FrameHandler,
    stats: DispatchStats,
}

impl QueueDispatcher {
    pub fn new(
        stream: &str,
        lazy: bool,
        converter: Arc<dyn FrameConverter>,
        handler: FrameHandler,
    ) -> Self {
        Self {
            stream: stream.to_string(),
            lazy,
            converter,
            handler,
            stats: DispatchStats::default(),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn handler(&self) -> &FrameHandler {
        &self.handler
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn on_frame(&self, msg: &Message) {
        DispatchStats::inc(&self.stats.received);
        if self.lazy && !self.handler.has_subscribers() {
            DispatchStats::inc(&self.stats.skipped);
            return;
        }
        match self.dispatch(msg) {
            Ok(()) => DispatchStats::inc(&self.stats.published),
            Err(e) => {
                DispatchStats::inc(&self.stats.dropped);
                log::warn!(
                    "{}: dropping frame {}: {}",
                    self.stream,
                    msg.sequence().unwrap_or_default(),
                    e
                );
            }
        }
    }

    fn dispatch(&self, msg: &Message) -> Result<(), DecodeError> {
        match &self.handler {
            FrameHandler::Camera { publish, info } => {
                let image = self.converter.to_image(msg)?;
                DispatchStats::inc(&self.stats.converted);
                let info = Arc::new(info.stamped(&image.header));
                match publish {
                    PublishMode::Split {
                        image: image_pub,
                        info: info_pub,
                    } => {
                        image_pub.publish(image);
                        info_pub.publish(info);
                    }
                    PublishMode::Combined { camera } => camera.publish(image, info),
                }
            }
            FrameHandler::Video {
                sink,
                width,
                height,
            } => {
                let Message::EncodedFrame(frame) = msg else {
                    return Err(DecodeError::UnexpectedMessage(msg.kind_name()));
                };
                let packet = self.converter.to_video_packet(frame, *width, *height)?;
                DispatchStats::inc(&self.stats.converted);
                sink.publish(packet);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Active,
    Closed,
}

impl ChannelState {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelState::Idle => "idle",
            ChannelState::Active => "active",
            ChannelState::Closed => "closed",
        }
    }
}

/// One output stream of a node and the queue it is bound to.
pub struct DispatchChannel {
    dispatcher: Arc<QueueDispatcher>,
    state: ChannelState,
    queue: Option<Arc<DataOutputQueue>>,
    callback: Option<CallbackId>,
}

impl DispatchChannel {
    pub fn new(dispatcher: QueueDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            state: ChannelState::Idle,
            queue: None,
            callback: None,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn stream(&self) -> &str {
        self.dispatcher.stream()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.dispatcher.stats()
    }

    pub fn callback_id(&self) -> Option<CallbackId> {
        self.callback
    }

    /// Registers the dispatcher on `queue`. The queue keeps the dispatcher
    /// alive until it is closed.
    pub fn activate(&mut self, queue: Arc<DataOutputQueue>) -> NodeResult<()> {
        if self.state != ChannelState::Idle {
            return Err(NodeError::Lifecycle {
                node: self.stream().to_string(),
                expected: ChannelState::Idle.name(),
                actual: self.state.name(),
            });
        }
        let dispatcher = Arc::clone(&self.dispatcher);
        let id = queue.add_callback(move |_, msg| dispatcher.on_frame(msg))?;
        log::debug!(
            "{}: dispatching to {} (lazy {})",
            self.stream(),
            self.dispatcher.handler().kind_name(),
            self.dispatcher.lazy
        );
        self.callback = Some(id);
        self.queue = Some(queue);
        self.state = ChannelState::Active;
        Ok(())
    }

    /// Closes the queue, waiting for a frame being dispatched. Safe to call
    /// in any state and more than once.
    pub fn close(&mut self) {
        if let Some(queue) = self.queue.take() {
            queue.close();
            self.callback = None;
            let stats = self.stats();
            log::debug!(
                "{}: closed after {} frames ({} skipped, {} published, {} dropped)",
                self.stream(),
                stats.received,
                stats.skipped,
                stats.published,
                stats.dropped
            );
        }
        self.state = ChannelState::Closed;
    }
}

impl Drop for DispatchChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
pub(crate) mod dispatch_test;
