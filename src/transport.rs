//! In-process topic transport.
//!
//! Every topic is a `tokio::sync::broadcast` channel. A publisher has
//! subscribers while at least one receiver is alive, so the per-frame
//! subscriber check is a single atomic load inside `receiver_count`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::broadcast;

use crate::msg::{CalibrationInfo, ImageMessage, VideoPacket};

const TOPIC_CAPACITY: usize = 16;

pub struct Publisher<T> {
    topic: Arc<str>,
    sender: broadcast::Sender<T>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            topic: Arc::clone(&self.topic),
            sender: self.sender.clone(),
        }
    }
}

impl<T: Clone> Publisher<T> {
    pub fn new(topic: &str) -> Self {
        let (sender, _) = broadcast::channel(TOPIC_CAPACITY);
        Self {
            topic: Arc::from(topic),
            sender,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the message.
    pub fn publish(&self, msg: T) -> usize {
        self.sender.send(msg).unwrap_or(0)
    }
}

/// Image and camera info published together in one call.
#[derive(Clone)]
pub struct CameraPublisher {
    image: Publisher<ImageMessage>,
    info: Publisher<Arc<CalibrationInfo>>,
}

impl CameraPublisher {
    pub fn new(image: Publisher<ImageMessage>, info: Publisher<Arc<CalibrationInfo>>) -> Self {
        Self { image, info }
    }

    pub fn image_topic(&self) -> &str {
        self.image.topic()
    }

    pub fn info_topic(&self) -> &str {
        self.info.topic()
    }

    pub fn has_subscribers(&self) -> bool {
        self.image.has_subscribers() || self.info.has_subscribers()
    }

    pub fn publish(&self, image: ImageMessage, info: Arc<CalibrationInfo>) {
        self.image.publish(image);
        self.info.publish(info);
    }
}

#[derive(Default)]
struct Topics {
    images: HashMap<String, Publisher<ImageMessage>>,
    infos: HashMap<String, Publisher<Arc<CalibrationInfo>>>,
    videos: HashMap<String, Publisher<VideoPacket>>,
}

fn get_or_create<T: Clone>(map: &mut HashMap<String, Publisher<T>>, topic: &str) -> Publisher<T> {
    map.entry(topic.to_string())
        .or_insert_with(|| Publisher::new(topic))
        .clone()
}

/// Topic registry of one process. Subscribing to a topic before anyone
/// advertises it is allowed.
pub struct Transport {
    node_name: String,
    intra_process: bool,
    topics: Mutex<Topics>,
}

impl Transport {
    pub fn new(node_name: &str, intra_process: bool) -> Self {
        Self {
            node_name: node_name.to_string(),
            intra_process,
            topics: Mutex::new(Topics::default()),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Nodes composed into one process exchange image and info through a
    /// single camera publisher.
    pub fn intra_process_enabled(&self) -> bool {
        self.intra_process
    }

    /// `<node>/<name>`
    pub fn base_topic(&self, name: &str) -> String {
        format!("{}/{}", self.node_name, name)
    }

    /// `<node>/<name>/<suffix>`
    pub fn topic_name(&self, name: &str, suffix: &str) -> String {
        format!("{}/{}", self.base_topic(name), suffix)
    }

    fn topics(&self) -> std::sync::MutexGuard<'_, Topics> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn image_publisher(&self, topic: &str) -> Publisher<ImageMessage> {
        get_or_create(&mut self.topics().images, topic)
    }

    pub fn info_publisher(&self, topic: &str) -> Publisher<Arc<CalibrationInfo>> {
        get_or_create(&mut self.topics().infos, topic)
    }

    pub fn video_publisher(&self, topic: &str) -> Publisher<VideoPacket> {
        get_or_create(&mut self.topics().videos, topic)
    }

    /// Publisher pair on `<base>/image_raw` and `<base>/camera_info`.
    pub fn camera_publisher(&self, base: &str) -> CameraPublisher {
        CameraPublisher::new(
            self.image_publisher(&format!("{}/image_raw", base)),
            self.info_publisher(&format!("{}/camera_info", base)),
        )
    }

    pub fn subscribe_image(&self, topic: &str) -> broadcast::Receiver<ImageMessage> {
        self.image_publisher(topic).subscribe()
    }

    pub fn subscribe_info(&self, topic: &str) -> broadcast::Receiver<Arc<CalibrationInfo>> {
        self.info_publisher(topic).subscribe()
    }

    pub fn subscribe_video(&self, topic: &str) -> broadcast::Receiver<VideoPacket> {
        self.video_publisher(topic).subscribe()
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;
