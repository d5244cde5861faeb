use std::sync::Arc;

use device_bus::{
    device::Device,
    pipeline::{CameraBoardSocket, Pipeline},
    sim::{CameraTask, SimulatedCamera},
};
use futures::StreamExt;
use sensor_node::{
    SensorNode, catalog::SensorCatalog, params::MemoryParameterStore, transport::Transport,
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("sensor_node", log::LevelFilter::Debug)
        .filter_module("device_bus", log::LevelFilter::Debug)
        .init();
}

/// Logs a line per second of frames arriving on `topic`.
fn spawn_monitor(transport: &Transport, topic: &str, cancel: CancellationToken) {
    let mut frames = Box::pin(BroadcastStream::new(transport.subscribe_image(topic)).filter_map(
        |r| async move {
            match r {
                Ok(image) => Some(image),
                Err(e) => {
                    log::warn!("monitor lagging: {}", e);
                    None
                }
            }
        },
    ));
    let topic = topic.to_string();
    tokio::spawn(async move {
        let mut count: u64 = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                image = frames.next() => {
                    let Some(image) = image else { break };
                    count += 1;
                    if count % 30 == 1 {
                        log::info!(
                            "{}: {}x{} {} ({} bytes, {} frames)",
                            topic,
                            image.width,
                            image.height,
                            image.encoding,
                            image.data.len(),
                            count
                        );
                    }
                }
            }
        }
    });
}

async fn run(cancel: CancellationToken) -> anyhow::Result<()> {
    let store = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("loading parameters from {}", path);
            MemoryParameterStore::from_json_file(&path)?
        }
        None => MemoryParameterStore::new(),
    };
    let store = Arc::new(store);
    let catalog = SensorCatalog::builtin();
    let sensor = catalog
        .sensor("OV9282")
        .ok_or(anyhow::anyhow!("sensor OV9282 missing from the catalog"))?;

    let mut pipeline = Pipeline::new();
    let mut node = SensorNode::new(
        &mut pipeline,
        "left",
        sensor,
        CameraBoardSocket::CamB,
        store,
        catalog,
        true,
    )?;
    let device = Arc::new(Device::new("sim-0", pipeline)?);
    let transport = Transport::new("oak", false);
    node.setup_queues(&device, &transport)?;

    spawn_monitor(
        &transport,
        &format!("{}/image_raw", transport.base_topic(node.name())),
        cancel.clone(),
    );

    let camera = SimulatedCamera::new(Arc::clone(&device), node.handles().camera)?;
    let task = CameraTask::new();
    task.start(camera).await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
            },
        }
    }

    task.stop();
    node.close_queues();
    device.close();
    log::info!("shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> ! {
    init_logging();
    let cancel = CancellationToken::new();
    if let Err(e) = run(cancel).await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
    std::process::exit(0);
}
