use anyhow::{Context, Result};
use futures::{try_join, FutureExt, TryFutureExt};
use interval_publisher::{
    driver, loopback::LoopbackTransport, msg::Message, params::Params, queued::QueuedTransport,
    IntervalPublisher,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let params = Params::from_env()?;

    // local bus with one listener standing in for a remote subscriber
    let bus = LoopbackTransport::new();
    let echo_sub = bus.subscribe(&params.topic_name);
    let (transport, worker) =
        QueuedTransport::spawn(bus, params.queue_depth, params.request_timeout);

    let publisher = IntervalPublisher::with_message(
        transport,
        &params.topic_name,
        params.publish_interval,
        params.message.clone(),
    )
    .with_context(|| format!("Unable to start publisher on '{}'", params.topic_name))?;

    let echo_task = echo(echo_sub, params.topic_name.clone()).map(anyhow::Ok);
    let publish_task = async move {
        let publisher = driver::run(publisher, params.tick_period, driver::ctrl_c()).await;
        // closing the queue lets the worker and the echo listener finish
        drop(publisher);
        worker.await.map_err(anyhow::Error::from)?;
        anyhow::Ok(())
    }
    .map_err(|err| err.context("publisher stopped abnormally"));

    try_join!(publish_task, echo_task)?;

    Ok(())
}

async fn echo(sub: flume::Receiver<Message>, topic: String) {
    while let Ok(msg) = sub.recv_async().await {
        match msg {
            Message::String(msg) => info!("[{}] {}", topic, msg.data),
            other => info!("[{}] {:?}", topic, other),
        }
    }
}
