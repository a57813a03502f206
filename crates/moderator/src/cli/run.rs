//! The `moderator run` command: the long-running queue worker.

use std::sync::Arc;

use clap::Args;
use moderator_core::{Config, Moderator, RedisQueue};
use tokio::sync::watch;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the queue to consume
    #[arg(long)]
    pub queue: Option<String>,

    /// Override the channel results are published on
    #[arg(long)]
    pub channel: Option<String>,
}

/// Execute the run command.
pub async fn execute(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(queue) = args.queue {
        config.queue.queue_name = queue;
    }
    if let Some(channel) = args.channel {
        config.queue.results_channel = channel;
    }

    let redis = Arc::new(RedisQueue::connect(&config.queue).await?);
    let moderator = Moderator::new(config);
    if !moderator.processor().nsfw_loaded() {
        tracing::warn!("NSFW model not loaded: every photo will be rejected as nsfw_check_failed");
    }
    let worker = moderator.worker(redis.clone(), redis);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing current batch");
            let _ = shutdown_tx.send(true);
        }
    });

    let stats = worker.run(shutdown_rx).await;
    tracing::info!(
        batches = stats.batches,
        photos = stats.photos,
        failures = stats.failures,
        "Moderator exited cleanly"
    );
    Ok(())
}
