use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use count_relay::aggregator::Aggregator;
use count_relay::args::Args;
use count_relay::ingest::{AllowList, IngestServer};
use count_relay::logging::{init_console_logging, init_dual_logging};
use count_relay::runtime::{
    RuntimeConfig, build_upstreams, load_and_log_config, spawn_shutdown_handler,
};

fn main() -> Result<()> {
    let args = Args::parse();

    if args.no_log_file {
        init_console_logging();
    } else {
        init_dual_logging();
    }

    let runtime = RuntimeConfig::from_args(args.threads).build_runtime()?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let (mut config, _source) = load_and_log_config(&args.config)?;
    args.apply_to(&mut config);
    config.validate()?;

    let upstreams = Arc::new(build_upstreams(&config)?);

    let allow = AllowList::new(config.ingest.allow.iter().cloned())?;
    let mut builder = Aggregator::builder().policy(config.aggregation.on_invalid_sample);
    if !allow.is_empty() {
        builder = builder.guard(move |user| allow.allows(user));
    }
    let aggregator = builder.build();

    let server = IngestServer::bind(&config.ingest.listen_addr(), aggregator.clone()).await?;
    let scheduler =
        aggregator.start_shared(config.aggregation.scheduler_config(), upstreams.clone());

    let shutdown_rx = spawn_shutdown_handler();
    let served = server.run(shutdown_rx).await;

    scheduler.shutdown().await;
    info!("Count relay shutdown complete");
    served
}
