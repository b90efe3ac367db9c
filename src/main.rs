mod catalog;
mod census;
mod config;
mod events;
mod pipeline;
mod render;
mod resolver;

use std::{future::Future, io, time::Duration};

use anyhow::Result;
use clap::Parser;
use tokio::{
    sync::{mpsc, watch},
    time::timeout,
};
use tracing::{info, warn};

use crate::{
    census::{spawn_census_stream, CensusLookup},
    config::{Cli, TrackerConfig},
    events::EventFilter,
    pipeline::Pipeline,
    render::{EventRenderer, FeedWriter},
    resolver::IdentityResolver,
};

const TRANSPORT_CLOSE_GRACE: Duration = Duration::from_secs(2);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let (mut config, config_path) = TrackerConfig::load_or_create(cli.config.as_deref())?;
    config.apply_cli(&cli);
    let settings = config.validate()?;
    info!(
        config = %config_path.display(),
        zone_id = settings.zone_id,
        world_id = settings.world_id,
        vehicles = settings.vehicle_ids.len(),
        home_faction = settings.home_faction.and_then(catalog::faction_tag).unwrap_or("none"),
        "starting vehicle tracker"
    );

    let lookup = CensusLookup::new(
        &settings.census_endpoint,
        &settings.service_id,
        settings.lookup_timeout,
    )?;
    let pipeline = Pipeline::new(
        EventFilter::new(settings.filter_target()),
        IdentityResolver::new(lookup),
        EventRenderer::new(settings.home_faction),
    );

    let mut sink = FeedWriter::new(io::stdout(), settings.feed_style);
    if let Err(err) = sink.write_header(&settings.header()) {
        warn!(?err, "failed writing feed header");
    }

    let (tx, rx) = mpsc::channel(settings.queue_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stream = spawn_census_stream(settings.stream_config(), tx, shutdown_rx);

    tokio::select! {
        _ = pipeline.run(rx, &mut sink) => warn!("census stream ended"),
        _ = interrupted(tokio::signal::ctrl_c()) => {
            info!(
                cached_characters = pipeline.resolver().cached_len(),
                abandoned_lookups = pipeline.resolver().in_flight_len(),
                "interrupt received, shutting down"
            );
        }
    }

    let _ = shutdown_tx.send(true);
    if timeout(TRANSPORT_CLOSE_GRACE, stream).await.is_err() {
        warn!("census stream did not close in time");
    }
    Ok(())
}

// Without a working handler there is no interrupt to wait for; keep running.
async fn interrupted(signal: impl Future<Output = io::Result<()>>) {
    if let Err(err) = signal.await {
        warn!(?err, "failed listening for interrupt");
        std::future::pending::<()>().await;
    }
}
