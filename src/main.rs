//! simplelb: health-aware load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                     SIMPLELB                         │
//!   Client (HTTP)    │  ┌──────────┐                                        │
//!   ─────────────────┼─▶│  plain   │──┐   ┌────────────────┐                 │
//!                    │  │ listener │  │   │   dispatcher   │   ┌──────────┐  │
//!   Client (HTTPS)   │  └──────────┘  ├──▶│ penalty → pick │──▶│ backend  │──┼──▶ Backend
//!   ─────────────────┼─▶┌──────────┐  │   │ → rate limit   │   │ forward  │  │     Server
//!                    │  │   TLS    │──┘   │ → forward      │   └──────────┘  │
//!                    │  │ listener │      └───────┬────────┘                 │
//!                    │  └──────────┘              │                          │
//!                    │           ┌────────────────┴───────────────┐          │
//!                    │           │ registry │ affinity │ limiter  │          │
//!                    │           └──────────▲─────────────────────┘          │
//!                    │                      │                                │
//!                    │              ┌───────┴────────┐                       │
//!                    │              │ health monitor │  (TCP probes)         │
//!                    │              └────────────────┘                       │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use simplelb::config::load_config;
use simplelb::lifecycle::{signals::shutdown_signal, startup::bind_frontends, Shutdown};
use simplelb::observability::{logging::init_logging, metrics};
use simplelb::Server;

#[derive(Parser)]
#[command(name = "simplelb")]
#[command(about = "Health-aware load balancer with sticky sessions and rate limiting", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "/etc/simplelb/config.toml")]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;

    if cli.check {
        println!(
            "configuration OK: {} backend(s), method {}",
            config.backends.len(),
            config.balancer.method
        );
        return Ok(());
    }

    init_logging(&config.observability.log_level);
    tracing::info!(
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        method = %config.balancer.method,
        rate_limit_period = config.rate_limit.period_secs,
        rate_limit_max_requests = config.rate_limit.max_requests,
        penalty_duration = config.rate_limit.penalty_secs,
        "simplelb v0.1.0 starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let frontends = bind_frontends(&config).await?;
    let grace = Duration::from_secs(config.lifecycle.shutdown_grace_secs);

    let shutdown = Shutdown::new();
    let server = Server::new(config);
    let tracker = server.tracker();

    let run = server.run(frontends.plain, frontends.tls, &shutdown);
    tokio::pin!(run);

    tokio::select! {
        _ = &mut run => {}
        _ = shutdown_signal() => {
            shutdown.trigger();
            run.await;
        }
    }

    tracing::info!(in_flight = tracker.active_count(), "Draining connections");
    if !tracker.wait_for_drain(grace).await {
        tracing::warn!(in_flight = tracker.active_count(), "Grace period elapsed, closing remaining connections");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
