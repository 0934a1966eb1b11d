//! Dental dashboard
//!
//! Composes configuration, transport and notification sink into a
//! `Dashboard`, loads it once and prints the rendered page. With `--watch`
//! the page is printed again after every periodic refresh.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dental_core::{
    ApiClient, Config, Dashboard, DentalApi, Page, ReqwestTransport, TracingSink,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dental-dashboard", about = "Dental clinic dashboard client")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, default_value = "dental.toml")]
    config: PathBuf,

    /// Run a full resynchronization after the initial load
    #[arg(long)]
    sync: bool,

    /// Keep running, refreshing on the configured interval
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load_or_default(Some(&args.config))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("dental_core={}", config.logging.level)),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        base_url = %config.api.base_url,
        timeout_ms = config.api.timeout_ms,
        api_key = config.api.api_key.is_some(),
        "dental dashboard v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = ApiClient::new(
        config.api.clone(),
        Arc::new(ReqwestTransport::new()),
        Arc::new(TracingSink),
    );
    let dashboard = Arc::new(
        Dashboard::new(
            DentalApi::new(client),
            Arc::new(Page::new()),
            config.dashboard.clone(),
        )
        .with_default_bindings(),
    );

    dashboard.startup().await;
    if args.sync {
        dashboard.sync().await;
    }

    print_page(&dashboard).await;

    if args.watch {
        let Some(mut refresh) = dashboard.spawn_periodic_refresh() else {
            tracing::warn!("--watch ignored: refresh_interval_secs is 0");
            return Ok(());
        };
        loop {
            tokio::select! {
                changed = refresh.ticks.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let tick = *refresh.ticks.borrow_and_update();
                    tracing::debug!(tick, "periodic refresh finished");
                    print_page(&dashboard).await;
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    break;
                }
            }
        }
        refresh.handle.abort();
        tracing::info!("shutting down");
    }

    Ok(())
}

async fn print_page(dashboard: &Dashboard) {
    for (id, fragment) in dashboard.page().snapshot().await {
        println!("#{id}\n{fragment}\n");
    }
}
