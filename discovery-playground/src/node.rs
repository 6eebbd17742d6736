use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use discovery_core::config::settings::Settings;
use discovery_core::discoverer::ClusterDiscoverer;
use discovery_core::ext::init_logger_with_filter;
use discovery_core::identity::static_identity::StaticIdentity;
use discovery_core::inventory::static_inventory::StaticInventory;
use discovery_core::listener::ClusterListener;
use discovery_core::member::{Address, MemberId};

#[derive(Parser, Debug)]
struct Args {
    /// Settings file layered over the built-in reference settings.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Inventory file listing groups and instance addresses.
    #[arg(short, long)]
    inventory: PathBuf,
    /// Skip the instance metadata lookup and use this id.
    #[arg(long)]
    self_id: Option<String>,
    /// Refresh period in milliseconds, overrides `refresh-interval`.
    #[arg(long)]
    sleep: Option<u64>,
}

struct PrintListener;

impl ClusterListener for PrintListener {
    fn peer_discovered(&self, id: &MemberId, address: &Address) -> anyhow::Result<()> {
        println!("peerDiscovered({},{})", id, address);
        Ok(())
    }

    fn peer_gone(&self, id: &MemberId, address: &Address) -> anyhow::Result<()> {
        println!("peerGone({},{})", id, address);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger_with_filter("discovery_core=info,node=info");
    let settings = Settings::load(args.config.as_deref())?;
    let inventory = StaticInventory::from_file(&args.inventory, settings.page_size)?;
    let discoverer = match &args.self_id {
        Some(id) => ClusterDiscoverer::new(&StaticIdentity::new(id.as_str()), inventory, PrintListener).await?,
        None => ClusterDiscoverer::bootstrap(&settings, inventory, PrintListener).await?,
    };
    info!(
        "{} is a member of {} in region {}",
        discoverer.self_id(),
        discoverer.group_name(),
        discoverer.region().unwrap_or("unknown"),
    );
    let interval = args.sleep
        .map(Duration::from_millis)
        .filter(|interval| !interval.is_zero())
        .or(settings.refresh_interval());
    let Some(interval) = interval else {
        return Ok(());
    };
    let discoverer = Arc::new(discoverer);
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(error) = discoverer.refresh().await {
            error!("refresh {} failed: {}, retry on next tick", discoverer.group_name(), error);
        }
    }
}
