// padrelay relay server
// Serves /ws/controller and /ws/game on one port and runs the broadcast actor

use clap::Parser;
use padrelay::{config, logging, network, relay};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "padrelay", version, about = "Phone-as-gamepad input relay")]
struct Cli {
    /// Config file (defaults to <config dir>/padrelay/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listener port
    #[arg(short, long)]
    port: Option<u16>,

    /// Listener address
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Directory with the controller/display web pages
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// WebSocket input only, never offer a WebRTC data channel
    #[arg(long)]
    no_rtc: bool,
}

impl Cli {
    fn apply(self, config: &mut config::Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(dir) = self.static_dir {
            config.server.static_dir = Some(dir);
        }
        if self.no_rtc {
            config.rtc.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref())?;
    cli.apply(&mut config);

    logging::init_stderr(&config.server.log_level);
    info!(
        "Broadcasting at {} Hz, WebRTC {}",
        config.relay.broadcast_hz,
        if config.rtc.enabled { "enabled" } else { "disabled" }
    );

    let listener = network::bind(&config.server).await?;
    let (relay, relay_task) = relay::spawn_relay(&config);

    let stopper = relay.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
        stopper.shutdown();
    };

    network::serve(listener, relay, &config.server, shutdown).await?;
    relay_task.await?;
    Ok(())
}
