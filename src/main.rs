use clap::Parser;
use color_eyre::eyre::WrapErr;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use devctl::buffer::{LogBuffer, LogView};
use devctl::config::ViewConfig;
use devctl::network::DiscoveryConfig;
use devctl::protocol::Level;
use devctl::terminal::{LineEditorConsole, Terminal};
use devctl::{App, AppConfig, log_debug, logger};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "devctl: terminal console for the device controller.",
    long_about = "devctl discovers the device controller on the local network,\n\
    shows its live log stream and configures the devices it manages."
)]
struct Cli {
    /// UDP port the controller listens on for discovery broadcasts
    #[arg(short, long, value_name = "PORT", default_value_t = 5000)]
    port: u16,

    /// Local UDP port discovery broadcasts are sent from
    #[arg(long, value_name = "PORT", default_value_t = 9999)]
    bind_port: u16,

    /// Address discovery broadcasts are sent to
    #[arg(long, value_name = "IP_ADDRESS", default_value = "255.255.255.255")]
    broadcast: Ipv4Addr,

    /// How long to wait for a discovery reply before retrying
    #[arg(long, value_name = "MILLIS", default_value_t = 5000)]
    timeout_ms: u64,

    /// Keep retrying discovery and rediscover after a lost connection
    #[arg(short, long)]
    reconnect: bool,

    /// Directory holding logconf.properties and the history files
    #[arg(long, value_name = "DIR", default_value = ".")]
    state_dir: PathBuf,

    /// Return to the general prompt when the controller ends a dialog
    #[arg(long)]
    switch_on_release: bool,

    /// Threshold for the console's own diagnostics
    #[arg(short, long, value_name = "LEVEL", default_value = "warn")]
    verbosity: Level,

    /// Mirror diagnostics into a rotating log file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    logger::init_standalone(cli.verbosity);
    if let Some(path) = &cli.log_file {
        logger::enable_file(path)
            .wrap_err_with(|| format!("could not open log file {}", path.display()))?;
    }

    let console = Arc::new(
        LineEditorConsole::new(&cli.state_dir).wrap_err("could not initialise the terminal")?,
    );
    let terminal = Arc::new(Terminal::new(console.clone()));
    logger::set_console_mode(console);
    log_debug!("State directory {}", cli.state_dir.display());

    let view = Arc::new(LogView::new(
        LogBuffer::new(),
        ViewConfig::load_or_default(&cli.state_dir),
    ));
    let config = AppConfig {
        discovery: DiscoveryConfig {
            bind_port: cli.bind_port,
            broadcast: cli.broadcast,
            service_port: cli.port,
            timeout: Duration::from_millis(cli.timeout_ms),
        },
        reconnect: cli.reconnect,
        switch_on_release: cli.switch_on_release,
    };

    let code = App::new(terminal, view, config).run().await;
    logger::set_standalone_mode();
    std::process::exit(code);
}
