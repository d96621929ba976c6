use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use grblevel::init_logging;
use grblevel_comm::serial_adapter::SerialAdapter;
use grblevel_comm::spjs_adapter::SpjsAdapter;
use grblevel_orchestrator::Orchestrator;

/// Command-line arguments for the grblevel controller daemon.
#[derive(Parser, Debug)]
#[command(name = "grblevel", version, about = "Grbl streaming controller and mesh-levelling daemon")]
struct Args {
    /// Serial device path, e.g. /dev/ttyUSB0 or COM3. Mutually exclusive with `--spjs-url`.
    #[arg(long)]
    serial_port: Option<String>,

    /// Serial baud rate, used only with `--serial-port`.
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// SPJS bridge websocket URL, e.g. ws://localhost:8989/ws. Mutually exclusive with `--serial-port`.
    #[arg(long)]
    spjs_url: Option<String>,

    /// Serial port name as seen by the SPJS bridge, required with `--spjs-url`.
    #[arg(long)]
    spjs_port: Option<String>,

    /// Address the HTTP facade binds to.
    #[arg(long, default_value = "127.0.0.1:3923")]
    listen: SocketAddr,

    /// Directory bed-map JSON files are read from and written to.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let args = Args::parse();

    std::fs::create_dir_all(&args.data_dir)?;

    tracing::info!(version = grblevel::VERSION, built = grblevel::BUILD_DATE, "starting grblevel");

    match (args.serial_port.as_deref(), args.spjs_url.as_deref()) {
        (Some(path), None) => {
            let adapter = Arc::new(SerialAdapter::open(path, args.baud)?);
            serve(adapter, args.listen, args.data_dir).await
        }
        (None, Some(url)) => {
            let port = args
                .spjs_port
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("--spjs-port is required with --spjs-url"))?;
            let adapter = Arc::new(SpjsAdapter::connect(url, port).await?);
            serve(adapter, args.listen, args.data_dir).await
        }
        (Some(_), Some(_)) => anyhow::bail!("--serial-port and --spjs-url are mutually exclusive"),
        (None, None) => anyhow::bail!("one of --serial-port or --spjs-url is required"),
    }
}

async fn serve<A>(adapter: Arc<A>, listen: SocketAddr, data_dir: PathBuf) -> anyhow::Result<()>
where
    A: grblevel_comm::adapter::MachineAdapter + 'static,
{
    let orchestrator = Arc::new(Orchestrator::new(adapter));
    let app = grblevel_http::router(orchestrator, data_dir);

    tracing::info!(%listen, "http facade listening");
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
