use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "drape")]
#[command(about = "Drape CLI: WhatsApp virtual try-on gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration file and the static/media directories.
    Init {
        /// Config file path (default: DRAPE_CONFIG_PATH or ~/.drape/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the gateway (Twilio webhook on POST /, results on GET /static/<file>).
    /// Needs TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN; result links use DRAPE_PUBLIC_URL or NGROK_URL.
    Gateway {
        /// Config file path (default: DRAPE_CONFIG_PATH or ~/.drape/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 5000)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("drape {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(drape::config::default_config_path);
    let dir = drape::init::init_config_dir(&path)?;
    let (config, _) = drape::config::load_config(Some(path))?;
    drape::init::init_storage(&config)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = drape::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    drape::gateway::run_gateway(config, path).await
}
