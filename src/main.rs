use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use googleads_extractor::cli;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Google Ads Extractor: --{gadx}-> pulls Google Ads report streams into NDJSON files
#[derive(Parser)]
#[command(name = "gadx", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the OAuth refresh-token exchange
    Auth {
        /// Config file with credentials
        #[arg(short, long, default_value = "config.json")]
        config: String,
    },

    /// List the report streams active for a config
    Streams {
        /// Config file to evaluate
        #[arg(short, long, default_value = "config.json")]
        config: String,
    },

    /// Extract all active streams from the Google Ads API
    Sync {
        /// Config file with credentials and the report window
        #[arg(short, long, default_value = "config.json")]
        config: String,

        /// Directory to write one NDJSON file per stream
        #[arg(short, long, default_value = "output")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::from_filename(&cli.env).ok();

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match cli.command {
        Commands::Auth { config } => {
            log::info!("Testing authorization");
            let config = cli::load_config(&config)?;
            cli::check_auth(config).await?;
        }
        Commands::Streams { config } => {
            let config = cli::load_config(&config)?;
            cli::list_streams(&config);
        }
        Commands::Sync { config, output } => {
            let config = cli::load_config(&config)?;
            cli::run_sync(config, &output).await?;
        }
    }

    Ok(())
}
