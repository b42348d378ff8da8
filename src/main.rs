use anyhow::{Context, Result};
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::info;

use video_quiz_api::api::ApiServer;
use video_quiz_api::{Config, QuizPipeline, Store};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Video Quiz API")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate multiple-choice quizzes from video transcripts")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML configuration file")
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to listen on (overrides configuration)")
                .value_parser(clap::value_parser!(u16))
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");

    // Initialize logging; RUST_LOG wins over the defaults
    let default_filter = if verbose {
        "video_quiz_api=debug,tower_http=debug,info"
    } else {
        "video_quiz_api=info,tower_http=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    // Load configuration
    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = Config::load(config_path.as_deref())?;
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }
    config.validate()?;

    info!("🚀 Video Quiz API starting...");
    info!("{}", config.summary());

    let store = Store::open(&config.database.path)
        .with_context(|| format!("failed to open database {}", config.database.path.display()))?;
    let pipeline = QuizPipeline::from_config(&config, store.clone())?;

    ApiServer::new(store, pipeline, config).start().await
}
