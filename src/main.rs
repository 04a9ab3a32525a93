use clap::Parser;
use magi::cli::{commands, Cli, Commands};
use magi::types::config::Config;
use magi::MagiResult;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> MagiResult<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let (mut config, load_error) = match Config::locate(&cli.config) {
        Some(path) => match Config::load(&path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default_config(), Some((path, e))),
        },
        None => (Config::default_config(), None),
    };
    config.apply_env_overrides();

    // CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("magi={}", log_level)
            .parse()
            .unwrap_or_else(|_| "magi=info".parse().expect("fallback directive is valid")),
    );

    let json = config.general.log_format == "json";
    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .init();

    if let Some((path, e)) = load_error {
        tracing::warn!(path = %path.display(), error = %e, "Failed to load configuration, using defaults");
    }
    tracing::debug!("Configuration path: {}", cli.config.display());

    match cli.command {
        Commands::Init { path } => commands::init(path).await?,
        Commands::Serve => commands::serve(&config).await?,
        Commands::Status { ping, providers } => commands::status(&config, ping, &providers).await?,
        Commands::Consensus(args) => commands::consensus(&args, &config).await?,
        Commands::Compare(args) => commands::compare(&args, &config).await?,
        Commands::Config => commands::config_cmd(&cli.config).await?,
        Commands::Doctor => commands::doctor(&config).await?,
        Commands::Version => commands::version(),
    }

    Ok(())
}
