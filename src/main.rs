use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use prayertimes::app::App;
use prayertimes::cli::{parse_args, print_help};
use prayertimes::config::Config;
use prayertimes::redact;

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    if args.help {
        print_help();
        return Ok(());
    }

    // Logs go to stderr so the board on stdout stays readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("prayertimes=info".parse()?),
        )
        .init();

    info!("prayertimes v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");
    match config.coordinates() {
        Some(coords) => info!("  Location: {}", redact::coordinates(&coords)),
        None => info!("  Location: IP geolocation via {}", redact::url(&config.geolocation_url)),
    }
    info!("  Provider: {} (method {})", redact::url(&config.api_url), config.method);
    info!("  Cache: {}", config.cache_dir.display());
    if let Some(zone) = &config.timezone {
        info!("  Timezone override: {}", zone);
    }

    // Handle --validate mode
    if args.validate {
        info!("Validating configuration...");
        match config.validate() {
            Ok(()) => {
                info!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate()?;

    let mut app = App::from_config(&config)?;

    if args.once {
        info!("Printing board once (--once mode)");
        println!("{}", app.run_once(args.refresh).await);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    app.run(args.refresh, cancel).await;

    Ok(())
}
