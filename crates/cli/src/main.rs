use std::path::PathBuf;

use ck_core::config::loader::load_config;
use ck_core::config::models::AppConfig;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run shell commands remotely and watch their output live.
#[derive(Debug, Parser)]
#[command(name = "cockpit", version, about)]
struct Args {
    /// Configuration file. Missing files fall back to defaults.
    #[arg(short, long, default_value = "cockpit.toml")]
    config: PathBuf,

    /// Address to listen on, overriding `server.bind`.
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database file, overriding `database.path`.
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind.clone_from(bind);
        }
        if let Some(database) = &self.database {
            config.database.path.clone_from(database);
        }
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = load_config(&args.config).await?;
    args.apply(&mut config);

    if args.print_config {
        print!("{}", toml::to_string(&config)?);
        return Ok(());
    }

    info!(
        config = %args.config.display(),
        bind = %config.server.bind,
        database = %config.database.path.display(),
        "starting cockpit"
    );
    ck_server::run_server(config).await?;
    Ok(())
}
