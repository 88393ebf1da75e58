use clap::Parser;
use tracing_subscriber::EnvFilter;

use labelkit::cli::{Cli, Command, run_exec_command};
use labelkit::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "labelkit=debug" } else { "labelkit=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let config = Config::from_env()?;

    let code = match cli.command {
        Command::Exec(args) => run_exec_command(args, &config).await?,
    };

    std::process::exit(code);
}
