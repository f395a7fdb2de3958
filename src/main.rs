use clap::Parser;

use trustlens::cli::{self, Cli, Command, ConfigCommand};
use trustlens::config::Config;
use trustlens::{logging, server};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command.unwrap_or(Command::Start) {
        Command::Start => {
            let config = Config::load(cli.config.as_deref())?;
            logging::init(&config.logging)?;
            server::run(config).await?;
        }
        Command::Config(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;
            cli::run_config_show(&config)?;
        }
        Command::Config(ConfigCommand::Path) => {
            cli::run_config_path(cli.config.as_deref());
        }
        Command::Version => cli::run_version(),
    }
    Ok(())
}
