use anyhow::Result;
use clap::Parser;

use companion::cli::{self, Cli, Commands};
use companion::config::Config;
use companion::logging::{self, LogTarget};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let config = Config::load_from(cli.config.as_deref())?;
    let user_id = cli::resolve_user(cli.user.as_deref(), &config);
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Chat(cli::chat::ChatArgs::default()));

    let target = if command.logs_to_file() {
        LogTarget::File
    } else {
        LogTarget::Stderr
    };
    logging::init(&config.logging, &config.paths.logs_dir(), cli.verbose, target)?;

    match command {
        Commands::Chat(args) => cli::chat::run(args, config, &user_id).await,
        Commands::Ask(args) => cli::ask::run(args, config, &user_id).await,
        Commands::Config(args) => cli::config::run(args, config).await,
        Commands::Memory(args) => cli::memory::run(args, config, &user_id).await,
        Commands::Profile(args) => cli::profile::run(args, config, &user_id).await,
        Commands::Paths => cli::paths::run(&user_id),
    }
}
