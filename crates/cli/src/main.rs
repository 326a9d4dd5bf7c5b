use anyhow::Context;
use bookshelf_kernel::Settings;
use clap::{Parser, Subcommand};

/// Operate the bookshelf service
#[derive(Debug, Parser)]
#[command(name = "bookshelf-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations, then serve HTTP until shutdown
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Print the effective settings as JSON (secrets omitted)
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load bookshelf settings")?;

    match cli.command {
        Command::Config => {
            let rendered =
                serde_json::to_string_pretty(&settings).context("failed to render settings")?;
            println!("{rendered}");
            Ok(())
        }
        Command::Migrate => {
            bookshelf_telemetry::init(&settings)?;
            let runtime = runtime()?;
            let applied = runtime.block_on(bookshelf_app::migrate(&settings))?;
            tracing::info!(applied, "migrate finished");
            Ok(())
        }
        Command::Serve => {
            bookshelf_telemetry::init(&settings)?;
            runtime()?.block_on(bookshelf_app::run(settings))
        }
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}
