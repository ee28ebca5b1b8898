use anyhow::Result;
use clap::{Parser, Subcommand};
use evr_cli::{BuildArgs, ExtractArgs, commands};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "evrtools",
    about = "Extract and build EVR manifest/package archives",
    version,
    long_about = "A command-line tool for extracting files from EVR package archives, building new archives from a directory tree, and repacking existing archives with modified files."
)]
struct Cli {
    /// Set the logging level
    #[arg(short = 'L', long, value_enum, global = true, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract files from a package
    Extract(ExtractArgs),

    /// Build a package from a directory tree, or repack an existing one
    Build(BuildArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Extract(args) => commands::extract::handle(args)?,
        Commands::Build(args) => commands::build::handle(args)?,
    }

    Ok(())
}
