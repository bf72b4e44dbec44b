mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{cmd_build, cmd_manifest, cmd_platforms};
use output::{OutputFormat, print_error};

/// autobuild - Cross-platform binary packaging
#[derive(Parser)]
#[command(name = "autobuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output (disables the CI heartbeat)
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a recipe for its platforms and write the manifest script
  Build {
    /// Path to the recipe
    #[arg(short, long, default_value = "build_tarballs.lua")]
    recipe: PathBuf,

    /// Only build these platform triplets (default: every platform in the recipe)
    platforms: Vec<String>,

    /// Directory for downloads, workspaces and products
    #[arg(long, default_value = "autobuild")]
    run_dir: PathBuf,

    /// Interval between CI heartbeat dots
    #[arg(long, value_parser = parse_heartbeat_interval)]
    heartbeat_interval: Option<Duration>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Rebuild the manifest script from an existing release without building
  Manifest {
    /// Path to the recipe
    #[arg(short, long, default_value = "build_tarballs.lua")]
    recipe: PathBuf,

    /// Directory the manifest script is written to (under products/)
    #[arg(long, default_value = "autobuild")]
    run_dir: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// List the platforms built by default
  Platforms {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn parse_heartbeat_interval(s: &str) -> Result<Duration, String> {
  let interval = humantime::parse_duration(s).map_err(|e| e.to_string())?;
  if interval.is_zero() {
    return Err("heartbeat interval must be greater than zero".to_string());
  }
  Ok(interval)
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build {
      recipe,
      platforms,
      run_dir,
      heartbeat_interval,
      output,
    } => cmd_build(&recipe, &platforms, &run_dir, heartbeat_interval, cli.verbose, output),
    Commands::Manifest {
      recipe,
      run_dir,
      output,
    } => cmd_manifest(&recipe, &run_dir, cli.verbose, output),
    Commands::Platforms { output } => cmd_platforms(output),
  };

  if let Err(e) = result {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}
