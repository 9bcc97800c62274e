//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Sandpit component playground CLI
#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about,
    long_about = None,
    arg_required_else_help = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    pub version: Option<bool>,

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: nearest sandpit.toml)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a starter project
    #[command(visible_alias = "i")]
    Init {
        /// Project directory (default: current directory)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },

    /// Build a project once
    #[command(visible_alias = "b")]
    Build {
        /// Project directory or `.json` snapshot
        #[arg(value_hint = clap::ValueHint::AnyPath)]
        project: Option<PathBuf>,

        /// Output directory (default: `build.out_dir`)
        #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
        output: Option<PathBuf>,
    },

    /// Rebuild on every change until Ctrl+C
    #[command(visible_alias = "w")]
    Watch {
        /// Project directory
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },

    /// Save a project directory as a JSON snapshot
    Pack {
        /// Project directory
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,

        /// Snapshot file (default: stdout)
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Write a JSON snapshot out as a project directory
    Unpack {
        /// Snapshot file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Target directory (default: current directory)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },
}
