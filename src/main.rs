//! Sandpit - build and live-reload `ix` component projects.

mod cli;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, build::project_root, init::InitMode};
use sandpit::config::SandpitConfig;
use sandpit::logger;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    match &cli.command {
        Commands::Init { dir } => {
            let (root, mode) = match dir {
                Some(dir) => (dir.clone(), InitMode::NewDir),
                None => (PathBuf::from("."), InitMode::CurrentDir),
            };
            cli::init::new_project(&root, mode)
        }
        Commands::Build { project, output } => {
            let project = project.clone().unwrap_or_else(|| PathBuf::from("."));
            let config = load_config(&cli, &project_root(&project))?;
            let color = diagnostics_color(&cli, &config);
            let ok = runtime()?.block_on(cli::build::run(
                &config,
                &project,
                output.as_deref(),
                color,
            ))?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Watch { dir } => {
            let dir = dir.clone().unwrap_or_else(|| PathBuf::from("."));
            let config = load_config(&cli, &dir)?;
            let color = diagnostics_color(&cli, &config);
            runtime()?.block_on(cli::watch::run(&config, &dir, color))
        }
        Commands::Pack { dir, output } => {
            let dir = dir.clone().unwrap_or_else(|| PathBuf::from("."));
            let config = load_config(&cli, &dir)?;
            cli::pack::pack(&dir, &config.out_dir(&dir), output.as_deref())
        }
        Commands::Unpack { file, dir } => {
            let dir = dir.clone().unwrap_or_else(|| PathBuf::from("."));
            cli::pack::unpack(file, &dir)
        }
    }
}

/// Load and validate the configuration for a project at `root`.
fn load_config(cli: &Cli, root: &Path) -> Result<SandpitConfig> {
    let config = SandpitConfig::load(cli.config.as_deref(), root)?;
    config.validate()?;
    Ok(config)
}

/// Whether formatted diagnostics carry ANSI colors.
fn diagnostics_color(cli: &Cli, config: &SandpitConfig) -> bool {
    config.build.color
        && match cli.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::io::stderr().is_terminal(),
        }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}
