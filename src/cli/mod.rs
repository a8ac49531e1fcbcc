//! CLI command definitions for term-settings
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Resolve, validate and edit layered terminal settings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the settings document (overrides config)
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved settings (default if no subcommand given)
    Show(ShowArgs),

    /// Load the settings and report warnings; fails on a fatal error
    Validate,

    /// Write the resolved user document back, keeping a backup
    Save,

    /// Add a new profile and save
    NewProfile(NewProfileArgs),

    /// Copy an existing profile and save
    Duplicate(DuplicateArgs),

    /// Reload and print whenever the settings or fragments change
    Watch,
}

#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Show one profile in detail, by braced key or name
    #[arg(short, long)]
    pub profile: Option<String>,
}

#[derive(Args, Debug)]
pub struct NewProfileArgs {
    /// Name of the new profile (default: "Profile N")
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct DuplicateArgs {
    /// Profile to copy, by braced key or name
    pub profile: String,
}
