//! term-settings
//!
//! Command-line front end for the layered terminal settings engine.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use term_settings::cli::{Cli, Command, DuplicateArgs, NewProfileArgs, ShowArgs};
use term_settings::config::{
    AppConfig, ConfigLoader, ConfigPaths,
    watcher::{WatchPaths, WatcherConfig, start_settings_watcher},
};
use term_settings::format::{
    OutputFormat, format_profile_markdown, format_warnings_markdown, render_snapshot,
};
use term_settings::logging::{LogTarget, init_logging};
use term_settings::pipeline::SettingsLoader;
use term_settings::snapshot::{SettingsHandle, Snapshot, SnapshotChange};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_explicit(ConfigPaths::discover(), path.clone())?,
        None => ConfigLoader::load()?,
    }
    .into_config();

    if let Some(settings) = &cli.settings {
        config.paths.settings_file = Some(settings.clone());
    }

    let settings_path = config.settings_path();
    let loader = SettingsLoader::from_config(&config);
    debug!(settings = %settings_path.display(), "loading settings");

    let handle = SettingsHandle::new(load(&loader, &settings_path));

    match cli.command.unwrap_or(Command::Show(ShowArgs::default())) {
        Command::Show(args) => show(&handle.load(), args, cli.format)?,
        Command::Validate => validate(&handle.load(), cli.format)?,
        Command::Save => {
            handle.load().write_to(&settings_path)?;
            println!("Saved {}", settings_path.display());
        }
        Command::NewProfile(NewProfileArgs { name }) => {
            let guid = handle.edit(|snapshot| snapshot.create_profile(name.as_deref()))?;
            save_edit(&handle, &settings_path, guid)?;
        }
        Command::Duplicate(DuplicateArgs { profile }) => {
            let guid = handle.edit(|snapshot| {
                let source = snapshot
                    .profile_for_args(Some(&profile), None)
                    .map(|record| record.guid())
                    .with_context(|| format!("no profile named {profile}"))?;
                Ok::<_, anyhow::Error>(snapshot.duplicate_profile(&source)?)
            })?;
            save_edit(&handle, &settings_path, guid)?;
        }
        Command::Watch => watch(&handle, &loader, &config, cli.format).await?,
    }

    Ok(())
}

/// Load the settings document with a change listener that logs edits.
fn load(loader: &SettingsLoader, path: &Path) -> Snapshot {
    let mut snapshot = loader.load_file(path);
    snapshot.set_change_listener(Arc::new(|change: &SnapshotChange| {
        info!(change = ?change, "settings changed");
    }));
    snapshot
}

fn show(snapshot: &Snapshot, args: ShowArgs, format: OutputFormat) -> Result<()> {
    let Some(reference) = args.profile else {
        println!("{}", render_snapshot(snapshot, format));
        return Ok(());
    };

    let Some(profile) = snapshot.profile_for_args(Some(&reference), None) else {
        bail!("no profile named {reference}");
    };
    match format {
        OutputFormat::Markdown => println!("{}", format_profile_markdown(snapshot, profile)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(profile.effective())?),
    }
    Ok(())
}

fn validate(snapshot: &Snapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Markdown => print!("{}", format_warnings_markdown(snapshot.warnings())),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(snapshot.warnings())?),
    }

    if let Some(message) = snapshot.deserialization_message() {
        bail!("settings could not be parsed:\n{message}");
    }
    if let Some(code) = snapshot.load_error() {
        bail!("settings could not be loaded: {code}");
    }
    Ok(())
}

fn save_edit(handle: &SettingsHandle, path: &Path, guid: uuid::Uuid) -> Result<()> {
    let snapshot = handle.load();
    snapshot.write_to(path)?;
    if let Some(profile) = snapshot.find_profile(&guid) {
        println!("Added {} {}", profile.name(), term_settings::model::guid::format_guid(&guid));
    }
    Ok(())
}

/// Reload and print whenever the settings document or a fragment changes.
async fn watch(
    handle: &SettingsHandle,
    loader: &SettingsLoader,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<()> {
    let settings_path = config.settings_path();
    let fragment_roots = if config.fragments.enabled {
        config.fragment_roots()
    } else {
        Vec::new()
    };
    let paths = WatchPaths {
        settings_file: settings_path.clone(),
        fragment_roots,
    };

    let mut watcher = start_settings_watcher(paths, WatcherConfig::default())?;
    info!("Watching {} for changes", settings_path.display());
    println!("{}", render_snapshot(&handle.load(), format));

    while let Some(event) = watcher.wait_for_change().await {
        if !event.requires_reload() {
            warn!("Settings watcher reported: {:?}", event);
            continue;
        }
        info!("Settings change detected: {:?}", event);
        handle.publish(load(loader, &settings_path));
        println!("{}", render_snapshot(&handle.load(), format));
    }

    info!("Settings watcher stopped");
    Ok(())
}
