use anyhow::Context;
use clap::{Parser, Subcommand};
use dayr_verify_lib::commands;
use dayr_verify_lib::services::matching::{resolve_font_path, GlyphRenderer};
use dayr_verify_lib::{init_tracing, AppConfig, ConfigManager, Verifier};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dayr-verify", version, about = "Screenshot-based Day R username verification")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a chat screenshot against a claimed username
    Verify {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        username: String,
        /// Phrase to look for instead of the configured keyword
        #[arg(long)]
        keyword: Option<String>,
        /// Save templates and the annotated search region here
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },
    /// Render a text template as PNG
    Render {
        #[arg(long)]
        text: String,
        #[arg(long)]
        size: u32,
        /// Use the username colour instead of the keyword colour
        #[arg(long)]
        username: bool,
        #[arg(long, short, default_value = "template.png")]
        output: PathBuf,
    },
    /// Report whether a username can be verified automatically
    CheckUsername { name: String },
    /// Print the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
        #[arg(long, requires = "init")]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    match cli.command {
        Command::Config { init, force } => {
            let report = if init {
                commands::config::init_config(&manager, force)?
            } else {
                commands::config::show_config(&manager)?
            };
            print_json(&report)?;
        }
        Command::Verify {
            image,
            username,
            keyword,
            dump_dir,
        } => {
            let mut config = load_config(&manager)?;
            if dump_dir.is_some() {
                config.debug.dump_dir = dump_dir;
            }
            let verifier = Verifier::from_config(&config).context("failed to prepare verifier")?;
            let report = commands::verify::verify_screenshot(&verifier, &image, &username, keyword.as_deref())?;
            print_json(&report)?;
            if !report.verified {
                std::process::exit(1);
            }
        }
        Command::Render {
            text,
            size,
            username,
            output,
        } => {
            let config = load_config(&manager)?;
            let settings = &config.verification;
            let font = resolve_font_path(settings.font_path.as_deref())?;
            let renderer = GlyphRenderer::from_file(&font, settings.downscale)?;
            let report = commands::render::render_template(&renderer, settings, &text, size, username, &output)?;
            print_json(&report)?;
        }
        Command::CheckUsername { name } => {
            let config = load_config(&manager)?;
            let verifier = Verifier::from_config(&config).context("failed to prepare verifier")?;
            let check = commands::verify::check_username(&verifier, &name);
            print_json(&check)?;
            if !check.supported {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Load the config file and start logging as it describes
fn load_config(manager: &ConfigManager) -> anyhow::Result<AppConfig> {
    let config = manager
        .load()
        .with_context(|| format!("failed to load {}", manager.config_file_path().display()))?;
    init_tracing(&config.logging);
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
