use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;

use decoy_core::{
    browser, load_decoy_config, AutomationError, BrowserTools, ConfigError, DecoyConfig,
    ProfileSelection,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("automation error: {0}")]
    Automation(#[from] AutomationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid image payload: {0}")]
    ImageDecode(#[from] base64::DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RotationMode {
    Random,
    RoundRobin,
}

impl From<RotationMode> for ProfileSelection {
    fn from(mode: RotationMode) -> Self {
        match mode {
            RotationMode::Random => ProfileSelection::Random,
            RotationMode::RoundRobin => ProfileSelection::RoundRobin,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Decoy command-line control interface", long_about = None)]
pub struct Cli {
    /// Path to decoy.toml; built-in defaults are used when absent
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Run the browser with a visible window
    #[arg(long)]
    pub headed: bool,
    /// Override the profile selection policy
    #[arg(long, value_enum)]
    pub rotation: Option<RotationMode>,
    /// Print session metrics as JSON after the command
    #[arg(long)]
    pub show_metrics: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a page and read it the way a person would
    Navigate { url: String },
    /// Navigate, then click the first element matching the selector
    Click { url: String, selector: String },
    /// Navigate, then type into the first element matching the selector
    Type {
        url: String,
        selector: String,
        text: String,
    },
    /// Navigate, then capture a PNG of the page or one element
    Screenshot {
        url: String,
        #[arg(long)]
        selector: Option<String>,
        /// Write the decoded PNG here instead of printing base64
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Navigate, then dump the accessibility tree as JSON
    Snapshot { url: String },
    /// Navigate, then run the idle interaction choreography once more
    Interact { url: String },
    /// List the fingerprint catalog
    Profiles,
}

pub fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(cli))
}

async fn execute(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => load_decoy_config(path)?,
        None => DecoyConfig::default(),
    };
    if cli.headed {
        config.chromium.headless = false;
    }
    if let Some(mode) = cli.rotation {
        config.session.profile_selection = mode.into();
    }

    let tools = BrowserTools::new(config);
    let outcome = dispatch(&tools, cli.command).await;
    let metrics = tools.metrics().await;
    tools.shutdown().await;

    println!("{}", outcome?);
    if cli.show_metrics {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    }
    Ok(())
}

async fn dispatch(tools: &BrowserTools, command: Command) -> Result<String> {
    match command {
        Command::Navigate { url } => Ok(tools.navigate(&url).await?),
        Command::Click { url, selector } => {
            tools.navigate(&url).await?;
            Ok(tools.click(&selector).await?)
        }
        Command::Type {
            url,
            selector,
            text,
        } => {
            tools.navigate(&url).await?;
            Ok(tools.type_text(&selector, &text).await?)
        }
        Command::Screenshot {
            url,
            selector,
            output,
        } => {
            tools.navigate(&url).await?;
            let encoded = tools.screenshot(selector.as_deref()).await?;
            match output {
                Some(path) => {
                    let bytes = BASE64.decode(encoded.as_bytes())?;
                    std::fs::write(&path, bytes)?;
                    Ok(format!("wrote screenshot to {}", path.display()))
                }
                None => Ok(encoded),
            }
        }
        Command::Snapshot { url } => {
            tools.navigate(&url).await?;
            Ok(tools.snapshot().await?)
        }
        Command::Interact { url } => {
            tools.navigate(&url).await?;
            Ok(tools.interact().await?)
        }
        Command::Profiles => {
            let mut listing = String::new();
            for profile in browser::catalog() {
                listing.push_str(&format!(
                    "{:<22} {:>4}x{:<4} {:<6} {:<20} touch={}\n",
                    profile.name,
                    profile.viewport_width,
                    profile.viewport_height,
                    profile.locale,
                    profile.timezone,
                    profile.has_touch
                ));
            }
            Ok(listing.trim_end().to_string())
        }
    }
}
