use std::path::PathBuf;

use clap::Parser;
use kara_config::{KaraConfig, LogLevel};

/// Kara: desktop windows driven from a controlling process over a local
/// WebSocket hub.
#[derive(Parser, Debug)]
#[command(name = "kara", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<LogLevel>,

    /// Start the renderer in debug mode.
    #[arg(long)]
    pub debug: bool,

    /// Page to load once the window is ready.
    #[arg(long)]
    pub url: Option<String>,

    /// Renderer program override.
    #[arg(long)]
    pub renderer: Option<String>,
}

impl Args {
    /// Fold command-line overrides into the loaded config.
    pub fn apply(&self, config: &mut KaraConfig) {
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.debug {
            config.renderer.debug = true;
        }
        if let Some(program) = &self.renderer {
            config.renderer.program = program.clone();
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
