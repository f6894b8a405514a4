//! Resumable upload client for the storage cluster

mod config;
mod constants;
mod logger;
mod upload;

use anyhow::{Context, Result};
use clap::Parser;
use common::FileKind;
use config::ClientConfig;
use std::path::PathBuf;
use upload::UploadJob;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Upload a video or a model bundle to the storage cluster")]
struct Cli {
    /// Mode of operation (video/model)
    #[arg(long)]
    mode: FileKind,
    /// Path to video file
    #[arg(long)]
    video: Option<PathBuf>,
    /// Path to model file
    #[arg(long)]
    model: Option<PathBuf>,
    /// Path to model config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Path to model code file
    #[arg(long)]
    code: Option<PathBuf>,
    /// TOML settings file (retries, chunk size, masters)
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Retries after the first attempt
    #[arg(long)]
    max_retries: Option<u32>,
    /// Seconds to wait between attempts
    #[arg(long)]
    retry_wait: Option<u64>,
    /// Initial chunk size in bytes
    #[arg(long)]
    chunk_size: Option<u64>,
    /// Master addresses; replace the masters of the settings file
    masters: Vec<String>,
}

impl Cli {
    /// Required paths for the selected mode
    fn job(&self) -> Result<UploadJob> {
        fn required(path: &Option<PathBuf>, flag: &str) -> Result<PathBuf> {
            path.clone()
                .with_context(|| format!("{} flag wasn't provided", flag))
        }

        match self.mode {
            FileKind::Video => Ok(UploadJob::Video(required(&self.video, "video")?)),
            FileKind::Model => Ok(UploadJob::Model {
                model: required(&self.model, "model")?,
                config: required(&self.config, "config")?,
                code: required(&self.code, "code")?,
            }),
        }
    }

    /// Defaults, then settings file, then environment, then flags
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.settings {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };
        config.apply_env()?;

        if !self.masters.is_empty() {
            config.masters = self.masters.clone();
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(retry_wait) = self.retry_wait {
            config.retry_wait_secs = retry_wait;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    logger::init();

    let cli = Cli::parse();
    let job = cli.job()?;
    let config = cli.client_config()?;

    upload::run(&config, &job).context("upload failed")?;
    Ok(())
}
