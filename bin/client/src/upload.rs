use crate::config::ClientConfig;
use anyhow::Result;
use log::info;
use std::path::PathBuf;
use transfer::{HttpTransport, MasterPool, UploadOutcome, Uploader};

/// What to upload, as selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadJob {
    Video(PathBuf),
    Model {
        model: PathBuf,
        config: PathBuf,
        code: PathBuf,
    },
}

/// Upload `job` to the cluster described by `config`
pub fn run(config: &ClientConfig, job: &UploadJob) -> Result<UploadOutcome> {
    let transport = HttpTransport::new(config.http_options())?;
    let masters = MasterPool::new(config.masters.clone())?;
    let mut uploader = Uploader::new(transport, masters, config.retry_policy(), config.chunk_size);

    let outcome = match job {
        UploadJob::Video(video) => uploader.upload_video(video)?,
        UploadJob::Model {
            model,
            config: model_config,
            code,
        } => uploader.upload_model(model, model_config, code)?,
    };

    info!(
        "Uploaded {} bytes in session {} via {} (attempt {})",
        outcome.report.bytes_acknowledged, outcome.session_id, outcome.master, outcome.attempt
    );
    Ok(outcome)
}
