//! Retry orchestration: master selection, negotiation and transfer per trial

use crate::engine::{ChunkedTransfer, TransferReport};
use crate::error::{Result, TransferError};
use crate::manifest::TransferManifest;
use crate::master::MasterPool;
use crate::retry::RetryPolicy;
use crate::session::{discover_upload_address, open_session};
use crate::transport::Transport;
use log::{debug, error, info, warn};
use std::path::Path;
use std::thread;

/// Where the current trial stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrialPhase {
    Idle,
    SelectingMaster,
    Negotiating,
    Transferring,
    Success,
    Failed,
}

/// Result of a successful upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Trial that succeeded, counting from 1
    pub attempt: u32,
    pub master: String,
    pub session_id: String,
    pub report: TransferReport,
}

/// Uploads manifests to the cluster, retrying whole trials on failure.
///
/// Owns the master pool for the lifetime of the process; every trial
/// discovers a fresh upload address and opens a fresh session.
pub struct Uploader<T: Transport> {
    transport: T,
    masters: MasterPool,
    policy: RetryPolicy,
    chunk_size: u64,
    phase: TrialPhase,
}

impl<T: Transport> Uploader<T> {
    pub fn new(transport: T, masters: MasterPool, policy: RetryPolicy, chunk_size: u64) -> Self {
        Self {
            transport,
            masters,
            policy,
            chunk_size,
            phase: TrialPhase::Idle,
        }
    }

    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    /// Upload a single video
    pub fn upload_video(&mut self, video: &Path) -> Result<UploadOutcome> {
        self.upload(&TransferManifest::video(video))
    }

    /// Upload a model bundle: model, config and code, in that order
    pub fn upload_model(
        &mut self,
        model: &Path,
        config: &Path,
        code: &Path,
    ) -> Result<UploadOutcome> {
        self.upload(&TransferManifest::model(model, config, code))
    }

    /// Run trials until one succeeds, a fatal error occurs, or the policy
    /// runs out of attempts
    pub fn upload(&mut self, manifest: &TransferManifest) -> Result<UploadOutcome> {
        let attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            info!(
                "Starting {} upload, attempt {}/{}",
                manifest.kind(),
                attempt,
                attempts
            );
            let error = match self.trial(manifest) {
                Ok((master, session_id, report)) => {
                    self.enter(TrialPhase::Success);
                    info!("Upload successful");
                    return Ok(UploadOutcome {
                        attempt,
                        master,
                        session_id,
                        report,
                    });
                }
                Err(e) => e,
            };
            self.enter(TrialPhase::Failed);

            if let TransferError::MasterUnreachable { .. } = error {
                warn!("Can't contact master: {}", error);
                self.masters.rotate();
            } else {
                warn!("Attempt {} failed: {}", attempt, error);
            }

            if !self.policy.is_retryable(&error) {
                error!("Upload failed: {}", error);
                return Err(error);
            }

            if attempt >= attempts {
                error!("Upload failed after {} attempts", attempts);
                return Err(TransferError::RetriesExhausted {
                    attempts,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay(attempt);
            if !delay.is_zero() {
                debug!("Waiting {:?} before next attempt", delay);
                thread::sleep(delay);
            }
            attempt += 1;
        }
    }

    /// One negotiate-then-transfer pass
    fn trial(&mut self, manifest: &TransferManifest) -> Result<(String, String, TransferReport)> {
        self.enter(TrialPhase::SelectingMaster);
        let master = self.masters.select().to_string();

        self.enter(TrialPhase::Negotiating);
        let upload_address = discover_upload_address(&self.transport, &master)?;
        let file_name = manifest.header_file_name()?;
        let layout = manifest.measure()?;
        let sizes = manifest.size_headers(&layout)?;
        let mut session = open_session(
            &self.transport,
            &upload_address,
            &file_name,
            manifest.kind(),
            &sizes,
            self.chunk_size,
        )?;

        self.enter(TrialPhase::Transferring);
        let report = ChunkedTransfer::new(&self.transport, &mut session).run(manifest, &layout)?;
        Ok((master, session.session_id, report))
    }

    fn enter(&mut self, phase: TrialPhase) {
        debug!("Upload phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeDataNode, ScriptedTransport};
    use crate::transport::{MasterReply, SessionReply};
    use common::{FileKind, SizeHeaders};
    use tempfile::TempDir;

    fn masters(n: usize) -> MasterPool {
        MasterPool::new((0..n).map(|i| format!("http://master{}", i)).collect()).unwrap()
    }

    fn uploader(
        transport: &ScriptedTransport,
        pool: MasterPool,
        max_retries: u32,
    ) -> Uploader<&ScriptedTransport> {
        Uploader::new(transport, pool, RetryPolicy::immediate(max_retries), 64)
    }

    fn master_down() -> Result<MasterReply> {
        Err(TransferError::Transport("connection refused".into()))
    }

    #[test]
    fn test_video_upload_succeeds_first_try() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("lecture.mp4");
        std::fs::write(&video, vec![5u8; 150]).unwrap();

        let transport = ScriptedTransport::with_node(FakeDataNode::new(150));
        transport.push_master_address("http://datanode/upload");
        transport.push_session_id("s1");

        let mut uploader = uploader(&transport, masters(2), 3);
        let outcome = uploader.upload_video(&video).unwrap();

        assert_eq!(outcome.attempt, 1);
        assert_eq!(outcome.master, "http://master0");
        assert_eq!(outcome.session_id, "s1");
        assert_eq!(outcome.report.bytes_acknowledged, 150);
        assert_eq!(uploader.phase(), TrialPhase::Success);

        let sessions = transport.sessions_opened();
        assert_eq!(sessions[0].file_name, "lecture.mp4");
        assert_eq!(sessions[0].kind, FileKind::Video);
        assert_eq!(sessions[0].sizes, SizeHeaders::video(150));
        assert!(transport
            .appends()
            .iter()
            .all(|a| a.upload_address == "http://datanode/upload" && a.session_id == "s1"));
    }

    #[test]
    fn test_unreachable_master_rotates_and_retries() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();

        let transport = ScriptedTransport::new();
        transport.push_master(master_down());
        transport.push_master_address("http://datanode/upload");
        transport.push_session_id("s2");
        transport.push_append_status(201);

        let mut uploader = uploader(&transport, masters(3), 3);
        let outcome = uploader.upload_video(&video).unwrap();

        assert_eq!(outcome.attempt, 2);
        assert_eq!(outcome.master, "http://master1");
        assert_eq!(
            transport.masters_contacted(),
            vec!["http://master0", "http://master1"]
        );
    }

    #[test]
    fn test_master_rotation_is_round_robin() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();

        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push_master(Ok(MasterReply {
                status: 500,
                body: "not the leader".to_string(),
            }));
        }
        transport.push_master_address("http://datanode/upload");
        transport.push_session_id("s1");
        transport.push_append_status(201);

        let mut uploader = uploader(&transport, masters(3), 5);
        let outcome = uploader.upload_video(&video).unwrap();

        assert_eq!(
            transport.masters_contacted(),
            vec![
                "http://master0",
                "http://master1",
                "http://master2",
                "http://master0"
            ]
        );
        assert_eq!(outcome.attempt, 4);
    }

    #[test]
    fn test_exhausted_retries_report_failure() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();

        let transport = ScriptedTransport::new();
        let mut uploader = uploader(&transport, masters(2), 3);

        match uploader.upload_video(&video) {
            Err(TransferError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, TransferError::MasterUnreachable { .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(transport.masters_contacted().len(), 4);
        assert_eq!(uploader.phase(), TrialPhase::Failed);
    }

    #[test]
    fn test_transfer_failure_renegotiates_on_same_master() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();

        let transport = ScriptedTransport::new();
        transport.push_master_address("http://datanode-a/upload");
        transport.push_session_id("s1");
        transport.push_append(Err(TransferError::Transport("reset".into())));
        transport.push_master_address("http://datanode-b/upload");
        transport.push_session_id("s2");
        transport.push_append_status(201);

        let mut uploader = uploader(&transport, masters(2), 3);
        let outcome = uploader.upload_video(&video).unwrap();

        assert_eq!(outcome.session_id, "s2");
        assert_eq!(
            transport.masters_contacted(),
            vec!["http://master0", "http://master0"]
        );
        assert_eq!(
            transport.sessions_opened()[1].upload_address,
            "http://datanode-b/upload"
        );
        let appends = transport.appends();
        assert_eq!(appends[1].upload_address, "http://datanode-b/upload");
        assert_eq!(appends[1].session_id, "s2");
    }

    #[test]
    fn test_session_init_refusal_is_fatal_by_default() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();

        let transport = ScriptedTransport::new();
        transport.push_master_address("http://datanode/upload");
        transport.push_session(Ok(SessionReply {
            status: 507,
            body: "disk full".to_string(),
            ..Default::default()
        }));

        let mut uploader = uploader(&transport, masters(1), 3);
        let err = uploader.upload_video(&video).unwrap_err();
        assert!(matches!(
            err,
            TransferError::SessionInitFailed { status: 507, .. }
        ));
        assert_eq!(transport.sessions_opened().len(), 1);
    }

    #[test]
    fn test_session_init_refusal_retried_when_enabled() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();

        let transport = ScriptedTransport::new();
        transport.push_master_address("http://datanode/upload");
        transport.push_session(Ok(SessionReply {
            status: 507,
            ..Default::default()
        }));
        transport.push_master_address("http://datanode/upload");
        transport.push_session_id("s9");
        transport.push_append_status(201);

        let policy = RetryPolicy {
            retry_session_init: true,
            ..RetryPolicy::immediate(3)
        };
        let mut uploader = Uploader::new(&transport, masters(1), policy, 64);
        assert_eq!(uploader.upload_video(&video).unwrap().session_id, "s9");
    }

    #[test]
    fn test_missing_local_file_is_fatal_by_default() {
        let transport = ScriptedTransport::new();
        transport.push_master_address("http://datanode/upload");

        let mut uploader = uploader(&transport, masters(1), 3);
        let err = uploader
            .upload_video(Path::new("/nonexistent/clip.mp4"))
            .unwrap_err();
        assert!(err.is_local());
        assert!(transport.sessions_opened().is_empty());
        assert_eq!(transport.masters_contacted().len(), 1);
    }

    #[test]
    fn test_missing_local_file_retried_when_enabled() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push_master_address("http://datanode/upload");
        }

        let policy = RetryPolicy {
            retry_local_file_errors: true,
            ..RetryPolicy::immediate(2)
        };
        let mut uploader = Uploader::new(&transport, masters(1), policy, 64);
        let err = uploader
            .upload_video(Path::new("/nonexistent/clip.mp4"))
            .unwrap_err();
        match err {
            TransferError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.is_local());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_model_upload_streams_bundle_in_order() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("weights.bin");
        let config = dir.path().join("config.yaml");
        let code = dir.path().join("code.py");
        std::fs::write(&model, vec![1u8; 100]).unwrap();
        std::fs::write(&config, vec![2u8; 30]).unwrap();
        std::fs::write(&code, vec![3u8; 40]).unwrap();

        let transport = ScriptedTransport::with_node(FakeDataNode::new(170));
        transport.push_master_address("http://datanode/upload");
        transport.push_session_id("m1");

        let mut uploader = uploader(&transport, masters(1), 0);
        let outcome = uploader.upload_model(&model, &config, &code).unwrap();
        assert_eq!(outcome.report.bytes_acknowledged, 170);

        let session = &transport.sessions_opened()[0];
        assert_eq!(session.file_name, "weights.bin");
        assert_eq!(session.kind, FileKind::Model);
        assert_eq!(session.sizes, SizeHeaders::model(100, 30, 40));

        let mut expected = vec![1u8; 100];
        expected.extend(vec![2u8; 30]);
        expected.extend(vec![3u8; 40]);
        assert_eq!(transport.stored(), expected);
    }

    #[test]
    fn test_incomplete_upload_is_retried_with_new_session() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();

        let transport = ScriptedTransport::new();
        transport.push_master_address("http://datanode/upload");
        transport.push_session_id("s1");
        transport.push_append_status(200);
        transport.push_master_address("http://datanode/upload");
        transport.push_session_id("s2");
        transport.push_append_status(201);

        let mut uploader = uploader(&transport, masters(1), 1);
        let outcome = uploader.upload_video(&video).unwrap();
        assert_eq!(outcome.attempt, 2);
        assert_eq!(outcome.session_id, "s2");
        assert_eq!(transport.sessions_opened().len(), 2);
    }
}
