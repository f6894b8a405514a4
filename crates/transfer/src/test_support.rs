//! In-memory `Transport` for unit tests

use crate::error::{Result, TransferError};
use crate::transport::{
    AppendRequest, AppendResponse, MasterReply, SessionReply, SessionRequest, Transport,
};
use common::{FileKind, SizeHeaders};
use std::cell::RefCell;
use std::collections::VecDeque;

#[derive(Clone, Debug)]
pub struct RecordedSession {
    pub upload_address: String,
    pub file_name: String,
    pub kind: FileKind,
    pub sizes: SizeHeaders,
}

#[derive(Clone, Debug)]
pub struct RecordedAppend {
    pub upload_address: String,
    pub session_id: String,
    pub offset: u64,
    pub chunk: Vec<u8>,
}

/// Data node that follows the protocol: it stores appended bytes, asks for
/// smaller chunks above its limit and resyncs clients sending the wrong offset.
#[derive(Debug, Default)]
pub struct FakeDataNode {
    pub data: Vec<u8>,
    pub total: u64,
    pub max_request_size: Option<u64>,
    /// Appends to drop after storing them, as if the ack was lost
    pub lose_acks_at: Vec<usize>,
    /// `(n, limit)`: from the n-th append on, chunks above `limit` are refused
    pub shrink_limit_at: Option<(usize, u64)>,
    appends_seen: usize,
}

impl FakeDataNode {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    fn handle(&mut self, request: &AppendRequest<'_>) -> Result<AppendResponse> {
        let index = self.appends_seen;
        self.appends_seen += 1;

        if let Some((from, limit)) = self.shrink_limit_at {
            if index >= from {
                self.max_request_size = Some(limit);
            }
        }

        if let Some(max) = self.max_request_size {
            if request.chunk.len() as u64 > max {
                return Ok(AppendResponse {
                    status: 413,
                    max_request_size: Some(max),
                    ..Default::default()
                });
            }
        }

        let stored = self.data.len() as u64;
        if request.offset != stored {
            return Ok(AppendResponse {
                status: 409,
                offset: Some(stored),
                ..Default::default()
            });
        }

        self.data.extend_from_slice(request.chunk);
        if self.lose_acks_at.contains(&index) {
            return Err(TransferError::Transport("connection reset".to_string()));
        }

        let status = if self.data.len() as u64 >= self.total {
            201
        } else {
            200
        };
        Ok(AppendResponse {
            status,
            ..Default::default()
        })
    }
}

/// Replays queued replies and records every request it receives.
/// Appends are answered from the queue first, then by the fake data node.
#[derive(Default)]
pub struct ScriptedTransport {
    master_replies: RefCell<VecDeque<Result<MasterReply>>>,
    session_replies: RefCell<VecDeque<Result<SessionReply>>>,
    append_replies: RefCell<VecDeque<Result<AppendResponse>>>,
    node: RefCell<Option<FakeDataNode>>,
    masters: RefCell<Vec<String>>,
    sessions: RefCell<Vec<RecordedSession>>,
    appends: RefCell<Vec<RecordedAppend>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(node: FakeDataNode) -> Self {
        let transport = Self::default();
        *transport.node.borrow_mut() = Some(node);
        transport
    }

    pub fn push_master(&self, reply: Result<MasterReply>) {
        self.master_replies.borrow_mut().push_back(reply);
    }

    pub fn push_master_address(&self, address: &str) {
        self.push_master(Ok(MasterReply {
            status: 200,
            body: address.to_string(),
        }));
    }

    pub fn push_session(&self, reply: Result<SessionReply>) {
        self.session_replies.borrow_mut().push_back(reply);
    }

    pub fn push_session_id(&self, id: &str) {
        self.push_session(Ok(SessionReply {
            status: 201,
            session_id: Some(id.to_string()),
            ..Default::default()
        }));
    }

    pub fn push_append(&self, reply: Result<AppendResponse>) {
        self.append_replies.borrow_mut().push_back(reply);
    }

    pub fn push_append_status(&self, status: u16) {
        self.push_append(Ok(AppendResponse {
            status,
            ..Default::default()
        }));
    }

    pub fn masters_contacted(&self) -> Vec<String> {
        self.masters.borrow().clone()
    }

    pub fn sessions_opened(&self) -> Vec<RecordedSession> {
        self.sessions.borrow().clone()
    }

    pub fn appends(&self) -> Vec<RecordedAppend> {
        self.appends.borrow().clone()
    }

    /// Bytes held by the fake data node
    pub fn stored(&self) -> Vec<u8> {
        self.node
            .borrow()
            .as_ref()
            .map(|node| node.data.clone())
            .unwrap_or_default()
    }
}

impl Transport for ScriptedTransport {
    fn fetch_upload_address(&self, master: &str) -> Result<MasterReply> {
        self.masters.borrow_mut().push(master.to_string());
        self.master_replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransferError::Transport("no scripted master reply".into())))
    }

    fn open_session(
        &self,
        upload_address: &str,
        request: &SessionRequest<'_>,
    ) -> Result<SessionReply> {
        self.sessions.borrow_mut().push(RecordedSession {
            upload_address: upload_address.to_string(),
            file_name: request.file_name.to_string(),
            kind: request.kind,
            sizes: request.sizes.clone(),
        });
        self.session_replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransferError::Transport("no scripted session reply".into())))
    }

    fn append(&self, upload_address: &str, request: &AppendRequest<'_>) -> Result<AppendResponse> {
        self.appends.borrow_mut().push(RecordedAppend {
            upload_address: upload_address.to_string(),
            session_id: request.session_id.to_string(),
            offset: request.offset,
            chunk: request.chunk.to_vec(),
        });
        if let Some(reply) = self.append_replies.borrow_mut().pop_front() {
            return reply;
        }
        match self.node.borrow_mut().as_mut() {
            Some(node) => node.handle(request),
            None => Err(TransferError::Transport("no scripted append reply".into())),
        }
    }
}
