use crate::error::Result;
use common::{FileKind, SizeHeaders};

/// Raw reply of a master to an upload address query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterReply {
    pub status: u16,
    pub body: String,
}

/// Init request opening an upload session
#[derive(Clone, Debug)]
pub struct SessionRequest<'a> {
    pub file_name: &'a str,
    pub kind: FileKind,
    pub sizes: &'a SizeHeaders,
}

/// Reply to the init request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionReply {
    pub status: u16,
    pub session_id: Option<String>,
    pub max_request_size: Option<u64>,
    pub body: String,
}

/// One chunk appended to a session
#[derive(Clone, Debug)]
pub struct AppendRequest<'a> {
    pub session_id: &'a str,
    pub offset: u64,
    pub chunk: &'a [u8],
}

/// Reply to an append, with the correction headers the data node may set
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppendResponse {
    pub status: u16,
    pub offset: Option<u64>,
    pub max_request_size: Option<u64>,
}

/// Request/response exchange with masters and data nodes.
///
/// Implementations report only request-level failures as errors; status
/// codes are returned as-is and interpreted by the caller.
pub trait Transport {
    /// GET the master for a data node upload address
    fn fetch_upload_address(&self, master: &str) -> Result<MasterReply>;

    /// POST an init request to the data node
    fn open_session(&self, upload_address: &str, request: &SessionRequest<'_>)
        -> Result<SessionReply>;

    /// POST a chunk to the data node
    fn append(&self, upload_address: &str, request: &AppendRequest<'_>) -> Result<AppendResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch_upload_address(&self, master: &str) -> Result<MasterReply> {
        (**self).fetch_upload_address(master)
    }

    fn open_session(
        &self,
        upload_address: &str,
        request: &SessionRequest<'_>,
    ) -> Result<SessionReply> {
        (**self).open_session(upload_address, request)
    }

    fn append(&self, upload_address: &str, request: &AppendRequest<'_>) -> Result<AppendResponse> {
        (**self).append(upload_address, request)
    }
}
