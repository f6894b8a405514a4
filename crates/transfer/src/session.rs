use crate::error::{Result, TransferError};
use crate::transport::{SessionRequest, Transport};
use common::{FileKind, SizeHeaders};
use log::info;

/// HTTP 200, the only reply of a master that carries an upload address
const STATUS_OK: u16 = 200;
/// HTTP 201, the only accepted reply to an init request
const STATUS_CREATED: u16 = 201;

/// An open upload session on a data node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSession {
    pub session_id: String,
    pub upload_address: String,
    /// Bytes per append; the data node may lower it mid-transfer
    pub chunk_size: u64,
}

/// Ask `master` which data node to upload to.
///
/// Any failure here means the master is unusable and maps to
/// [`TransferError::MasterUnreachable`].
pub fn discover_upload_address(transport: &dyn Transport, master: &str) -> Result<String> {
    let unreachable = |detail: String| TransferError::MasterUnreachable {
        master: master.to_string(),
        detail,
    };

    let reply = transport
        .fetch_upload_address(master)
        .map_err(|e| unreachable(e.to_string()))?;

    if reply.status != STATUS_OK {
        return Err(unreachable(format!("status {}: {}", reply.status, reply.body)));
    }

    let address = reply.body.trim();
    if address.is_empty() {
        return Err(unreachable("empty upload address".to_string()));
    }

    info!("Updated upload url to {}", address);
    Ok(address.to_string())
}

/// Open an upload session on the data node at `upload_address`.
///
/// `default_chunk_size` is used unless the data node suggests a maximum
/// request size in its reply.
pub fn open_session(
    transport: &dyn Transport,
    upload_address: &str,
    file_name: &str,
    kind: FileKind,
    sizes: &SizeHeaders,
    default_chunk_size: u64,
) -> Result<UploadSession> {
    let request = SessionRequest {
        file_name,
        kind,
        sizes,
    };
    let reply = transport.open_session(upload_address, &request)?;

    if reply.status != STATUS_CREATED {
        return Err(TransferError::SessionInitFailed {
            status: reply.status,
            detail: reply.body,
        });
    }

    let session_id = reply.session_id.ok_or(TransferError::MissingSessionId)?;

    let chunk_size = match reply.max_request_size {
        Some(0) => {
            return Err(TransferError::Protocol(
                "data node suggested a chunk size of 0".to_string(),
            ))
        }
        Some(size) => {
            info!("Chunk size {}", size);
            size
        }
        None => default_chunk_size,
    };

    info!("Sent initial {} request with ID = {}", kind, session_id);
    Ok(UploadSession {
        session_id,
        upload_address: upload_address.to_string(),
        chunk_size,
    })
}
