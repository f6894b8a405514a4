//! Chunked transfer of a manifest into an open upload session

use crate::error::{Result, TransferError};
use crate::manifest::{ManifestLayout, TransferManifest};
use crate::session::UploadSession;
use crate::transport::{AppendRequest, AppendResponse, Transport};
use crate::MAX_CONSECUTIVE_CORRECTIONS;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

const STATUS_OK: u16 = 200;
const STATUS_CREATED: u16 = 201;

/// How the engine reacts to one append reply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Chunk stored, keep going
    Acknowledged,
    /// Whole upload stored
    Complete,
    /// Server holds a different number of bytes than the client assumed
    ResyncOffset(u64),
    /// Chunk too large for the server
    ResizeChunk(u64),
    /// Refused without a correction
    Rejected(u16),
}

impl AppendOutcome {
    pub fn classify(response: &AppendResponse) -> Self {
        match response.status {
            STATUS_OK => AppendOutcome::Acknowledged,
            STATUS_CREATED => AppendOutcome::Complete,
            status => match (response.offset, response.max_request_size) {
                (Some(offset), _) => AppendOutcome::ResyncOffset(offset),
                (None, Some(size)) => AppendOutcome::ResizeChunk(size),
                (None, None) => AppendOutcome::Rejected(status),
            },
        }
    }
}

/// Position of the transfer within the manifest
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferState {
    pub file_index: usize,
    /// Session-wide bytes acknowledged, the value sent as `Offset`
    pub offset: u64,
}

/// Summary of a completed transfer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Session offset after the completing append
    pub bytes_acknowledged: u64,
    pub appends: usize,
    pub offset_corrections: usize,
    pub chunk_size_corrections: usize,
    /// Chunk size in force at the end
    pub chunk_size: u64,
}

/// Streams the files of a manifest, in order, to an upload session
pub struct ChunkedTransfer<'a> {
    transport: &'a dyn Transport,
    session: &'a mut UploadSession,
}

impl<'a> ChunkedTransfer<'a> {
    pub fn new(transport: &'a dyn Transport, session: &'a mut UploadSession) -> Self {
        Self { transport, session }
    }

    /// Send every file until the data node reports completion.
    ///
    /// Offset and chunk size corrections are applied in place; any other
    /// rejection, request failure or local I/O error ends the transfer.
    pub fn run(
        &mut self,
        manifest: &TransferManifest,
        layout: &ManifestLayout,
    ) -> Result<TransferReport> {
        let entries = manifest.entries();
        let last = entries.len().checked_sub(1).ok_or_else(|| {
            TransferError::InvalidManifest("manifest is empty".to_string())
        })?;

        let mut state = TransferState::default();
        let mut report = TransferReport::default();
        let mut buffer = chunk_buffer(self.session.chunk_size, layout.total())?;
        let mut corrections = 0usize;

        'files: while state.file_index <= last {
            let entry = &entries[state.file_index];
            let path = entry.path.as_path();

            // Dropped, and so closed, whenever the loop leaves this file
            let mut file = File::open(path).map_err(|e| TransferError::local_file(path, e))?;
            let position = local_position(layout, &state)?;
            if position > 0 {
                seek(&mut file, path, position)?;
            }
            info!("Uploading {} {}", entry.label, path.display());

            loop {
                let read = fill_chunk(&mut file, &mut buffer)
                    .map_err(|e| TransferError::local_file(path, e))?;

                if read == 0 {
                    if state.file_index == last {
                        return Err(TransferError::IncompleteUpload {
                            offset: state.offset,
                            total: layout.total(),
                        });
                    }
                    let end =
                        layout.start_of(state.file_index) + layout.sizes()[state.file_index];
                    if state.offset != end {
                        return Err(TransferError::local_file(
                            path,
                            io::Error::new(
                                io::ErrorKind::Other,
                                format!(
                                    "size changed during upload: ended at offset {}, expected {}",
                                    state.offset, end
                                ),
                            ),
                        ));
                    }
                    debug!("Finished {} at offset {}", entry.label, state.offset);
                    state.file_index += 1;
                    continue 'files;
                }

                let response = self.transport.append(
                    &self.session.upload_address,
                    &AppendRequest {
                        session_id: &self.session.session_id,
                        offset: state.offset,
                        chunk: &buffer[..read],
                    },
                )?;
                report.appends += 1;

                match AppendOutcome::classify(&response) {
                    AppendOutcome::Acknowledged => {
                        state.offset += read as u64;
                        corrections = 0;
                        debug!("Chunk acknowledged, offset {}", state.offset);
                    }
                    AppendOutcome::Complete => {
                        report.bytes_acknowledged = state.offset + read as u64;
                        report.chunk_size = self.session.chunk_size;
                        info!(
                            "Upload complete at offset {} after {} appends",
                            report.bytes_acknowledged, report.appends
                        );
                        return Ok(report);
                    }
                    AppendOutcome::ResyncOffset(offset) => {
                        corrections = note_correction(corrections)?;
                        report.offset_corrections += 1;
                        warn!(
                            "Offset error: changing from {} to {}",
                            state.offset, offset
                        );
                        state.offset = offset;

                        let (index, position) = layout.locate(offset);
                        if index != state.file_index {
                            state.file_index = index;
                            continue 'files;
                        }
                        seek(&mut file, path, position)?;
                    }
                    AppendOutcome::ResizeChunk(size) => {
                        corrections = note_correction(corrections)?;
                        report.chunk_size_corrections += 1;
                        warn!(
                            "Chunk size error: changing from {} to {}",
                            self.session.chunk_size, size
                        );
                        buffer = chunk_buffer(size, layout.total())?;
                        self.session.chunk_size = size;
                        seek(&mut file, path, local_position(layout, &state)?)?;
                    }
                    AppendOutcome::Rejected(status) => {
                        return Err(TransferError::UnexpectedStatus { status });
                    }
                }
            }
        }

        Err(TransferError::IncompleteUpload {
            offset: state.offset,
            total: layout.total(),
        })
    }
}

/// Buffer for chunks of `size` bytes, never larger than the whole upload
fn chunk_buffer(size: u64, total: u64) -> Result<Vec<u8>> {
    if size == 0 {
        return Err(TransferError::Protocol(
            "chunk size must be positive".to_string(),
        ));
    }
    let size = size.min(total.max(1));
    let size = usize::try_from(size)
        .map_err(|_| TransferError::Protocol(format!("chunk size {} too large", size)))?;
    Ok(vec![0u8; size])
}

fn note_correction(corrections: usize) -> Result<usize> {
    let corrections = corrections + 1;
    if corrections > MAX_CONSECUTIVE_CORRECTIONS {
        return Err(TransferError::Protocol(format!(
            "{} consecutive corrections without progress",
            corrections
        )));
    }
    Ok(corrections)
}

/// Read position inside the current file for the session offset
fn local_position(layout: &ManifestLayout, state: &TransferState) -> Result<u64> {
    state
        .offset
        .checked_sub(layout.start_of(state.file_index))
        .ok_or_else(|| {
            TransferError::Protocol(format!(
                "offset {} lies before file {}",
                state.offset, state.file_index
            ))
        })
}

fn seek(file: &mut File, path: &Path, position: u64) -> Result<()> {
    file.seek(SeekFrom::Start(position))
        .map_err(|e| TransferError::local_file(path, e))?;
    Ok(())
}

/// Read until `buffer` is full or the file ends
fn fill_chunk(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
