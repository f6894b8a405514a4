use crate::error::{Result, TransferError};
use common::file_utils::header_file_name;
use common::{FileKind, SizeHeaders};
use std::fs;
use std::path::{Path, PathBuf};

/// Labels of a model bundle, in the order they are streamed
pub const MODEL_UPLOAD_ORDER: [&str; 3] = ["model", "config", "code"];

/// One file of a manifest
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub label: String,
    pub path: PathBuf,
}

/// Ordered list of files making up one logical upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferManifest {
    kind: FileKind,
    entries: Vec<ManifestEntry>,
}

impl TransferManifest {
    /// Manifest for a single video
    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FileKind::Video,
            entries: vec![ManifestEntry {
                label: "video".to_string(),
                path: path.into(),
            }],
        }
    }

    /// Manifest for a model bundle, always sent as model, config, code
    pub fn model(
        model: impl Into<PathBuf>,
        config: impl Into<PathBuf>,
        code: impl Into<PathBuf>,
    ) -> Self {
        let paths = [model.into(), config.into(), code.into()];
        let entries = MODEL_UPLOAD_ORDER
            .iter()
            .zip(paths)
            .map(|(label, path)| ManifestEntry {
                label: label.to_string(),
                path,
            })
            .collect();
        Self {
            kind: FileKind::Model,
            entries,
        }
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// `Filename` header value: base name of the first file
    pub fn header_file_name(&self) -> Result<String> {
        let first = self
            .entries
            .first()
            .ok_or_else(|| TransferError::InvalidManifest("manifest is empty".to_string()))?;
        header_file_name(&first.path).map_err(|source| TransferError::InvalidFileName {
            path: first.path.clone(),
            source,
        })
    }

    /// Stat every file and record where each one starts in the upload stream
    pub fn measure(&self) -> Result<ManifestLayout> {
        let sizes = self
            .entries
            .iter()
            .map(|entry| file_size(&entry.path))
            .collect::<Result<Vec<_>>>()?;
        Ok(ManifestLayout::from_sizes(sizes))
    }

    /// Size headers for the init request
    pub fn size_headers(&self, layout: &ManifestLayout) -> Result<SizeHeaders> {
        match (self.kind, layout.sizes()) {
            (FileKind::Video, [size]) => Ok(SizeHeaders::video(*size)),
            (FileKind::Model, [model, config, code]) => {
                Ok(SizeHeaders::model(*model, *config, *code))
            }
            (kind, sizes) => Err(TransferError::InvalidManifest(format!(
                "{} upload cannot have {} files",
                kind,
                sizes.len()
            ))),
        }
    }
}

fn file_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| TransferError::local_file(path, e))?;
    Ok(metadata.len())
}

/// File sizes of a manifest, measured at negotiation time
///
/// The `Offset` header counts bytes across the whole manifest, so the
/// layout is what maps a session offset back to a file and a position
/// inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestLayout {
    sizes: Vec<u64>,
    starts: Vec<u64>,
}

impl ManifestLayout {
    pub fn from_sizes(sizes: Vec<u64>) -> Self {
        let starts = sizes
            .iter()
            .scan(0u64, |acc, size| {
                let start = *acc;
                *acc += size;
                Some(start)
            })
            .collect();
        Self { sizes, starts }
    }

    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    pub fn total(&self) -> u64 {
        self.sizes.iter().sum()
    }

    /// Session offset at which file `index` begins
    pub fn start_of(&self, index: usize) -> u64 {
        self.starts[index]
    }

    /// File index and in-file position for a session offset.
    /// A boundary offset belongs to the file that starts there; offsets at
    /// or past the end resolve to the end of the last file.
    pub fn locate(&self, offset: u64) -> (usize, u64) {
        let last = self.sizes.len().saturating_sub(1);
        if offset >= self.total() {
            return (last, self.sizes.get(last).copied().unwrap_or(0));
        }
        let index = self
            .starts
            .iter()
            .zip(&self.sizes)
            .position(|(start, size)| offset < start + size)
            .unwrap_or(last);
        (index, offset - self.starts[index])
    }
}
