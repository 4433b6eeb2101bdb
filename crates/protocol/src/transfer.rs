//! Bulk upload payload.
//!
//! One upload is one MessagePack-encoded [`TransferRequest`] naming the
//! destination directory and every file with its full contents.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// All files of one upload, in selection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Remote directory receiving the files.
    pub dir_path: String,
    pub uploaded_file: Vec<UploadedFile>,
}

/// One file of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_name: String,
    #[serde(with = "serde_bytes")]
    pub content: Vec<u8>,
}

impl TransferRequest {
    pub fn new(dir_path: impl Into<String>, files: Vec<UploadedFile>) -> Self {
        Self {
            dir_path: dir_path.into(),
            uploaded_file: files,
        }
    }

    /// Sum of file sizes.
    pub fn content_len(&self) -> u64 {
        self.uploaded_file
            .iter()
            .map(|f| f.content.len() as u64)
            .sum()
    }

    /// Serialize to MessagePack with named fields.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
