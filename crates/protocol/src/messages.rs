//! Channel message definitions for SPTF.
//!
//! This module defines every message exchanged over the persistent
//! WebSocket channel. All messages are wrapped in an [`Envelope`] and
//! serialized using MessagePack with named fields.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Sequence carried by replies from a server that does not correlate requests.
pub const UNCORRELATED_SEQUENCE: u64 = 0;

/// Envelope wrapper for all channel messages.
///
/// The envelope provides versioning and a sequence number. Requests carry a
/// fresh sequence; replies echo it back, or carry
/// [`UNCORRELATED_SEQUENCE`] when the server does not track ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version for compatibility checking.
    pub version: u8,
    /// Request id this message belongs to.
    pub sequence: u64,
    /// The actual message payload.
    pub payload: Message,
}

impl Envelope {
    /// Create a new envelope with the current protocol version.
    pub fn new(sequence: u64, payload: Message) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sequence,
            payload,
        }
    }
}

/// Top-level message enum containing all message types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    /// Request a listing of one directory. Client to server.
    ListDirectory(ListDirectory),
    /// Listing or error for a previously requested directory. Server to client.
    ListDirectoryResponse(ListDirectoryResponse),
    /// Error not tied to any request. Server to client.
    GeneralError(ErrorResponse),
}

impl Message {
    /// Short name of the message type, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::ListDirectory(_) => "ListDirectory",
            Message::ListDirectoryResponse(_) => "ListDirectoryResponse",
            Message::GeneralError(_) => "GeneralError",
        }
    }

    /// Whether the server may send this message.
    pub fn is_inbound(&self) -> bool {
        !matches!(self, Message::ListDirectory(_))
    }
}

// ============================================================================
// Directory Messages
// ============================================================================

/// Request to list a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDirectory {
    /// Absolute remote path to list.
    pub path: String,
}

/// Reply to [`ListDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDirectoryResponse {
    /// Path the reply is about.
    pub directory_path: String,
    /// Listing on success, error code otherwise.
    pub result: ListingResult,
}

/// Outcome of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ListingResult {
    /// The directory's entries.
    DirectoryLayout(DirectoryLayout),
    /// The server refused or failed the listing.
    ErrorResponse(ErrorResponse),
}

/// Entries of one directory, in server order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryLayout {
    pub files: Vec<FileEntry>,
}

/// Numeric server error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: i64,
}

/// A single file or subdirectory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Last path component.
    pub file_name: String,
    /// Full remote path.
    pub path: String,
    /// Type, size and timestamps.
    pub metadata: FileMetadata,
}

/// Metadata reported for an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_type: FileType,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Unix seconds.
    #[serde(default)]
    pub modified_timestamp: i64,
    /// Unix seconds.
    #[serde(default)]
    pub accessed_timestamp: i64,
    /// Unix seconds.
    #[serde(default)]
    pub created_timestamp: i64,
}

/// Type of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    NormalFile,
    Directory,
}

// ============================================================================
// Serialization helpers
// ============================================================================

impl Envelope {
    /// Serialize the envelope to MessagePack bytes.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserialize an envelope from MessagePack bytes.
    ///
    /// Envelopes from another protocol version are rejected.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope = rmp_serde::from_slice(bytes)?;
        if envelope.version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: envelope.version,
            });
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to test roundtrip serialization
    fn roundtrip_envelope(msg: Message) {
        let envelope = Envelope::new(42, msg);
        let bytes = envelope.to_msgpack().expect("serialization failed");
        let decoded = Envelope::from_msgpack(&bytes).expect("deserialization failed");
        assert_eq!(envelope, decoded);
    }

    fn entry(name: &str, parent: &str, file_type: FileType) -> FileEntry {
        FileEntry {
            file_name: name.to_string(),
            path: format!("{}/{}", parent.trim_end_matches('/'), name),
            metadata: FileMetadata {
                file_type,
                size: 1024,
                modified_timestamp: 1704067200,
                accessed_timestamp: 1704067300,
                created_timestamp: 1704067100,
            },
        }
    }

    #[test]
    fn test_envelope_version() {
        let envelope = Envelope::new(
            1,
            Message::ListDirectory(ListDirectory {
                path: "/".to_string(),
            }),
        );
        assert_eq!(envelope.version, PROTOCOL_VERSION);
        assert_eq!(envelope.sequence, 1);
    }

    #[test]
    fn test_list_directory_roundtrip() {
        roundtrip_envelope(Message::ListDirectory(ListDirectory {
            path: "/home/user/My Documents".to_string(),
        }));
    }

    #[test]
    fn test_listing_preserves_entry_order() {
        let files = vec![
            entry("zeta.txt", "/a", FileType::NormalFile),
            entry("alpha", "/a", FileType::Directory),
            entry("mid.bin", "/a", FileType::NormalFile),
        ];
        let msg = Message::ListDirectoryResponse(ListDirectoryResponse {
            directory_path: "/a".to_string(),
            result: ListingResult::DirectoryLayout(DirectoryLayout {
                files: files.clone(),
            }),
        });
        let bytes = Envelope::new(3, msg).to_msgpack().unwrap();
        let decoded = Envelope::from_msgpack(&bytes).unwrap();
        match decoded.payload {
            Message::ListDirectoryResponse(ListDirectoryResponse {
                result: ListingResult::DirectoryLayout(layout),
                ..
            }) => assert_eq!(layout.files, files),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_error_response_roundtrip() {
        roundtrip_envelope(Message::ListDirectoryResponse(ListDirectoryResponse {
            directory_path: "/secret".to_string(),
            result: ListingResult::ErrorResponse(ErrorResponse { error_code: 0x6 }),
        }));
    }

    #[test]
    fn test_general_error_roundtrip() {
        roundtrip_envelope(Message::GeneralError(ErrorResponse { error_code: 0x3 }));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut envelope = Envelope::new(
            1,
            Message::GeneralError(ErrorResponse { error_code: 0 }),
        );
        envelope.version = 9;
        let bytes = envelope.to_msgpack().unwrap();
        let err = Envelope::from_msgpack(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: 9
            }
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let err = Envelope::from_msgpack(&[0xc1, 0x00, 0xff]).unwrap_err();
        assert!(matches!(err, ProtocolError::Deserialization(_)));
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let envelope = Envelope::new(
            5,
            Message::ListDirectoryResponse(ListDirectoryResponse {
                directory_path: "/a".to_string(),
                result: ListingResult::DirectoryLayout(DirectoryLayout {
                    files: vec![entry("x", "/a", FileType::NormalFile)],
                }),
            }),
        );
        let value: serde_json::Value =
            rmp_serde::from_slice(&envelope.to_msgpack().unwrap()).unwrap();
        let data = &value["payload"]["data"];
        assert_eq!(value["payload"]["type"], "ListDirectoryResponse");
        assert_eq!(data["directoryPath"], "/a");
        let file = &data["result"]["data"]["files"][0];
        assert_eq!(file["fileName"], "x");
        assert_eq!(file["metadata"]["fileType"], "NormalFile");
        assert_eq!(file["metadata"]["modifiedTimestamp"], 1704067200);
    }

    #[test]
    fn test_missing_timestamps_default_to_zero() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct BareMetadata {
            file_type: FileType,
        }
        let bytes = rmp_serde::to_vec_named(&BareMetadata {
            file_type: FileType::Directory,
        })
        .unwrap();
        let metadata: FileMetadata = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(metadata.file_type, FileType::Directory);
        assert_eq!(metadata.size, 0);
        assert_eq!(metadata.created_timestamp, 0);
    }

    #[test]
    fn test_message_direction() {
        assert!(!Message::ListDirectory(ListDirectory {
            path: "/".to_string()
        })
        .is_inbound());
        assert!(Message::GeneralError(ErrorResponse { error_code: 1 }).is_inbound());
        assert_eq!(
            Message::GeneralError(ErrorResponse { error_code: 1 }).kind(),
            "GeneralError"
        );
    }

    #[test]
    fn test_list_request_compact() {
        let envelope = Envelope::new(
            u64::MAX,
            Message::ListDirectory(ListDirectory {
                path: "/".to_string(),
            }),
        );
        let bytes = envelope.to_msgpack().unwrap();
        assert!(bytes.len() < 100, "request too large: {} bytes", bytes.len());
    }
}
