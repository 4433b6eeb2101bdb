//! # SPTF Protocol Library
//!
//! Wire definitions shared by every SPTF client component.
//!
//! ## Overview
//!
//! The protocol crate is the foundation of the client's communication layer,
//! providing:
//!
//! - **Channel Messages**: the versioned envelope exchanged over the
//!   persistent WebSocket channel (directory listing requests and replies)
//! - **HTTP Bodies**: JSON request/response bodies of the request/reply API
//! - **Transfer Payload**: the MessagePack-encoded bulk upload request
//! - **Error Codes**: the fixed server error-code table and its categories
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Envelope { version, sequence }      │  MessagePack-encoded
//! ├─────────────────────────────────────────┤
//! │         WebSocket binary frames         │  /ws?auth_token=...
//! └─────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────┐
//! │   JSON bodies / MessagePack uploads     │  /login, /upload, ...
//! ├─────────────────────────────────────────┤
//! │                 HTTPS                   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{classify, Envelope, ErrorCategory, Message};
//! use protocol::messages::ListDirectory;
//!
//! let envelope = Envelope::new(1, Message::ListDirectory(ListDirectory {
//!     path: "/photos".to_string(),
//! }));
//! let bytes = envelope.to_msgpack().unwrap();
//! assert_eq!(Envelope::from_msgpack(&bytes).unwrap(), envelope);
//!
//! assert_eq!(classify(0x6), ErrorCategory::PermissionDenied);
//! ```
//!
//! ## Modules
//!
//! - [`codes`]: Error-code table and categories
//! - [`messages`]: Channel envelope and message definitions
//! - [`http`]: Request/reply endpoint paths and JSON bodies
//! - [`transfer`]: Bulk upload payload
//! - [`error`]: Error types

pub mod codes;
pub mod error;
pub mod http;
pub mod messages;
pub mod transfer;

pub use codes::{classify, classify_field, CredentialFault, ErrorCategory, Locale};
pub use error::{ProtocolError, Result};
pub use messages::{
    DirectoryLayout, Envelope, FileEntry, FileMetadata, FileType, ListDirectoryResponse,
    ListingResult, Message, PROTOCOL_VERSION, UNCORRELATED_SEQUENCE,
};
pub use transfer::{TransferRequest, UploadedFile};
