//! # SPTF Client Library
//!
//! Everything between a user's intent and the SPTF server.
//!
//! ## Overview
//!
//! The client crate turns a username and password into an authenticated
//! session and drives remote browsing over it:
//!
//! - **Credential Gateway**: login, signup, logout and stored-cookie
//!   revalidation over the request/reply API
//! - **Session Connection**: one persistent WebSocket channel per session
//! - **Navigation Controller**: request-id correlated directory browsing with
//!   per-request deadlines
//! - **Transfer Coordinator**: bulk uploads, download links, directory creation
//! - **Cookie Store**: the `SPTF_AUTH` cookie in the OS keychain
//! - **Bridge**: JSON request/reply payloads for a UI process
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Session (owns the Credential)                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────┐   │
//! │  │   Gateway    │  │ Browser          │  │    Transfers     │   │
//! │  │  (reqwest)   │  │ Navigator +      │  │    (reqwest)     │   │
//! │  │              │  │ Connection (ws)  │  │                  │   │
//! │  └──────────────┘  └──────────────────┘  └──────────────────┘   │
//! │                                                                 │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │           CookieJar (keyring / memory backend)            │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use client::{ClientConfig, HttpDownloadLauncher, NavigationUpdate, Session, SystemKeychain};
//!
//! let config = ClientConfig::load_default()?;
//! let launcher = Arc::new(HttpDownloadLauncher::new(
//!     &client::ApiClient::new(&config)?,
//!     config.transfer.download_dir.clone(),
//! ));
//! let mut session = Session::new(config, SystemKeychain, launcher)?;
//!
//! if !session.restore().await? {
//!     session.login("alice", "secret").await?;
//! }
//!
//! let mut browser = session.open_browser().await?;
//! if let NavigationUpdate::Synced(snapshot) = browser.settle().await? {
//!     for entry in &snapshot.entries {
//!         println!("{}", entry.name);
//!     }
//! }
//! ```

pub mod api;
pub mod bridge;
pub mod browser;
pub mod config;
pub mod connection;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod navigation;
pub mod session;
pub mod storage;
pub mod transfer;

pub use protocol;

pub use api::ApiClient;
pub use bridge::{Bridge, BridgeError, BridgeReply, BridgeRequest};
pub use browser::Browser;
pub use config::{ClientConfig, ConfigError};
pub use connection::{Connection, ConnectionHandle, ConnectionState, EnvelopeSink, InboundEvent};
pub use credential::{Credential, CredentialOrigin};
pub use error::{ClientError, ClientResult};
pub use gateway::CredentialGateway;
pub use navigation::{
    DirectoryEntry, DirectorySnapshot, EntryKind, NavigationState, NavigationUpdate, Navigator,
};
pub use session::Session;
pub use storage::{
    CookieJar, CredentialBackend, MemoryBackend, StorageError, StoredCookie, SystemKeychain,
};
pub use transfer::{
    DownloadLauncher, DownloadRequest, HttpDownloadLauncher, RecordingLauncher, TransferCoordinator,
};
