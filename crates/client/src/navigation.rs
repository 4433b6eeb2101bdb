//! Navigation Controller.
//!
//! Turns "go to path P" intents into `ListDirectory` requests and reconciles
//! the replies that come back asynchronously over the channel.
//!
//! Every request carries a fresh sequence number and only the reply echoing
//! the live sequence is applied. Servers that do not correlate reply with
//! sequence [`UNCORRELATED_SEQUENCE`]; for those the reply path is compared
//! with the target path instead. Once a reply is applied the live request is
//! cleared, so a duplicate reply is discarded.
//!
//! ```text
//!   navigate(P) ──► target = P, live = {seq, P}
//!        │
//!        ├── listing(seq)      ──► current = P, Synced(snapshot)
//!        ├── error(seq, code)  ──► target = current, Rejected(classify(code))
//!        ├── deadline passed   ──► target = current, Rejected(RequestTimeout)
//!        └── reply(other seq)  ──► discarded
//! ```

use std::time::Duration;

use protocol::messages::{ListDirectory, ListDirectoryResponse, ListingResult};
use protocol::{Envelope, ErrorCategory, FileEntry, FileType, Message, UNCORRELATED_SEQUENCE};
use tokio::time::Instant;

use crate::connection::{EnvelopeSink, InboundEvent};
use crate::error::{ClientError, ClientResult};

pub const ROOT_PATH: &str = "/";

/// Where the user is and where they asked to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    /// Last successfully listed directory.
    pub current_path: Option<String>,
    /// Directory most recently asked for.
    pub target_path: String,
}

impl NavigationState {
    pub fn new(start_path: impl Into<String>) -> Self {
        Self {
            current_path: None,
            target_path: start_path.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct LiveRequest {
    sequence: u64,
    path: String,
    issued_at: Instant,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One file or subdirectory of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    /// Bytes.
    pub size: u64,
    /// Unix seconds.
    pub modified: i64,
    pub accessed: i64,
    pub created: i64,
}

impl From<FileEntry> for DirectoryEntry {
    fn from(entry: FileEntry) -> Self {
        let kind = match entry.metadata.file_type {
            FileType::NormalFile => EntryKind::File,
            FileType::Directory => EntryKind::Directory,
        };
        Self {
            name: entry.file_name,
            path: entry.path,
            kind,
            size: entry.metadata.size,
            modified: entry.metadata.modified_timestamp,
            accessed: entry.metadata.accessed_timestamp,
            created: entry.metadata.created_timestamp,
        }
    }
}

/// Authoritative listing of one directory, in server order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DirectorySnapshot {
    pub path: String,
    pub entries: Vec<DirectoryEntry>,
}

/// What a reconciled event means for the caller.
#[derive(Debug)]
pub enum NavigationUpdate {
    /// The live request succeeded; `current_path` is now the snapshot's path.
    Synced(DirectorySnapshot),
    /// The live request failed or timed out; the target fell back to
    /// `fallback` when there was a current directory.
    Rejected {
        path: String,
        error: ClientError,
        fallback: Option<String>,
    },
    /// Error not tied to a request. State is unchanged.
    Notice(ErrorCategory),
    /// The channel is gone.
    SessionFailed(ClientError),
}

/// Navigation state machine over an [`EnvelopeSink`].
pub struct Navigator<S: EnvelopeSink> {
    sink: S,
    state: NavigationState,
    live: Option<LiveRequest>,
    next_sequence: u64,
    request_timeout: Duration,
}

impl<S: EnvelopeSink> Navigator<S> {
    pub fn new(sink: S, start_path: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            sink,
            state: NavigationState::new(start_path),
            live: None,
            next_sequence: 1,
            request_timeout,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn current_path(&self) -> Option<&str> {
        self.state.current_path.as_deref()
    }

    pub fn target_path(&self) -> &str {
        &self.state.target_path
    }

    /// Whether a request is waiting for its reply.
    pub fn is_pending(&self) -> bool {
        self.live.is_some()
    }

    /// Request a listing of `path`, superseding any pending request.
    ///
    /// Returns the request's sequence number without waiting for a reply.
    pub fn navigate(&mut self, path: &str) -> ClientResult<u64> {
        if !path.starts_with('/') {
            return Err(ClientError::Validation(format!(
                "path must be absolute: {}",
                path
            )));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let envelope = Envelope::new(
            sequence,
            Message::ListDirectory(ListDirectory {
                path: path.to_string(),
            }),
        );
        self.sink.dispatch(envelope)?;

        if let Some(previous) = &self.live {
            tracing::debug!(
                superseded = previous.sequence,
                path = %previous.path,
                "request superseded"
            );
        }
        tracing::debug!(sequence, path, "navigate");

        self.state.target_path = path.to_string();
        self.live = Some(LiveRequest {
            sequence,
            path: path.to_string(),
            issued_at: Instant::now(),
        });
        Ok(sequence)
    }

    /// Re-list the current directory. No-op without one.
    pub fn refresh(&mut self) -> ClientResult<Option<u64>> {
        match self.state.current_path.clone() {
            Some(path) => self.navigate(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Navigate to the parent of the current directory.
    ///
    /// Disabled at the root and before the first listing.
    pub fn go_up(&mut self) -> ClientResult<Option<u64>> {
        match self.state.current_path.as_deref().and_then(parent_path) {
            Some(parent) => self.navigate(&parent).map(Some),
            None => Ok(None),
        }
    }

    /// Whether `go_up` would do anything.
    pub fn can_go_up(&self) -> bool {
        self.state
            .current_path
            .as_deref()
            .and_then(parent_path)
            .is_some()
    }

    fn is_live(&self, sequence: u64, reply_path: &str) -> bool {
        match &self.live {
            Some(live) if sequence == UNCORRELATED_SEQUENCE => {
                reply_path == self.state.target_path && reply_path == live.path
            }
            Some(live) => sequence == live.sequence,
            None => false,
        }
    }

    fn revert(&mut self) -> Option<String> {
        self.live = None;
        let fallback = self.state.current_path.clone();
        if let Some(current) = &fallback {
            self.state.target_path = current.clone();
        }
        fallback
    }

    /// Reconcile one inbound event.
    ///
    /// Returns `None` for replies that do not address the live request.
    pub fn apply(&mut self, event: InboundEvent) -> Option<NavigationUpdate> {
        match event {
            InboundEvent::Listing { sequence, response } => self.apply_listing(sequence, response),
            InboundEvent::GeneralError { code, .. } => {
                let category = protocol::classify(code);
                tracing::info!(code, ?category, "server notice");
                Some(NavigationUpdate::Notice(category))
            }
            InboundEvent::Failed(error) => {
                self.live = None;
                Some(NavigationUpdate::SessionFailed(error))
            }
        }
    }

    fn apply_listing(
        &mut self,
        sequence: u64,
        response: ListDirectoryResponse,
    ) -> Option<NavigationUpdate> {
        if !self.is_live(sequence, &response.directory_path) {
            tracing::debug!(
                sequence,
                path = %response.directory_path,
                "discarding stale reply"
            );
            return None;
        }

        let path = self.state.target_path.clone();
        match response.result {
            ListingResult::DirectoryLayout(layout) => {
                self.live = None;
                self.state.current_path = Some(path.clone());
                tracing::debug!(sequence, path = %path, entries = layout.files.len(), "synced");
                Some(NavigationUpdate::Synced(DirectorySnapshot {
                    path,
                    entries: layout.files.into_iter().map(DirectoryEntry::from).collect(),
                }))
            }
            ListingResult::ErrorResponse(error) => {
                let fallback = self.revert();
                tracing::info!(sequence, path = %path, code = error.error_code, "listing rejected");
                Some(NavigationUpdate::Rejected {
                    path,
                    error: ClientError::from_code(error.error_code),
                    fallback,
                })
            }
        }
    }

    /// When the live request times out, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.live
            .as_ref()
            .map(|live| live.issued_at + self.request_timeout)
    }

    /// Give up on the live request if its deadline has passed by `now`.
    pub fn expire(&mut self, now: Instant) -> Option<NavigationUpdate> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        let path = self.state.target_path.clone();
        let fallback = self.revert();
        tracing::warn!(path = %path, "directory request timed out");
        Some(NavigationUpdate::Rejected {
            error: ClientError::RequestTimeout { path: path.clone() },
            path,
            fallback,
        })
    }
}

/// Parent directory of an absolute path. `None` at the root.
pub fn parent_path(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some(ROOT_PATH.to_string()),
        Some(index) => Some(trimmed[..index].to_string()),
        None => None,
    }
}

/// Resolve `name` against `base`: absolute names win, `..` goes up.
pub fn join_path(base: &str, name: &str) -> String {
    if name.starts_with('/') {
        return name.to_string();
    }
    if name == ".." {
        return parent_path(base).unwrap_or_else(|| ROOT_PATH.to_string());
    }
    if name.is_empty() || name == "." {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), name.trim_end_matches('/'))
}
