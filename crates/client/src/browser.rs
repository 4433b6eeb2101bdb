//! Reconciliation loop over an open channel.
//!
//! A [`Browser`] owns the [`Connection`] and the [`Navigator`] driving it.
//! [`Browser::next_update`] waits for the next inbound event or the live
//! request's deadline, whichever comes first, and reconciles it. Credential
//! notices from the server end the session.

use protocol::ErrorCategory;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionHandle, ConnectionState, InboundEvent};
use crate::error::{ClientError, ClientResult};
use crate::navigation::{NavigationState, NavigationUpdate, Navigator};

/// Interactive directory browser bound to one channel.
pub struct Browser {
    connection: Connection,
    navigator: Navigator<ConnectionHandle>,
    failed: bool,
}

enum Wake {
    Event(Option<InboundEvent>),
    Deadline,
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

impl Browser {
    /// Wrap an open connection. No request is sent yet.
    pub fn new(connection: Connection, config: &ClientConfig) -> Self {
        let navigator = Navigator::new(
            connection.handle(),
            config.ui.start_path.clone(),
            config.connection.request_timeout(),
        );
        Self {
            connection,
            navigator,
            failed: false,
        }
    }

    pub fn state(&self) -> &NavigationState {
        self.navigator.state()
    }

    pub fn current_path(&self) -> Option<&str> {
        self.navigator.current_path()
    }

    pub fn target_path(&self) -> &str {
        self.navigator.target_path()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub fn navigate(&mut self, path: &str) -> ClientResult<u64> {
        self.ensure_alive()?;
        self.navigator.navigate(path)
    }

    pub fn refresh(&mut self) -> ClientResult<Option<u64>> {
        self.ensure_alive()?;
        self.navigator.refresh()
    }

    pub fn go_up(&mut self) -> ClientResult<Option<u64>> {
        self.ensure_alive()?;
        self.navigator.go_up()
    }

    pub fn can_go_up(&self) -> bool {
        !self.failed && self.navigator.can_go_up()
    }

    fn ensure_alive(&self) -> ClientResult<()> {
        if self.failed {
            Err(ClientError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Wait for the next update.
    ///
    /// Returns `None` once the session has failed and nothing more will
    /// arrive.
    pub async fn next_update(&mut self) -> Option<NavigationUpdate> {
        if self.failed {
            return None;
        }

        loop {
            let deadline = self.navigator.deadline();
            let wake = tokio::select! {
                event = self.connection.next_event() => Wake::Event(event),
                _ = wait_for(deadline) => Wake::Deadline,
            };

            let update = match wake {
                Wake::Deadline => self.navigator.expire(Instant::now()),
                Wake::Event(Some(event)) => self.navigator.apply(event),
                Wake::Event(None) => Some(NavigationUpdate::SessionFailed(
                    ClientError::ConnectionClosed,
                )),
            };

            let Some(update) = update else {
                continue;
            };

            return Some(match update {
                NavigationUpdate::Notice(category) if category.is_credential_failure() => {
                    tracing::warn!(?category, "credential rejected by server");
                    self.failed = true;
                    self.connection.handle().abandon().await;
                    NavigationUpdate::SessionFailed(ClientError::Server(category))
                }
                NavigationUpdate::SessionFailed(error) => {
                    self.failed = true;
                    NavigationUpdate::SessionFailed(error)
                }
                other => other,
            });
        }
    }

    /// Navigate and wait until that request is settled.
    ///
    /// Notices that arrive meanwhile are logged and skipped.
    pub async fn navigate_and_wait(&mut self, path: &str) -> ClientResult<NavigationUpdate> {
        self.navigate(path)?;
        self.settle().await
    }

    /// Wait for the update that settles the live request.
    pub async fn settle(&mut self) -> ClientResult<NavigationUpdate> {
        if !self.navigator.is_pending() {
            return Err(ClientError::Validation("no request pending".to_string()));
        }
        loop {
            match self.next_update().await {
                Some(NavigationUpdate::Notice(category)) => {
                    tracing::info!(?category, "ignoring notice while waiting");
                }
                Some(update) => return Ok(update),
                None => return Err(ClientError::ConnectionClosed),
            }
        }
    }

    /// Whether the session failed on a credential error.
    pub fn failed_on_credential(update: &NavigationUpdate) -> bool {
        matches!(
            update,
            NavigationUpdate::SessionFailed(ClientError::Server(
                ErrorCategory::CookieExpired | ErrorCategory::CookieInvalid
            ))
        )
    }

    /// Close the channel.
    pub async fn close(self) {
        self.connection.close().await;
    }
}
