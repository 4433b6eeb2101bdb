//! Process-wide session: owner of the credential.
//!
//! The [`Session`] ties the gateway, the cookie jar and the download launcher
//! together. Browsers and transfer coordinators borrow its credential; they
//! never hold one of their own.

use std::sync::Arc;

use protocol::Locale;

use crate::api::ApiClient;
use crate::browser::Browser;
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::credential::{Credential, CredentialOrigin};
use crate::error::{ClientError, ClientResult};
use crate::gateway::CredentialGateway;
use crate::storage::{CookieJar, CredentialBackend};
use crate::transfer::{DownloadLauncher, TransferCoordinator};

pub struct Session<B: CredentialBackend> {
    config: ClientConfig,
    api: ApiClient,
    gateway: CredentialGateway,
    jar: CookieJar<B>,
    credential: Option<Credential>,
    launcher: Arc<dyn DownloadLauncher>,
}

impl<B: CredentialBackend> Session<B> {
    /// Build a session. No I/O happens until a method is called.
    pub fn new(
        config: ClientConfig,
        backend: B,
        launcher: Arc<dyn DownloadLauncher>,
    ) -> ClientResult<Self> {
        config.validate()?;
        let api = ApiClient::new(&config)?;
        let jar = CookieJar::new(backend, api.base());
        Ok(Self {
            gateway: CredentialGateway::new(api.clone()),
            config,
            api,
            jar,
            credential: None,
            launcher,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn jar(&self) -> &CookieJar<B> {
        &self.jar
    }

    pub fn locale(&self) -> Locale {
        self.config.ui.locale
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    fn require_credential(&self) -> ClientResult<&Credential> {
        self.credential.as_ref().ok_or(ClientError::NotAuthenticated)
    }

    /// Resume from the stored cookie.
    ///
    /// `Ok(false)` when no cookie is stored or the server rejected it (the
    /// cookie is then removed). Transport failures and server faults are
    /// returned and the cookie is kept for the next attempt.
    pub async fn restore(&mut self) -> ClientResult<bool> {
        let Some(token) = self.jar.get_token()? else {
            tracing::debug!("no stored credential");
            return Ok(false);
        };

        if self.gateway.login_with_cookie(&token).await? {
            self.credential = Some(Credential::new(token, CredentialOrigin::Cookie));
            Ok(true)
        } else {
            self.jar.remove_cookie()?;
            self.credential = None;
            Ok(false)
        }
    }

    /// Log in and remember the credential.
    ///
    /// A cookie that cannot be persisted is logged; the session still holds
    /// the credential.
    pub async fn login(&mut self, username: &str, password: &str) -> ClientResult<()> {
        let credential = self.gateway.login(username, password).await?;
        if let Err(e) = self.jar.set_cookie(credential.token()) {
            tracing::warn!(error = %e, "could not persist credential");
        }
        self.credential = Some(credential);
        Ok(())
    }

    pub async fn signup(&self, username: &str, password: &str) -> ClientResult<()> {
        self.gateway.signup(username, password).await
    }

    /// Forget the credential locally and on the server.
    ///
    /// Local state is cleared before the server's answer is reported.
    pub async fn logout(&mut self) -> ClientResult<()> {
        let outcome = match self.credential.take() {
            Some(credential) => self.gateway.logout(&credential).await,
            None => Ok(()),
        };
        let removed = self.jar.remove_cookie();
        outcome?;
        removed?;
        Ok(())
    }

    /// Drop the credential after the server rejected it mid-session.
    pub fn invalidate(&mut self) -> ClientResult<()> {
        self.credential = None;
        self.jar.remove_cookie()?;
        tracing::info!("credential discarded");
        Ok(())
    }

    /// Open the channel and request the start directory.
    ///
    /// The first snapshot arrives through [`Browser::next_update`].
    pub async fn open_browser(&self) -> ClientResult<Browser> {
        let credential = self.require_credential()?;
        let connection = Connection::open(&self.config, credential).await?;
        let mut browser = Browser::new(connection, &self.config);
        let start = self.config.ui.start_path.clone();
        browser.navigate(&start)?;
        Ok(browser)
    }

    /// Transfers on behalf of the held credential.
    pub fn transfers(&self) -> ClientResult<TransferCoordinator<'_>> {
        let credential = self.require_credential()?;
        Ok(TransferCoordinator::new(
            &self.api,
            credential,
            self.launcher.as_ref(),
            self.config.transfer.max_upload_size,
        ))
    }
}
