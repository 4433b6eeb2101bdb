//! Transfer Coordinator: uploads, downloads and directory creation.
//!
//! Transfers travel over the request/reply API, not the channel:
//! - Uploads are one MessagePack [`TransferRequest`] holding every file in
//!   full. All-or-nothing, no resumption.
//! - Downloads are a URL handed to a [`DownloadLauncher`]. The coordinator
//!   gets no completion signal.
//! - Directory creation is a JSON POST.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use protocol::http::{
    MakeDirectoryRequest, DOWNLOAD_PATH, DOWNLOAD_PATHS_QUERY, MAKE_DIRECTORY_PATH,
    MULTI_DOWNLOAD_NAME, UPLOAD_PATH,
};
use protocol::{TransferRequest, UploadedFile};
use reqwest::header::COOKIE;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use url::Url;

use crate::api::{interpret_parts, ApiClient};
use crate::credential::Credential;
use crate::error::{ClientError, ClientResult};

/// A download ready to be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Full download URL including the selection.
    pub url: Url,
    /// Name the result should be saved under.
    pub file_name: String,
    /// Remote paths selected.
    pub paths: Vec<String>,
}

impl DownloadRequest {
    pub fn new(base: &Url, paths: &[String]) -> ClientResult<Self> {
        if paths.is_empty() {
            return Err(ClientError::Validation("no paths selected".to_string()));
        }
        let mut url = base
            .join(DOWNLOAD_PATH)
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        url.query_pairs_mut()
            .clear()
            .append_pair(DOWNLOAD_PATHS_QUERY, &paths.join(","));

        let file_name = match paths {
            [single] => file_name_of(single).unwrap_or(MULTI_DOWNLOAD_NAME).to_string(),
            _ => MULTI_DOWNLOAD_NAME.to_string(),
        };

        Ok(Self {
            url,
            file_name,
            paths: paths.to_vec(),
        })
    }
}

fn file_name_of(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

/// Port that starts a download. Implementations must not block.
pub trait DownloadLauncher: Send + Sync {
    fn launch(&self, request: DownloadRequest, credential: &Credential) -> ClientResult<()>;
}

/// Launcher that streams downloads into a local directory.
///
/// Each download runs on its own task; its outcome is only logged.
pub struct HttpDownloadLauncher {
    http: reqwest::Client,
    dir: PathBuf,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HttpDownloadLauncher {
    pub fn new(api: &ApiClient, dir: impl Into<PathBuf>) -> Self {
        Self {
            http: api.http().clone(),
            dir: dir.into(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Fetch one download to `dir`, returning the written path.
    pub async fn fetch(
        http: &reqwest::Client,
        request: &DownloadRequest,
        cookie: &str,
        dir: &Path,
    ) -> ClientResult<PathBuf> {
        let mut response = http
            .get(request.url.clone())
            .header(COOKIE, cookie)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(interpret_parts(status, &body)
                .err()
                .unwrap_or_else(|| ClientError::Unknown(format!("HTTP status {}", status))));
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ClientError::Validation(format!("cannot create {}: {}", dir.display(), e)))?;
        let target = dir.join(&request.file_name);
        let mut file = tokio::fs::File::create(&target)
            .await
            .map_err(|e| ClientError::Validation(format!("cannot create {}: {}", target.display(), e)))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| ClientError::Validation(format!("write failed: {}", e)))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ClientError::Validation(format!("write failed: {}", e)))?;

        tracing::info!(path = %target.display(), bytes = written, "download finished");
        Ok(target)
    }

    /// Wait for every download started so far.
    pub async fn wait_all(&self) {
        let tasks: Vec<_> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => return,
        };
        for task in tasks {
            let _ = task.await;
        }
    }
}

impl DownloadLauncher for HttpDownloadLauncher {
    fn launch(&self, request: DownloadRequest, credential: &Credential) -> ClientResult<()> {
        let http = self.http.clone();
        let dir = self.dir.clone();
        let cookie = credential.cookie_header();

        tracing::info!(paths = ?request.paths, file = %request.file_name, "download started");
        let task = tokio::spawn(async move {
            if let Err(e) = Self::fetch(&http, &request, &cookie, &dir).await {
                tracing::error!(error = %e, file = %request.file_name, "download failed");
            }
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.retain(|t| !t.is_finished());
            tasks.push(task);
        }
        Ok(())
    }
}

/// Bulk transfers on behalf of one credential.
pub struct TransferCoordinator<'a> {
    api: &'a ApiClient,
    credential: &'a Credential,
    launcher: &'a dyn DownloadLauncher,
    max_upload_size: u64,
}

fn require_absolute(path: &str) -> ClientResult<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ClientError::Validation(format!(
            "path must be absolute: {}",
            path
        )))
    }
}

impl<'a> TransferCoordinator<'a> {
    pub fn new(
        api: &'a ApiClient,
        credential: &'a Credential,
        launcher: &'a dyn DownloadLauncher,
        max_upload_size: u64,
    ) -> Self {
        Self {
            api,
            credential,
            launcher,
            max_upload_size,
        }
    }

    fn check_size(&self, size: u64) -> ClientResult<()> {
        if size > self.max_upload_size {
            return Err(ClientError::Validation(format!(
                "upload of {} bytes exceeds the {} byte limit",
                size, self.max_upload_size
            )));
        }
        Ok(())
    }

    /// Upload `files` into `destination_dir` in one request.
    ///
    /// An empty selection sends nothing.
    pub async fn upload(&self, destination_dir: &str, files: Vec<UploadedFile>) -> ClientResult<()> {
        require_absolute(destination_dir)?;
        if files.is_empty() {
            return Ok(());
        }

        let request = TransferRequest::new(destination_dir, files);
        self.check_size(request.content_len())?;

        let body = request.to_msgpack()?;
        tracing::info!(
            dir = destination_dir,
            files = request.uploaded_file.len(),
            bytes = body.len(),
            "uploading"
        );
        self.api
            .post_msgpack(UPLOAD_PATH, body, self.credential)
            .await?;
        Ok(())
    }

    /// Read local files fully, then upload them.
    ///
    /// Each file keeps its last path component as its name.
    pub async fn upload_paths(&self, destination_dir: &str, paths: &[PathBuf]) -> ClientResult<()> {
        require_absolute(destination_dir)?;

        let mut total: u64 = 0;
        for path in paths {
            let metadata = tokio::fs::metadata(path)
                .await
                .map_err(|e| ClientError::Validation(format!("{}: {}", path.display(), e)))?;
            if !metadata.is_file() {
                return Err(ClientError::Validation(format!(
                    "not a regular file: {}",
                    path.display()
                )));
            }
            total += metadata.len();
        }
        self.check_size(total)?;

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    ClientError::Validation(format!("unusable file name: {}", path.display()))
                })?
                .to_string();
            let content = tokio::fs::read(path)
                .await
                .map_err(|e| ClientError::Validation(format!("{}: {}", path.display(), e)))?;
            files.push(UploadedFile { file_name, content });
        }

        self.upload(destination_dir, files).await
    }

    /// Start downloading the selected remote paths.
    ///
    /// Returns once the launcher has the request. An empty selection does
    /// nothing.
    pub fn download(&self, paths: &[String]) -> ClientResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        for path in paths {
            require_absolute(path)?;
        }
        let request = DownloadRequest::new(self.api.base(), paths)?;
        tracing::debug!(url = %request.url, "launching download");
        self.launcher.launch(request, self.credential)
    }

    /// Create a remote directory at `full_path`.
    pub async fn make_directory(&self, full_path: &str) -> ClientResult<()> {
        require_absolute(full_path)?;
        if full_path.trim_end_matches('/').is_empty() {
            return Err(ClientError::Validation("cannot create the root".to_string()));
        }
        let body = MakeDirectoryRequest {
            directory_path: full_path.to_string(),
        };
        self.api
            .post_json(MAKE_DIRECTORY_PATH, &body, Some(self.credential))
            .await?;
        tracing::info!(path = full_path, "directory created");
        Ok(())
    }
}

/// Launcher that only records requests.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<DownloadRequest>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launched(&self) -> Vec<DownloadRequest> {
        self.launched
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}

impl DownloadLauncher for RecordingLauncher {
    fn launch(&self, request: DownloadRequest, _credential: &Credential) -> ClientResult<()> {
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(request);
        }
        Ok(())
    }
}
