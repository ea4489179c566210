/*
 * Alex - A Minecraft Launcher SDK
 * Copyright (C) 2024 Alex SDK contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{bail, Result};
use futures_util::StreamExt;
use log::warn;
use reqwest::{header, redirect, Client, StatusCode};
use std::{
    fs, fs::File, io::{Read, Write}, path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering}, time::Duration
};
use url::Url;

use crate::Error;

const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_REDIRECT_HOPS: usize = 10;

/// Default bound on in-flight fetches in a batch.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Per-file byte progress: `(bytes_downloaded, total_bytes, percent)`.
///
/// `total_bytes` is 0 when the server sends no Content-Length.
pub type ByteProgress = dyn Fn(u64, u64, u8) + Send + Sync;

pub struct DownloadRequest {
    pub url: String,
    pub dest: PathBuf,
    pub sha1: Option<String>
}

impl DownloadRequest {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(url: S, dest: P) -> Self {
        DownloadRequest {
            url: url.into(),
            dest: dest.into(),
            sha1: None
        }
    }

    pub fn with_sha1<S: Into<String>>(mut self, sha1: S) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }
}

pub struct DownloadStatus {
    pub url: String,
    pub dest: PathBuf,
    pub error: Option<String>
}

impl DownloadStatus {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct BatchReport {
    pub success: usize,
    pub failed: usize,
    pub results: Vec<DownloadStatus>
}

pub struct Downloader {
    client: Client
}

impl Downloader {
    pub fn new() -> Self {
        Downloader {
            client: Client::builder()
                // redirects are followed by hand so progress and hash
                // verification carry into the resolved URL
                .redirect(redirect::Policy::none())
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("failed to build HTTP client")
        }
    }

    /// Fetch a single file, verifying against `sha1` when provided.
    ///
    /// An existing destination that already matches the expected hash is
    /// accepted without network I/O. On any failure the partial file is
    /// removed before the error is returned.
    pub async fn fetch(&self, request: &DownloadRequest, progress: Option<&ByteProgress>) -> Result<()> {
        if let Some(expected) = &request.sha1 {
            if request.dest.is_file() && file_sha1(&request.dest)?.eq_ignore_ascii_case(expected) {
                return Ok(());
            }
        }

        if let Some(parent) = request.dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let response = self.get_following_redirects(&request.url).await?;

        match self.stream_to_file(response, request, progress).await {
            Ok(()) => Ok(()),
            Err(error) => {
                let _ = fs::remove_file(&request.dest);
                Err(error)
            }
        }
    }

    /// Fetch a batch with at most `max_concurrent` transfers in flight.
    ///
    /// A slot freed by one completion is immediately filled by the next
    /// pending request, and one failure never cancels its peers.
    /// `on_complete` fires after each request settles with
    /// `(completed, total)` counts.
    pub async fn fetch_all(
        &self,
        requests: Vec<DownloadRequest>,
        max_concurrent: usize,
        on_complete: impl Fn(usize, usize) + Sync
    ) -> BatchReport {
        let total = requests.len();
        let completed = AtomicUsize::new(0);

        let results: Vec<DownloadStatus> = futures_util::stream::iter(
            requests.into_iter().map(|request| {
                let completed = &completed;
                let on_complete = &on_complete;

                async move {
                    let result = self.fetch(&request, None).await;

                    if let Err(error) = &result {
                        warn!("Download of '{url}' failed: {error:#}", url = request.url);
                    }

                    on_complete(completed.fetch_add(1, Ordering::SeqCst) + 1, total);

                    DownloadStatus {
                        url: request.url,
                        dest: request.dest,
                        error: result.err().map(|e| format!("{e:#}"))
                    }
                }
            }))
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await;

        let success = results.iter().filter(|r| r.is_success()).count();

        BatchReport {
            success,
            failed: total - success,
            results
        }
    }

    /// Fetch a text document, following redirects with the same policy as
    /// file downloads.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get_following_redirects(url).await?;

        Ok(response.text().await?)
    }

    pub async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.fetch_text(url).await?;

        Ok(serde_json::from_str(&text)?)
    }

    async fn get_following_redirects(&self, url: &str) -> Result<reqwest::Response> {
        let mut url = url.to_string();

        for _ in 0..MAX_REDIRECT_HOPS {
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(error) if error.is_timeout() => bail!(Error::Timeout(url)),
                Err(error) => return Err(error.into())
            };

            let status = response.status();

            if is_redirect(status) {
                let location = response.headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(Error::Transport { status: status.as_u16(), url: url.clone() })?;

                // Location may be relative, resolve against the current URL
                url = Url::parse(&url)?.join(location)?.to_string();
                continue;
            }

            if !status.is_success() {
                bail!(Error::Transport { status: status.as_u16(), url });
            }

            return Ok(response);
        }

        bail!("too many redirects fetching '{url}'")
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        request: &DownloadRequest,
        progress: Option<&ByteProgress>
    ) -> Result<()> {
        let total = response.content_length().unwrap_or(0);
        let mut hasher = request.sha1.as_ref().map(|_| sha1_smol::Sha1::new());
        let mut file = File::create(&request.dest)?;
        let mut downloaded: u64 = 0;

        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) if error.is_timeout() => bail!(Error::Timeout(request.url.clone())),
                Err(error) => return Err(error.into())
            };

            file.write_all(&chunk)?;

            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }

            downloaded += chunk.len() as u64;

            if let Some(progress) = progress {
                let percent = if total > 0 { (downloaded * 100 / total) as u8 } else { 0 };
                progress(downloaded, total, percent);
            }
        }

        file.flush()?;

        if let (Some(hasher), Some(expected)) = (hasher, &request.sha1) {
            let actual = hasher.digest().to_string();

            if !actual.eq_ignore_ascii_case(expected) {
                bail!(Error::Integrity {
                    path: request.dest.clone(),
                    expected: expected.clone(),
                    actual
                });
            }
        }

        Ok(())
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Hex SHA-1 of a file's contents.
pub(crate) fn file_sha1(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = sha1_smol::Sha1::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.digest().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{not_found_response, ok_response, redirect_response, spawn_server};

    const HELLO_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    #[test]
    fn file_sha1_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, "hello world").unwrap();

        assert_eq!(file_sha1(&path).unwrap(), HELLO_SHA1);
    }

    #[tokio::test]
    async fn verified_file_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, "hello world").unwrap();

        // the URL is unreachable on purpose: a hash hit must not touch it
        let request = DownloadRequest::new("http://127.0.0.1:1/hello.txt", &path)
            .with_sha1(HELLO_SHA1.to_uppercase());

        Downloader::new().fetch(&request, None).await.unwrap();
    }

    #[tokio::test]
    async fn batch_reports_verified_hits() {
        let dir = tempfile::tempdir().unwrap();

        let requests: Vec<DownloadRequest> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("{i}.txt"));
                fs::write(&path, "hello world").unwrap();
                DownloadRequest::new(format!("http://127.0.0.1:1/{i}.txt"), path)
                    .with_sha1(HELLO_SHA1)
            })
            .collect();

        let completions = AtomicUsize::new(0);
        let report = Downloader::new()
            .fetch_all(requests, 2, |_, _| { completions.fetch_add(1, Ordering::SeqCst); })
            .await;

        assert_eq!(report.success, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(completions.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn integrity_failure_removes_partial_file() {
        let base = spawn_server(|_| ok_response("something else entirely"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");

        let request = DownloadRequest::new(format!("{base}/hello.txt"), &path)
            .with_sha1(HELLO_SHA1);

        let error = Downloader::new().fetch(&request, None).await.unwrap_err();

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::Integrity { .. })
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn redirect_chain_reaches_terminal_content() {
        let base = spawn_server(|path| match path {
            "/a" => redirect_response("/b"),
            "/b" => redirect_response("/c"),
            "/c" => ok_response("hello world"),
            _ => not_found_response()
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");

        let request = DownloadRequest::new(format!("{base}/a"), &path)
            .with_sha1(HELLO_SHA1);

        let last_progress = std::sync::Arc::new(std::sync::Mutex::new(None));
        let recorder = last_progress.clone();

        Downloader::new()
            .fetch(&request, Some(&move |downloaded, total, percent| {
                *recorder.lock().unwrap() = Some((downloaded, total, percent));
            }))
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello world");
        assert_eq!(*last_progress.lock().unwrap(), Some((11, 11, 100)));
    }

    #[tokio::test]
    async fn http_error_status_is_transport_error() {
        let base = spawn_server(|_| not_found_response());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");

        let request = DownloadRequest::new(format!("{base}/missing.txt"), &path);
        let error = Downloader::new().fetch(&request, None).await.unwrap_err();

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::Transport { status: 404, .. })
        ));
        assert!(!path.exists());
    }
}
