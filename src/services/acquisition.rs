// src/services/acquisition.rs

//! Archive download service.
//!
//! Files are fetched one at a time. Each attempt streams into its own
//! `<name>.part<N>` sibling and races the attempt timeout; only a complete
//! transfer is renamed onto the destination and extracted next to it. A file
//! that is already present is trusted and skipped.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{AcquisitionConfig, BatchReport, FileOutcome};
use crate::storage::local::remove_quietly;

/// Moves a remote body into a local file.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write the body of `url` to `dest`, returning the number of bytes written.
    async fn download(&self, url: &Url, dest: &Path) -> Result<u64>;
}

/// [`Transport`] over HTTP(S) GET.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn download(&self, url: &Url, dest: &Path) -> Result<u64> {
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        let mut body = response.bytes_stream();
        let mut file = tokio::fs::File::create(dest).await?;

        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// Sequential, bounded-retry archive downloader.
pub struct Downloader<T: Transport> {
    transport: T,
    base_url: Url,
    max_attempts: u32,
    attempt_timeout: Duration,
}

impl Downloader<HttpTransport> {
    /// Downloader over HTTP configured from `config`.
    pub fn from_config(config: &AcquisitionConfig, client: Client) -> Result<Self> {
        Self::new(
            HttpTransport::new(client),
            &config.base_url,
            config.max_attempts,
            config.attempt_timeout(),
        )
    }
}

impl<T: Transport> Downloader<T> {
    /// Create a downloader. Fails if `base_url` is not an absolute URL.
    pub fn new(
        transport: T,
        base_url: &str,
        max_attempts: u32,
        attempt_timeout: Duration,
    ) -> Result<Self> {
        // Trailing slash so joining appends instead of replacing the last segment.
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        Ok(Self {
            transport,
            base_url,
            max_attempts: max_attempts.max(1),
            attempt_timeout,
        })
    }

    /// URL of a candidate file.
    pub fn url_for(&self, file_name: &str) -> Result<Url> {
        Ok(self.base_url.join(file_name)?)
    }

    /// Download every candidate into `dest_dir`, in order.
    ///
    /// Only an unusable destination directory is an error; failed files are
    /// reported in the returned [`BatchReport`].
    pub async fn fetch_all(&self, file_names: &[String], dest_dir: &Path) -> Result<BatchReport> {
        prepare_dir(dest_dir).await?;

        let total = file_names.len();
        let mut report = BatchReport::default();
        for (index, file_name) in file_names.iter().enumerate() {
            log::info!("Downloading file {}/{}: {}", index + 1, total, file_name);
            let outcome = match self.url_for(file_name) {
                Ok(url) => self.fetch_one(&url, &dest_dir.join(file_name)).await,
                Err(e) => FileOutcome::failed(file_name.as_str(), 0, e),
            };
            report.push(outcome);
        }
        Ok(report)
    }

    /// Fetch one archive to `dest` and extract it into the same directory.
    pub async fn fetch_one(&self, url: &Url, dest: &Path) -> FileOutcome {
        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());

        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            log::info!("Skipping {}: already downloaded", file_name);
            return FileOutcome::skipped(file_name);
        }

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            let part = part_path(dest, attempt);
            match self.attempt(url, &part, dest).await {
                Ok(bytes) => {
                    log::info!(
                        "Downloaded {} ({} bytes, attempt {}/{})",
                        file_name,
                        bytes,
                        attempt,
                        self.max_attempts
                    );
                    return FileOutcome::completed(file_name, attempt);
                }
                Err(e) => {
                    remove_quietly(&part).await;
                    if attempt < self.max_attempts {
                        log::warn!(
                            "Attempt {}/{} for {} failed: {}. Retrying",
                            attempt,
                            self.max_attempts,
                            file_name,
                            e
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        log::error!(
            "Giving up on {} after {} attempts: {}",
            file_name,
            self.max_attempts,
            reason
        );
        FileOutcome::failed(file_name, self.max_attempts, reason)
    }

    /// One transfer into `part`, then publish to `dest` and extract.
    async fn attempt(&self, url: &Url, part: &Path, dest: &Path) -> Result<u64> {
        let bytes = match tokio::time::timeout(
            self.attempt_timeout,
            self.transport.download(url, part),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(AppError::timeout(
                    format!("downloading {url}"),
                    self.attempt_timeout,
                ));
            }
        };

        tokio::fs::rename(part, dest).await?;

        let archive = dest.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extract_archive(&archive)).await;
        match extracted {
            Ok(Ok(entries)) => {
                log::debug!("Extracted {} entries from {}", entries, dest.display());
                Ok(bytes)
            }
            Ok(Err(e)) => {
                // A broken archive must not be trusted by the skip-if-present check.
                remove_quietly(dest).await;
                Err(e)
            }
            Err(e) => {
                remove_quietly(dest).await;
                Err(e.into())
            }
        }
    }
}

/// Create `dir` if needed and make sure it is a directory.
async fn prepare_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        AppError::setup(format!(
            "cannot use destination directory {}: {}",
            dir.display(),
            e
        ))
    })
}

/// Temp path for the given attempt.
fn part_path(dest: &Path, attempt: u32) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".part{attempt}"));
    dest.with_file_name(name)
}

/// Extract every entry of a zip archive into the archive's own directory,
/// overwriting existing files. Returns the number of files written.
///
/// Entries are decoded into `.tmp` siblings first and only renamed into
/// place once every entry passed its checksum. On failure no partially
/// extracted file is left under an input name.
pub fn extract_archive(archive_path: &Path) -> Result<usize> {
    let target = archive_path.parent().unwrap_or_else(|| Path::new("."));
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
    if let Err(e) = stage_entries(&mut archive, target, &mut staged) {
        for (tmp, _) in &staged {
            let _ = std::fs::remove_file(tmp);
        }
        return Err(e);
    }

    let mut published = 0;
    for (tmp, out_path) in &staged {
        if let Err(e) = std::fs::rename(tmp, out_path) {
            for (_, out_path) in &staged[..published] {
                let _ = std::fs::remove_file(out_path);
            }
            for (tmp, _) in &staged[published..] {
                let _ = std::fs::remove_file(tmp);
            }
            return Err(e.into());
        }
        published += 1;
    }
    Ok(published)
}

/// Decode every file entry into its `.tmp` sibling, recording each temp in
/// `staged` as soon as it is created.
fn stage_entries(
    archive: &mut zip::ZipArchive<File>,
    target: &Path,
    staged: &mut Vec<(PathBuf, PathBuf)>,
) -> Result<()> {
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            log::warn!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let out_path = target.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp_name = out_path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = out_path.with_file_name(tmp_name);

        let mut out = File::create(&tmp)?;
        staged.push((tmp, out_path));
        // The checksum is verified when the entry is read to its end.
        io::copy(&mut entry, &mut out)?;
        out.sync_all()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Fails a fixed number of times, then serves `body`.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
        body: Vec<u8>,
    }

    impl FlakyTransport {
        fn new(failures: u32, body: Vec<u8>) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                body,
            }
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn download(&self, url: &Url, dest: &Path) -> Result<u64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            // Leave a partial file behind, like an interrupted transfer would.
            tokio::fs::write(dest, b"PK partial").await?;
            if call <= self.failures {
                return Err(AppError::fetch(url.as_str(), "connection reset"));
            }
            tokio::fs::write(dest, &self.body).await?;
            Ok(self.body.len() as u64)
        }
    }

    /// Never finishes within any reasonable timeout.
    struct StalledTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for StalledTransport {
        async fn download(&self, _url: &Url, dest: &Path) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(dest, b"PK").await?;
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(2)
        }
    }

    fn downloader<T: Transport>(transport: T) -> Downloader<T> {
        Downloader::new(
            transport,
            "http://data.example.org/events",
            3,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn leftover_parts(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".part"))
            .count()
    }

    #[test]
    fn test_url_for_appends_to_base() {
        let d = downloader(FlakyTransport::new(0, Vec::new()));
        assert_eq!(
            d.url_for("20130401.export.CSV.zip").unwrap().as_str(),
            "http://data.example.org/events/20130401.export.CSV.zip"
        );
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let tmp = TempDir::new().unwrap();
        let body = zip_bytes(&[("20130401.export.CSV", "row\n")]);
        let d = downloader(FlakyTransport::new(2, body));
        let dest = tmp.path().join("20130401.export.CSV.zip");

        let outcome = d.fetch_one(&d.url_for("20130401.export.CSV.zip").unwrap(), &dest).await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(d.transport.calls.load(Ordering::SeqCst), 3);
        assert!(dest.exists());
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("20130401.export.CSV")).unwrap(),
            "row\n"
        );
        assert_eq!(leftover_parts(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let tmp = TempDir::new().unwrap();
        let d = downloader(FlakyTransport::new(10, Vec::new()));
        let dest = tmp.path().join("20130402.export.CSV.zip");

        let outcome = d.fetch_one(&d.url_for("20130402.export.CSV.zip").unwrap(), &dest).await;

        assert!(outcome.is_failed());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(d.transport.calls.load(Ordering::SeqCst), 3);
        assert!(!dest.exists());
        assert_eq!(leftover_parts(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_existing_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("20130403.export.CSV.zip");
        std::fs::write(&dest, b"already here").unwrap();
        let d = downloader(FlakyTransport::new(0, Vec::new()));

        let outcome = d.fetch_one(&d.url_for("20130403.export.CSV.zip").unwrap(), &dest).await;

        assert!(outcome.is_skipped());
        assert_eq!(d.transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(&dest).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_attempt() {
        let tmp = TempDir::new().unwrap();
        let d = Downloader::new(
            StalledTransport {
                calls: AtomicU32::new(0),
            },
            "http://data.example.org/events",
            2,
            Duration::from_millis(50),
        )
        .unwrap();
        let dest = tmp.path().join("20130404.export.CSV.zip");

        let outcome = d.fetch_one(&d.url_for("20130404.export.CSV.zip").unwrap(), &dest).await;

        assert!(outcome.is_failed());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(d.transport.calls.load(Ordering::SeqCst), 2);
        assert!(!dest.exists());
        assert_eq!(leftover_parts(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_retried_and_removed() {
        let tmp = TempDir::new().unwrap();
        let d = downloader(FlakyTransport::new(0, b"not a zip".to_vec()));
        let dest = tmp.path().join("20130405.export.CSV.zip");

        let outcome = d.fetch_one(&d.url_for("20130405.export.CSV.zip").unwrap(), &dest).await;

        assert!(outcome.is_failed());
        assert_eq!(d.transport.calls.load(Ordering::SeqCst), 3);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_checksum_failure_leaves_no_extracted_file() {
        let tmp = TempDir::new().unwrap();
        let mut body = zip_bytes(&[("20130401.export.CSV", "GOODROW1\nGOODROW2\nGOODROW3\n")]);
        let at = body
            .windows(8)
            .position(|w| w == b"GOODROW3")
            .unwrap();
        body[at] = b'X';
        let d = downloader(FlakyTransport::new(0, body));
        let dest = tmp.path().join("20130401.export.CSV.zip");

        let outcome = d.fetch_one(&d.url_for("20130401.export.CSV.zip").unwrap(), &dest).await;

        assert!(outcome.is_failed());
        assert!(!dest.exists());
        assert!(!tmp.path().join("20130401.export.CSV").exists());
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
    }

    #[test]
    fn test_failed_extraction_keeps_previous_file() {
        let tmp = TempDir::new().unwrap();
        let mut body = zip_bytes(&[("20130402.export.CSV", "NEWROW1\nNEWROW2\n")]);
        let at = body.windows(7).position(|w| w == b"NEWROW2").unwrap();
        body[at] = b'X';
        let archive = tmp.path().join("20130402.export.CSV.zip");
        std::fs::write(&archive, body).unwrap();
        std::fs::write(tmp.path().join("20130402.export.CSV"), "previous").unwrap();

        assert!(extract_archive(&archive).is_err());
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("20130402.export.CSV")).unwrap(),
            "previous"
        );
        assert!(!tmp.path().join("20130402.export.CSV.tmp").exists());
    }

    #[tokio::test]
    async fn test_fetch_all_reports_per_file() {
        let tmp = TempDir::new().unwrap();
        let body = zip_bytes(&[("20130406.export.CSV", "a\n")]);
        let d = downloader(FlakyTransport::new(0, body));
        std::fs::write(tmp.path().join("20130407.export.CSV.zip"), b"x").unwrap();

        let names = vec![
            "20130406.export.CSV.zip".to_string(),
            "20130407.export.CSV.zip".to_string(),
        ];
        let report = d.fetch_all(&names, tmp.path()).await.unwrap();

        assert_eq!(report.completed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 0);
    }

    #[tokio::test]
    async fn test_unusable_destination_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let d = downloader(FlakyTransport::new(0, Vec::new()));

        let result = d
            .fetch_all(&["20130408.export.CSV.zip".to_string()], &blocker)
            .await;

        assert!(matches!(result, Err(AppError::Setup(_))));
    }

    #[test]
    fn test_extract_overwrites_existing_files() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        std::fs::write(&archive, zip_bytes(&[("a.CSV", "new")])).unwrap();
        std::fs::write(tmp.path().join("a.CSV"), "old contents").unwrap();

        assert_eq!(extract_archive(&archive).unwrap(), 1);
        assert_eq!(std::fs::read_to_string(tmp.path().join("a.CSV")).unwrap(), "new");
    }
}
