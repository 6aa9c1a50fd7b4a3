//! Concurrent static file upload
//!
//! Files are enumerated up front, queued into a pre-sized channel that is
//! closed once full, and drained by a fixed pool of workers. Each worker
//! retries a failing file on its own budget, rewinding the file handle before
//! every retry. The coordinator collects exactly one result per file.

use crate::client::{RetryConfig, StorageClient};
use crate::error::{CloudError, Result};
use crate::fingerprint::{Fingerprint, hash_file};
use crate::progress::UploadProgress;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncSeekExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

pub const DEFAULT_WORKERS: usize = 5;

/// Upload tuning
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Size of the worker pool
    pub workers: usize,

    /// Retry budget for each file
    pub retry: RetryConfig,

    /// Hide the progress bar
    pub silent: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            retry: RetryConfig::default(),
            silent: false,
        }
    }
}

/// A regular, non-empty file waiting to be uploaded
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFile {
    pub path: PathBuf,
    /// `/`-separated path relative to the static directory
    pub relative_path: String,
    pub content_type: String,
}

/// Result of scanning the static directory
#[derive(Debug, Default)]
pub struct Scan {
    pub files: Vec<StaticFile>,
    pub empty: Vec<String>,
    pub fingerprints: Vec<Fingerprint>,
}

/// Walk `dir` and collect what has to be uploaded
///
/// Symbolic links are skipped. Zero-byte files are fingerprinted but not
/// uploaded.
pub fn scan(dir: &Path) -> Result<Scan> {
    let mut scan = Scan::default();

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if entry.path_is_symlink() {
            tracing::debug!("Skipping symlink {}", entry.path().display());
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative_path = relative_name(dir, path);
        let hash = hash_file(path).map_err(|e| CloudError::Upload {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        scan.fingerprints.push(Fingerprint::new(&relative_path, hash));

        if entry.metadata()?.len() == 0 {
            tracing::debug!("Skipping empty file {}", relative_path);
            scan.empty.push(relative_path);
            continue;
        }

        scan.files.push(StaticFile {
            path: path.to_path_buf(),
            content_type: mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            relative_path,
        });
    }

    Ok(scan)
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Object key of a file under the deploy prefix
pub fn object_key(prefix: &str, relative_path: &str) -> String {
    if prefix.is_empty() {
        relative_path.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), relative_path)
    }
}

/// Outcome of an upload run
#[derive(Debug, Clone, Default)]
pub struct UploadSummary {
    /// Files accounted as uploaded, empty files included
    pub uploaded: usize,

    /// Zero-byte files that needed no network call
    pub skipped_empty: usize,

    /// Fingerprints of every file in the directory
    pub fingerprints: Vec<Fingerprint>,
}

struct Job {
    file: StaticFile,
    key: String,
}

pub struct UploadPipeline {
    storage: Arc<dyn StorageClient>,
    options: UploadOptions,
}

impl UploadPipeline {
    pub fn new(storage: Arc<dyn StorageClient>, options: UploadOptions) -> Self {
        Self { storage, options }
    }

    /// Upload every file below `local_dir` into `bucket` under `prefix`
    ///
    /// Returns on the first file that fails after its retries. Every worker
    /// has been cancelled and joined by the time this returns.
    pub async fn upload(&self, local_dir: &Path, bucket: &str, prefix: &str) -> Result<UploadSummary> {
        let dir = local_dir.to_path_buf();
        let scan = tokio::task::spawn_blocking(move || scan(&dir))
            .await
            .map_err(|e| CloudError::Upload {
                path: local_dir.to_path_buf(),
                message: e.to_string(),
            })??;

        let total = scan.files.len();
        let skipped_empty = scan.empty.len();
        tracing::info!(
            "Uploading {} files to bucket {} ({} empty files skipped)",
            total,
            bucket,
            skipped_empty
        );

        let mut summary = UploadSummary {
            uploaded: skipped_empty,
            skipped_empty,
            fingerprints: scan.fingerprints,
        };
        if total == 0 {
            return Ok(summary);
        }

        let (job_tx, job_rx) = mpsc::channel::<Job>(total);
        for file in scan.files {
            let key = object_key(prefix, &file.relative_path);
            job_tx
                .try_send(Job { file, key })
                .map_err(|e| CloudError::Upload {
                    path: local_dir.to_path_buf(),
                    message: format!("failed to queue upload: {}", e),
                })?;
        }
        drop(job_tx);

        let jobs = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<Result<String>>(total);
        let cancel = CancellationToken::new();
        let mut workers = JoinSet::new();

        for worker_id in 0..self.options.workers.clamp(1, total) {
            workers.spawn(worker(
                worker_id,
                self.storage.clone(),
                bucket.to_string(),
                jobs.clone(),
                result_tx.clone(),
                self.options.retry.clone(),
                cancel.clone(),
            ));
        }
        drop(result_tx);

        let progress = UploadProgress::new(total, self.options.silent);
        let mut first_error = None;
        for _ in 0..total {
            match result_rx.recv().await {
                Some(Ok(key)) => {
                    progress.inc();
                    tracing::debug!("Uploaded {}", key);
                }
                Some(Err(e)) => {
                    first_error = Some(e);
                    break;
                }
                None => {
                    first_error = Some(CloudError::Upload {
                        path: local_dir.to_path_buf(),
                        message: "upload workers exited before every file was reported".to_string(),
                    });
                    break;
                }
            }
        }

        if first_error.is_some() {
            cancel.cancel();
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Upload worker terminated abnormally: {}", e);
            }
        }

        if let Some(e) = first_error {
            progress.finish_error(&e.to_string());
            return Err(e);
        }

        progress.finish_success();
        summary.uploaded += progress.done();
        Ok(summary)
    }
}

async fn worker(
    worker_id: usize,
    storage: Arc<dyn StorageClient>,
    bucket: String,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<Result<String>>,
    retry: RetryConfig,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            tracing::debug!("Upload worker {} cancelled", worker_id);
            break;
        }

        let job = jobs.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        let result = upload_file(storage.as_ref(), &bucket, &job, &retry, &cancel).await;
        let failed = result.is_err();
        if results.send(result.map(|()| job.key)).await.is_err() || failed {
            break;
        }
    }
}

/// Upload one file, retrying on its own budget
async fn upload_file(
    storage: &dyn StorageClient,
    bucket: &str,
    job: &Job,
    retry: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let upload_error = |message: String| CloudError::Upload {
        path: job.file.path.clone(),
        message,
    };

    let mut content = File::open(&job.file.path)
        .await
        .map_err(|e| upload_error(e.to_string()))?;
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match storage
            .put_object(bucket, &job.key, &mut content, &job.file.content_type)
            .await
        {
            Ok(()) => return Ok(()),
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    "Upload of {} failed (attempt {}/{}): {}",
                    job.key,
                    attempt,
                    max_attempts,
                    e
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(CloudError::Cancelled),
                    _ = tokio::time::sleep(retry.delay_for(attempt)) => {}
                }
                content
                    .seek(SeekFrom::Start(0))
                    .await
                    .map_err(|e| upload_error(e.to_string()))?;
                attempt += 1;
            }
            Err(e) => {
                return Err(upload_error(format!("{} (after {} attempts)", e, attempt)));
            }
        }
    }
}
