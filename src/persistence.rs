//! Writing matches to disk.
//!
//! Each match produces `<name>_<address>.json` (including the secret) and
//! `<name>_<address>.<ext>`, both readable by the owner only. The metadata is
//! written before the render is fetched so an image never exists without its
//! secret next to it.

use crate::errors::{AppError, ResultExt};
use crate::image::{convert_svg, ImageFormat};
use crate::models::Candidate;
use crate::monkey_client::MonkeyApiClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Owner-only directory permissions required on the output directory.
pub const OUTPUT_DIR_MODE: u32 = 0o700;
pub const OUTPUT_FILE_MODE: u32 = 0o600;

/// Creates the output directory if needed and refuses directories that
/// anyone but the owner can access.
pub fn prepare_output_dir(path: &Path) -> Result<PathBuf, AppError> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(OUTPUT_DIR_MODE);
    }
    builder
        .create(path)
        .with_context(|| format!("could not create {}", path.display()))?;

    let path = std::fs::canonicalize(path)
        .with_context(|| format!("could not resolve {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path)
            .with_context(|| format!("could not verify permissions for {}", path.display()))?
            .permissions()
            .mode()
            & 0o777;
        if mode != OUTPUT_DIR_MODE {
            return Err(AppError::Config(format!(
                "{} has permissions {:o}, it must be {:o} so nobody else can read your keys",
                path.display(),
                mode,
                OUTPUT_DIR_MODE
            )));
        }
    }

    Ok(path)
}

async fn write_private_file(path: &Path, data: &[u8]) -> Result<(), AppError> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(OUTPUT_FILE_MODE);

    let mut file = options
        .open(path)
        .await
        .with_context(|| format!("could not open {}", path.display()))?;
    file.write_all(data)
        .await
        .with_context(|| format!("could not write {}", path.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("could not flush {}", path.display()))?;
    Ok(())
}

/// Paths written for one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedMatch {
    pub metadata: PathBuf,
    pub image: PathBuf,
}

/// Shared receiving end of the persistence queue.
pub type PersistQueue = Arc<Mutex<mpsc::Receiver<Candidate>>>;

#[derive(Clone)]
pub struct PersistenceWorker {
    client: MonkeyApiClient,
    output_dir: PathBuf,
    format: ImageFormat,
    image_size: u32,
}

impl PersistenceWorker {
    pub fn new(
        client: MonkeyApiClient,
        output_dir: PathBuf,
        format: ImageFormat,
        image_size: u32,
    ) -> Self {
        Self {
            client,
            output_dir,
            format,
            image_size,
        }
    }

    pub fn paths_for(&self, candidate: &Candidate) -> PersistedMatch {
        let stem = candidate.file_stem();
        PersistedMatch {
            metadata: self.output_dir.join(format!("{}.json", stem)),
            image: self
                .output_dir
                .join(format!("{}.{}", stem, self.format.extension())),
        }
    }

    /// Writes only the metadata file, which holds the address and secret.
    pub async fn save_metadata(&self, candidate: &Candidate) -> Result<PathBuf, AppError> {
        let path = self.paths_for(candidate).metadata;
        let metadata = serde_json::to_vec_pretty(candidate)
            .with_context(|| format!("could not serialize {}", candidate.display_name))?;
        write_private_file(&path, &metadata).await?;
        Ok(path)
    }

    /// Writes the metadata, then fetches, converts and writes the render.
    pub async fn persist(&self, candidate: &Candidate) -> Result<PersistedMatch, AppError> {
        let paths = self.paths_for(candidate);
        self.save_metadata(candidate).await?;

        let svg = self
            .client
            .fetch_svg_with_retry(&candidate.address)
            .await
            .with_context(|| format!("could not fetch render of {}", candidate.display_name))?;

        let format = self.format;
        let size = self.image_size;
        let image = tokio::task::spawn_blocking(move || convert_svg(svg, format, size))
            .await
            .map_err(|e| AppError::ImageConversion(format!("conversion task failed: {}", e)))?
            .with_context(|| format!("could not convert render of {}", candidate.display_name))?;

        write_private_file(&paths.image, &image).await?;
        Ok(paths)
    }

    /// Drains the queue until it is closed and empty.
    ///
    /// Cancellation is not observed while draining: everything accepted onto
    /// the queue is written. The first failure cancels the run; after it the
    /// worker keeps draining but only writes metadata, then returns that
    /// first error.
    pub async fn run(
        self,
        id: usize,
        queue: PersistQueue,
        token: CancellationToken,
    ) -> Result<u64, AppError> {
        let mut written = 0;
        let mut failure: Option<AppError> = None;
        loop {
            let next = queue.lock().await.recv().await;
            let Some(candidate) = next else {
                break;
            };

            if failure.is_some() {
                self.salvage(id, &candidate).await;
                continue;
            }

            match self.persist(&candidate).await {
                Ok(paths) => {
                    written += 1;
                    debug!("Writer {} saved {}", id, paths.metadata.display());
                }
                Err(e) => {
                    error!(
                        "Writer {} failed to save {} ({}), metadata kept at {}: {}",
                        id,
                        candidate.display_name,
                        candidate.address,
                        self.paths_for(&candidate).metadata.display(),
                        e
                    );
                    token.cancel();
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => {
                debug!("Writer {} finished after {} matches", id, written);
                Ok(written)
            }
        }
    }

    /// Metadata-only write for matches drained after a failure.
    async fn salvage(&self, id: usize, candidate: &Candidate) {
        match self.save_metadata(candidate).await {
            Ok(path) => warn!(
                "Writer {} saved metadata only for {} at {}",
                id,
                candidate.display_name,
                path.display()
            ),
            Err(e) => error!(
                "Writer {} could not save metadata for {} ({}): {}",
                id, candidate.display_name, candidate.address, e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_output_dir_is_created_private() {
        use std::os::unix::fs::PermissionsExt;
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("foundMonKeys");
        let resolved = prepare_output_dir(&target).unwrap();
        let mode = std::fs::metadata(&resolved).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);

        // a second call accepts the existing directory
        assert_eq!(prepare_output_dir(&target).unwrap(), resolved);
    }

    #[cfg(unix)]
    #[test]
    fn test_open_output_dir_is_rejected() {
        use std::os::unix::fs::PermissionsExt;
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("shared");
        std::fs::create_dir(&target).unwrap();
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(prepare_output_dir(&target), Err(AppError::Config(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_private_file_mode() {
        use std::os::unix::fs::PermissionsExt;
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("secret.json");
        write_private_file(&path, b"{}").await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }
}
