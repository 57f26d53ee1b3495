use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{
    cache_key::CacheKey,
    error::{MathvizError, MathvizResult},
};

pub const ARTIFACT_EXTENSION: &str = "mp4";

/// Flat, content-addressed directory of published artifacts.
///
/// Artifacts are never deleted by the store. Publishing replaces the stable path with a single
/// rename so readers never observe a partially written file.
#[derive(Clone, Debug)]
pub struct CacheStore {
    root: PathBuf,
    file_prefix: String,
    url_prefix: String,
}

impl CacheStore {
    pub fn new(
        root: impl Into<PathBuf>,
        file_prefix: impl Into<String>,
        url_prefix: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            file_prefix: file_prefix.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    pub fn file_name(&self, key: &CacheKey) -> String {
        format!("{}.{ARTIFACT_EXTENSION}", key.file_stem(&self.file_prefix))
    }

    pub fn stable_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(self.file_name(key))
    }

    /// Cache-relative URL under which the artifact is served.
    pub fn public_url(&self, key: &CacheKey) -> String {
        format!(
            "{}/{}",
            self.url_prefix.trim_end_matches('/'),
            self.file_name(key)
        )
    }

    /// Existence check only: an empty or truncated file still counts as a hit.
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.stable_path(key);
        path.is_file().then_some(path)
    }

    pub fn ensure_root(&self) -> MathvizResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            MathvizError::storage(format!(
                "failed to create cache directory '{}': {e}",
                self.root.display()
            ))
        })
    }

    /// Move `source` to the stable path for `key`.
    ///
    /// Uses a rename when possible. Across filesystems the file is copied into a staging file
    /// inside the cache root, verified, renamed into place, and only then removed at the source.
    #[tracing::instrument(level = "debug", skip(self, key, source), fields(key = %key))]
    pub fn publish(&self, key: &CacheKey, source: &Path) -> MathvizResult<PathBuf> {
        self.ensure_root()?;
        let dest = self.stable_path(key);

        match fs::rename(source, &dest) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                tracing::debug!(
                    source = %source.display(),
                    "rename crosses devices; falling back to copy"
                );
                self.publish_by_copy(key, source, &dest)?;
            }
            Err(e) => {
                return Err(MathvizError::storage(format!(
                    "failed to move '{}' to '{}': {e}",
                    source.display(),
                    dest.display()
                )));
            }
        }

        tracing::info!(path = %dest.display(), "published artifact");
        Ok(dest)
    }

    fn publish_by_copy(&self, key: &CacheKey, source: &Path, dest: &Path) -> MathvizResult<()> {
        let staging = self.root.join(format!(
            ".{}.{}.partial",
            key.file_stem(&self.file_prefix),
            uuid::Uuid::new_v4().simple()
        ));

        let staged = copy_verified(source, &staging).and_then(|()| {
            fs::rename(&staging, dest).map_err(|e| {
                MathvizError::storage(format!(
                    "failed to move staged artifact into '{}': {e}",
                    dest.display()
                ))
            })
        });
        if let Err(e) = staged {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }

        if let Err(e) = fs::remove_file(source) {
            tracing::warn!(
                source = %source.display(),
                error = %e,
                "published by copy but failed to remove source"
            );
        }
        Ok(())
    }
}

fn copy_verified(source: &Path, staging: &Path) -> MathvizResult<()> {
    let storage = |what: &str, e: io::Error| {
        MathvizError::storage(format!(
            "failed to {what} '{}' -> '{}': {e}",
            source.display(),
            staging.display()
        ))
    };

    let expected = fs::metadata(source).map_err(|e| storage("stat", e))?.len();
    let copied = fs::copy(source, staging).map_err(|e| storage("copy", e))?;
    fs::File::open(staging)
        .and_then(|f| f.sync_all())
        .map_err(|e| storage("sync", e))?;

    if copied != expected {
        return Err(MathvizError::storage(format!(
            "copy of '{}' is incomplete: {copied} of {expected} bytes",
            source.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/unit/cache.rs"]
mod tests;
