use std::{
    ffi::OsStr,
    fmt,
    path::{Path, PathBuf},
};

use walkdir::{DirEntry, WalkDir};

use crate::{cache::ARTIFACT_EXTENSION, job::RenderJob};

/// Directory-name marker renderers use for in-progress segments.
pub const PARTIAL_MARKER: &str = "partial";

/// One step of the locator's increasingly permissive search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchLayer {
    /// Any video under the working directory, skipping partial-output directories.
    WorkingDirComplete,
    /// Any video under the working directory.
    WorkingDirAny,
    /// A video named after the job anywhere under the process root, outside the cache.
    ProcessRoot,
}

impl SearchLayer {
    pub const ALL: [SearchLayer; 3] = [
        SearchLayer::WorkingDirComplete,
        SearchLayer::WorkingDirAny,
        SearchLayer::ProcessRoot,
    ];
}

impl fmt::Display for SearchLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WorkingDirComplete => "working-dir",
            Self::WorkingDirAny => "working-dir-with-partials",
            Self::ProcessRoot => "process-root",
        })
    }
}

/// Finds the file a renderer produced.
///
/// The renderer's internal layout is not fixed, so each [`SearchLayer`] runs only when the
/// previous one found nothing. Within a layer the first match in walk order wins (entries are
/// visited depth-first, sorted by file name); no attempt is made to pick a "best" candidate.
#[derive(Clone, Debug)]
pub struct ArtifactLocator {
    process_root: PathBuf,
    cache_root: PathBuf,
}

impl ArtifactLocator {
    pub fn new(process_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            process_root: process_root.into(),
            cache_root: cache_root.into(),
        }
    }

    pub fn locate(&self, job: &RenderJob) -> Option<PathBuf> {
        for layer in SearchLayer::ALL {
            if let Some(found) = self.search(job, layer) {
                tracing::debug!(%layer, path = %found.display(), "located artifact");
                return Some(found);
            }
            tracing::debug!(%layer, "no artifact in layer");
        }
        None
    }

    pub fn search(&self, job: &RenderJob, layer: SearchLayer) -> Option<PathBuf> {
        match layer {
            SearchLayer::WorkingDirComplete => {
                let root = job.working_dir.as_path();
                first_video(root, |e| !is_partial_dir(e), |_| true)
            }
            SearchLayer::WorkingDirAny => first_video(&job.working_dir, |_| true, |_| true),
            SearchLayer::ProcessRoot => {
                let root = resolve(&self.process_root);
                let cache_root = resolve(&self.cache_root);
                let stem = job.output_base_name.as_str();
                first_video(
                    &root,
                    |e| !e.path().starts_with(&cache_root),
                    |e| e.file_name().to_string_lossy().contains(stem),
                )
            }
        }
    }
}

fn first_video(
    root: &Path,
    mut descend: impl FnMut(&DirEntry) -> bool,
    mut accept: impl FnMut(&DirEntry) -> bool,
) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || descend(e))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .find(|e| e.file_type().is_file() && is_video(e.path()) && accept(e))
        .map(DirEntry::into_path)
}

fn is_video(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(ARTIFACT_EXTENSION))
}

fn is_partial_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_string_lossy().contains(PARTIAL_MARKER)
}

/// Canonical form when the path exists, so prefix checks survive symlinked roots.
fn resolve(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
#[path = "../tests/unit/locate.rs"]
mod tests;
