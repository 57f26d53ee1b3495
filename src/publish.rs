use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{cache::CacheStore, error::MathvizResult, job::RenderJob};

/// Scratch directory some renderers create in their process's current directory.
pub const DEFAULT_SCRATCH_DIR: &str = "media";

/// Whether the renderer's default scratch directory existed before dispatch.
///
/// Only a directory that appeared during the invocation is swept, so a pre-existing directory
/// of the same name is never touched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScratchSnapshot {
    path: PathBuf,
    preexisting: bool,
}

impl ScratchSnapshot {
    pub fn take(process_root: &Path) -> Self {
        let path = process_root.join(DEFAULT_SCRATCH_DIR);
        let preexisting = path.exists();
        Self { path, preexisting }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn created_since(&self) -> bool {
        !self.preexisting && self.path.is_dir()
    }
}

/// Moves a located artifact into the cache and clears transient workspace.
#[derive(Clone, Debug)]
pub struct ArtifactPublisher {
    cache: CacheStore,
}

impl ArtifactPublisher {
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    /// Publish `found` under the job's key, then sweep. A failed publish still sweeps.
    pub fn publish(
        &self,
        job: &RenderJob,
        found: &Path,
        scratch: &ScratchSnapshot,
    ) -> MathvizResult<PathBuf> {
        let published = self.cache.publish(&job.key, found);
        self.sweep(job, scratch);
        published
    }

    /// Best-effort cleanup. Failures are logged and never surface to the caller.
    pub fn sweep(&self, job: &RenderJob, scratch: &ScratchSnapshot) {
        remove_tree(&job.working_dir, "working directory");
        if scratch.created_since() {
            remove_tree(scratch.path(), "renderer scratch directory");
        }
    }
}

fn remove_tree(path: &Path, what: &str) {
    match fs::remove_dir_all(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed {what}"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove {what}"),
    }
}
