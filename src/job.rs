use std::{fmt, fs, path::PathBuf};

use crate::{
    cache::CacheStore,
    cache_key::CacheKey,
    descriptor::ProblemDescriptor,
    error::{MathvizError, MathvizResult},
};

/// Prefix of per-invocation working directories inside the cache root.
pub const WORKDIR_PREFIX: &str = "media_tmp";

/// Renderer quality preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    /// Short flag understood by the renderer CLI (`-q <flag>`).
    pub fn flag(self) -> &'static str {
        match self {
            Self::Low => "l",
            Self::Medium => "m",
            Self::High => "h",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low_quality",
            Self::Medium => "medium_quality",
            Self::High => "high_quality",
        })
    }
}

/// Fixed render parameters. Not user-controlled so render cost stays bounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub quality: QualityTier,
}

pub const RENDER_SETTINGS: RenderSettings = RenderSettings {
    width: 1280,
    height: 720,
    frame_rate: 30,
    quality: QualityTier::Medium,
};

/// Parameters of one render, owned by the pipeline for a single invocation.
#[derive(Clone, Debug)]
pub struct RenderJob {
    pub key: CacheKey,
    /// Fresh directory under the cache root; the renderer's media root.
    pub working_dir: PathBuf,
    pub settings: RenderSettings,
    /// Base name the renderer is asked to give its output.
    pub output_base_name: String,
}

impl RenderJob {
    pub fn width(&self) -> u32 {
        self.settings.width
    }

    pub fn height(&self) -> u32 {
        self.settings.height
    }

    pub fn frame_rate(&self) -> u32 {
        self.settings.frame_rate
    }

    pub fn quality(&self) -> QualityTier {
        self.settings.quality
    }
}

/// Build the job for `descriptor` and create its working directory.
///
/// The directory name carries a random suffix, so two invocations never share a workspace even
/// when they render the same key. The returned path is absolute even when the cache root is not.
pub fn configure(
    descriptor: &ProblemDescriptor,
    key: &CacheKey,
    cache: &CacheStore,
) -> MathvizResult<RenderJob> {
    let output_base_name = key.file_stem(cache.file_prefix());
    let working_dir = cache.root().join(format!(
        "{WORKDIR_PREFIX}_{output_base_name}_{}",
        uuid::Uuid::new_v4().simple()
    ));
    // The renderer runs inside this directory and also receives it as its media root.
    let working_dir = std::path::absolute(&working_dir).map_err(|e| {
        MathvizError::config(format!(
            "failed to resolve working directory '{}': {e}",
            working_dir.display()
        ))
    })?;

    fs::create_dir_all(&working_dir).map_err(|e| {
        MathvizError::config(format!(
            "failed to create working directory '{}': {e}",
            working_dir.display()
        ))
    })?;

    tracing::debug!(
        key = %key,
        kind = %descriptor.kind,
        working_dir = %working_dir.display(),
        "configured render job"
    );

    Ok(RenderJob {
        key: key.clone(),
        working_dir,
        settings: RENDER_SETTINGS,
        output_base_name,
    })
}
