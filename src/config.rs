use std::{path::PathBuf, time::Duration};

use crate::error::{MathvizError, MathvizResult};

pub const DEFAULT_CACHE_ROOT: &str = "public/manim-cache";
pub const DEFAULT_URL_PREFIX: &str = "/manim-cache";
pub const DEFAULT_FILE_PREFIX: &str = "math_viz";
pub const DEFAULT_RENDERER_PROGRAM: &str = "manim";
pub const DEFAULT_SCENE_SCRIPT: &str = "server/manim/render.py";

/// How the external scene renderer is launched.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Executable to spawn (looked up on `PATH` when not a path).
    pub program: PathBuf,
    /// Arguments placed before the renderer's own arguments (e.g. `-m manim` for `python3`).
    pub program_args: Vec<String>,
    /// Scene script handed to the renderer.
    pub script: PathBuf,
    /// Kill the renderer if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_RENDERER_PROGRAM),
            program_args: Vec::new(),
            script: PathBuf::from(DEFAULT_SCENE_SCRIPT),
            timeout: None,
        }
    }
}

/// Filesystem layout and naming for one pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Flat directory holding published artifacts.
    pub cache_root: PathBuf,
    /// Stand-in for the process working directory: searched by the last locator layer and
    /// swept for stray renderer scratch output.
    pub process_root: PathBuf,
    /// Prefix of the public `videoUrl`.
    pub url_prefix: String,
    /// Artifact names are `<file_prefix>_<hash>.mp4`.
    pub file_prefix: String,
    pub renderer: RendererConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from(DEFAULT_CACHE_ROOT),
            process_root: PathBuf::from("."),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            renderer: RendererConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> MathvizResult<()> {
        if self.cache_root.as_os_str().is_empty() {
            return Err(MathvizError::config("cache root must not be empty"));
        }
        if self.process_root.as_os_str().is_empty() {
            return Err(MathvizError::config("process root must not be empty"));
        }
        if self.file_prefix.is_empty() {
            return Err(MathvizError::config("file prefix must not be empty"));
        }
        if self.file_prefix.contains(['/', '\\']) {
            return Err(MathvizError::config(format!(
                "file prefix '{}' must not contain a path separator",
                self.file_prefix
            )));
        }
        if self.renderer.program.as_os_str().is_empty() {
            return Err(MathvizError::config("renderer program must not be empty"));
        }
        if self.renderer.timeout.is_some_and(|t| t.is_zero()) {
            return Err(MathvizError::config("renderer timeout must be non-zero"));
        }
        Ok(())
    }

    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = cache_root.into();
        self
    }

    pub fn with_process_root(mut self, process_root: impl Into<PathBuf>) -> Self {
        self.process_root = process_root.into();
        self
    }
}
