use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    cache::CacheStore,
    cache_key::CacheKey,
    config::PipelineConfig,
    descriptor::ProblemDescriptor,
    dispatch,
    error::{ErrorKind, MathvizError, MathvizResult},
    job::{self, RenderJob},
    locate::ArtifactLocator,
    publish::{ArtifactPublisher, ScratchSnapshot},
    renderer::{CommandRenderer, SceneRenderer},
};

/// Controller states for one invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    KeyDerived,
    CacheHit,
    CacheMiss,
    Configured,
    Dispatched,
    Located,
    Published,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Successful end state of an invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOutcome {
    pub key: CacheKey,
    pub video_path: PathBuf,
    pub video_url: String,
    pub cached: bool,
}

/// Where a descriptor's artifact lives, and whether it is already there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub key: String,
    pub file_name: String,
    pub video_url: String,
    pub cached: bool,
}

/// Structured result of one invocation, as reported to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineResult {
    Success {
        video_path: PathBuf,
        video_url: String,
        cached: bool,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        diagnostic: Option<String>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessLine<'a> {
    success: bool,
    video_url: &'a str,
    cached: bool,
}

#[derive(Serialize)]
struct FailureLine<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

impl PipelineResult {
    pub fn failure(err: &MathvizError) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.message(),
            diagnostic: err.diagnostic().map(str::to_string),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Process exit status: `0` on success, `1` on any failure.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    /// The single JSON line written for the caller.
    pub fn to_json_line(&self) -> String {
        let line = match self {
            Self::Success {
                video_url, cached, ..
            } => serde_json::to_string(&SuccessLine {
                success: true,
                video_url,
                cached: *cached,
            }),
            Self::Failure {
                message,
                diagnostic,
                ..
            } => serde_json::to_string(&FailureLine {
                error: message,
                detail: diagnostic.as_deref(),
            }),
        };
        line.unwrap_or_else(|e| format!(r#"{{"error":"failed to encode result: {e}"}}"#))
    }
}

impl From<MathvizResult<RenderOutcome>> for PipelineResult {
    fn from(result: MathvizResult<RenderOutcome>) -> Self {
        match result {
            Ok(outcome) => Self::Success {
                video_path: outcome.video_path,
                video_url: outcome.video_url,
                cached: outcome.cached,
            },
            Err(err) => Self::failure(&err),
        }
    }
}

/// End-to-end render pipeline: key, cache lookup, and on a miss configure, dispatch, locate,
/// publish.
///
/// One call to [`Pipeline::run`] is one invocation. Invocations with different keys are
/// independent; invocations racing on the same key both render and the last publish wins.
#[derive(Debug)]
pub struct Pipeline<R> {
    cache: CacheStore,
    locator: ArtifactLocator,
    publisher: ArtifactPublisher,
    process_root: PathBuf,
    renderer: R,
}

impl Pipeline<CommandRenderer> {
    /// Pipeline using the external renderer described by `cfg.renderer`.
    pub fn from_config(cfg: &PipelineConfig) -> MathvizResult<Self> {
        Self::new(cfg, CommandRenderer::new(cfg.renderer.clone()))
    }
}

impl<R: SceneRenderer> Pipeline<R> {
    pub fn new(cfg: &PipelineConfig, renderer: R) -> MathvizResult<Self> {
        cfg.validate()?;
        let cache = CacheStore::new(&cfg.cache_root, &cfg.file_prefix, &cfg.url_prefix);
        Ok(Self {
            locator: ArtifactLocator::new(&cfg.process_root, &cfg.cache_root),
            publisher: ArtifactPublisher::new(cache.clone()),
            process_root: cfg.process_root.clone(),
            cache,
            renderer,
        })
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Parse `raw` and run it, folding every error into the structured result.
    pub fn run_json(&self, raw: &str) -> PipelineResult {
        ProblemDescriptor::from_json_str(raw)
            .and_then(|d| self.run(&d))
            .into()
    }

    /// Cache identity and presence for `descriptor`, without rendering.
    pub fn inspect(&self, descriptor: &ProblemDescriptor) -> CacheStatus {
        let key = CacheKey::derive(descriptor);
        CacheStatus {
            file_name: self.cache.file_name(&key),
            video_url: self.cache.public_url(&key),
            cached: self.cache.lookup(&key).is_some(),
            key: key.to_string(),
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(kind = %descriptor.kind))]
    pub fn run(&self, descriptor: &ProblemDescriptor) -> MathvizResult<RenderOutcome> {
        let mut state = Transitions::new();

        let key = CacheKey::derive(descriptor);
        state.enter(PipelineState::KeyDerived, &key);

        if let Some(video_path) = self.cache.lookup(&key) {
            state.enter(PipelineState::CacheHit, &key);
            tracing::info!(key = %key, path = %video_path.display(), "cache hit");
            state.enter(PipelineState::Done, &key);
            return Ok(self.outcome(key, video_path, true));
        }
        state.enter(PipelineState::CacheMiss, &key);
        tracing::info!(key = %key, "cache miss; rendering");

        let result = self.render_miss(descriptor, &key, &mut state);
        match result {
            Ok(video_path) => {
                state.enter(PipelineState::Done, &key);
                Ok(self.outcome(key, video_path, false))
            }
            Err(err) => {
                state.enter(PipelineState::Failed, &key);
                tracing::warn!(key = %key, kind = ?err.kind(), error = %err, "render pipeline failed");
                Err(err)
            }
        }
    }

    fn render_miss(
        &self,
        descriptor: &ProblemDescriptor,
        key: &CacheKey,
        state: &mut Transitions,
    ) -> MathvizResult<PathBuf> {
        let job = job::configure(descriptor, key, &self.cache)?;
        state.enter(PipelineState::Configured, key);

        let scratch = ScratchSnapshot::take(&self.process_root);
        let found = match self.render_and_locate(descriptor, &job, state) {
            Ok(found) => found,
            Err(err) => {
                self.publisher.sweep(&job, &scratch);
                return Err(err);
            }
        };

        let published = self.publisher.publish(&job, &found, &scratch)?;
        state.enter(PipelineState::Published, key);
        Ok(published)
    }

    fn render_and_locate(
        &self,
        descriptor: &ProblemDescriptor,
        job: &RenderJob,
        state: &mut Transitions,
    ) -> MathvizResult<PathBuf> {
        dispatch::dispatch(&self.renderer, job, descriptor)?;
        state.enter(PipelineState::Dispatched, &job.key);

        let found = self.locator.locate(job).ok_or_else(|| {
            MathvizError::internal("Rendered file not found after rendering")
        })?;
        state.enter(PipelineState::Located, &job.key);
        Ok(found)
    }

    fn outcome(&self, key: CacheKey, video_path: PathBuf, cached: bool) -> RenderOutcome {
        RenderOutcome {
            video_url: self.cache.public_url(&key),
            video_path,
            cached,
            key,
        }
    }

    pub fn process_root(&self) -> &Path {
        &self.process_root
    }
}

struct Transitions {
    state: PipelineState,
}

impl Transitions {
    fn new() -> Self {
        Self {
            state: PipelineState::Start,
        }
    }

    fn enter(&mut self, next: PipelineState, key: &CacheKey) {
        tracing::debug!(key = %key, from = %self.state, to = %next, "pipeline transition");
        self.state = next;
    }
}
