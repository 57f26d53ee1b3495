//! mathviz renders short animated explanations of arithmetic problems and caches them.
//!
//! A [`ProblemDescriptor`] is reduced to a [`CacheKey`]; when the cache already holds an artifact
//! for that key it is returned as-is. Otherwise an external [`SceneRenderer`] is run inside a
//! fresh working directory, the video it produced is located, moved into the cache with a single
//! rename, and the working directory is removed.
//!
//! - Build a [`PipelineConfig`]
//! - Create a [`Pipeline`] (with [`CommandRenderer`] or any other [`SceneRenderer`])
//! - Call [`Pipeline::run`] or [`Pipeline::run_json`]
#![forbid(unsafe_code)]

mod foundation {
    pub mod error;
}

pub mod cache;
pub mod cache_key;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod job;
pub mod locate;
pub mod pipeline;
pub mod publish;
pub mod renderer;

pub use crate::foundation::error;

pub use crate::cache::CacheStore;
pub use crate::cache_key::CacheKey;
pub use crate::config::{PipelineConfig, RendererConfig};
pub use crate::descriptor::{OperationKind, ProblemDescriptor};
pub use crate::dispatch::SceneProgram;
pub use crate::error::{ErrorKind, MathvizError, MathvizResult};
pub use crate::job::{QualityTier, RenderJob, RenderSettings};
pub use crate::locate::{ArtifactLocator, SearchLayer};
pub use crate::pipeline::{CacheStatus, Pipeline, PipelineResult, PipelineState, RenderOutcome};
pub use crate::publish::{ArtifactPublisher, ScratchSnapshot};
pub use crate::renderer::{CommandRenderer, RendererFailure, SceneRenderer, SceneRequest};
