use std::fmt;

use crate::{
    descriptor::{NUMBERLINE_STYLE, OperationKind, ProblemDescriptor},
    error::{MathvizError, MathvizResult},
    job::RenderJob,
    renderer::{SceneRenderer, SceneRequest},
};

/// Scene variant the renderer is asked to play.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneProgram {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    /// Jumps along a number line; addition and subtraction only.
    NumberLine,
}

impl SceneProgram {
    pub fn select(descriptor: &ProblemDescriptor) -> Self {
        match descriptor.kind {
            OperationKind::Addition | OperationKind::Subtraction
                if descriptor.style == NUMBERLINE_STYLE =>
            {
                Self::NumberLine
            }
            OperationKind::Addition => Self::Addition,
            OperationKind::Subtraction => Self::Subtraction,
            OperationKind::Multiplication => Self::Multiplication,
            OperationKind::Division => Self::Division,
        }
    }

    /// Scene class name inside the renderer's script.
    pub fn scene_class(self) -> &'static str {
        match self {
            Self::Addition => "AdditionScene",
            Self::Subtraction => "SubtractionScene",
            Self::Multiplication => "MultiplicationScene",
            Self::Division => "DivisionScene",
            Self::NumberLine => "NumberLineScene",
        }
    }
}

impl fmt::Display for SceneProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scene_class())
    }
}

/// Hand one job to the scene renderer. No retry: a failure ends the invocation.
#[tracing::instrument(level = "debug", skip_all, fields(key = %job.key))]
pub fn dispatch(
    renderer: &dyn SceneRenderer,
    job: &RenderJob,
    descriptor: &ProblemDescriptor,
) -> MathvizResult<()> {
    if !job.working_dir.is_dir() {
        return Err(MathvizError::config(format!(
            "working directory '{}' does not exist",
            job.working_dir.display()
        )));
    }

    let program = SceneProgram::select(descriptor);
    tracing::info!(scene = %program, working_dir = %job.working_dir.display(), "dispatching render");

    let request = SceneRequest {
        program,
        descriptor,
        job,
    };
    renderer.render(&request).map_err(|failure| {
        tracing::warn!(scene = %program, error = %failure.message, "renderer failed");
        MathvizError::render(failure.message, failure.diagnostic)
    })
}
