use std::{
    io::{self, Read as _},
    path::{Path, PathBuf},
    process::{Child, ChildStderr, Command, ExitStatus, Stdio},
    sync::{
        Arc, Mutex, PoisonError,
        mpsc::{self, RecvTimeoutError},
    },
    time::{Duration, Instant},
};

use crate::{
    config::RendererConfig, descriptor::ProblemDescriptor, dispatch::SceneProgram, job::RenderJob,
};

/// Environment variable carrying the descriptor JSON to the renderer.
pub const PROBLEM_ENV: &str = "MATHVIZ_PROBLEM";
/// Environment variable carrying the selected scene class.
pub const SCENE_ENV: &str = "MATHVIZ_SCENE";

const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// How long to wait for stderr EOF once the renderer itself has exited. Grandchildren that
/// inherited the pipe can keep it open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Everything the renderer needs for one scene.
#[derive(Clone, Copy, Debug)]
pub struct SceneRequest<'a> {
    pub program: SceneProgram,
    pub descriptor: &'a ProblemDescriptor,
    pub job: &'a RenderJob,
}

/// A failed render, with whatever diagnostics the renderer produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RendererFailure {
    pub message: String,
    pub diagnostic: Option<String>,
}

impl RendererFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        if !diagnostic.trim().is_empty() {
            self.diagnostic = Some(diagnostic.trim().to_string());
        }
        self
    }
}

/// Scene renderer contract.
///
/// On success exactly one playable video has been written somewhere under the job's working
/// directory (or, for misbehaving renderers, the process root). The output location is not part
/// of the contract; the pipeline searches for it afterwards.
pub trait SceneRenderer {
    fn render(&self, request: &SceneRequest<'_>) -> Result<(), RendererFailure>;
}

/// Renderer backed by an external program, invoked once per scene.
///
/// Command line:
/// `<program> [program_args..] render <script> <SceneClass> --media_dir <working_dir>
///  -o <output_base_name> -r <w>,<h> --fps <fps> -q <tier> --disable_caching`
///
/// The child runs with the working directory as its current directory so that relative writes
/// land inside the job's media root.
#[derive(Clone, Debug)]
pub struct CommandRenderer {
    cfg: RendererConfig,
}

impl CommandRenderer {
    pub fn new(cfg: RendererConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.cfg
    }

    pub fn build_command(&self, request: &SceneRequest<'_>) -> Result<Command, RendererFailure> {
        let job = request.job;
        let problem = request
            .descriptor
            .to_json()
            .map_err(|e| RendererFailure::new(e.message()))?;

        let mut cmd = Command::new(resolve_program(&self.cfg.program)?);
        cmd.args(&self.cfg.program_args)
            .arg("render")
            .arg(absolute(&self.cfg.script)?)
            .arg(request.program.scene_class())
            .arg("--media_dir")
            .arg(&job.working_dir)
            .arg("-o")
            .arg(&job.output_base_name)
            .arg("-r")
            .arg(format!("{},{}", job.width(), job.height()))
            .arg("--fps")
            .arg(job.frame_rate().to_string())
            .arg("-q")
            .arg(job.quality().flag())
            .arg("--disable_caching")
            .current_dir(&job.working_dir)
            .env(PROBLEM_ENV, problem)
            .env(SCENE_ENV, request.program.scene_class())
            .env("MANIM_RENDERER", "cairo")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        Ok(cmd)
    }
}

impl SceneRenderer for CommandRenderer {
    fn render(&self, request: &SceneRequest<'_>) -> Result<(), RendererFailure> {
        let mut cmd = self.build_command(request)?;
        let program = self.cfg.program.display().to_string();

        let mut child = cmd.spawn().map_err(|e| {
            RendererFailure::new(format!(
                "failed to spawn renderer '{program}' (is it installed and on PATH?): {e}"
            ))
        })?;

        let stderr_drain = child.stderr.take().map(StderrDrain::spawn);

        let status = wait_with_timeout(&mut child, self.cfg.timeout);
        let stderr = stderr_drain
            .map(|drain| drain.finish(DRAIN_GRACE))
            .unwrap_or_default();

        match status {
            Ok(Some(status)) if status.success() => Ok(()),
            Ok(Some(status)) => Err(RendererFailure::new(exit_message(status))
                .with_diagnostic(stderr)),
            Ok(None) => {
                let secs = self.cfg.timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
                Err(RendererFailure::new(format!("renderer timed out after {secs}s"))
                    .with_diagnostic(stderr))
            }
            Err(e) => Err(RendererFailure::new(format!(
                "failed to wait for renderer to finish: {e}"
            ))
            .with_diagnostic(stderr)),
        }
    }
}

fn exit_message(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("renderer exited with status {code}"),
        None => "renderer was terminated by a signal".to_string(),
    }
}

/// Probe whether `program` can be launched at all.
pub fn is_program_on_path(program: &Path) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// The parts of a child process the timeout loop needs.
trait Reap {
    fn pid(&self) -> u32;
    fn try_reap(&mut self) -> io::Result<Option<ExitStatus>>;
    fn reap(&mut self) -> io::Result<ExitStatus>;
    fn kill(&mut self) -> io::Result<()>;
}

impl Reap for Child {
    fn pid(&self) -> u32 {
        self.id()
    }

    fn try_reap(&mut self) -> io::Result<Option<ExitStatus>> {
        self.try_wait()
    }

    fn reap(&mut self) -> io::Result<ExitStatus> {
        self.wait()
    }

    fn kill(&mut self) -> io::Result<()> {
        Child::kill(self)
    }
}

/// Wait for the child, killing it once `timeout` elapses. `Ok(None)` means it was killed.
///
/// The child is also killed when waiting on it fails, so an error never leaves it running.
fn wait_with_timeout(
    child: &mut impl Reap,
    timeout: Option<Duration>,
) -> io::Result<Option<ExitStatus>> {
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        let polled = match deadline {
            Some(_) => child.try_reap(),
            None => child.reap().map(Some),
        };
        match polled {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(pid = child.pid(), error = %e, "failed to wait for renderer; killing");
                let _ = child.kill();
                let _ = child.reap();
                return Err(e);
            }
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::warn!(pid = child.pid(), "renderer exceeded timeout; killing");
            child.kill()?;
            child.reap()?;
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Reads the renderer's stderr on a background thread into a shared buffer.
///
/// The buffer is readable at any time, so a pipe held open by a grandchild never blocks the
/// caller past [`StderrDrain::finish`]'s grace period.
struct StderrDrain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<io::Result<()>>,
}

impl StderrDrain {
    fn spawn(stderr: ChildStderr) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let sink = Arc::clone(&buf);
        std::thread::spawn(move || {
            let _ = tx.send(pump(stderr, &sink));
        });
        Self { buf, done }
    }

    fn finish(self, grace: Duration) -> String {
        let note = match self.done.recv_timeout(grace) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("<failed to read renderer stderr: {e}>")),
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("renderer stderr still open; using what was read so far");
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                Some("<renderer stderr drain thread panicked>".to_string())
            }
        };

        let mut text = {
            let bytes = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
            String::from_utf8_lossy(&bytes).into_owned()
        };
        if let Some(note) = note {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&note);
        }
        text
    }
}

fn pump(mut stderr: ChildStderr, sink: &Mutex<Vec<u8>>) -> io::Result<()> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = match stderr.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(&chunk[..n]);
    }
}

/// Bare program names are left for `PATH` lookup; anything with a directory part is made
/// absolute because the child runs inside the working directory.
fn resolve_program(program: &Path) -> Result<PathBuf, RendererFailure> {
    if program.components().count() > 1 {
        absolute(program)
    } else {
        Ok(program.to_path_buf())
    }
}

fn absolute(path: &Path) -> Result<PathBuf, RendererFailure> {
    std::path::absolute(path).map_err(|e| {
        RendererFailure::new(format!("failed to resolve '{}': {e}", path.display()))
    })
}

#[cfg(test)]
#[path = "../tests/unit/renderer.rs"]
mod tests;
