use super::*;
use crate::{
    cache::CacheStore,
    cache_key::CacheKey,
    descriptor::{OperationKind, ProblemDescriptor},
    job,
};

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    descriptor: ProblemDescriptor,
    job: RenderJob,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let cache = CacheStore::new(root.join("cache"), "math_viz", "/manim-cache");
    let descriptor = ProblemDescriptor::new(OperationKind::Addition, 3, 4, 7);
    let job = job::configure(&descriptor, &CacheKey::derive(&descriptor), &cache).unwrap();
    Fixture {
        _dir: dir,
        root,
        descriptor,
        job,
    }
}

/// Runs `body` through `sh` so the test never has to exec a freshly written file.
fn shell_renderer(root: &Path, body: &str, timeout: Option<Duration>) -> CommandRenderer {
    let script = root.join("fake_renderer.sh");
    std::fs::write(&script, body).unwrap();
    CommandRenderer::new(RendererConfig {
        program: PathBuf::from("sh"),
        program_args: vec![script.to_string_lossy().into_owned()],
        script: root.join("scenes.py"),
        timeout,
    })
}

fn request<'a>(fx: &'a Fixture) -> SceneRequest<'a> {
    SceneRequest {
        program: SceneProgram::select(&fx.descriptor),
        descriptor: &fx.descriptor,
        job: &fx.job,
    }
}

#[test]
fn command_line_carries_job_parameters() {
    let fx = fixture();
    let renderer = CommandRenderer::new(RendererConfig::default());
    let cmd = renderer.build_command(&request(&fx)).unwrap();

    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert_eq!(cmd.get_program(), "manim");
    assert_eq!(args[0], "render");
    assert!(args[1].ends_with("render.py"));
    assert_eq!(args[2], "AdditionScene");
    assert_eq!(&args[3..5], ["--media_dir", &*fx.job.working_dir.to_string_lossy()]);
    assert_eq!(&args[5..7], ["-o", fx.job.output_base_name.as_str()]);
    assert_eq!(&args[7..], ["-r", "1280,720", "--fps", "30", "-q", "m", "--disable_caching"]);
    assert_eq!(cmd.get_current_dir(), Some(fx.job.working_dir.as_path()));
}

#[cfg(unix)]
#[test]
fn successful_render_runs_inside_working_dir() {
    let fx = fixture();
    let renderer = shell_renderer(
        &fx.root,
        r#"
out="$5/videos/scenes/720p30"
mkdir -p "$out"
printf 'video' > "$out/$7.mp4"
pwd > "$5/cwd.txt"
printf '%s' "$MATHVIZ_PROBLEM" > "$5/problem.json"
printf '%s' "$MATHVIZ_SCENE" > "$5/scene.txt"
"#,
        None,
    );

    renderer.render(&request(&fx)).unwrap();

    let wd = &fx.job.working_dir;
    let out = wd
        .join("videos/scenes/720p30")
        .join(format!("{}.mp4", fx.job.output_base_name));
    assert!(out.is_file());
    let cwd = std::fs::read_to_string(wd.join("cwd.txt")).unwrap();
    assert_eq!(
        std::fs::canonicalize(cwd.trim()).unwrap(),
        std::fs::canonicalize(wd).unwrap()
    );
    let problem: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(wd.join("problem.json")).unwrap()).unwrap();
    assert_eq!(problem["type"], "addition");
    assert_eq!(problem["answer"], 7);
    assert_eq!(
        std::fs::read_to_string(wd.join("scene.txt")).unwrap(),
        "AdditionScene"
    );
}

#[cfg(unix)]
#[test]
fn non_zero_exit_reports_stderr_as_diagnostic() {
    let fx = fixture();
    let renderer = shell_renderer(&fx.root, "echo 'scene exploded' >&2\nexit 3\n", None);

    let failure = renderer.render(&request(&fx)).unwrap_err();
    assert_eq!(failure.message, "renderer exited with status 3");
    assert_eq!(failure.diagnostic.as_deref(), Some("scene exploded"));
}

#[cfg(unix)]
#[test]
fn renderer_is_killed_after_timeout() {
    let fx = fixture();
    let renderer = shell_renderer(
        &fx.root,
        "exec sleep 10\n",
        Some(Duration::from_millis(200)),
    );

    let started = Instant::now();
    let failure = renderer.render(&request(&fx)).unwrap_err();
    assert!(failure.message.contains("timed out"), "{failure:?}");
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[cfg(unix)]
#[test]
fn timeout_holds_when_a_grandchild_keeps_stderr_open() {
    let fx = fixture();
    let renderer = shell_renderer(
        &fx.root,
        "echo 'encoding' >&2\nsleep 10 &\nsleep 10\n",
        Some(Duration::from_millis(300)),
    );

    let started = Instant::now();
    let failure = renderer.render(&request(&fx)).unwrap_err();
    assert!(failure.message.contains("timed out"), "{failure:?}");
    assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    assert_eq!(failure.diagnostic.as_deref(), Some("encoding"));
}

/// Child stand-in whose status poll always fails.
#[derive(Default)]
struct BrokenChild {
    kills: usize,
    reaps: usize,
}

impl Reap for BrokenChild {
    fn pid(&self) -> u32 {
        0
    }

    fn try_reap(&mut self) -> io::Result<Option<ExitStatus>> {
        Err(io::Error::other("poll failed"))
    }

    fn reap(&mut self) -> io::Result<ExitStatus> {
        self.reaps += 1;
        Err(io::Error::other("wait failed"))
    }

    fn kill(&mut self) -> io::Result<()> {
        self.kills += 1;
        Ok(())
    }
}

#[test]
fn wait_error_kills_the_child_before_returning() {
    let mut child = BrokenChild::default();
    let err = wait_with_timeout(&mut child, Some(Duration::from_secs(30))).unwrap_err();
    assert_eq!(err.to_string(), "poll failed");
    assert_eq!(child.kills, 1);
    assert_eq!(child.reaps, 1);

    let mut child = BrokenChild::default();
    let err = wait_with_timeout(&mut child, None).unwrap_err();
    assert_eq!(err.to_string(), "wait failed");
    assert_eq!(child.kills, 1);
}

#[test]
fn missing_program_is_a_spawn_failure() {
    let fx = fixture();
    let renderer = CommandRenderer::new(RendererConfig {
        program: PathBuf::from("mathviz-definitely-not-installed"),
        ..RendererConfig::default()
    });

    let failure = renderer.render(&request(&fx)).unwrap_err();
    assert!(failure.message.contains("failed to spawn renderer"));
    assert!(!is_program_on_path(Path::new("mathviz-definitely-not-installed")));
}

#[test]
fn blank_diagnostics_are_dropped() {
    let failure = RendererFailure::new("x").with_diagnostic("  \n");
    assert!(failure.diagnostic.is_none());
}
