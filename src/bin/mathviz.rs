use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use mathviz::{
    MathvizError, Pipeline, PipelineConfig, PipelineResult, ProblemDescriptor, RendererConfig,
};

#[derive(Parser, Debug)]
#[command(name = "mathviz", version, about = "Render and cache arithmetic explainer videos")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). Logs go to stderr.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a problem (or reuse its cached video) and print one JSON result line.
    Render(RenderArgs),
    /// Print the cache key and location for a problem without rendering it.
    Key(KeyArgs),
}

#[derive(Args, Debug)]
struct ProblemInput {
    /// Problem JSON, e.g. '{"type":"addition","operand1":3,"operand2":4,"answer":7}'.
    problem: Option<String>,

    /// Read the problem JSON from a file instead.
    #[arg(long = "in", conflicts_with = "problem")]
    in_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CacheArgs {
    /// Directory holding published videos.
    #[arg(long, env = "MATHVIZ_CACHE_DIR", default_value = mathviz::config::DEFAULT_CACHE_ROOT)]
    cache_dir: PathBuf,

    /// Public URL prefix of the cache directory.
    #[arg(long, env = "MATHVIZ_URL_PREFIX", default_value = mathviz::config::DEFAULT_URL_PREFIX)]
    url_prefix: String,

    /// Prefix of cached file names.
    #[arg(long, env = "MATHVIZ_FILE_PREFIX", default_value = mathviz::config::DEFAULT_FILE_PREFIX)]
    file_prefix: String,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    input: ProblemInput,

    #[command(flatten)]
    cache: CacheArgs,

    /// Directory searched for stray renderer output and swept for its scratch directory.
    #[arg(long, env = "MATHVIZ_PROCESS_ROOT", default_value = ".")]
    process_root: PathBuf,

    /// Scene renderer executable.
    #[arg(long, env = "MATHVIZ_RENDERER", default_value = mathviz::config::DEFAULT_RENDERER_PROGRAM)]
    renderer: PathBuf,

    /// Extra argument passed to the renderer before its own arguments (repeatable).
    #[arg(long = "renderer-arg", allow_hyphen_values = true)]
    renderer_args: Vec<String>,

    /// Scene script handed to the renderer.
    #[arg(long, env = "MATHVIZ_SCRIPT", default_value = mathviz::config::DEFAULT_SCENE_SCRIPT)]
    script: PathBuf,

    /// Kill the renderer after this many seconds.
    #[arg(long, env = "MATHVIZ_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

#[derive(Parser, Debug)]
struct KeyArgs {
    #[command(flatten)]
    input: ProblemInput,

    #[command(flatten)]
    cache: CacheArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("failed to initialize logging: {e:#}");
    }

    let output = match cli.cmd {
        Command::Render(args) => cmd_render(args).map(Output::Pipeline),
        Command::Key(args) => cmd_key(args),
    }
    .unwrap_or_else(|err| {
        tracing::error!(kind = ?err.kind(), error = %err, "command failed");
        Output::Pipeline(PipelineResult::failure(&err))
    });

    println!("{}", output.to_json_line());
    ExitCode::from(output.exit_code())
}

/// What a subcommand prints as its single stdout line.
enum Output {
    Pipeline(PipelineResult),
    Status(String),
}

impl Output {
    fn to_json_line(&self) -> String {
        match self {
            Self::Pipeline(r) => r.to_json_line(),
            Self::Status(s) => s.clone(),
        }
    }

    fn exit_code(&self) -> u8 {
        match self {
            Self::Pipeline(r) => r.exit_code(),
            Self::Status(_) => 0,
        }
    }
}

fn cmd_render(args: RenderArgs) -> Result<PipelineResult, MathvizError> {
    let cfg = PipelineConfig {
        cache_root: args.cache.cache_dir,
        process_root: args.process_root,
        url_prefix: args.cache.url_prefix,
        file_prefix: args.cache.file_prefix,
        renderer: RendererConfig {
            program: args.renderer,
            program_args: args.renderer_args,
            script: args.script,
            timeout: args.timeout_secs.map(Duration::from_secs),
        },
    };

    let raw = read_problem(&args.input)?;
    let pipeline = Pipeline::from_config(&cfg)?;
    Ok(pipeline.run_json(&raw))
}

fn cmd_key(args: KeyArgs) -> Result<Output, MathvizError> {
    let cfg = PipelineConfig {
        cache_root: args.cache.cache_dir,
        url_prefix: args.cache.url_prefix,
        file_prefix: args.cache.file_prefix,
        ..PipelineConfig::default()
    };

    let raw = read_problem(&args.input)?;
    let descriptor = ProblemDescriptor::from_json_str(&raw)?;
    let status = Pipeline::from_config(&cfg)?.inspect(&descriptor);
    let line = serde_json::to_string(&status)
        .map_err(|e| MathvizError::internal(format!("failed to encode status: {e}")))?;
    Ok(Output::Status(line))
}

fn read_problem(input: &ProblemInput) -> Result<String, MathvizError> {
    if let Some(raw) = &input.problem {
        return Ok(raw.clone());
    }
    match &input.in_path {
        Some(path) => read_problem_file(path).map_err(MathvizError::Other),
        None => Err(MathvizError::validation("No problem data provided")),
    }
}

fn read_problem_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read problem '{}'", path.display()))
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))
}
