mod stat;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use casefile_config::WorkerConfig;
use casefile_evidence::{DirectoryEvidence, DiskImageEvidence, Evidence, FileEvidence};
use casefile_output::ConfiguredWriterFactory;
use casefile_task::TaskRunner;

use crate::stat::StatTask;

/// Casefile - run forensic analysis tasks against evidence
#[derive(Parser)]
#[command(name = "casefile")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the worker config (default: ~/.casefile/worker.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a task against a piece of evidence
  Run {
    /// The task to run
    #[arg(long, value_enum, default_value_t = TaskKind::Stat)]
    task: TaskKind,

    /// Path to the evidence on this host
    #[arg(long)]
    evidence: PathBuf,

    /// How to treat the evidence path
    #[arg(long, value_enum, default_value_t = EvidenceArg::File)]
    kind: EvidenceArg,

    /// Root for task output directories, overriding the config
    #[arg(long)]
    output_dir: Option<PathBuf>,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum TaskKind {
  /// Record size and type metadata of the evidence
  Stat,
}

#[derive(Clone, Copy, ValueEnum)]
enum EvidenceArg {
  File,
  Directory,
  DiskImage,
}

impl EvidenceArg {
  fn build(self, path: PathBuf) -> Arc<dyn Evidence> {
    match self {
      EvidenceArg::File => Arc::new(FileEvidence::new(path)),
      EvidenceArg::Directory => Arc::new(DirectoryEvidence::new(path)),
      EvidenceArg::DiskImage => Arc::new(DiskImageEvidence::new(path)),
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run {
      task,
      evidence,
      kind,
      output_dir,
    }) => {
      let mut config = load_config(cli.config.as_deref())?;
      if output_dir.is_some() {
        config.base_output_dir = output_dir;
      }
      let successful = run_task(config, task, kind.build(evidence))?;
      if !successful {
        std::process::exit(1);
      }
    }
    None => {
      println!("casefile - use --help to see available commands");
    }
  }

  Ok(())
}

/// Load the worker config from `path`, else from the default location if
/// it exists, else use defaults.
fn load_config(path: Option<&Path>) -> Result<WorkerConfig> {
  let path = match path {
    Some(path) => path.to_path_buf(),
    None => {
      let Some(home) = dirs::home_dir() else {
        return Ok(WorkerConfig::default());
      };
      let default = home.join(".casefile").join("worker.json");
      if !default.exists() {
        return Ok(WorkerConfig::default());
      }
      default
    }
  };

  WorkerConfig::from_file(&path)
    .with_context(|| format!("failed to load worker config: {}", path.display()))
}

fn run_task(config: WorkerConfig, task: TaskKind, evidence: Arc<dyn Evidence>) -> Result<bool> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_task_async(config, task, evidence).await })
}

async fn run_task_async(
  config: WorkerConfig,
  task: TaskKind,
  evidence: Arc<dyn Evidence>,
) -> Result<bool> {
  let worker_name = config.worker_name();
  info!(
    worker = %worker_name,
    remotes = config.remote_outputs.len(),
    "worker configured"
  );
  let writers = Arc::new(ConfiguredWriterFactory::new(&config));

  let result = match task {
    TaskKind::Stat => {
      let mut runner = TaskRunner::new(StatTask, writers).with_worker_name(worker_name);
      runner.run_wrapper(evidence).await
    }
  };

  for warning in result.warnings() {
    eprintln!("warning: {}", warning);
  }

  let record = result.to_record();
  println!("{}", serde_json::to_string_pretty(&record)?);

  Ok(record.successful)
}
