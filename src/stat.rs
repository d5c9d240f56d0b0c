//! Built-in task recording basic filesystem metadata of its evidence.

use async_trait::async_trait;
use casefile_evidence::{Evidence, EvidenceKind, ReportEvidence};
use casefile_task::{Task, TaskError, TaskResult};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Name of the report written into the output directory.
pub const STAT_FILE_NAME: &str = "stat.json";

/// Metadata captured by [`StatTask`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatReport {
  pub name: String,
  pub kind: EvidenceKind,
  pub size: u64,
  pub is_dir: bool,
  pub read_only: bool,
}

/// Writes `stat.json` describing the input evidence and reports it as
/// produced evidence.
#[derive(Debug, Default)]
pub struct StatTask;

#[async_trait]
impl Task for StatTask {
  async fn run(
    &self,
    evidence: &dyn Evidence,
    result: &mut TaskResult,
  ) -> Result<(), TaskError> {
    let Some(path) = evidence.local_path() else {
      return Err(TaskError::execution(format!(
        "evidence {} has no local copy",
        evidence.name()
      )));
    };
    let Some(output_dir) = result.output_dir().map(|p| p.to_path_buf()) else {
      return Err(TaskError::execution("result has no output directory"));
    };

    let metadata = fs::metadata(path).await?;
    let report = StatReport {
      name: evidence.name().to_string(),
      kind: evidence.kind(),
      size: metadata.len(),
      is_dir: metadata.is_dir(),
      read_only: metadata.permissions().readonly(),
    };
    result.log(format!(
      "{} is {} bytes ({:?})",
      report.name, report.size, report.kind
    ));

    let report_path = output_dir.join(STAT_FILE_NAME);
    let content = serde_json::to_vec_pretty(&report)
      .map_err(|e| TaskError::execution(format!("failed to encode stat report: {}", e)))?;
    fs::write(&report_path, content).await?;

    result.add_evidence(Box::new(ReportEvidence::new(report_path)));
    result.set_status(format!("Recorded metadata for {}", report.name));
    Ok(())
  }
}
