//! Runs the external ingestion tool as a subprocess.
//!
//! The tool is invoked as
//! `<program> [leading args] <repo-url> --format json --max-size <bytes> [--include-pattern|--exclude-pattern <pattern>]`
//! inside `<tmp_base>/<ingest_id>` and must print `{"summary", "tree", "content"}`
//! as JSON on stdout. The text digest is also written to `<owner>-<repo>.txt` in that
//! folder, which is what `/-/download` serves and what the retention sweeper reads.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gitdigest_ingest_types::{
    IngestDigest, IngestError, IngestRequest, IngestResponse, Ingestor, ResponseFormat,
};
use serde::Deserialize;
use tokio::fs;
use tokio::process::Command;
use tracing::{error, info};

const GITHUB_BASE: &str = "https://github.com";

#[derive(Debug, Deserialize)]
struct ToolOutput {
    summary: String,
    tree: String,
    content: String,
}

#[derive(Debug, Clone)]
pub struct CommandIngestor {
    program: String,
    leading_args: Vec<String>,
    tmp_base_path: PathBuf,
    timeout: Duration,
}

impl CommandIngestor {
    pub fn new(
        program: impl Into<String>,
        leading_args: Vec<String>,
        tmp_base_path: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args,
            tmp_base_path,
            timeout,
        }
    }

    fn work_dir(&self, ingest_id: &str) -> PathBuf {
        self.tmp_base_path.join(ingest_id)
    }

    async fn run_tool(
        &self,
        request: &IngestRequest,
        repo_url: &str,
        work_dir: &Path,
    ) -> Result<ToolOutput, IngestError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        cmd.arg(repo_url);
        cmd.arg("--format").arg("json");
        cmd.arg("--max-size").arg(request.max_file_size.to_string());
        if !request.pattern.trim().is_empty() {
            cmd.arg(format!("--{}-pattern", request.pattern_type.as_str()))
                .arg(request.pattern.trim());
        }
        cmd.current_dir(work_dir);
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| IngestError::TimedOut(self.timeout))??;

        if !output.status.success() {
            return Err(IngestError::Failed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

#[async_trait]
impl Ingestor for CommandIngestor {
    async fn process_query(&self, request: IngestRequest) -> Result<IngestResponse, IngestError> {
        let (owner, repo) = request
            .owner_and_repo()
            .ok_or_else(|| IngestError::InvalidSource(request.source.clone()))?;
        let repo_url = format!("{GITHUB_BASE}/{owner}/{repo}");
        let marker_name = format!("{owner}-{repo}.txt");

        let work_dir = self.work_dir(&request.ingest_id);
        fs::create_dir_all(&work_dir).await?;

        info!(
            stage = "ingest",
            event = "ingest.begin",
            ingest_id = %request.ingest_id,
            repo_url = %repo_url,
            max_file_size = request.max_file_size,
            pattern_type = request.pattern_type.as_str(),
            format = %request.response_format,
            "starting ingestion"
        );

        let start = Instant::now();
        let output = match self.run_tool(&request, &repo_url, &work_dir).await {
            Ok(output) => output,
            Err(err) => {
                error!(
                    stage = "ingest",
                    event = "ingest.end",
                    result = "fail",
                    ingest_id = %request.ingest_id,
                    repo_url = %repo_url,
                    duration_ms = start.elapsed().as_millis(),
                    error = %err,
                    "ingestion failed"
                );
                return Err(err);
            }
        };

        let digest = IngestDigest {
            summary: output.summary,
            tree: output.tree,
            content: output.content,
            ingest_id: request.ingest_id.clone(),
        };
        let text = digest.to_text();
        fs::write(work_dir.join(&marker_name), &text).await?;

        info!(
            stage = "ingest",
            event = "ingest.end",
            result = "ok",
            ingest_id = %request.ingest_id,
            repo_url = %repo_url,
            duration_ms = start.elapsed().as_millis(),
            "ingestion completed"
        );

        let body = match request.response_format {
            ResponseFormat::Text => text.into_bytes(),
            ResponseFormat::Json => serde_json::to_vec(&digest)?,
        };
        Ok(IngestResponse::ok(request.response_format, body))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use gitdigest_ingest_types::PatternType;

    fn request(format: ResponseFormat) -> IngestRequest {
        IngestRequest {
            source: "octocat/Hello-World".into(),
            max_file_size: 51_200,
            pattern_type: PatternType::Exclude,
            pattern: String::new(),
            response_format: format,
            ingest_id: "ingest-1".into(),
        }
    }

    fn shell(script: &str, base: &Path) -> CommandIngestor {
        CommandIngestor::new(
            "sh",
            vec!["-c".into(), script.into(), "ingest-tool".into()],
            base.to_path_buf(),
            Duration::from_secs(5),
        )
    }

    const DIGEST_JSON: &str =
        r#"echo '{"summary":"Test summary","tree":"Test tree","content":"Test content"}'"#;

    #[tokio::test]
    async fn json_response_carries_ingest_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ingestor = shell(DIGEST_JSON, dir.path());

        let response = ingestor
            .process_query(request(ResponseFormat::Json))
            .await
            .expect("ingest");

        assert!(response.is_json());
        let digest: IngestDigest = serde_json::from_slice(&response.body).expect("json");
        assert_eq!(digest.summary, "Test summary");
        assert_eq!(digest.ingest_id, "ingest-1");
    }

    #[tokio::test]
    async fn writes_marker_file_and_returns_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ingestor = shell(DIGEST_JSON, dir.path());

        let response = ingestor
            .process_query(request(ResponseFormat::Text))
            .await
            .expect("ingest");

        let body = String::from_utf8(response.body).expect("utf8");
        assert_eq!(body, "Test summary\n\nTest tree\n\nTest content");
        let marker = dir.path().join("ingest-1").join("octocat-Hello-World.txt");
        assert_eq!(std::fs::read_to_string(marker).expect("marker"), body);
    }

    #[tokio::test]
    async fn passes_pattern_arguments() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Echo the received arguments back inside the summary.
        let script = r#"printf '{"summary":"%s","tree":"","content":""}' "$*""#;
        let ingestor = shell(script, dir.path());
        let mut req = request(ResponseFormat::Json);
        req.pattern_type = PatternType::Include;
        req.pattern = " *.md ".into();

        let response = ingestor.process_query(req).await.expect("ingest");
        let digest: IngestDigest = serde_json::from_slice(&response.body).expect("json");
        assert_eq!(
            digest.summary,
            "https://github.com/octocat/Hello-World --format json --max-size 51200 --include-pattern *.md"
        );
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ingestor = shell("echo 'repository not found' >&2; exit 3", dir.path());

        let err = ingestor
            .process_query(request(ResponseFormat::Text))
            .await
            .expect_err("should fail");

        match err {
            IngestError::Failed { status, stderr } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "repository not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_output_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ingestor = shell("echo not-json", dir.path());

        let err = ingestor
            .process_query(request(ResponseFormat::Json))
            .await
            .expect_err("should fail");
        assert!(matches!(err, IngestError::Malformed(_)));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ingestor = shell("sleep 5", dir.path());
        ingestor.timeout = Duration::from_millis(100);

        let err = ingestor
            .process_query(request(ResponseFormat::Text))
            .await
            .expect_err("should time out");
        assert!(matches!(err, IngestError::TimedOut(_)));
    }

    #[tokio::test]
    async fn rejects_malformed_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ingestor = shell(DIGEST_JSON, dir.path());
        let mut req = request(ResponseFormat::Text);
        req.source = "no-slash".into();

        let err = ingestor.process_query(req).await.expect_err("should fail");
        assert!(matches!(err, IngestError::InvalidSource(_)));
    }
}
