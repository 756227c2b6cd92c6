//! External-process PDF converters (LibreOffice, docx2pdf, …).

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::application::convert::{ConvertError, Converter};

const INPUT_NAME: &str = "document.docx";
const OUTPUT_NAME: &str = "document.pdf";
const MAX_STDERR_CHARS: usize = 400;

/// Runs `program args…` once per document inside a scratch directory.
///
/// Argument tokens: `{input}` is the document path, `{outdir}` a directory the
/// program may write into, `{output}` the exact PDF path expected back. When
/// `{output}` is not used the PDF is looked up as `{outdir}/document.pdf`.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandConverter {
    pub fn new(
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            timeout,
        }
    }

    fn expand_args(&self, input: &Path, outdir: &Path, output: &Path) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input.to_string_lossy())
                    .replace("{outdir}", &outdir.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
            })
            .collect()
    }
}

#[async_trait]
impl Converter for CommandConverter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn convert(&self, document: &[u8]) -> Result<Vec<u8>, ConvertError> {
        let started_at = Instant::now();
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join(INPUT_NAME);
        let outdir = scratch.path().join("out");
        let output = outdir.join(OUTPUT_NAME);
        tokio::fs::write(&input, document).await?;
        tokio::fs::create_dir_all(&outdir).await?;

        let mut command = Command::new(&self.program);
        command
            .args(self.expand_args(&input, &outdir, &output))
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                warn!(
                    target = "infra::convert",
                    op = "convert::command",
                    backend = %self.name,
                    result = "timeout",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "conversion backend timed out"
                );
                return Err(ConvertError::Timeout {
                    timeout: self.timeout,
                });
            }
            Ok(result) => result,
        };

        let output_status = result.map_err(|err| {
            warn!(
                target = "infra::convert",
                op = "convert::command",
                backend = %self.name,
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error_code = "spawn",
                error = %err,
                "failed to spawn conversion backend"
            );
            if err.kind() == ErrorKind::NotFound {
                ConvertError::Unavailable(format!("`{}` not found", self.program.display()))
            } else {
                ConvertError::Io(err)
            }
        })?;

        if !output_status.status.success() {
            let stderr: String = String::from_utf8_lossy(&output_status.stderr)
                .trim()
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();
            let exit_code = output_status.status.code().map(i64::from).unwrap_or(-1);
            warn!(
                target = "infra::convert",
                op = "convert::command",
                backend = %self.name,
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code,
                stderr = %stderr,
                "conversion backend exited with failure"
            );
            return Err(ConvertError::Failed(format!("exit {exit_code}: {stderr}")));
        }

        let pdf = match tokio::fs::read(&output).await {
            Ok(pdf) => pdf,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ConvertError::Failed("backend produced no output file".into()));
            }
            Err(err) => return Err(ConvertError::Io(err)),
        };

        debug!(
            target = "infra::convert",
            op = "convert::command",
            backend = %self.name,
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            output_bytes = pdf.len(),
            "conversion backend finished"
        );
        Ok(pdf)
    }
}
