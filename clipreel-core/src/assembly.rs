use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

use crate::clip::DownloadRecord;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("no downloaded clips to assemble")]
    NothingToAssemble,
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with status {status:?}")]
    Failed {
        program: String,
        status: Option<i32>,
    },
}

pub type AssemblyResult<T> = Result<T, AssemblyError>;

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<ExitStatus>;
}

/// Runs the tool with the caller's stdio attached and waits for it to exit.
#[derive(Debug, Default)]
pub struct SystemCommandExecutor;

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<ExitStatus> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
    }
}

/// Ordered inputs and the output path for one concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyJob {
    inputs: Vec<PathBuf>,
    output: PathBuf,
}

impl AssemblyJob {
    pub fn new(inputs: Vec<PathBuf>, output: PathBuf) -> AssemblyResult<Self> {
        if inputs.is_empty() {
            return Err(AssemblyError::NothingToAssemble);
        }
        Ok(Self { inputs, output })
    }

    /// Builds a job from download records, ordered by their catalog position.
    pub fn from_records(records: &[DownloadRecord], output: PathBuf) -> AssemblyResult<Self> {
        let mut ordered: Vec<&DownloadRecord> = records.iter().collect();
        ordered.sort_by_key(|record| record.sequence_index);
        let inputs = ordered
            .into_iter()
            .map(|record| record.local_path.clone())
            .collect();
        Self::new(inputs, output)
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// `[0:v] [0:a] [1:v] [1:a] concat=n=2:v=1:a=1 [v] [a]`
    pub fn filter_graph(&self) -> String {
        let streams: Vec<String> = (0..self.inputs.len())
            .map(|index| format!("[{index}:v] [{index}:a]"))
            .collect();
        format!(
            "{} concat=n={}:v=1:a=1 [v] [a]",
            streams.join(" "),
            self.inputs.len()
        )
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.inputs.len() * 2 + 8);
        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
        }
        args.push("-filter_complex".to_string());
        args.push(self.filter_graph());
        args.extend(["-map", "[v]", "-map", "[a]", "-y"].map(String::from));
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

pub struct VideoAssembler {
    program: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl fmt::Debug for VideoAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoAssembler")
            .field("program", &self.program)
            .finish()
    }
}

impl VideoAssembler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            executor: Arc::new(SystemCommandExecutor),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub async fn assemble_paths(
        &self,
        ordered_paths: Vec<PathBuf>,
        output: PathBuf,
    ) -> AssemblyResult<PathBuf> {
        self.assemble(AssemblyJob::new(ordered_paths, output)?)
            .await
    }

    pub async fn assemble(&self, job: AssemblyJob) -> AssemblyResult<PathBuf> {
        let program = self.program.display().to_string();
        let args = job.args();
        info!(program = %program, inputs = job.inputs.len(), output = %job.output.display(), "merging clips");
        let status = self
            .executor
            .run(&self.program, &args)
            .await
            .map_err(|source| AssemblyError::Spawn {
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            error!(program = %program, status = ?status.code(), "merge failed");
            return Err(AssemblyError::Failed {
                program,
                status: status.code(),
            });
        }
        info!(output = %job.output.display(), "merge complete");
        Ok(job.output)
    }
}
