/// DSP executor - FFmpeg wrapper for mastering and loudness analysis
use async_trait::async_trait;
use mastering_core::{FilterChain, MasteringError, OutputFormat};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Sample rate of delivered masters (the loudness normalizer resamples internally)
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;

/// Loudness meter used for analysis-only runs
const ANALYSIS_FILTER: &str = "ebur128=peak=true+sample:framelog=verbose";

/// Lines of diagnostic output kept in an execution error
const ERROR_TAIL_LINES: usize = 6;

/// One mastering invocation
#[derive(Debug, Clone, Copy)]
pub struct ProcessRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub chain: &'a FilterChain,
    pub format: OutputFormat,
    pub bitrate_kbps: u32,
}

/// Boundary to the external DSP engine
///
/// Both operations return the engine's diagnostic text on success. A non-zero
/// exit, a spawn failure, or a timeout is a [`MasteringError::Execution`].
#[async_trait]
pub trait DspExecutor: Send + Sync {
    /// Measure loudness without producing output
    async fn analyze(&self, input: &Path) -> Result<String, MasteringError>;

    /// Run the filter chain and write the master
    async fn process(&self, request: ProcessRequest<'_>) -> Result<String, MasteringError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegExecutor {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegExecutor {
    pub fn new(ffmpeg_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg_path,
            timeout,
        }
    }

    /// Check that the binary can be started
    pub async fn version(&self) -> Result<String, MasteringError> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(&self.ffmpeg_path, &e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }

    fn analysis_args(input: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-map".to_string(),
            "0:a:0".to_string(),
            "-af".to_string(),
            ANALYSIS_FILTER.to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ]
    }

    fn process_args(request: &ProcessRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-y".to_string(), // Overwrite output file
            "-i".to_string(),
            request.input.display().to_string(),
            "-map".to_string(),
            "0:a:0".to_string(),
            "-af".to_string(),
            request.chain.to_filtergraph(),
            "-ar".to_string(),
            OUTPUT_SAMPLE_RATE.to_string(),
        ];
        args.extend(request.format.encoder_args(request.bitrate_kbps));
        args.push(request.output.display().to_string());
        args
    }

    /// Run the engine with a wall-clock limit and collect its diagnostic stream
    async fn run(&self, args: Vec<String>) -> Result<String, MasteringError> {
        let child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.ffmpeg_path, &e))?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                MasteringError::execution(format!(
                    "FFmpeg timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| MasteringError::execution(format!("FFmpeg did not finish: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let tail = error_tail(&stderr);
            let message = if tail.is_empty() {
                format!("FFmpeg failed with {}", output.status)
            } else {
                format!("FFmpeg failed: {}", tail)
            };
            return Err(MasteringError::execution(message));
        }

        Ok(stderr)
    }
}

#[async_trait]
impl DspExecutor for FfmpegExecutor {
    async fn analyze(&self, input: &Path) -> Result<String, MasteringError> {
        tracing::debug!(input = %input.display(), "Running loudness analysis");
        self.run(Self::analysis_args(input)).await
    }

    async fn process(&self, request: ProcessRequest<'_>) -> Result<String, MasteringError> {
        tracing::debug!(
            input = %request.input.display(),
            output = %request.output.display(),
            filters = %request.chain,
            "Running mastering chain"
        );
        self.run(Self::process_args(&request)).await
    }
}

fn spawn_error(path: &Path, err: &std::io::Error) -> MasteringError {
    MasteringError::execution(format!("Failed to start {}: {}", path.display(), err))
}

/// Last few meaningful lines of the diagnostic stream
fn error_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}
