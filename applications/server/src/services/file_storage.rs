/// File storage service - temp files for running jobs and the local output directory
use crate::error::{Result, ServerError};
use mastering_core::{JobId, MasteringError, OutputFormat};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct FileStorage {
    temp_dir: PathBuf,
    output_dir: PathBuf,
}

/// Temp files owned by one job, removed when dropped
///
/// Removal runs on every exit path of the workflow, including early returns on
/// errors and panics that unwind through the worker.
#[derive(Debug)]
pub struct JobFiles {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Drop for JobFiles {
    fn drop(&mut self) {
        for path in [&self.input, &self.output] {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::trace!(path = %path.display(), "Removed temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Failed to remove temp file: {}", e);
                }
            }
        }
    }
}

impl FileStorage {
    pub fn new(temp_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            temp_dir,
            output_dir,
        }
    }

    /// Create the temp and output directories
    ///
    /// Called once at startup before any job is accepted.
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.temp_dir).await?;
        fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Allocate temp paths for a job
    ///
    /// Names derive from the job id, so concurrent jobs never collide.
    pub fn job_files(
        &self,
        job_id: &JobId,
        input_extension: &str,
        format: OutputFormat,
    ) -> JobFiles {
        let extension = sanitize_extension(input_extension);
        JobFiles {
            input: self
                .temp_dir
                .join(format!("{}_input.{}", job_id.as_str(), extension)),
            output: self
                .temp_dir
                .join(format!("{}_output.{}", job_id.as_str(), format.extension())),
        }
    }

    /// Write uploaded input bytes to a job's temp input file
    pub async fn store_input(
        &self,
        files: &JobFiles,
        data: &[u8],
    ) -> std::result::Result<(), MasteringError> {
        if let Some(parent) = files.input.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&files.input, data).await?;
        Ok(())
    }

    /// Keep a finished master in the output directory
    pub async fn retain_output(
        &self,
        source: &Path,
        filename: &str,
    ) -> std::result::Result<PathBuf, MasteringError> {
        if !is_plain_filename(filename) {
            return Err(MasteringError::validation(format!(
                "Invalid output file name: {}",
                filename
            )));
        }
        let destination = self.output_dir.join(filename);
        fs::create_dir_all(&self.output_dir).await?;

        // Rename fails across filesystems; fall back to copying.
        if fs::rename(source, &destination).await.is_err() {
            fs::copy(source, &destination).await?;
        }
        Ok(destination)
    }

    /// Resolve a download filename to a path inside the output directory
    pub fn get_output_path(&self, filename: &str) -> Result<PathBuf> {
        if !is_plain_filename(filename) {
            return Err(ServerError::NotFound(format!("File not found: {}", filename)));
        }
        let path = self.output_dir.join(filename);
        if !path.is_file() {
            return Err(ServerError::NotFound(format!("File not found: {}", filename)));
        }
        self.validate_path(&path)?;
        Ok(path)
    }

    /// Validate that a path is within the output directory (prevent directory traversal)
    pub fn validate_path(&self, path: &Path) -> Result<()> {
        let canonical_base = self
            .output_dir
            .canonicalize()
            .map_err(|e| ServerError::Internal(format!("Invalid output directory: {}", e)))?;

        let canonical_path = path
            .canonicalize()
            .map_err(|e| ServerError::NotFound(format!("Invalid path: {}", e)))?;

        if !canonical_path.starts_with(&canonical_base) {
            return Err(ServerError::BadRequest(
                "Path traversal attempt detected".to_string(),
            ));
        }

        Ok(())
    }
}

/// Content type of a master, preferring the engine's own format table
pub fn content_type(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(OutputFormat::from_extension)
        .map_or_else(
            || mime_guess::from_path(path).first_or_octet_stream().to_string(),
            |format| format.mime_type().to_string(),
        )
}

/// Plain file name with no separators or leading dot
fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn sanitize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .trim_start_matches('.')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(8)
        .collect::<String>()
        .to_lowercase();
    if cleaned.is_empty() {
        "bin".to_string()
    } else {
        cleaned
    }
}
