/// Artifact delivery - turns a finished master into one stable download reference
use crate::services::{FileStorage, RemoteStorage};
use mastering_core::{JobId, MasteringError, OutputFormat};
use std::path::Path;
use std::sync::Arc;

/// Longest project or track fragment kept in an output filename
const MAX_NAME_FRAGMENT: usize = 48;

/// Route prefix serving masters kept in the local output directory
pub const DOWNLOAD_ROUTE: &str = "/download";

pub struct ArtifactDelivery {
    file_storage: Arc<FileStorage>,
    remote: Option<Arc<dyn RemoteStorage>>,
    public_base_url: String,
}

impl ArtifactDelivery {
    pub fn new(
        file_storage: Arc<FileStorage>,
        remote: Option<Arc<dyn RemoteStorage>>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            file_storage,
            remote,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Deliver `source` under `filename` and return its reference
    ///
    /// Remote storage is tried first when configured. Any remote failure is
    /// absorbed and the file is kept in the local output directory instead, so
    /// a successful return looks the same on both paths.
    pub async fn deliver(&self, source: &Path, filename: &str) -> Result<String, MasteringError> {
        if let Some(remote) = &self.remote {
            match remote.upload(source, filename).await {
                Ok(url) => return Ok(url),
                Err(e) => {
                    tracing::warn!(
                        filename = %filename,
                        "Remote upload failed, keeping master locally: {}",
                        e
                    );
                }
            }
        }

        let kept = self.file_storage.retain_output(source, filename).await?;
        tracing::debug!(path = %kept.display(), "Master kept in local output directory");

        Ok(self.local_reference(filename))
    }

    fn local_reference(&self, filename: &str) -> String {
        format!("{}{}/{}", self.public_base_url, DOWNLOAD_ROUTE, filename)
    }
}

/// Name of a delivered master
///
/// `<project>_<track>_mastered_<jobId>.<ext>` when both names are given,
/// otherwise `mastered_<jobId>.<ext>`.
pub fn output_filename(
    job_id: &JobId,
    project_name: Option<&str>,
    track_name: Option<&str>,
    format: OutputFormat,
) -> String {
    let project = project_name.map(name_fragment).filter(|s| !s.is_empty());
    let track = track_name.map(name_fragment).filter(|s| !s.is_empty());

    match (project, track) {
        (Some(project), Some(track)) => format!(
            "{}_{}_mastered_{}.{}",
            project,
            track,
            job_id.as_str(),
            format.extension()
        ),
        _ => format!("mastered_{}.{}", job_id.as_str(), format.extension()),
    }
}

fn name_fragment(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .take(MAX_NAME_FRAGMENT)
        .collect()
}
