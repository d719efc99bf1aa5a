/// Mastering API routes
use crate::{
    error::{Result, ServerError},
    jobs::{JobInput, MasteringRequest},
    state::AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use mastering_core::{
    JobId, JobStatus, LoudnessMetrics, MasteringJob, ProcessingSpec, SpecOverrides,
};
use serde::Serialize;

/// Loudness figures reported for a finished master
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputMetrics {
    #[serde(rename = "integratedLoudnessLUFS")]
    pub integrated_loudness_lufs: f64,
    #[serde(rename = "loudnessRangeLU")]
    pub loudness_range_lu: f64,
    #[serde(rename = "truePeakDB")]
    pub true_peak_db: f64,
}

impl From<&LoudnessMetrics> for OutputMetrics {
    fn from(m: &LoudnessMetrics) -> Self {
        Self {
            integrated_loudness_lufs: m.integrated_loudness_lufs,
            loudness_range_lu: m.loudness_range_lu,
            true_peak_db: m.true_peak_db,
        }
    }
}

/// Outbound job result
///
/// Identical in shape for remote and local delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: JobId,
    pub status: JobStatus,
    pub download_url: Option<String>,
    pub preset: String,
    pub settings: ProcessingSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_loudness: Option<LoudnessMetrics>,
    pub output_metrics: Option<OutputMetrics>,
    pub processing_time_ms: Option<u64>,
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<MasteringJob> for JobResult {
    fn from(job: MasteringJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            download_url: job.output_artifact_ref,
            preset: job.preset_used,
            settings: job.resolved_spec,
            input_loudness: job.input_metrics,
            output_metrics: job.output_metrics.as_ref().map(OutputMetrics::from),
            processing_time_ms: job.processing_time_ms,
            notes: job.notes,
            error: job.error_message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_metrics: Option<OutputMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<MasteringJob> for StatusResponse {
    fn from(job: MasteringJob) -> Self {
        Self {
            progress: job.status.progress(),
            job_id: job.id,
            status: job.status,
            download_url: job.output_artifact_ref,
            output_metrics: job.output_metrics.as_ref().map(OutputMetrics::from),
            error: job.error_message,
        }
    }
}

/// Parsed `multipart/form-data` mastering request
#[derive(Debug, Default)]
struct MasterForm {
    file: Option<(String, Bytes)>,
    source_url: Option<String>,
    preset: Option<String>,
    settings: Option<String>,
    project_name: Option<String>,
    track_name: Option<String>,
    wait: Option<String>,
}

impl MasterForm {
    fn wait(&self) -> Result<bool> {
        match self.wait.as_deref().map(str::trim) {
            None | Some("") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
            Some(v) => Err(ServerError::BadRequest(format!("Invalid wait flag: {}", v))),
        }
    }

    fn into_request(self) -> Result<MasteringRequest> {
        let overrides = SpecOverrides::from_json(self.settings.as_deref().unwrap_or_default())?;

        let input = match (self.file, self.source_url) {
            (Some((filename, data)), _) if !data.is_empty() => JobInput::Upload { filename, data },
            (_, Some(url)) => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ServerError::BadRequest(
                        "sourceUrl must be an http(s) URL".to_string(),
                    ));
                }
                JobInput::SourceUrl(url)
            }
            _ => {
                return Err(ServerError::BadRequest(
                    "Missing audio: send a file part or a sourceUrl field".to_string(),
                ))
            }
        };

        Ok(MasteringRequest {
            input,
            preset: self.preset,
            overrides,
            project_name: self.project_name,
            track_name: self.track_name,
        })
    }
}

/// POST /api/master
/// Accept audio plus options and run the two-pass mastering workflow
pub async fn submit(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<JobResult>)> {
    let form = parse_form(&headers, body).await?;
    let wait = form.wait()?;
    let request = form.into_request()?;

    let job = app_state.queue.submit(request).await?;
    tracing::info!(job_id = %job.id, preset = %job.preset_used, wait, "Mastering request accepted");

    if !wait {
        return Ok((StatusCode::ACCEPTED, Json(JobResult::from(job))));
    }

    let finished = app_state.tracker.wait_for_terminal(&job.id).await?;
    Ok((StatusCode::OK, Json(JobResult::from(finished))))
}

/// GET /api/master/:id
pub async fn get_result(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<Json<JobResult>> {
    let job = app_state.tracker.get(&JobId::new(id)).await?;
    Ok(Json(JobResult::from(job)))
}

/// GET /api/master/:id/status
pub async fn get_status(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<Json<StatusResponse>> {
    let job = app_state.tracker.get(&JobId::new(id)).await?;
    Ok(Json(StatusResponse::from(job)))
}

async fn parse_form(headers: &HeaderMap, body: Bytes) -> Result<MasterForm> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ServerError::BadRequest("Missing Content-Type".to_string()))?;

    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| ServerError::BadRequest("Expected multipart/form-data".to_string()))?;

    // Convert Bytes to a stream for multer
    let stream = futures_util::stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut form = MasterForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Failed to read file: {}", e)))?;
            form.file = Some((filename, data));
            continue;
        }

        let slot = match name.as_str() {
            "sourceUrl" => &mut form.source_url,
            "preset" => &mut form.preset,
            "settings" => &mut form.settings,
            "projectName" => &mut form.project_name,
            "trackName" => &mut form.track_name,
            "wait" => &mut form.wait,
            _ => continue,
        };
        let text = field
            .text()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read {}: {}", name, e)))?;
        let text = text.trim();
        if !text.is_empty() {
            *slot = Some(text.to_string());
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_flag() {
        let mut form = MasterForm::default();
        assert!(form.wait().unwrap());
        form.wait = Some("false".to_string());
        assert!(!form.wait().unwrap());
        form.wait = Some("0".to_string());
        assert!(!form.wait().unwrap());
        form.wait = Some("maybe".to_string());
        assert!(form.wait().is_err());
    }

    #[test]
    fn test_form_needs_audio() {
        let err = MasterForm::default().into_request().unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));

        let form = MasterForm {
            source_url: Some("ftp://example.com/mix.wav".to_string()),
            ..MasterForm::default()
        };
        assert!(form.into_request().is_err());
    }

    #[test]
    fn test_bad_settings_are_validation_errors() {
        let form = MasterForm {
            file: Some(("mix.wav".to_string(), Bytes::from_static(b"RIFF"))),
            settings: Some(r#"{"loudnessTargetLUFS": "loud"}"#.to_string()),
            ..MasterForm::default()
        };
        let err = form.into_request().unwrap_err();
        assert!(matches!(
            err,
            ServerError::Mastering(mastering_core::MasteringError::Validation(_))
        ));
    }

    #[test]
    fn test_status_progress_follows_state() {
        let spec = mastering_core::spec::resolve(None, &SpecOverrides::default());
        let job = MasteringJob::new("mix.wav", "streaming", spec);
        let status = StatusResponse::from(job);
        assert_eq!(status.progress, 0);
        assert!(status.download_url.is_none());
    }
}
