/// Local master downloads
use crate::{
    error::{Result, ServerError},
    services::file_storage::content_type,
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// GET /download/:filename
/// Serve a master from the local output directory with range request support
pub async fn download(
    Path(filename): Path<String>,
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    // Resolves inside the output directory or fails
    let file_path = app_state.file_storage.get_output_path(&filename)?;

    let metadata = tokio::fs::metadata(&file_path).await?;
    let file_size = metadata.len();

    let mime_type = content_type(&file_path);
    let disposition = format!("attachment; filename=\"{}\"", filename);

    if let Some(range) = headers.get(header::RANGE) {
        let range_str = range
            .to_str()
            .map_err(|_| ServerError::BadRequest("Invalid Range header".to_string()))?;

        let Some((start, end)) = parse_range(range_str, file_size) else {
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", file_size))
                .body(Body::empty())
                .map_err(|e| ServerError::Internal(format!("Failed to build response: {}", e)));
        };

        let mut file = File::open(&file_path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let content_length = end - start + 1;
        let body = Body::from_stream(ReaderStream::new(file.take(content_length)));

        return Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, mime_type)
            .header(header::CONTENT_LENGTH, content_length)
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, file_size),
            )
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(body)
            .map_err(|e| ServerError::Internal(format!("Failed to build response: {}", e)));
    }

    // No range request - stream entire file
    let file = File::open(&file_path).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CONTENT_LENGTH, file_size)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(body)
        .map_err(|e| ServerError::Internal(format!("Failed to build response: {}", e)))
}

/// Parse HTTP Range header
/// Format: "bytes=start-end", "bytes=start-" or "bytes=-suffix"
fn parse_range(range: &str, file_size: u64) -> Option<(u64, u64)> {
    let range = range.strip_prefix("bytes=")?.trim();
    let (start_str, end_str) = range.split_once('-')?;
    if file_size == 0 {
        return None;
    }

    if start_str.is_empty() {
        let suffix: u64 = end_str.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        return Some((file_size.saturating_sub(suffix), file_size - 1));
    }

    let start: u64 = start_str.parse().ok()?;
    let end: u64 = if end_str.is_empty() {
        file_size - 1
    } else {
        end_str.parse::<u64>().ok()?.min(file_size - 1)
    };

    (start <= end).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("bytes=0-999", 10000), Some((0, 999)));
        assert_eq!(parse_range("bytes=1000-", 10000), Some((1000, 9999)));
        assert_eq!(parse_range("bytes=0-20000", 10000), Some((0, 9999)));
        assert_eq!(parse_range("bytes=-500", 10000), Some((9500, 9999)));
        assert_eq!(parse_range("bytes=10000-", 10000), None); // Out of bounds
        assert_eq!(parse_range("bytes=0-0", 0), None);
        assert_eq!(parse_range("invalid", 10000), None);
    }
}
