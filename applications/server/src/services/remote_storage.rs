/// Remote object storage - uploads finished masters over HTTP
use crate::config::RemoteStorageSettings;
use crate::services::file_storage::content_type;
use async_trait::async_trait;
use mastering_core::MasteringError;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

/// Remote storage collaborator
///
/// Any error is reported as [`MasteringError::Storage`]; artifact delivery
/// treats it as a signal to keep the file locally.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Upload a local file and return its public URL
    async fn upload(&self, local_path: &Path, object_name: &str) -> Result<String, MasteringError>;
}

/// Object store reachable with plain `PUT` requests (S3 presigned-style buckets, MinIO, R2 gateways)
#[derive(Debug, Clone)]
pub struct HttpObjectStorage {
    http: Client,
    endpoint: String,
    public_url: String,
    token: Option<String>,
}

impl HttpObjectStorage {
    pub fn new(settings: &RemoteStorageSettings) -> Result<Self, MasteringError> {
        let endpoint = settings.endpoint.trim_end_matches('/').to_string();
        let public_url = settings
            .public_url
            .as_deref()
            .unwrap_or(&endpoint)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("MasteringServer/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MasteringError::storage(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            public_url,
            token: settings.token.clone(),
        })
    }
}

#[async_trait]
impl RemoteStorage for HttpObjectStorage {
    async fn upload(&self, local_path: &Path, object_name: &str) -> Result<String, MasteringError> {
        let data = tokio::fs::read(local_path).await.map_err(|e| {
            MasteringError::storage(format!("Failed to read {}: {}", local_path.display(), e))
        })?;
        let size = data.len();

        let mime_type = content_type(local_path);

        let url = format!("{}/{}", self.endpoint, object_name);
        let mut request = self
            .http
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(data);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MasteringError::storage(format!("Upload to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MasteringError::storage(format!(
                "Upload to {} rejected ({}): {}",
                url,
                status.as_u16(),
                body.trim()
            )));
        }

        tracing::info!(object = %object_name, size, "Uploaded master to remote storage");
        Ok(format!("{}/{}", self.public_url, object_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_defaults_to_endpoint() {
        let storage = HttpObjectStorage::new(&RemoteStorageSettings {
            endpoint: "https://bucket.example.com/masters/".to_string(),
            public_url: None,
            token: None,
        })
        .unwrap();
        assert_eq!(storage.endpoint, "https://bucket.example.com/masters");
        assert_eq!(storage.public_url, "https://bucket.example.com/masters");
    }

    #[test]
    fn test_explicit_public_url() {
        let storage = HttpObjectStorage::new(&RemoteStorageSettings {
            endpoint: "https://upload.example.com".to_string(),
            public_url: Some("https://cdn.example.com/".to_string()),
            token: Some("secret".to_string()),
        })
        .unwrap();
        assert_eq!(storage.public_url, "https://cdn.example.com");
    }

    #[tokio::test]
    async fn test_missing_file_is_storage_error() {
        let storage = HttpObjectStorage::new(&RemoteStorageSettings {
            endpoint: "http://127.0.0.1:9".to_string(),
            public_url: None,
            token: None,
        })
        .unwrap();
        let err = storage
            .upload(Path::new("/nonexistent/master.wav"), "master.wav")
            .await
            .unwrap_err();
        assert!(matches!(err, MasteringError::Storage(_)));
    }
}
