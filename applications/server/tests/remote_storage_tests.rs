//! Tests for remote delivery and source fetching over HTTP.
//!
//! These tests use mock servers in place of the object store and the
//! recording host.

mod common;

use bytes::Bytes;
use common::{create_test_state, create_test_state_with, FakeExecutor};
use mastering_core::{JobStatus, MasteringError, SpecOverrides};
use mastering_server::{
    config::RemoteStorageSettings,
    jobs::{JobInput, MasteringRequest},
    services::{HttpObjectStorage, RemoteStorage},
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(endpoint: String, token: Option<&str>) -> RemoteStorageSettings {
    RemoteStorageSettings {
        endpoint,
        public_url: Some("https://cdn.example.com/masters".to_string()),
        token: token.map(str::to_string),
    }
}

// =============================================================================
// Object Storage Tests
// =============================================================================

mod object_storage {
    use super::*;

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/mastered_1.wav"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.wav");
        std::fs::write(&file, b"master").unwrap();

        let storage = HttpObjectStorage::new(&settings(
            format!("{}/bucket", server.uri()),
            Some("s3cret"),
        ))
        .unwrap();
        let url = storage.upload(&file, "mastered_1.wav").await.unwrap();

        assert_eq!(url, "https://cdn.example.com/masters/mastered_1.wav");
    }

    #[tokio::test]
    async fn test_rejected_upload_is_storage_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.wav");
        std::fs::write(&file, b"master").unwrap();

        let storage = HttpObjectStorage::new(&settings(server.uri(), None)).unwrap();
        let err = storage.upload(&file, "mastered_2.wav").await.unwrap_err();

        match err {
            MasteringError::Storage(msg) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("AccessDenied"));
            }
            other => panic!("expected storage error, got {:?}", other),
        }
    }
}

// =============================================================================
// Workflow Delivery Tests
// =============================================================================

mod delivery {
    use super::*;

    fn request(input: JobInput) -> MasteringRequest {
        MasteringRequest {
            input,
            preset: Some("streaming".to_string()),
            overrides: SpecOverrides::default(),
            project_name: None,
            track_name: None,
        }
    }

    #[tokio::test]
    async fn test_completed_job_references_remote_url() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let remote: Arc<dyn RemoteStorage> =
            Arc::new(HttpObjectStorage::new(&settings(server.uri(), None)).unwrap());
        let (state, dir) =
            create_test_state(Arc::new(FakeExecutor::mastering_to(-14.0)), Some(remote)).await;

        let job = state
            .queue
            .submit_and_wait(request(JobInput::Upload {
                filename: "mix.wav".to_string(),
                data: Bytes::from_static(b"RIFF"),
            }))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(
            job.output_artifact_ref.unwrap(),
            format!("https://cdn.example.com/masters/mastered_{}.wav", job.id)
        );
        assert_eq!(common::entries(&dir.path().join("masters")), 0);
        assert_eq!(common::entries(&dir.path().join("tmp")), 0);
    }

    #[tokio::test]
    async fn test_source_url_is_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stems/final.wav"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....WAVE".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let (state, _dir) =
            create_test_state(Arc::new(FakeExecutor::mastering_to(-14.0)), None).await;
        let url = format!("{}/stems/final.wav", server.uri());

        let job = state
            .queue
            .submit_and_wait(request(JobInput::SourceUrl(url.clone())))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.input_ref, url);
    }

    #[tokio::test]
    async fn test_unreachable_source_fails_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let executor = Arc::new(FakeExecutor::mastering_to(-14.0));
        let (state, _dir) = create_test_state(executor.clone(), None).await;

        let job = state
            .queue
            .submit_and_wait(request(JobInput::SourceUrl(format!(
                "{}/missing.wav",
                server.uri()
            ))))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().starts_with("Source recording not found"));
        assert!(job.started_at.is_none());
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_stalled_sources_release_their_workers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"RIFF".to_vec())
                    .set_delay(Duration::from_secs(3600)),
            )
            .mount(&server)
            .await;

        // Default pool of two workers, both handed a stalled source first
        let (state, _dir) = create_test_state_with(
            Arc::new(FakeExecutor::mastering_to(-14.0)),
            None,
            |config| config.engine.fetch_timeout_secs = 1,
        )
        .await;

        let mut stalled = Vec::new();
        for i in 0..2 {
            let url = format!("{}/slow-{}.wav", server.uri(), i);
            stalled.push(state.queue.submit(request(JobInput::SourceUrl(url))).await.unwrap());
        }

        let upload = state.queue.submit_and_wait(request(JobInput::Upload {
            filename: "mix.wav".to_string(),
            data: Bytes::from_static(b"RIFF"),
        }));
        let job = tokio::time::timeout(Duration::from_secs(15), upload)
            .await
            .expect("upload job stuck behind stalled fetches")
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        for job in stalled {
            let finished = state.tracker.wait_for_terminal(&job.id).await.unwrap();
            assert_eq!(finished.status, JobStatus::Failed);
            assert!(finished
                .error_message
                .unwrap()
                .starts_with("Source recording not found"));
        }
    }

    #[tokio::test]
    async fn test_oversized_source_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stems/huge.wav"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2 * 1024 * 1024]))
            .mount(&server)
            .await;

        let executor = Arc::new(FakeExecutor::mastering_to(-14.0));
        let (state, dir) = create_test_state_with(executor.clone(), None, |config| {
            config.server.max_upload_mb = 1;
        })
        .await;

        let job = state
            .queue
            .submit_and_wait(request(JobInput::SourceUrl(format!(
                "{}/stems/huge.wav",
                server.uri()
            ))))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("larger than 1048576 bytes"));
        assert_eq!(executor.calls(), 0);
        assert_eq!(common::entries(&dir.path().join("tmp")), 0);
    }
}
