#![allow(dead_code)]
//! Common test utilities and fixtures

use async_trait::async_trait;
use mastering_core::MasteringError;
use mastering_server::{
    config::ServerConfig,
    services::{DspExecutor, ProcessRequest, RemoteStorage},
    state::AppState,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// EBU R128 summary block as printed by the loudness meter
pub fn r128_summary(integrated: f64, lra: f64, sample_peak: f64, true_peak: f64) -> String {
    format!(
        "[Parsed_ebur128_0 @ 0x5581d1c0] Summary:\n\
         \n\
         \x20 Integrated loudness:\n\
         \x20   I:         {integrated:.1} LUFS\n\
         \x20   Threshold: {:.1} LUFS\n\
         \n\
         \x20 Loudness range:\n\
         \x20   LRA:        {lra:.1} LU\n\
         \x20   Threshold: -34.1 LUFS\n\
         \x20   LRA low:   -24.4 LUFS\n\
         \x20   LRA high:  -17.2 LUFS\n\
         \n\
         \x20 Sample peak:\n\
         \x20   Peak:      {sample_peak:.1} dBFS\n\
         \n\
         \x20 True peak:\n\
         \x20   Peak:      {true_peak:.1} dBFS\n",
        integrated - 10.0
    )
}

/// In-process stand-in for the DSP engine
///
/// Input analysis reports a −20 LUFS mix; output analysis reports
/// `output_lufs`. Processing writes a small file to the requested output.
pub struct FakeExecutor {
    pub output_lufs: f64,
    pub fail_process: Option<String>,
    pub fail_input_analysis: bool,
    pub process_calls: AtomicUsize,
}

impl FakeExecutor {
    pub fn mastering_to(output_lufs: f64) -> Self {
        Self {
            output_lufs,
            fail_process: None,
            fail_input_analysis: false,
            process_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_process: Some(message.to_string()),
            ..Self::mastering_to(-14.0)
        }
    }

    pub fn calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DspExecutor for FakeExecutor {
    async fn analyze(&self, input: &Path) -> Result<String, MasteringError> {
        let is_output = input
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains("_output"));

        if is_output {
            Ok(r128_summary(self.output_lufs, 6.5, -1.4, -1.1))
        } else if self.fail_input_analysis {
            Err(MasteringError::execution("analysis crashed"))
        } else {
            Ok(r128_summary(-20.0, 9.0, -3.0, -2.8))
        }
    }

    async fn process(&self, request: ProcessRequest<'_>) -> Result<String, MasteringError> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        assert!(request.input.is_file(), "input must be staged before processing");

        if let Some(message) = &self.fail_process {
            return Err(MasteringError::execution(message.clone()));
        }
        tokio::fs::write(request.output, b"mastered audio")
            .await
            .map_err(|e| MasteringError::execution(e.to_string()))?;
        Ok(String::new())
    }
}

/// Remote storage that is always down
pub struct FailingRemote;

#[async_trait]
impl RemoteStorage for FailingRemote {
    async fn upload(&self, _: &Path, _: &str) -> Result<String, MasteringError> {
        Err(MasteringError::storage("connection refused"))
    }
}

/// Config rooted in a temp directory
pub fn test_config(dir: &TempDir) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.storage.temp_dir = dir.path().join("tmp");
    config.storage.output_dir = dir.path().join("masters");
    config
}

pub async fn create_test_state(
    executor: Arc<dyn DspExecutor>,
    remote: Option<Arc<dyn RemoteStorage>>,
) -> (AppState, TempDir) {
    create_test_state_with(executor, remote, |_| {}).await
}

/// Same as [`create_test_state`] with config tweaks applied first
pub async fn create_test_state_with(
    executor: Arc<dyn DspExecutor>,
    remote: Option<Arc<dyn RemoteStorage>>,
    configure: impl FnOnce(&mut ServerConfig),
) -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    configure(&mut config);
    let state = AppState::build(config, executor, remote).await.unwrap();
    (state, dir)
}

/// Number of entries left in a directory
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Stereo 16-bit WAV with a 1 kHz tone at the given amplitude
pub fn create_test_wav(path: &Path, seconds: u32, amplitude: f64) -> std::io::Result<()> {
    let sample_rate: u32 = 44_100;
    let channels: u16 = 2;
    let bits_per_sample: u16 = 16;
    let frames = sample_rate * seconds;
    let data_size = frames * u32::from(channels) * u32::from(bits_per_sample / 8);

    let mut wav = Vec::with_capacity(44 + data_size as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    let block_align = channels * (bits_per_sample / 8);
    wav.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());

    for n in 0..frames {
        let t = f64::from(n) / f64::from(sample_rate);
        let sample = (amplitude * (2.0 * std::f64::consts::PI * 1000.0 * t).sin() * 32767.0) as i16;
        for _ in 0..channels {
            wav.extend_from_slice(&sample.to_le_bytes());
        }
    }

    std::fs::write(path, wav)
}
