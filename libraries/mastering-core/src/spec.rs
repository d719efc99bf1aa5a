//! Processing specification and the settings resolver
//!
//! A [`ProcessingSpec`] is built once per request by [`resolve`], which layers
//! caller overrides on top of a preset and the engine defaults. After
//! resolution the spec is treated as immutable.

use crate::error::{MasteringError, Result};
use crate::preset::Preset;
use crate::{CONVENTIONAL_LOUDNESS_MAX_LUFS, CONVENTIONAL_LOUDNESS_MIN_LUFS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default compressor threshold in dBFS
pub const DEFAULT_COMPRESSOR_THRESHOLD_DB: f64 = -18.0;
/// Default compressor ratio
pub const DEFAULT_COMPRESSOR_RATIO: f64 = 2.0;
/// Default compressor attack in milliseconds
pub const DEFAULT_COMPRESSOR_ATTACK_MS: f64 = 20.0;
/// Default compressor release in milliseconds
pub const DEFAULT_COMPRESSOR_RELEASE_MS: f64 = 250.0;
/// Default output bitrate for lossy formats
pub const DEFAULT_OUTPUT_BITRATE_KBPS: u32 = 320;

/// Largest boost or cut accepted for any tonal band
const MAX_TONAL_GAIN_DB: f64 = 12.0;

/// Output container/codec for the mastered file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 24-bit PCM WAV
    #[default]
    Wav,
    /// FLAC (lossless)
    Flac,
    /// MPEG layer III
    Mp3,
    /// AAC in an MPEG-4 container
    Aac,
    /// Ogg Vorbis
    Ogg,
}

impl OutputFormat {
    /// All supported formats
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Wav,
        OutputFormat::Flac,
        OutputFormat::Mp3,
        OutputFormat::Aac,
        OutputFormat::Ogg,
    ];

    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Flac => "flac",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Aac => "m4a",
            OutputFormat::Ogg => "ogg",
        }
    }

    /// Format whose file extension matches, ignoring case
    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(extension))
    }

    /// MIME type served for downloads
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "audio/wav",
            OutputFormat::Flac => "audio/flac",
            OutputFormat::Mp3 => "audio/mpeg",
            OutputFormat::Aac => "audio/mp4",
            OutputFormat::Ogg => "audio/ogg",
        }
    }

    /// Whether the bitrate setting is ignored for this format
    pub fn is_lossless(&self) -> bool {
        matches!(self, OutputFormat::Wav | OutputFormat::Flac)
    }

    /// Encoder arguments for the DSP engine
    pub fn encoder_args(&self, bitrate_kbps: u32) -> Vec<String> {
        let bitrate = format!("{}k", bitrate_kbps);
        let args: Vec<&str> = match self {
            OutputFormat::Wav => vec!["-c:a", "pcm_s24le", "-f", "wav"],
            OutputFormat::Flac => vec!["-c:a", "flac", "-f", "flac"],
            OutputFormat::Mp3 => vec!["-c:a", "libmp3lame", "-b:a", &bitrate, "-f", "mp3"],
            OutputFormat::Aac => vec!["-c:a", "aac", "-b:a", &bitrate, "-f", "ipod"],
            OutputFormat::Ogg => vec!["-c:a", "libvorbis", "-b:a", &bitrate, "-f", "ogg"],
        };
        args.into_iter().map(str::to_string).collect()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Flac => "flac",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Aac => "aac",
            OutputFormat::Ogg => "ogg",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = MasteringError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "flac" => Ok(OutputFormat::Flac),
            "mp3" => Ok(OutputFormat::Mp3),
            "aac" | "m4a" => Ok(OutputFormat::Aac),
            "ogg" | "vorbis" => Ok(OutputFormat::Ogg),
            other => Err(MasteringError::validation(format!(
                "unsupported output format '{}'",
                other
            ))),
        }
    }
}

/// Dynamics settings for the compressor stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressorSettings {
    /// Level above which gain reduction starts (dBFS)
    #[serde(rename = "thresholdDB")]
    pub threshold_db: f64,
    /// Compression ratio; 1.0 disables the stage
    pub ratio: f64,
    /// Attack time in milliseconds
    pub attack_ms: f64,
    /// Release time in milliseconds
    pub release_ms: f64,
    /// Make-up gain in dB
    #[serde(rename = "makeupDB")]
    pub makeup_db: f64,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: DEFAULT_COMPRESSOR_THRESHOLD_DB,
            ratio: DEFAULT_COMPRESSOR_RATIO,
            attack_ms: DEFAULT_COMPRESSOR_ATTACK_MS,
            release_ms: DEFAULT_COMPRESSOR_RELEASE_MS,
            makeup_db: 0.0,
        }
    }
}

/// Fully resolved processing parameters for one mastering job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSpec {
    /// Integrated loudness target (LUFS)
    #[serde(rename = "loudnessTargetLUFS")]
    pub loudness_target_lufs: f64,
    /// True peak ceiling (dBTP), never above 0
    #[serde(rename = "truePeakCeilingDB")]
    pub true_peak_ceiling_db: f64,
    /// Target loudness range (LU)
    #[serde(rename = "loudnessRangeLU")]
    pub loudness_range_lu: f64,
    /// Stereo width in percent, 100 leaves the image untouched
    pub stereo_width_percent: f64,
    /// Low shelf boost (dB)
    #[serde(rename = "bassEnhanceDB")]
    pub bass_enhance_db: f64,
    /// Low-mid boost (dB)
    #[serde(rename = "warmthDB")]
    pub warmth_db: f64,
    /// Upper-mid boost (dB)
    #[serde(rename = "presenceDB")]
    pub presence_db: f64,
    /// High shelf boost (dB)
    #[serde(rename = "airBoostDB")]
    pub air_boost_db: f64,
    /// High-pass corner frequency; `None` disables the stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_cut_hz: Option<f64>,
    /// Compressor settings
    pub compressor: CompressorSettings,
    /// Delivered file format
    pub output_format: OutputFormat,
    /// Bitrate for lossy formats
    pub output_bitrate_kbps: u32,
}

impl ProcessingSpec {
    /// Seed a spec from a preset and the engine defaults
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            loudness_target_lufs: preset.loudness_target_lufs,
            true_peak_ceiling_db: preset.true_peak_ceiling_db,
            loudness_range_lu: preset.loudness_range_lu,
            stereo_width_percent: preset.stereo_width_percent,
            bass_enhance_db: 0.0,
            warmth_db: 0.0,
            presence_db: 0.0,
            air_boost_db: 0.0,
            low_cut_hz: None,
            compressor: CompressorSettings::default(),
            output_format: OutputFormat::default(),
            output_bitrate_kbps: DEFAULT_OUTPUT_BITRATE_KBPS,
        }
    }

    /// Check the hard invariants
    ///
    /// # Errors
    /// Returns [`MasteringError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let numbers = [
            ("loudnessTargetLUFS", self.loudness_target_lufs),
            ("truePeakCeilingDB", self.true_peak_ceiling_db),
            ("loudnessRangeLU", self.loudness_range_lu),
            ("stereoWidthPercent", self.stereo_width_percent),
            ("bassEnhanceDB", self.bass_enhance_db),
            ("warmthDB", self.warmth_db),
            ("presenceDB", self.presence_db),
            ("airBoostDB", self.air_boost_db),
            ("compressor.thresholdDB", self.compressor.threshold_db),
            ("compressor.ratio", self.compressor.ratio),
            ("compressor.attackMs", self.compressor.attack_ms),
            ("compressor.releaseMs", self.compressor.release_ms),
            ("compressor.makeupDB", self.compressor.makeup_db),
        ];
        for (field, value) in numbers {
            if !value.is_finite() {
                return Err(invalid(field, "must be a finite number"));
            }
        }

        if !(-70.0..=-5.0).contains(&self.loudness_target_lufs) {
            return Err(invalid(
                "loudnessTargetLUFS",
                "must be between -70 and -5 LUFS",
            ));
        }
        if !(-9.0..=0.0).contains(&self.true_peak_ceiling_db) {
            return Err(invalid(
                "truePeakCeilingDB",
                "must be between -9 and 0 dBTP",
            ));
        }
        if !(1.0..=20.0).contains(&self.loudness_range_lu) {
            return Err(invalid("loudnessRangeLU", "must be between 1 and 20 LU"));
        }
        if !(50.0..=150.0).contains(&self.stereo_width_percent) {
            return Err(invalid(
                "stereoWidthPercent",
                "must be between 50 and 150 percent",
            ));
        }
        for (field, gain) in [
            ("bassEnhanceDB", self.bass_enhance_db),
            ("warmthDB", self.warmth_db),
            ("presenceDB", self.presence_db),
            ("airBoostDB", self.air_boost_db),
        ] {
            if gain.abs() > MAX_TONAL_GAIN_DB {
                return Err(invalid(field, "must be within +/-12 dB"));
            }
        }
        if let Some(hz) = self.low_cut_hz {
            if !hz.is_finite() || hz <= 0.0 || hz > 500.0 {
                return Err(invalid("lowCutHz", "must be above 0 and at most 500 Hz"));
            }
        }

        let c = &self.compressor;
        if c.ratio < 1.0 || c.ratio > 20.0 {
            return Err(invalid("compressor.ratio", "must be between 1 and 20"));
        }
        if !(-60.0..=0.0).contains(&c.threshold_db) {
            return Err(invalid(
                "compressor.thresholdDB",
                "must be between -60 and 0 dB",
            ));
        }
        if c.attack_ms <= 0.0 || c.attack_ms > 2000.0 {
            return Err(invalid("compressor.attackMs", "must be in (0, 2000] ms"));
        }
        if c.release_ms <= 0.0 || c.release_ms > 9000.0 {
            return Err(invalid("compressor.releaseMs", "must be in (0, 9000] ms"));
        }
        if !(0.0..=24.0).contains(&c.makeup_db) {
            return Err(invalid("compressor.makeupDB", "must be between 0 and 24 dB"));
        }

        if !(32..=512).contains(&self.output_bitrate_kbps) {
            return Err(invalid(
                "outputBitrateKbps",
                "must be between 32 and 512 kbps",
            ));
        }

        Ok(())
    }

    /// Non-fatal remarks about settings outside conventional practice
    pub fn advisories(&self) -> Vec<String> {
        let mut notes = Vec::new();
        let target = self.loudness_target_lufs;
        if !(CONVENTIONAL_LOUDNESS_MIN_LUFS..=CONVENTIONAL_LOUDNESS_MAX_LUFS).contains(&target) {
            notes.push(format!(
                "Loudness target {:.1} LUFS is outside the conventional {:.0} to {:.0} LUFS range",
                target, CONVENTIONAL_LOUDNESS_MIN_LUFS, CONVENTIONAL_LOUDNESS_MAX_LUFS
            ));
        }
        if self.output_format.is_lossless()
            && self.output_bitrate_kbps != DEFAULT_OUTPUT_BITRATE_KBPS
        {
            notes.push(format!(
                "Bitrate is ignored for lossless {} output",
                self.output_format
            ));
        }
        notes
    }
}

fn invalid(field: &str, reason: &str) -> MasteringError {
    MasteringError::validation(format!("{} {}", field, reason))
}

/// Partial compressor settings supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(missing_docs)]
pub struct CompressorOverrides {
    #[serde(rename = "thresholdDB", default)]
    pub threshold_db: Option<f64>,
    #[serde(default)]
    pub ratio: Option<f64>,
    #[serde(default)]
    pub attack_ms: Option<f64>,
    #[serde(default)]
    pub release_ms: Option<f64>,
    #[serde(rename = "makeupDB", default)]
    pub makeup_db: Option<f64>,
}

/// Caller-supplied overrides; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(missing_docs)]
pub struct SpecOverrides {
    #[serde(rename = "loudnessTargetLUFS", default)]
    pub loudness_target_lufs: Option<f64>,
    #[serde(rename = "truePeakCeilingDB", default)]
    pub true_peak_ceiling_db: Option<f64>,
    #[serde(rename = "loudnessRangeLU", default)]
    pub loudness_range_lu: Option<f64>,
    #[serde(default)]
    pub stereo_width_percent: Option<f64>,
    #[serde(rename = "bassEnhanceDB", default)]
    pub bass_enhance_db: Option<f64>,
    #[serde(rename = "warmthDB", default)]
    pub warmth_db: Option<f64>,
    #[serde(rename = "presenceDB", default)]
    pub presence_db: Option<f64>,
    #[serde(rename = "airBoostDB", default)]
    pub air_boost_db: Option<f64>,
    #[serde(default)]
    pub low_cut_hz: Option<f64>,
    #[serde(default)]
    pub compressor: Option<CompressorOverrides>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    #[serde(default)]
    pub output_bitrate_kbps: Option<u32>,
}

impl SpecOverrides {
    /// Parse overrides from a JSON object
    ///
    /// # Errors
    /// Unknown keys or wrongly typed values are a validation error.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
            .map_err(|e| MasteringError::validation(format!("settings: {}", e)))
    }
}

/// Merge a named preset with caller overrides
///
/// Unknown or missing preset names fall back to `streaming`. Numeric ranges are
/// not checked here; call [`ProcessingSpec::validate`] on the result.
pub fn resolve(preset_name: Option<&str>, overrides: &SpecOverrides) -> ProcessingSpec {
    let preset = Preset::find_or_default(preset_name);
    let base = ProcessingSpec::from_preset(preset);
    let o = overrides;

    let compressor = match &o.compressor {
        Some(c) => CompressorSettings {
            threshold_db: c.threshold_db.unwrap_or(base.compressor.threshold_db),
            ratio: c.ratio.unwrap_or(base.compressor.ratio),
            attack_ms: c.attack_ms.unwrap_or(base.compressor.attack_ms),
            release_ms: c.release_ms.unwrap_or(base.compressor.release_ms),
            makeup_db: c.makeup_db.unwrap_or(base.compressor.makeup_db),
        },
        None => base.compressor,
    };

    ProcessingSpec {
        loudness_target_lufs: o.loudness_target_lufs.unwrap_or(base.loudness_target_lufs),
        true_peak_ceiling_db: o.true_peak_ceiling_db.unwrap_or(base.true_peak_ceiling_db),
        loudness_range_lu: o.loudness_range_lu.unwrap_or(base.loudness_range_lu),
        stereo_width_percent: o.stereo_width_percent.unwrap_or(base.stereo_width_percent),
        bass_enhance_db: o.bass_enhance_db.unwrap_or(base.bass_enhance_db),
        warmth_db: o.warmth_db.unwrap_or(base.warmth_db),
        presence_db: o.presence_db.unwrap_or(base.presence_db),
        air_boost_db: o.air_boost_db.unwrap_or(base.air_boost_db),
        low_cut_hz: o.low_cut_hz.or(base.low_cut_hz),
        compressor,
        output_format: o.output_format.unwrap_or(base.output_format),
        output_bitrate_kbps: o.output_bitrate_kbps.unwrap_or(base.output_bitrate_kbps),
    }
}
