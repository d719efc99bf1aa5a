//! Filter chain synthesis
//!
//! Turns a [`ProcessingSpec`] into the ordered list of DSP stages handed to the
//! external engine. The order is fixed:
//!
//! 1. high-pass (only with a low-cut frequency)
//! 2. tonal low end: bass shelf, then warmth
//! 3. presence, then air
//! 4. stereo width
//! 5. compressor
//! 6. loudness normalization
//! 7. limiter at the true peak ceiling
//!
//! Stages that would do nothing are left out, so the same spec always yields the
//! same minimal chain. Normalization and the limiter are always present.

use crate::spec::{CompressorSettings, ProcessingSpec};
use serde::Serialize;
use std::fmt;

/// Gains smaller than this are treated as zero
const GAIN_EPSILON: f64 = 1e-6;

/// Corner frequency of the bass shelf (Hz)
pub const BASS_SHELF_HZ: f64 = 100.0;
/// Center frequency of the warmth band (Hz)
pub const WARMTH_HZ: f64 = 300.0;
/// Center frequency of the presence band (Hz)
pub const PRESENCE_HZ: f64 = 3_000.0;
/// Corner frequency of the air shelf (Hz)
pub const AIR_SHELF_HZ: f64 = 10_000.0;

/// One DSP operation in the chain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum FilterStage {
    /// Removes sub-audible rumble below the cutoff
    HighPass {
        /// Corner frequency in Hz
        cutoff_hz: f64,
    },
    /// Low shelf boost
    BassBoost {
        /// Gain in dB
        gain_db: f64,
    },
    /// Low-mid boost
    Warmth {
        /// Gain in dB
        gain_db: f64,
    },
    /// Upper-mid boost
    Presence {
        /// Gain in dB
        gain_db: f64,
    },
    /// High shelf boost
    Air {
        /// Gain in dB
        gain_db: f64,
    },
    /// Mid/side width adjustment
    StereoWidth {
        /// Width in percent, 100 = unchanged
        percent: f64,
    },
    /// Dynamics control
    Compressor(CompressorSettings),
    /// Two-sided loudness normalization
    LoudnessNormalize {
        /// Integrated loudness target (LUFS)
        target_lufs: f64,
        /// Loudness range target (LU)
        range_lu: f64,
        /// True peak target (dBTP)
        true_peak_db: f64,
    },
    /// Brickwall limiter
    Limiter {
        /// Ceiling in dB
        ceiling_db: f64,
    },
}

impl FilterStage {
    /// Short stage name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            FilterStage::HighPass { .. } => "highpass",
            FilterStage::BassBoost { .. } => "bass",
            FilterStage::Warmth { .. } => "warmth",
            FilterStage::Presence { .. } => "presence",
            FilterStage::Air { .. } => "air",
            FilterStage::StereoWidth { .. } => "width",
            FilterStage::Compressor(_) => "compressor",
            FilterStage::LoudnessNormalize { .. } => "loudnorm",
            FilterStage::Limiter { .. } => "limiter",
        }
    }

    /// Render as a filter-graph element for the DSP engine
    pub fn render(&self) -> String {
        match self {
            FilterStage::HighPass { cutoff_hz } => format!("highpass=f={}:p=2", num(*cutoff_hz)),
            FilterStage::BassBoost { gain_db } => {
                format!("bass=g={}:f={}", num(*gain_db), num(BASS_SHELF_HZ))
            }
            FilterStage::Warmth { gain_db } => {
                format!("equalizer=f={}:t=q:w=1:g={}", num(WARMTH_HZ), num(*gain_db))
            }
            FilterStage::Presence { gain_db } => {
                format!("equalizer=f={}:t=q:w=1:g={}", num(PRESENCE_HZ), num(*gain_db))
            }
            FilterStage::Air { gain_db } => {
                format!("treble=g={}:f={}", num(*gain_db), num(AIR_SHELF_HZ))
            }
            FilterStage::StereoWidth { percent } => {
                format!("extrastereo=m={}", num(percent / 100.0))
            }
            FilterStage::Compressor(c) => format!(
                "acompressor=threshold={}:ratio={}:attack={}:release={}:makeup={}",
                num(db_to_linear(c.threshold_db)),
                num(c.ratio),
                num(c.attack_ms),
                num(c.release_ms),
                num(db_to_linear(c.makeup_db)),
            ),
            FilterStage::LoudnessNormalize {
                target_lufs,
                range_lu,
                true_peak_db,
            } => format!(
                "loudnorm=I={}:TP={}:LRA={}",
                num(*target_lufs),
                num(*true_peak_db),
                num(*range_lu)
            ),
            FilterStage::Limiter { ceiling_db } => format!(
                "alimiter=limit={}:level=disabled",
                num(db_to_linear(*ceiling_db))
            ),
        }
    }
}

/// Ordered DSP stages for one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterChain {
    stages: Vec<FilterStage>,
}

impl FilterChain {
    /// Stages in execution order
    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a synthesized chain
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in order, for logging
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(FilterStage::name).collect()
    }

    /// The full filter graph, elements joined with `,`
    pub fn to_filtergraph(&self) -> String {
        self.stages
            .iter()
            .map(FilterStage::render)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_filtergraph())
    }
}

/// Build the filter chain for a resolved spec
///
/// The spec is expected to have passed [`ProcessingSpec::validate`].
pub fn synthesize(spec: &ProcessingSpec) -> FilterChain {
    let mut stages = Vec::with_capacity(9);

    if let Some(cutoff_hz) = spec.low_cut_hz {
        if cutoff_hz > 0.0 {
            stages.push(FilterStage::HighPass { cutoff_hz });
        }
    }

    if is_active(spec.bass_enhance_db) {
        stages.push(FilterStage::BassBoost {
            gain_db: spec.bass_enhance_db,
        });
    }
    if is_active(spec.warmth_db) {
        stages.push(FilterStage::Warmth {
            gain_db: spec.warmth_db,
        });
    }
    if is_active(spec.presence_db) {
        stages.push(FilterStage::Presence {
            gain_db: spec.presence_db,
        });
    }
    if is_active(spec.air_boost_db) {
        stages.push(FilterStage::Air {
            gain_db: spec.air_boost_db,
        });
    }

    if is_active(spec.stereo_width_percent - 100.0) {
        stages.push(FilterStage::StereoWidth {
            percent: spec.stereo_width_percent,
        });
    }

    if is_active(spec.compressor.ratio - 1.0) {
        stages.push(FilterStage::Compressor(spec.compressor));
    }

    stages.push(FilterStage::LoudnessNormalize {
        target_lufs: spec.loudness_target_lufs,
        range_lu: spec.loudness_range_lu,
        true_peak_db: spec.true_peak_ceiling_db,
    });
    stages.push(FilterStage::Limiter {
        ceiling_db: spec.true_peak_ceiling_db,
    });

    FilterChain { stages }
}

/// Convert decibels to a linear amplitude factor
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

fn is_active(value: f64) -> bool {
    value.abs() > GAIN_EPSILON
}

/// Format a number without trailing zeros
fn num(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{resolve, SpecOverrides};

    fn spec_with(overrides: SpecOverrides) -> ProcessingSpec {
        resolve(Some("streaming"), &overrides)
    }

    #[test]
    fn test_default_streaming_chain_is_minimal() {
        let chain = synthesize(&spec_with(SpecOverrides::default()));
        assert_eq!(chain.stage_names(), vec!["compressor", "loudnorm", "limiter"]);
    }

    #[test]
    fn test_full_chain_order() {
        let spec = spec_with(SpecOverrides {
            low_cut_hz: Some(30.0),
            bass_enhance_db: Some(1.0),
            warmth_db: Some(1.5),
            presence_db: Some(0.5),
            air_boost_db: Some(2.0),
            stereo_width_percent: Some(120.0),
            ..SpecOverrides::default()
        });
        let chain = synthesize(&spec);
        assert_eq!(
            chain.stage_names(),
            vec![
                "highpass",
                "bass",
                "warmth",
                "presence",
                "air",
                "width",
                "compressor",
                "loudnorm",
                "limiter"
            ]
        );
    }

    #[test]
    fn test_unity_ratio_drops_compressor() {
        let spec = spec_with(SpecOverrides {
            compressor: Some(crate::spec::CompressorOverrides {
                ratio: Some(1.0),
                ..Default::default()
            }),
            ..SpecOverrides::default()
        });
        assert_eq!(synthesize(&spec).stage_names(), vec!["loudnorm", "limiter"]);
    }

    #[test]
    fn test_vinyl_narrows_width() {
        let spec = resolve(Some("vinyl"), &SpecOverrides::default());
        let chain = synthesize(&spec);
        assert!(chain
            .stages()
            .contains(&FilterStage::StereoWidth { percent: 85.0 }));
        assert!(chain.to_filtergraph().contains("extrastereo=m=0.85"));
    }

    #[test]
    fn test_render_streaming_tail() {
        let chain = synthesize(&spec_with(SpecOverrides::default()));
        let graph = chain.to_filtergraph();
        assert!(graph.contains("loudnorm=I=-14:TP=-1:LRA=11"));
        assert!(graph.ends_with("alimiter=limit=0.891251:level=disabled"));
    }

    #[test]
    fn test_compressor_render_is_linear() {
        let stage = FilterStage::Compressor(CompressorSettings {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_ms: 5.0,
            release_ms: 50.0,
            makeup_db: 0.0,
        });
        assert_eq!(
            stage.render(),
            "acompressor=threshold=0.1:ratio=4:attack=5:release=50:makeup=1"
        );
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(-14.0), "-14");
        assert_eq!(num(0.85), "0.85");
        assert_eq!(num(-0.0), "0");
        assert_eq!(num(1.0), "1");
    }
}
