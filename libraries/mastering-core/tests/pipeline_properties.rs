//! Property tests for settings resolution, chain synthesis and report parsing
//!
//! Tests cover:
//! - Preset invariants after resolution
//! - Chain ordering for arbitrary valid settings
//! - Parser robustness against arbitrary text

use mastering_core::{
    chain::synthesize, parse_loudness_report, spec::resolve, CompressorOverrides, FilterStage,
    LoudnessMetrics, SpecOverrides, PRESETS,
};
use proptest::prelude::*;

// ========== Helper Functions ==========

/// Position of each stage kind in the canonical order
fn rank(stage: &FilterStage) -> usize {
    match stage {
        FilterStage::HighPass { .. } => 0,
        FilterStage::BassBoost { .. } => 1,
        FilterStage::Warmth { .. } => 2,
        FilterStage::Presence { .. } => 3,
        FilterStage::Air { .. } => 4,
        FilterStage::StereoWidth { .. } => 5,
        FilterStage::Compressor(_) => 6,
        FilterStage::LoudnessNormalize { .. } => 7,
        FilterStage::Limiter { .. } => 8,
    }
}

fn optional_gain() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![Just(None), Just(Some(0.0)), (-12.0_f64..12.0).prop_map(Some)]
}

prop_compose! {
    fn valid_overrides()(
        preset in prop::sample::select(PRESETS.iter().map(|p| p.name).collect::<Vec<_>>()),
        loudness in prop::option::of(-24.0_f64..-6.0),
        true_peak in prop::option::of(-9.0_f64..=0.0),
        width in prop::option::of(50.0_f64..=150.0),
        bass in optional_gain(),
        warmth in optional_gain(),
        presence in optional_gain(),
        air in optional_gain(),
        low_cut in prop::option::of(10.0_f64..200.0),
        ratio in prop::option::of(1.0_f64..20.0),
    ) -> (String, SpecOverrides) {
        (preset.to_string(), SpecOverrides {
            loudness_target_lufs: loudness,
            true_peak_ceiling_db: true_peak,
            stereo_width_percent: width,
            bass_enhance_db: bass,
            warmth_db: warmth,
            presence_db: presence,
            air_boost_db: air,
            low_cut_hz: low_cut,
            compressor: ratio.map(|r| CompressorOverrides { ratio: Some(r), ..Default::default() }),
            ..SpecOverrides::default()
        })
    }
}

// ========== Preset Tests ==========

#[test]
fn every_preset_resolves_within_hard_limits() {
    for preset in PRESETS {
        let spec = resolve(Some(preset.name), &SpecOverrides::default());
        assert!(spec.true_peak_ceiling_db <= 0.0, "{}", preset.name);
        assert!((50.0..=150.0).contains(&spec.stereo_width_percent), "{}", preset.name);
        spec.validate().unwrap();
    }
}

#[test]
fn streaming_preset_targets() {
    let spec = resolve(Some("streaming"), &SpecOverrides::default());
    assert_eq!(spec.loudness_target_lufs, -14.0);
    assert_eq!(spec.true_peak_ceiling_db, -1.0);
    assert_eq!(spec.loudness_range_lu, 11.0);
}

// ========== Property Tests ==========

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The limiter is always last and normalization always right before it
    #[test]
    fn chain_ends_with_normalize_then_limiter((preset, overrides) in valid_overrides()) {
        let spec = resolve(Some(&preset), &overrides);
        prop_assert!(spec.validate().is_ok());

        let chain = synthesize(&spec);
        let stages = chain.stages();
        prop_assert!(stages.len() >= 2);
        let is_limiter = matches!(stages[stages.len() - 1], FilterStage::Limiter { .. });
        let is_normalize = matches!(stages[stages.len() - 2], FilterStage::LoudnessNormalize { .. });
        prop_assert!(is_limiter);
        prop_assert!(is_normalize);
    }

    /// Stages appear in canonical order, each at most once
    #[test]
    fn chain_order_is_canonical((preset, overrides) in valid_overrides()) {
        let chain = synthesize(&resolve(Some(&preset), &overrides));
        let ranks: Vec<usize> = chain.stages().iter().map(rank).collect();
        for pair in ranks.windows(2) {
            prop_assert!(pair[0] < pair[1], "out of order: {:?}", chain.stage_names());
        }
    }

    /// Zero contributions never show up as stages
    #[test]
    fn no_op_stages_are_omitted((preset, overrides) in valid_overrides()) {
        let spec = resolve(Some(&preset), &overrides);
        for stage in synthesize(&spec).stages() {
            match stage {
                FilterStage::BassBoost { gain_db }
                | FilterStage::Warmth { gain_db }
                | FilterStage::Presence { gain_db }
                | FilterStage::Air { gain_db } => prop_assert!(*gain_db != 0.0),
                FilterStage::StereoWidth { percent } => prop_assert!(*percent != 100.0),
                FilterStage::Compressor(c) => prop_assert!(c.ratio != 1.0),
                _ => {}
            }
        }
    }

    /// Synthesis is deterministic for a given spec
    #[test]
    fn synthesis_is_deterministic((preset, overrides) in valid_overrides()) {
        let spec = resolve(Some(&preset), &overrides);
        prop_assert_eq!(synthesize(&spec), synthesize(&spec));
    }

    /// Arbitrary text never panics and yields finite values
    #[test]
    fn parser_never_panics(text in ".*") {
        let m = parse_loudness_report(&text);
        prop_assert!(m.integrated_loudness_lufs.is_finite());
        prop_assert!(m.loudness_range_lu.is_finite());
        prop_assert!(m.true_peak_db.is_finite());
        prop_assert!(m.sample_peak_db.is_finite());
    }

    /// Text without any known label yields exactly the defaults
    #[test]
    fn unlabeled_text_yields_defaults(text in "[a-z0-9 .,=-]{0,200}") {
        prop_assert_eq!(parse_loudness_report(&text), LoudnessMetrics::default());
    }
}
