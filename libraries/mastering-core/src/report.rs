//! Loudness report parsing
//!
//! The DSP engine prints its measurements as free-form text on its diagnostic
//! stream. Two layouts are understood:
//!
//! - the EBU R128 meter summary, where the value lines (`I:`, `LRA:`, `Peak:`)
//!   sit under section headers (`Integrated loudness:`, `Loudness range:`,
//!   `Sample peak:`, `True peak:`)
//! - the loudness normalizer summary (`Input Integrated:`, `Input LRA:`,
//!   `Input True Peak:`)
//!
//! Each field is parsed on its own. A missing or malformed value only resets
//! that field to its default, and the last occurrence of a label wins.

use crate::error::{MasteringError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integrated loudness reported when none could be parsed
pub const DEFAULT_INTEGRATED_LUFS: f64 = -16.0;
/// Loudness range reported when none could be parsed
pub const DEFAULT_LOUDNESS_RANGE_LU: f64 = 8.0;
/// True peak reported when none could be parsed
pub const DEFAULT_TRUE_PEAK_DB: f64 = -1.0;
/// Sample peak reported when none could be parsed
pub const DEFAULT_SAMPLE_PEAK_DB: f64 = -1.5;

/// Loudness measurements of one audio file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoudnessMetrics {
    /// Integrated loudness (LUFS)
    #[serde(rename = "integratedLoudnessLUFS")]
    pub integrated_loudness_lufs: f64,
    /// Loudness range (LU)
    #[serde(rename = "loudnessRangeLU")]
    pub loudness_range_lu: f64,
    /// Inter-sample peak (dBTP)
    #[serde(rename = "truePeakDB")]
    pub true_peak_db: f64,
    /// Maximum sample value (dBFS)
    #[serde(rename = "samplePeakDB")]
    pub sample_peak_db: f64,
}

impl Default for LoudnessMetrics {
    fn default() -> Self {
        Self {
            integrated_loudness_lufs: DEFAULT_INTEGRATED_LUFS,
            loudness_range_lu: DEFAULT_LOUDNESS_RANGE_LU,
            true_peak_db: DEFAULT_TRUE_PEAK_DB,
            sample_peak_db: DEFAULT_SAMPLE_PEAK_DB,
        }
    }
}

impl fmt::Display for LoudnessMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1} LUFS, LRA {:.1} LU, true peak {:.1} dBTP, sample peak {:.1} dBFS",
            self.integrated_loudness_lufs,
            self.loudness_range_lu,
            self.true_peak_db,
            self.sample_peak_db
        )
    }
}

/// Which measurement the parser found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Integrated,
    Range,
    TruePeak,
    SamplePeak,
}

/// Section of the R128 summary the parser is currently inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Integrated,
    Range,
    SamplePeak,
    TruePeak,
}

/// Per-field parse outcome, before defaults are applied
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParsedReport {
    /// Integrated loudness, if found
    pub integrated_loudness_lufs: Option<f64>,
    /// Loudness range, if found
    pub loudness_range_lu: Option<f64>,
    /// True peak, if found
    pub true_peak_db: Option<f64>,
    /// Sample peak, if found
    pub sample_peak_db: Option<f64>,
}

impl ParsedReport {
    /// Whether every field was found
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Labels of fields that fell back to their default
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.integrated_loudness_lufs.is_none() {
            missing.push("integrated loudness");
        }
        if self.loudness_range_lu.is_none() {
            missing.push("loudness range");
        }
        if self.true_peak_db.is_none() {
            missing.push("true peak");
        }
        if self.sample_peak_db.is_none() {
            missing.push("sample peak");
        }
        missing
    }

    /// All four measurements, or a parse error naming the missing ones
    ///
    /// # Errors
    /// [`MasteringError::Parse`] when any field was not found. Callers that
    /// can live with defaults use [`ParsedReport::with_defaults`] instead.
    pub fn complete(&self) -> Result<LoudnessMetrics> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(self.with_defaults())
        } else {
            Err(MasteringError::parse(format!("missing {}", missing.join(", "))))
        }
    }

    /// Fill gaps with the documented defaults
    pub fn with_defaults(&self) -> LoudnessMetrics {
        let d = LoudnessMetrics::default();
        LoudnessMetrics {
            integrated_loudness_lufs: self
                .integrated_loudness_lufs
                .unwrap_or(d.integrated_loudness_lufs),
            loudness_range_lu: self.loudness_range_lu.unwrap_or(d.loudness_range_lu),
            true_peak_db: self.true_peak_db.unwrap_or(d.true_peak_db),
            sample_peak_db: self.sample_peak_db.unwrap_or(d.sample_peak_db),
        }
    }

    fn set(&mut self, field: Field, value: Option<f64>) {
        // A malformed later line does not erase an earlier good value.
        let Some(value) = value else { return };
        match field {
            Field::Integrated => self.integrated_loudness_lufs = Some(value),
            Field::Range => self.loudness_range_lu = Some(value),
            Field::TruePeak => self.true_peak_db = Some(value),
            Field::SamplePeak => self.sample_peak_db = Some(value),
        }
    }
}

/// Extract loudness measurements, falling back to defaults field by field
///
/// Never fails; garbage in yields [`LoudnessMetrics::default`].
pub fn parse_loudness_report(text: &str) -> LoudnessMetrics {
    scan_report(text).with_defaults()
}

/// Extract whatever measurements are present without applying defaults
pub fn scan_report(text: &str) -> ParsedReport {
    let mut report = ParsedReport::default();
    let mut section = Section::None;

    for raw in text.lines() {
        let line = strip_log_prefix(raw).trim();
        if line.is_empty() {
            continue;
        }

        // R128 summary section headers
        match line {
            "Integrated loudness:" => {
                section = Section::Integrated;
                continue;
            }
            "Loudness range:" => {
                section = Section::Range;
                continue;
            }
            "Sample peak:" => {
                section = Section::SamplePeak;
                continue;
            }
            "True peak:" => {
                section = Section::TruePeak;
                continue;
            }
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("I:") {
            if section == Section::Integrated {
                report.set(Field::Integrated, parse_value(rest));
            }
        } else if let Some(rest) = line.strip_prefix("LRA:") {
            if section == Section::Range {
                report.set(Field::Range, parse_value(rest));
            }
        } else if let Some(rest) = line.strip_prefix("Peak:") {
            match section {
                Section::SamplePeak => report.set(Field::SamplePeak, parse_value(rest)),
                Section::TruePeak => report.set(Field::TruePeak, parse_value(rest)),
                _ => {}
            }
        } else if let Some(rest) = line.strip_prefix("Input Integrated:") {
            report.set(Field::Integrated, parse_value(rest));
        } else if let Some(rest) = line.strip_prefix("Input LRA:") {
            report.set(Field::Range, parse_value(rest));
        } else if let Some(rest) = line.strip_prefix("Input True Peak:") {
            report.set(Field::TruePeak, parse_value(rest));
        }
    }

    report
}

/// Drop an engine log prefix such as `[Parsed_ebur128_0 @ 0x55d0c8]`
fn strip_log_prefix(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with('[') {
        if let Some(end) = trimmed.find(']') {
            return &trimmed[end + 1..];
        }
    }
    trimmed
}

/// Parse the leading number of `" -14.2 LUFS"`; `-inf`/`nan` count as missing
fn parse_value(rest: &str) -> Option<f64> {
    let token = rest.split_whitespace().next()?;
    let token = token.trim_start_matches('+');
    let value: f64 = token.parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const R128_SUMMARY: &str = "\
[Parsed_ebur128_0 @ 0x55d0c8a3c5c0] Summary:

  Integrated loudness:
    I:         -20.0 LUFS
    Threshold: -30.5 LUFS

  Loudness range:
    LRA:         5.2 LU
    Threshold:  -40.4 LUFS
    LRA low:    -23.1 LUFS
    LRA high:   -17.9 LUFS

  Sample peak:
    Peak:       -3.2 dBFS

  True peak:
    Peak:       -3.0 dBFS
";

    #[test]
    fn test_parse_r128_summary() {
        let m = parse_loudness_report(R128_SUMMARY);
        assert_eq!(m.integrated_loudness_lufs, -20.0);
        assert_eq!(m.loudness_range_lu, 5.2);
        assert_eq!(m.sample_peak_db, -3.2);
        assert_eq!(m.true_peak_db, -3.0);
    }

    #[test]
    fn test_threshold_lines_are_ignored() {
        let report = scan_report(R128_SUMMARY);
        assert!(report.is_complete());
        assert_eq!(report.integrated_loudness_lufs, Some(-20.0));
    }

    #[test]
    fn test_empty_text_yields_defaults() {
        assert_eq!(parse_loudness_report(""), LoudnessMetrics::default());
        assert_eq!(
            parse_loudness_report("ffmpeg: No such file or directory\n\u{fffd}\u{0}"),
            LoudnessMetrics::default()
        );
    }

    #[test]
    fn test_malformed_field_degrades_alone() {
        let text = R128_SUMMARY.replace("-20.0 LUFS", "garbage LUFS");
        let m = parse_loudness_report(&text);
        assert_eq!(m.integrated_loudness_lufs, DEFAULT_INTEGRATED_LUFS);
        assert_eq!(m.loudness_range_lu, 5.2);
        assert_eq!(m.true_peak_db, -3.0);
    }

    #[test]
    fn test_negative_infinity_is_missing() {
        let text = R128_SUMMARY.replace("-3.0 dBFS", "-inf dBFS");
        let report = scan_report(&text);
        assert_eq!(report.true_peak_db, None);
        assert_eq!(report.missing_fields(), vec!["true peak"]);
        assert_eq!(report.with_defaults().true_peak_db, DEFAULT_TRUE_PEAK_DB);

        let err = report.complete().unwrap_err();
        assert!(matches!(err, MasteringError::Parse(ref msg) if msg == "missing true peak"));
    }

    #[test]
    fn test_complete_report_has_no_parse_error() {
        let metrics = scan_report(R128_SUMMARY).complete().unwrap();
        assert_eq!(metrics, parse_loudness_report(R128_SUMMARY));
    }

    #[test]
    fn test_loudnorm_summary_labels() {
        let text = "\
Input Integrated:    -19.5 LUFS
Input True Peak:      -2.1 dBTP
Input LRA:             7.4 LU
Input Threshold:     -29.9 LUFS
";
        let m = parse_loudness_report(text);
        assert_eq!(m.integrated_loudness_lufs, -19.5);
        assert_eq!(m.true_peak_db, -2.1);
        assert_eq!(m.loudness_range_lu, 7.4);
        assert_eq!(m.sample_peak_db, DEFAULT_SAMPLE_PEAK_DB);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let text = format!("{}{}", R128_SUMMARY, R128_SUMMARY.replace("-20.0", "-14.1"));
        assert_eq!(parse_loudness_report(&text).integrated_loudness_lufs, -14.1);
    }

    #[test]
    fn test_frame_log_lines_do_not_match() {
        let text = "[Parsed_ebur128_0 @ 0x1] t: 0.5 TARGET:-23 LUFS M: -21.0 S:-120.7 I: -30.0 LUFS LRA: 0.0 LU";
        assert_eq!(scan_report(text), ParsedReport::default());
    }
}
