//! # Musical Tuning Module
//!
//! Maps a frequency estimate onto a 12-tone equal-tempered scale anchored at
//! a configurable fundamental (A4-like reference pitch).
//!
//! ## Features
//! - Per-semitone frequency and log2 scale tables for the reference octave
//! - Octave normalisation of the estimate into the reference octave
//! - Nearest note and signed deviation in fractions of a semitone
//! - Note labels in US, French and German notation, sharp or flat spelling

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of semitones in the reference octave.
pub const SEMITONES: usize = 12;

/// Lowest frequency accepted as a pitch estimate, in Hz.
pub const MIN_DETECTABLE_FREQUENCY: f64 = 40.0;

/// Highest frequency accepted as a pitch estimate, in Hz.
pub const MAX_DETECTABLE_FREQUENCY: f64 = 2000.0;

/// Frequency ratio of two consecutive semitones, `2^(1/12)`.
pub const SEMITONE_RATIO: f64 = 1.059_463_094_359_295_3;

/// Base-2 logarithm of [`SEMITONE_RATIO`].
pub const SEMITONE_LOG2: f64 = 1.0 / 12.0;

/// Labelling convention for note names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TuningNotation {
    #[default]
    Us,
    French,
    German,
}

impl FromStr for TuningNotation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "us" => Ok(TuningNotation::Us),
            "french" => Ok(TuningNotation::French),
            "german" => Ok(TuningNotation::German),
            _ => Err(ConfigError::Notation(s.to_string())),
        }
    }
}

impl fmt::Display for TuningNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TuningNotation::Us => "us",
            TuningNotation::French => "french",
            TuningNotation::German => "german",
        };
        f.write_str(name)
    }
}

fn sharp(name: &str) -> String {
    format!("{name}\u{266F}")
}

fn flat(name: &str) -> String {
    format!("{name}\u{266D}")
}

/// Note labels, one row per `(notation, alternative)` pair.
///
/// Index 0 is the fundamental (A), ascending by semitone.
static NOTE_LABELS: Lazy<[[String; SEMITONES]; 6]> = Lazy::new(|| {
    let plain = |s: &str| s.to_string();
    [
        // US
        [
            plain("A"), sharp("A"), plain("B"), plain("C"), sharp("C"), plain("D"),
            sharp("D"), plain("E"), plain("F"), sharp("F"), plain("G"), sharp("G"),
        ],
        // US alternate
        [
            plain("A"), flat("B"), plain("B"), plain("C"), flat("D"), plain("D"),
            flat("E"), plain("E"), plain("F"), flat("G"), plain("G"), flat("A"),
        ],
        // French
        [
            plain("La"), sharp("La"), plain("Si"), plain("Do"), sharp("Do"), plain("Re"),
            sharp("Re"), plain("Mi"), plain("Fa"), sharp("Fa"), plain("Sol"), sharp("Sol"),
        ],
        // French alternate
        [
            plain("La"), flat("Si"), plain("Si"), plain("Do"), flat("Re"), plain("Re"),
            flat("Mi"), plain("Mi"), plain("Fa"), flat("Sol"), plain("Sol"), flat("La"),
        ],
        // German
        [
            plain("A"), plain("B"), plain("H"), plain("C"), sharp("C"), plain("D"),
            sharp("D"), plain("E"), plain("F"), sharp("F"), plain("G"), sharp("G"),
        ],
        // German alternate
        [
            plain("A"), plain("B"), plain("H"), plain("C"), flat("D"), plain("D"),
            flat("E"), plain("E"), plain("F"), flat("G"), plain("G"), flat("A"),
        ],
    ]
});

/// Classification of one frequency estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatedNote {
    /// The estimate as passed in, in Hz.
    pub estimated_frequency: f64,
    /// Index of the nearest note in the reference octave (0 is the fundamental).
    pub current_pitch: usize,
    /// Signed deviation from the nearest note, in fractions of a semitone.
    pub current_pitch_deviation: f64,
    /// Frequency of the nearest note in the estimate's own octave, in Hz.
    pub note_frequency: f64,
}

impl EstimatedNote {
    pub fn deviation_cents(&self) -> f64 {
        self.current_pitch_deviation * 100.0
    }
}

/// Reference pitch, notation, and the tables derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningParameters {
    fundamental_frequency: f64,
    notation: TuningNotation,
    /// Frequencies of the notes of the reference octave.
    note_frequency: [f64; SEMITONES],
    /// log2 positions of the notes of the reference octave.
    note_scale: [f64; SEMITONES],
}

impl TuningParameters {
    pub fn new(fundamental_frequency: f64, notation: TuningNotation) -> Self {
        let mut params = Self {
            fundamental_frequency,
            notation,
            note_frequency: [0.0; SEMITONES],
            note_scale: [0.0; SEMITONES],
        };
        params.set_parameters(fundamental_frequency, notation);
        params
    }

    /// Replaces the reference pitch and notation and rebuilds the tables.
    pub fn set_parameters(&mut self, fundamental_frequency: f64, notation: TuningNotation) {
        self.fundamental_frequency = fundamental_frequency;
        self.notation = notation;

        let log_fundamental = fundamental_frequency.log2();
        for k in 0..SEMITONES {
            self.note_frequency[k] = fundamental_frequency * SEMITONE_RATIO.powi(k as i32);
            self.note_scale[k] = log_fundamental + k as f64 * SEMITONE_LOG2;
        }
    }

    pub fn fundamental_frequency(&self) -> f64 {
        self.fundamental_frequency
    }

    pub fn notation(&self) -> TuningNotation {
        self.notation
    }

    pub fn note_frequencies(&self) -> &[f64; SEMITONES] {
        &self.note_frequency
    }

    pub fn note_scale(&self) -> &[f64; SEMITONES] {
        &self.note_scale
    }

    /// Label of note `index` in the configured notation.
    ///
    /// # Panics
    /// * If `index` is not in `0..12`
    pub fn note_label(&self, index: usize, alternative: bool) -> &'static str {
        assert!(index < SEMITONES, "note index {index} out of range");
        let row = self.notation as usize * 2 + alternative as usize;
        &NOTE_LABELS[row][index]
    }

    /// Classifies a frequency estimate.
    ///
    /// # Returns
    /// * `None` if `estimated_frequency` is outside [40, 2000] Hz (including
    ///   infinite and NaN estimates)
    /// * `Some(note)` with the nearest note of the scale otherwise
    pub fn estimate_note(&self, estimated_frequency: f64) -> Option<EstimatedNote> {
        if !(MIN_DETECTABLE_FREQUENCY..=MAX_DETECTABLE_FREQUENCY).contains(&estimated_frequency) {
            return None;
        }

        let half_step = self.fundamental_frequency * SEMITONE_LOG2 / 2.0;
        let upper = self.note_frequency[SEMITONES - 1] + half_step;
        let lower = self.note_frequency[0] - half_step;

        // Bring the estimate into the reference octave.
        let mut normalized = estimated_frequency;
        let mut octave_deviation = 0i32;
        while normalized > upper {
            normalized /= 2.0;
            octave_deviation += 1;
        }
        while normalized < lower {
            normalized *= 2.0;
            octave_deviation -= 1;
        }

        // Nearest note on the log scale; the first of equal distances wins.
        let log_normalized = normalized.log2();
        let mut min_distance = f64::INFINITY;
        let mut nearest = 0;
        for (k, &scale) in self.note_scale.iter().enumerate() {
            let distance = (log_normalized - scale).abs();
            if distance < min_distance {
                min_distance = distance;
                nearest = k;
            }
        }

        Some(EstimatedNote {
            estimated_frequency,
            current_pitch: nearest,
            current_pitch_deviation: (log_normalized - self.note_scale[nearest]) / SEMITONE_LOG2,
            note_frequency: self.note_frequency[nearest] * 2f64.powi(octave_deviation),
        })
    }
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self::new(440.0, TuningNotation::Us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn semitone_constants_agree() {
        assert_relative_eq!(SEMITONE_RATIO, 2f64.powf(1.0 / 12.0), max_relative = 1e-15);
        assert_relative_eq!(SEMITONE_LOG2, SEMITONE_RATIO.log2(), max_relative = 1e-12);
    }

    #[test]
    fn tables_follow_equal_temperament() {
        let params = TuningParameters::new(440.0, TuningNotation::Us);
        assert_abs_diff_eq!(params.note_frequencies()[0], 440.0);
        assert_abs_diff_eq!(params.note_frequencies()[3], 523.251, epsilon = 1e-3);
        assert_abs_diff_eq!(params.note_frequencies()[11], 830.609, epsilon = 1e-3);
        assert_abs_diff_eq!(params.note_scale()[0], 440f64.log2());
        assert_abs_diff_eq!(params.note_scale()[6], 440f64.log2() + 0.5, epsilon = 1e-12);
    }

    #[test]
    fn rejects_frequencies_outside_detectable_band() {
        let params = TuningParameters::default();
        assert!(params.estimate_note(39.999).is_none());
        assert!(params.estimate_note(2000.001).is_none());
        assert!(params.estimate_note(f64::INFINITY).is_none());
        assert!(params.estimate_note(f64::NAN).is_none());
        assert!(params.estimate_note(40.0).is_some());
        assert!(params.estimate_note(2000.0).is_some());
    }

    #[test]
    fn fundamental_maps_to_index_zero() {
        let params = TuningParameters::new(440.0, TuningNotation::Us);
        let note = params.estimate_note(440.0).expect("in range");
        assert_eq!(note.current_pitch, 0);
        assert_abs_diff_eq!(note.current_pitch_deviation, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(note.note_frequency, 440.0, epsilon = 1e-9);
        assert_abs_diff_eq!(note.estimated_frequency, 440.0);
    }

    #[test]
    fn octaves_share_pitch_class() {
        let params = TuningParameters::new(440.0, TuningNotation::Us);
        let a4 = params.estimate_note(440.0).expect("a4");
        let a5 = params.estimate_note(880.0).expect("a5");
        let a2 = params.estimate_note(110.0).expect("a2");

        assert_eq!(a4.current_pitch, a5.current_pitch);
        assert_eq!(a4.current_pitch, a2.current_pitch);
        assert_abs_diff_eq!(a5.current_pitch_deviation, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(a5.estimated_frequency, 880.0);
        assert_abs_diff_eq!(a5.note_frequency, 880.0, epsilon = 1e-9);
        assert_abs_diff_eq!(a2.note_frequency, 110.0, epsilon = 1e-9);
    }

    #[test]
    fn notes_below_the_reference_octave() {
        let params = TuningParameters::new(440.0, TuningNotation::Us);
        // G#4 sits below the reference window and is matched one octave down.
        let g_sharp = params.estimate_note(415.305).expect("g#4");
        assert_eq!(g_sharp.current_pitch, 11);
        assert_abs_diff_eq!(g_sharp.note_frequency, 415.305, epsilon = 1e-2);
        assert_abs_diff_eq!(g_sharp.current_pitch_deviation, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn deviation_is_signed_fraction_of_semitone() {
        let params = TuningParameters::new(440.0, TuningNotation::Us);
        // 20 cents sharp of C5.
        let c5 = params.note_frequencies()[3];
        let sharp = params.estimate_note(c5 * 2f64.powf(0.2 / 12.0)).expect("c5");
        assert_eq!(sharp.current_pitch, 3);
        assert_abs_diff_eq!(sharp.current_pitch_deviation, 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(sharp.deviation_cents(), 20.0, epsilon = 1e-7);

        let flat = params.estimate_note(c5 * 2f64.powf(-0.3 / 12.0)).expect("c5");
        assert_eq!(flat.current_pitch, 3);
        assert_abs_diff_eq!(flat.current_pitch_deviation, -0.3, epsilon = 1e-9);
    }

    #[test]
    fn other_reference_pitches() {
        let params = TuningParameters::new(442.0, TuningNotation::Us);
        let note = params.estimate_note(442.0 * 2.0).expect("a5");
        assert_eq!(note.current_pitch, 0);
        assert_abs_diff_eq!(note.note_frequency, 884.0, epsilon = 1e-9);

        // 440 Hz against A = 442 is flat by about 7.85 cents.
        let flat = params.estimate_note(440.0).expect("a4");
        assert_eq!(flat.current_pitch, 0);
        assert_abs_diff_eq!(flat.deviation_cents(), 1200.0 * (440f64 / 442.0).log2(), epsilon = 1e-9);
    }

    #[test]
    fn set_parameters_updates_in_place() {
        let mut params = TuningParameters::new(440.0, TuningNotation::Us);
        params.set_parameters(415.0, TuningNotation::German);
        assert_abs_diff_eq!(params.fundamental_frequency(), 415.0);
        assert_eq!(params.notation(), TuningNotation::German);
        assert_abs_diff_eq!(params.note_frequencies()[0], 415.0);
        assert_eq!(params.estimate_note(415.0).expect("a").current_pitch, 0);
    }

    #[test]
    fn labels_per_notation() {
        let us = TuningParameters::new(440.0, TuningNotation::Us);
        assert_eq!(us.note_label(0, false), "A");
        assert_eq!(us.note_label(1, false), "A\u{266F}");
        assert_eq!(us.note_label(1, true), "B\u{266D}");
        assert_eq!(us.note_label(11, true), "A\u{266D}");

        let french = TuningParameters::new(440.0, TuningNotation::French);
        assert_eq!(french.note_label(3, false), "Do");
        assert_eq!(french.note_label(9, true), "Sol\u{266D}");

        let german = TuningParameters::new(440.0, TuningNotation::German);
        assert_eq!(german.note_label(1, false), "B");
        assert_eq!(german.note_label(2, true), "H");
    }

    #[test]
    #[should_panic]
    fn label_index_out_of_range_panics() {
        TuningParameters::default().note_label(12, false);
    }

    #[test]
    fn notation_parses_case_insensitively() {
        assert_eq!("French".parse::<TuningNotation>().unwrap(), TuningNotation::French);
        assert_eq!("us".parse::<TuningNotation>().unwrap(), TuningNotation::Us);
        assert!("dutch".parse::<TuningNotation>().is_err());
        assert_eq!(TuningNotation::German.to_string(), "german");
    }
}
