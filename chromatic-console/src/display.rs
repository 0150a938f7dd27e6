//! # Status Line
//!
//! One-line terminal rendering of the latest estimate: note, frequencies,
//! cents and a text cent meter.

use chromatic_core::{EstimatedNote, TuningParameters};

/// Number of cells in the cent meter.
pub const METER_CELLS: usize = 21;

/// The meter spans -50 to +50 cents.
const METER_RANGE_CENTS: f64 = 50.0;

/// Renders `cents` as a needle on a bar, e.g. `[-------#--|----------]`.
///
/// Deviations beyond the range pin the needle to the nearest end. Without a
/// reading only the centre mark is shown.
pub fn cent_meter(cents: Option<f64>) -> String {
    let centre = METER_CELLS / 2;
    let needle = cents.map(|c| {
        let clamped = c.clamp(-METER_RANGE_CENTS, METER_RANGE_CENTS);
        ((clamped + METER_RANGE_CENTS) / (2.0 * METER_RANGE_CENTS) * (METER_CELLS - 1) as f64).round() as usize
    });

    let cells: String = (0..METER_CELLS)
        .map(|i| match needle {
            Some(n) if n == i => '#',
            _ if i == centre => '|',
            _ => '-',
        })
        .collect();
    format!("[{cells}]")
}

/// Formats the status line for one snapshot.
pub fn status_line(note: Option<&EstimatedNote>, tuning: &TuningParameters, alternative: bool, fps: f64) -> String {
    match note {
        Some(note) => format!(
            "{:<4} {:>8.2} Hz ({:>8.2} Hz) {:>+6.1} cents {} {:>5.1} fps",
            tuning.note_label(note.current_pitch, alternative),
            note.estimated_frequency,
            note.note_frequency,
            note.deviation_cents(),
            cent_meter(Some(note.deviation_cents())),
            fps
        ),
        None => format!(
            "{:<4} {:>8} Hz ({:>8} Hz) {:>6} cents {} {:>5.1} fps",
            "--",
            "--",
            "--",
            "--",
            cent_meter(None),
            fps
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromatic_core::TuningNotation;

    #[test]
    fn meter_without_reading_shows_centre() {
        assert_eq!(cent_meter(None), "[----------|----------]");
    }

    #[test]
    fn meter_needle_positions() {
        assert_eq!(cent_meter(Some(0.0)), "[----------#----------]");
        assert_eq!(cent_meter(Some(50.0)), "[----------|---------#]");
        assert_eq!(cent_meter(Some(-50.0)), "[#---------|----------]");
        assert_eq!(cent_meter(Some(25.0)), "[----------|----#-----]");
    }

    #[test]
    fn meter_clamps_out_of_range() {
        assert_eq!(cent_meter(Some(-80.0)), cent_meter(Some(-50.0)));
        assert_eq!(cent_meter(Some(120.0)), cent_meter(Some(50.0)));
    }

    #[test]
    fn meter_has_fixed_width() {
        for cents in [-49.0, -10.3, 0.4, 33.3] {
            assert_eq!(cent_meter(Some(cents)).chars().count(), METER_CELLS + 2);
        }
    }

    #[test]
    fn status_line_for_detected_note() {
        let tuning = TuningParameters::default();
        let note = tuning.estimate_note(440.0).unwrap();
        let line = status_line(Some(&note), &tuning, false, 59.94);

        assert!(line.starts_with("A "));
        assert!(line.contains("440.00 Hz"));
        assert!(line.contains("+0.0 cents"));
        assert!(line.contains("[----------#----------]"));
        assert!(line.ends_with("59.9 fps"));
    }

    #[test]
    fn status_line_uses_notation_and_alternative() {
        let tuning = TuningParameters::new(440.0, TuningNotation::French);
        let note = tuning.estimate_note(466.16).unwrap();
        let line = status_line(Some(&note), &tuning, true, 0.0);
        assert!(line.starts_with("Si\u{266D}"));
    }

    #[test]
    fn status_line_without_note() {
        let line = status_line(None, &TuningParameters::default(), false, 12.0);
        assert!(line.starts_with("--"));
        assert!(line.contains("[----------|----------]"));
    }
}
