//! Batch session result accounting.

use serde::Serialize;

/// Outcome of one answered card in a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardResult {
    pub correct: bool,
    pub time_ms: i64,
}

/// Qualitative band for a batch accuracy percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeBand {
    Perfect,
    Great,
    Good,
    KeepGoing,
    NeedsPractice,
}

impl GradeBand {
    pub fn for_accuracy(pct: u32) -> Self {
        match pct {
            100.. => Self::Perfect,
            80..=99 => Self::Great,
            60..=79 => Self::Good,
            40..=59 => Self::KeepGoing,
            _ => Self::NeedsPractice,
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Perfect => "Perfect",
            Self::Great => "Great",
            Self::Good => "Good",
            Self::KeepGoing => "Keep going",
            Self::NeedsPractice => "Needs practice",
        }
    }
}

/// End-of-queue summary for a batch session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub correct: usize,
    /// Accuracy percentage, rounded to the nearest integer.
    pub accuracy_pct: u32,
    /// Average time per answered card in milliseconds.
    pub avg_time_ms: i64,
    /// Longest consecutive-correct streak.
    pub best_streak: usize,
    pub band: GradeBand,
}

impl BatchSummary {
    pub fn from_results(results: &[CardResult]) -> Self {
        let total = results.len();
        let correct = results.iter().filter(|r| r.correct).count();
        let accuracy_pct = if total == 0 {
            0
        } else {
            ((correct as f64 / total as f64) * 100.0).round() as u32
        };
        let avg_time_ms = if total == 0 {
            0
        } else {
            let sum: i64 = results.iter().map(|r| r.time_ms).sum();
            (sum as f64 / total as f64).round() as i64
        };

        let mut best_streak = 0;
        let mut run = 0;
        for result in results {
            if result.correct {
                run += 1;
                best_streak = best_streak.max(run);
            } else {
                run = 0;
            }
        }

        Self {
            total,
            correct,
            accuracy_pct,
            avg_time_ms,
            best_streak,
            band: GradeBand::for_accuracy(accuracy_pct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(correct: bool, time_ms: i64) -> CardResult {
        CardResult { correct, time_ms }
    }

    #[test]
    fn two_of_three_rounds_to_good() {
        let summary = BatchSummary::from_results(&[
            result(true, 1000),
            result(true, 2000),
            result(false, 3000),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.accuracy_pct, 67);
        assert_eq!(summary.avg_time_ms, 2000);
        assert_eq!(summary.best_streak, 2);
        assert_eq!(summary.band, GradeBand::Good);
    }

    #[test]
    fn all_correct_is_perfect() {
        let summary = BatchSummary::from_results(&[result(true, 500), result(true, 700)]);
        assert_eq!(summary.accuracy_pct, 100);
        assert_eq!(summary.band, GradeBand::Perfect);
        assert_eq!(summary.best_streak, 2);
    }

    #[test]
    fn streak_breaks_on_a_miss() {
        let summary = BatchSummary::from_results(&[
            result(true, 100),
            result(true, 100),
            result(false, 100),
            result(true, 100),
            result(true, 100),
            result(true, 100),
        ]);
        assert_eq!(summary.best_streak, 3);
        assert_eq!(summary.accuracy_pct, 83);
        assert_eq!(summary.band, GradeBand::Great);
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(GradeBand::for_accuracy(100), GradeBand::Perfect);
        assert_eq!(GradeBand::for_accuracy(99), GradeBand::Great);
        assert_eq!(GradeBand::for_accuracy(80), GradeBand::Great);
        assert_eq!(GradeBand::for_accuracy(79), GradeBand::Good);
        assert_eq!(GradeBand::for_accuracy(60), GradeBand::Good);
        assert_eq!(GradeBand::for_accuracy(59), GradeBand::KeepGoing);
        assert_eq!(GradeBand::for_accuracy(40), GradeBand::KeepGoing);
        assert_eq!(GradeBand::for_accuracy(39), GradeBand::NeedsPractice);
        assert_eq!(GradeBand::for_accuracy(0), GradeBand::NeedsPractice);
    }

    #[test]
    fn empty_results_do_not_divide_by_zero() {
        let summary = BatchSummary::from_results(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.accuracy_pct, 0);
        assert_eq!(summary.avg_time_ms, 0);
        assert_eq!(summary.band, GradeBand::NeedsPractice);
    }

    #[test]
    fn labels_match_bands() {
        assert_eq!(GradeBand::KeepGoing.label(), "Keep going");
        assert_eq!(GradeBand::NeedsPractice.label(), "Needs practice");
    }
}
