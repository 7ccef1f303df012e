use serde::Serialize;

use crate::model::EvaluationReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Correct,
    FalsePositive { predicted: String },
    FalseNegative,
}

impl MatchOutcome {
    pub fn is_correct(&self) -> bool {
        matches!(self, Self::Correct)
    }

    pub fn predicted_label(&self, ground_truth: &str) -> Option<String> {
        match self {
            Self::Correct => Some(ground_truth.to_string()),
            Self::FalsePositive { predicted } => Some(predicted.clone()),
            Self::FalseNegative => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::FalsePositive { .. } => "false_positive",
            Self::FalseNegative => "false_negative",
        }
    }
}

/// Labels are compared exactly; caption text is not scored.
pub fn classify(ground_truth: &str, predicted: Option<&str>) -> MatchOutcome {
    match predicted {
        Some(label) if label == ground_truth => MatchOutcome::Correct,
        Some(label) => MatchOutcome::FalsePositive {
            predicted: label.to_string(),
        },
        None => MatchOutcome::FalseNegative,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationCounters {
    pub total_images: u64,
    pub correct_matches: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl EvaluationCounters {
    pub fn record(&mut self, outcome: &MatchOutcome) {
        match outcome {
            MatchOutcome::Correct => self.correct_matches += 1,
            MatchOutcome::FalsePositive { .. } => self.false_positives += 1,
            MatchOutcome::FalseNegative => self.false_negatives += 1,
        }
        self.total_images += 1;
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_images == 0 {
            return 0.0;
        }
        self.correct_matches as f64 / self.total_images as f64
    }

    pub fn report(&self) -> EvaluationReport {
        EvaluationReport {
            accuracy: self.accuracy(),
            false_positives: self.false_positives,
            false_negatives: self.false_negatives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_covers_all_outcomes() {
        assert_eq!(classify("B", Some("B")), MatchOutcome::Correct);
        assert_eq!(
            classify("A", Some("C")),
            MatchOutcome::FalsePositive {
                predicted: "C".to_string()
            }
        );
        assert_eq!(classify("A", None), MatchOutcome::FalseNegative);
        assert_eq!(
            classify("a", Some("A")),
            MatchOutcome::FalsePositive {
                predicted: "A".to_string()
            }
        );
    }

    #[test]
    fn counters_stay_total_and_accuracy_bounded() {
        let mut counters = EvaluationCounters::default();
        assert_eq!(counters.accuracy(), 0.0);

        let predictions = [
            ("A", Some("A")),
            ("B", Some("C")),
            ("C", None),
            ("D", Some("D")),
            ("E", Some("E")),
        ];
        for (truth, predicted) in predictions {
            counters.record(&classify(truth, predicted));
            assert_eq!(
                counters.correct_matches + counters.false_positives + counters.false_negatives,
                counters.total_images
            );
            let accuracy = counters.accuracy();
            assert!((0.0..=1.0).contains(&accuracy));
        }

        let report = counters.report();
        assert_eq!(counters.total_images, 5);
        assert!((report.accuracy - 0.6).abs() < f64::EPSILON);
        assert_eq!(report.false_positives, 1);
        assert_eq!(report.false_negatives, 1);
    }

    #[test]
    fn predicted_label_reflects_outcome() {
        assert_eq!(MatchOutcome::Correct.predicted_label("B").as_deref(), Some("B"));
        assert_eq!(MatchOutcome::FalseNegative.predicted_label("B"), None);
    }
}
