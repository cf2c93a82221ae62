//! Grading and statistics
//!
//! Mark entry for a finished attempt plus the aggregate views shown on a
//! paper's results page. Stored per-question scores are tolerated in three
//! legacy shapes (raw number, `{score}` object, numeric string); anything
//! else counts as ungraded and is excluded from aggregates rather than
//! treated as zero.

use crate::error::{Error, Result};
use crate::types::{AttemptDoc, Question, TestPaperDoc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Pull a numeric score out of whichever shape it was stored in.
pub fn extract_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("score").and_then(extract_score),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Marks being entered for one attempt. Validated per question against the
/// obtainable marks before anything is written back.
#[derive(Debug, Clone, Default)]
pub struct GradeSheet {
    scores: BTreeMap<String, f64>,
}

impl GradeSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a score for one question. Out-of-range marks are rejected.
    pub fn set_score(&mut self, question: &Question, score: f64) -> Result<()> {
        if !score.is_finite() || score < 0.0 || score > question.marks {
            return Err(Error::Validation(format!(
                "score {} out of range for question {} (max {})",
                score, question.id, question.marks
            )));
        }
        self.scores.insert(question.id.clone(), score);
        Ok(())
    }

    pub fn score(&self, question_id: &str) -> Option<f64> {
        self.scores.get(question_id).copied()
    }

    pub fn total_scored(&self) -> f64 {
        self.scores.values().sum()
    }

    /// Scores in their stored representation.
    pub fn score_values(&self) -> BTreeMap<String, Value> {
        self.scores
            .iter()
            .map(|(id, s)| (id.clone(), serde_json::json!(s)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Per-question aggregate over every attempt carrying a usable score.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    pub question_id: String,
    pub marks: f64,
    /// Attempts that carried a usable numeric score for this question.
    pub scored_count: usize,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
}

/// Whole-paper aggregate over graded attempts.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperStats {
    pub total_marks: f64,
    pub attempt_count: usize,
    pub graded_count: usize,
    pub average_total: f64,
    pub highest_total: f64,
    pub lowest_total: f64,
    pub questions: Vec<QuestionStats>,
}

/// Aggregate a paper's attempts. Paper-level totals cover graded attempts
/// only; per-question aggregates cover every attempt that recorded a usable
/// numeric score for that question, graded or not.
pub fn paper_stats(paper: &TestPaperDoc, attempts: &[AttemptDoc]) -> PaperStats {
    let graded: Vec<&AttemptDoc> = attempts.iter().filter(|a| a.graded).collect();

    let totals: Vec<f64> = graded.iter().map(|a| a.total_scored).collect();
    let (average_total, highest_total, lowest_total) = summarize(&totals);

    let questions = paper
        .questions()
        .map(|q| {
            let scores: Vec<f64> = attempts
                .iter()
                .filter_map(|a| a.scores.get(&q.id).and_then(extract_score))
                .collect();
            let (average, highest, lowest) = summarize(&scores);
            QuestionStats {
                question_id: q.id.clone(),
                marks: q.marks,
                scored_count: scores.len(),
                average,
                highest,
                lowest,
            }
        })
        .collect();

    PaperStats {
        total_marks: paper.total_marks(),
        attempt_count: attempts.len(),
        graded_count: graded.len(),
        average_total,
        highest_total,
        lowest_total,
        questions,
    }
}

fn summarize(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let sum: f64 = values.iter().sum();
    let highest = values.iter().cloned().fold(f64::MIN, f64::max);
    let lowest = values.iter().cloned().fold(f64::MAX, f64::min);
    (sum / values.len() as f64, highest, lowest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QuestionPage, QuestionType};
    use chrono::Utc;
    use serde_json::json;

    fn question(id: &str, marks: f64) -> Question {
        Question {
            id: id.to_string(),
            question_number: id.to_string(),
            qtype: QuestionType::OpenEnded,
            marks,
            options: Vec::new(),
            correct_answer: None,
        }
    }

    fn paper() -> TestPaperDoc {
        TestPaperDoc {
            id: "p1".into(),
            paper_title: "Physics".into(),
            file_name: String::new(),
            file_url: String::new(),
            num_pages: 1,
            questions_by_page: vec![QuestionPage {
                page: 1,
                questions: vec![question("q1", 5.0), question("q2", 10.0)],
            }],
            tags: Vec::new(),
            uploaded_at: Utc::now(),
        }
    }

    fn attempt(graded: bool, total: f64, scores: &[(&str, Value)]) -> AttemptDoc {
        AttemptDoc {
            id: String::new(),
            answers: BTreeMap::new(),
            scores: scores
                .iter()
                .map(|(id, v)| (id.to_string(), v.clone()))
                .collect(),
            total_scored: total,
            graded,
            time_taken: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_extract_score_shapes() {
        assert_eq!(extract_score(&json!(4.5)), Some(4.5));
        assert_eq!(extract_score(&json!({"score": 3})), Some(3.0));
        assert_eq!(extract_score(&json!("2.5")), Some(2.5));
        assert_eq!(extract_score(&json!(" 7 ")), Some(7.0));
        assert_eq!(extract_score(&json!("n/a")), None);
        assert_eq!(extract_score(&json!(null)), None);
        assert_eq!(extract_score(&json!([1])), None);
    }

    #[test]
    fn test_grade_sheet_rejects_out_of_range() {
        let q = question("q1", 5.0);
        let mut sheet = GradeSheet::new();
        assert!(sheet.set_score(&q, 6.0).is_err());
        assert!(sheet.set_score(&q, -1.0).is_err());
        assert!(sheet.set_score(&q, f64::NAN).is_err());
        sheet.set_score(&q, 5.0).unwrap();
        assert_eq!(sheet.total_scored(), 5.0);
    }

    #[test]
    fn test_grade_sheet_full_marks_allowed() {
        let mut sheet = GradeSheet::new();
        sheet.set_score(&question("q1", 5.0), 5.0).unwrap();
        sheet.set_score(&question("q2", 10.0), 0.0).unwrap();
        assert_eq!(sheet.total_scored(), 5.0);
        assert_eq!(sheet.score_values()["q1"], json!(5.0));
    }

    #[test]
    fn test_paper_stats_totals_cover_graded_only() {
        let p = paper();
        let attempts = vec![
            attempt(true, 12.0, &[("q1", json!(4)), ("q2", json!({"score": 8}))]),
            attempt(true, 6.0, &[("q1", json!("2")), ("q2", json!(4))]),
            attempt(false, 0.0, &[]),
        ];
        let stats = paper_stats(&p, &attempts);
        assert_eq!(stats.attempt_count, 3);
        assert_eq!(stats.graded_count, 2);
        assert_eq!(stats.average_total, 9.0);
        assert_eq!(stats.highest_total, 12.0);
        assert_eq!(stats.lowest_total, 6.0);

        let q1 = &stats.questions[0];
        assert_eq!(q1.scored_count, 2);
        assert_eq!(q1.average, 3.0);
        assert_eq!(q1.highest, 4.0);
        assert_eq!(q1.lowest, 2.0);
    }

    #[test]
    fn test_paper_stats_question_scores_cover_all_attempts() {
        let p = paper();
        let attempts = vec![
            attempt(false, 0.0, &[("q1", json!(5))]),
            attempt(false, 0.0, &[("q1", json!(3))]),
            attempt(false, 0.0, &[]),
        ];
        let stats = paper_stats(&p, &attempts);
        // No attempt is graded, so paper-level totals stay empty...
        assert_eq!(stats.graded_count, 0);
        assert_eq!(stats.average_total, 0.0);
        // ...but per-question figures still reflect the recorded scores.
        let q1 = &stats.questions[0];
        assert_eq!(q1.scored_count, 2);
        assert_eq!(q1.average, 4.0);
        assert_eq!(q1.highest, 5.0);
        assert_eq!(q1.lowest, 3.0);
    }

    #[test]
    fn test_paper_stats_unusable_score_excluded_not_zero() {
        let p = paper();
        let attempts = vec![
            attempt(true, 5.0, &[("q1", json!(5)), ("q2", json!("pending"))]),
            attempt(true, 8.0, &[("q2", json!(8))]),
        ];
        let stats = paper_stats(&p, &attempts);
        let q2 = &stats.questions[1];
        // Only one usable q2 score; "pending" neither counts nor drags
        // the average down.
        assert_eq!(q2.scored_count, 1);
        assert_eq!(q2.average, 8.0);
    }

    #[test]
    fn test_paper_stats_empty() {
        let stats = paper_stats(&paper(), &[]);
        assert_eq!(stats.graded_count, 0);
        assert_eq!(stats.average_total, 0.0);
        assert_eq!(stats.total_marks, 15.0);
    }
}
