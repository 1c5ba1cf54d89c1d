// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use std::collections::HashMap;
use validator::Validate;

use crate::models::question::{AttemptQuestion, ReviewChoice};

/// Lifecycle state of an attempt. The only legal transition is
/// `InProgress -> Completed`, performed once by the scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

/// Represents the 'exam_attempts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamAttempt {
    pub id: i64,
    pub user_id: i64,
    pub exam_id: i64,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub status: AttemptStatus,
    pub score: Option<f64>,
}

/// DTO for returning a freshly started attempt with its sampled questions.
#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub attempt_id: i64,
    pub exam_title: String,
    /// Advisory duration in seconds.
    pub duration: i64,
    pub questions: Vec<AttemptQuestion>,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    /// User's answers map.
    /// Key: Question ID (i64)
    /// Value: IDs of the selected answer choices
    #[validate(custom(function = validate_answers))]
    pub answers: HashMap<i64, Vec<i64>>,
}

fn validate_answers(answers: &HashMap<i64, Vec<i64>>) -> Result<(), validator::ValidationError> {
    if answers.len() > 500 {
        return Err(validator::ValidationError::new("too_many_questions"));
    }
    for selected in answers.values() {
        if selected.len() > 64 {
            return Err(validator::ValidationError::new("too_many_selections"));
        }
    }
    Ok(())
}

/// DTO for the grading summary returned by submit.
#[derive(Debug, Serialize)]
pub struct SubmitAttemptResponse {
    pub attempt_id: i64,
    pub score: f64,
    pub correct_count: i64,
    pub total_questions: i64,
}

/// Attempt header included in the review payload.
#[derive(Debug, Serialize)]
pub struct AttemptDetails {
    pub id: i64,
    pub exam_id: i64,
    pub exam_title: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub score: Option<f64>,
}

/// One reviewed question: what was selected, whether it was graded correct,
/// and every choice annotated with its objective correctness.
#[derive(Debug, Serialize)]
pub struct QuestionResult {
    pub question_id: i64,
    pub title: String,
    pub explanation: Option<String>,
    pub selected_answer_ids: Vec<i64>,
    pub is_correct: bool,
    pub answers: Vec<ReviewChoice>,
}

/// DTO for the full review payload of a completed attempt.
#[derive(Debug, Serialize)]
pub struct AttemptResultResponse {
    pub attempt: AttemptDetails,
    pub results: Vec<QuestionResult>,
}
