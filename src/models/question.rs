// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub category_id: Option<i64>,

    /// Question type: 'single' (single choice) or 'multiple' (multiple choice).
    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    pub question_type: String,

    pub title: String,

    pub content: String,

    /// Explanation shown at review time.
    pub explanation: Option<String>,
}

/// One answer choice row from 'question_answers', correctness excluded.
/// This is the only shape a choice takes while an attempt is in progress.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnswerChoice {
    pub id: i64,
    pub text: String,
}

/// An answer choice annotated with its objective correctness flag.
/// Only ever sent to the owner of a completed attempt.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReviewChoice {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
}

/// DTO for a question handed to a caller who just started an attempt.
/// Correct-answer flags are deliberately absent.
#[derive(Debug, Serialize)]
pub struct AttemptQuestion {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub answers: Vec<AnswerChoice>,
}
