// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// Represents the 'exams' table in the database.
///
/// An exam is a template: title, advisory duration, and the number of
/// questions to sample from the bank (optionally restricted to one category).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,

    /// Advisory duration in seconds; never enforced server-side.
    pub duration: i64,

    /// Target sample size for each attempt.
    pub question_count: i64,

    /// Optional filter restricting the eligible question pool.
    pub category_id: Option<i64>,

    pub created_by: i64,
}
