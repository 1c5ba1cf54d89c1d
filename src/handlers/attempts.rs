// src/handlers/attempts.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{
            AttemptDetails, AttemptResultResponse, AttemptStatus, ExamAttempt, QuestionResult,
            StartAttemptResponse, SubmitAttemptRequest, SubmitAttemptResponse,
        },
        exam::Exam,
        question::{AnswerChoice, AttemptQuestion, Question, ReviewChoice},
    },
    utils::{identity::CallerId, sampling::sample_question_ids},
};

/// Helper struct for fetching answer choices grouped by question.
#[derive(sqlx::FromRow)]
struct ChoiceRow {
    question_id: i64,
    id: i64,
    text: String,
}

/// Helper struct for fetching the correct-answer key of a question.
#[derive(sqlx::FromRow)]
struct CorrectAnswerRow {
    question_id: i64,
    id: i64,
}

/// Sorts and deduplicates an answer-id selection.
///
/// Both the submitted set and the authoritative set go through this before
/// comparison, so grading is insensitive to order and duplicate submissions.
fn normalize_answer_ids(ids: &[i64]) -> Vec<i64> {
    let mut normalized = ids.to_vec();
    normalized.sort_unstable();
    normalized.dedup();
    normalized
}

/// Helper function to calculate score.
/// Returns the score as a percentage, untruncated.
fn calculate_score(correct_count: i64, total_questions: i64) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    (correct_count as f64 / total_questions as f64) * 100.0
}

/// Starts a new attempt for an exam.
///
/// Inside one transaction: looks up the exam, creates the attempt row,
/// samples `question_count` distinct questions from the eligible pool with a
/// uniform shuffle, and persists the immutable snapshot. If the pool is
/// smaller than requested the whole transaction rolls back and no attempt
/// survives. The returned questions carry answer choices without their
/// correctness flags.
pub async fn start_attempt(
    State(pool): State<SqlitePool>,
    Extension(CallerId(user_id)): Extension<CallerId>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let exam = sqlx::query_as::<_, Exam>(
        r#"
        SELECT id, title, description, duration, question_count, category_id, created_by
        FROM exams
        WHERE id = ?
        "#,
    )
    .bind(exam_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    let start_time = chrono::Utc::now();

    let attempt_id = sqlx::query(
        "INSERT INTO exam_attempts (user_id, exam_id, start_time, status) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(exam.id)
    .bind(start_time)
    .bind(AttemptStatus::InProgress)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let eligible_ids: Vec<i64> = match exam.category_id {
        Some(category_id) => {
            sqlx::query_scalar("SELECT id FROM questions WHERE category_id = ?")
                .bind(category_id)
                .fetch_all(&mut *tx)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT id FROM questions")
                .fetch_all(&mut *tx)
                .await?
        }
    };

    let requested = exam.question_count as usize;
    if eligible_ids.len() < requested {
        tracing::warn!(
            "Exam {} requests {} questions but pool has only {}",
            exam.id,
            requested,
            eligible_ids.len()
        );
        // Dropping the transaction rolls back the attempt row.
        return Err(AppError::PreconditionFailed(
            "insufficient questions".to_string(),
        ));
    }

    let drawn = sample_question_ids(eligible_ids, requested, &mut rand::thread_rng());

    if !drawn.is_empty() {
        let mut insert_snapshot = QueryBuilder::<Sqlite>::new(
            "INSERT INTO attempt_questions (attempt_id, question_id, position) ",
        );
        insert_snapshot.push_values(drawn.iter().enumerate(), |mut b, (position, question_id)| {
            b.push_bind(attempt_id)
                .push_bind(*question_id)
                .push_bind(position as i64);
        });
        insert_snapshot.build().execute(&mut *tx).await?;
    }

    let questions = hydrate_questions(&mut tx, &drawn).await?;

    tx.commit().await?;

    tracing::info!(
        "User {} started attempt {} on exam {} ({} questions)",
        user_id,
        attempt_id,
        exam.id,
        questions.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(StartAttemptResponse {
            attempt_id,
            exam_title: exam.title,
            duration: exam.duration,
            questions,
        }),
    ))
}

/// Fetches question content and answer choices for the drawn ids,
/// preserving the drawn order. Correctness flags are never selected here.
async fn hydrate_questions(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    drawn: &[i64],
) -> Result<Vec<AttemptQuestion>, AppError> {
    if drawn.is_empty() {
        return Ok(Vec::new());
    }

    // Dynamic IN clause for the drawn question ids
    let mut question_query = QueryBuilder::<Sqlite>::new(
        "SELECT id, category_id, type, title, content, explanation FROM questions WHERE id IN (",
    );
    let mut separated = question_query.separated(",");
    for id in drawn {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let rows: Vec<Question> = question_query
        .build_query_as()
        .fetch_all(&mut **tx)
        .await?;

    let mut choice_query = QueryBuilder::<Sqlite>::new(
        "SELECT question_id, id, text FROM question_answers WHERE question_id IN (",
    );
    let mut separated = choice_query.separated(",");
    for id in drawn {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");

    let choice_rows: Vec<ChoiceRow> = choice_query.build_query_as().fetch_all(&mut **tx).await?;

    let mut choices_by_question: HashMap<i64, Vec<AnswerChoice>> = HashMap::new();
    for row in choice_rows {
        choices_by_question
            .entry(row.question_id)
            .or_default()
            .push(AnswerChoice {
                id: row.id,
                text: row.text,
            });
    }

    let mut by_id: HashMap<i64, Question> = rows.into_iter().map(|q| (q.id, q)).collect();

    let mut questions = Vec::with_capacity(drawn.len());
    for id in drawn {
        let question = by_id.remove(id).ok_or_else(|| {
            AppError::InternalServerError(format!("snapshot question {} missing from bank", id))
        })?;
        questions.push(AttemptQuestion {
            id: question.id,
            title: question.title,
            content: question.content,
            question_type: question.question_type,
            answers: choices_by_question.remove(id).unwrap_or_default(),
        });
    }

    Ok(questions)
}

/// Submits a user's answers for an in-progress attempt and grades them.
///
/// The snapshot written at start is the authoritative question set: submitted
/// ids outside it are ignored, snapshot questions with no submission grade as
/// an empty selection. A question is correct iff the normalized submitted set
/// equals the normalized correct set. The final status transition is an
/// atomic conditional update; if it affects zero rows a concurrent submission
/// already graded this attempt and this call fails without committing.
pub async fn submit_attempt(
    State(pool): State<SqlitePool>,
    Extension(CallerId(user_id)): Extension<CallerId>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let mut tx = pool.begin().await?;

    let attempt = sqlx::query_as::<_, ExamAttempt>(
        r#"
        SELECT id, user_id, exam_id, start_time, end_time, status, score
        FROM exam_attempts
        WHERE id = ?
        "#,
    )
    .bind(attempt_id)
    .fetch_optional(&mut *tx)
    .await?
    // A foreign attempt is indistinguishable from a missing one.
    .filter(|a| a.user_id == user_id)
    .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.status != AttemptStatus::InProgress {
        return Err(AppError::PreconditionFailed(
            "attempt is not in progress".to_string(),
        ));
    }

    let snapshot_ids: Vec<i64> =
        sqlx::query_scalar("SELECT question_id FROM attempt_questions WHERE attempt_id = ? ORDER BY position")
            .bind(attempt_id)
            .fetch_all(&mut *tx)
            .await?;

    let correct_by_question = fetch_correct_answer_ids(&mut tx, &snapshot_ids).await?;

    let mut correct_count: i64 = 0;
    let mut graded_rows: Vec<(i64, Vec<i64>, bool)> = Vec::with_capacity(snapshot_ids.len());

    for question_id in &snapshot_ids {
        let selected = normalize_answer_ids(
            req.answers
                .get(question_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        );
        let correct = correct_by_question
            .get(question_id)
            .cloned()
            .unwrap_or_default();

        let is_correct = selected == correct;
        if is_correct {
            correct_count += 1;
        }
        graded_rows.push((*question_id, selected, is_correct));
    }

    if !graded_rows.is_empty() {
        let mut insert_graded = QueryBuilder::<Sqlite>::new(
            "INSERT INTO attempt_answers (attempt_id, question_id, selected_answer_ids, is_correct) ",
        );
        insert_graded.push_values(graded_rows, |mut b, (question_id, selected, is_correct)| {
            b.push_bind(attempt_id)
                .push_bind(question_id)
                .push_bind(sqlx::types::Json(selected))
                .push_bind(is_correct);
        });
        insert_graded.build().execute(&mut *tx).await?;
    }

    let total_questions = snapshot_ids.len() as i64;
    let score = calculate_score(correct_count, total_questions);
    let end_time = chrono::Utc::now();

    // Atomic conditional transition: the affected-row count is the sole
    // authority for whether this grading pass stands.
    let updated = sqlx::query(
        "UPDATE exam_attempts SET status = ?, end_time = ?, score = ? WHERE id = ? AND status = ?",
    )
    .bind(AttemptStatus::Completed)
    .bind(end_time)
    .bind(score)
    .bind(attempt_id)
    .bind(AttemptStatus::InProgress)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        // Lost the race to a concurrent submission; rollback on drop.
        return Err(AppError::PreconditionFailed(
            "attempt is not in progress".to_string(),
        ));
    }

    tx.commit().await?;

    tracing::info!(
        "Attempt {} graded: {}/{} correct, score {}",
        attempt_id,
        correct_count,
        total_questions,
        score
    );

    Ok(Json(SubmitAttemptResponse {
        attempt_id,
        score,
        correct_count,
        total_questions,
    }))
}

/// Fetches the normalized correct-answer id set for each snapshot question.
async fn fetch_correct_answer_ids(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    question_ids: &[i64],
) -> Result<HashMap<i64, Vec<i64>>, AppError> {
    if question_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT question_id, id FROM question_answers WHERE is_correct = 1 AND question_id IN (",
    );
    let mut separated = query.separated(",");
    for id in question_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let rows: Vec<CorrectAnswerRow> = query.build_query_as().fetch_all(&mut **tx).await?;

    let mut by_question: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in rows {
        by_question.entry(row.question_id).or_default().push(row.id);
    }
    for ids in by_question.values_mut() {
        ids.sort_unstable();
        ids.dedup();
    }

    Ok(by_question)
}

/// Helper struct for the attempt header of the review payload.
#[derive(sqlx::FromRow)]
struct AttemptHeaderRow {
    id: i64,
    exam_id: i64,
    exam_title: String,
    start_time: chrono::DateTime<chrono::Utc>,
    end_time: Option<chrono::DateTime<chrono::Utc>>,
    score: Option<f64>,
}

/// Helper struct joining snapshot, question content, and the graded row.
#[derive(sqlx::FromRow)]
struct GradedQuestionRow {
    question_id: i64,
    title: String,
    explanation: Option<String>,
    selected_answer_ids: sqlx::types::Json<Vec<i64>>,
    is_correct: bool,
}

/// Helper struct for review-time answer choices with correctness flags.
#[derive(sqlx::FromRow)]
struct ReviewChoiceRow {
    question_id: i64,
    id: i64,
    text: String,
    is_correct: bool,
}

/// Returns the review payload for a completed attempt.
///
/// An attempt that is absent, in progress, or owned by someone else uniformly
/// reads as NotFound. Answer choices are annotated with their objective
/// correctness read live from the question bank, so the reviewer sees every
/// correct option, not only the graded selection. Read-only.
pub async fn get_attempt_result(
    State(pool): State<SqlitePool>,
    Extension(CallerId(user_id)): Extension<CallerId>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let header = sqlx::query_as::<_, AttemptHeaderRow>(
        r#"
        SELECT a.id, a.exam_id, e.title AS exam_title, a.start_time, a.end_time, a.score
        FROM exam_attempts a
        JOIN exams e ON e.id = a.exam_id
        WHERE a.id = ? AND a.user_id = ? AND a.status = ?
        "#,
    )
    .bind(attempt_id)
    .bind(user_id)
    .bind(AttemptStatus::Completed)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    let graded: Vec<GradedQuestionRow> = sqlx::query_as(
        r#"
        SELECT q.id AS question_id, q.title, q.explanation,
               aa.selected_answer_ids, aa.is_correct
        FROM attempt_questions aq
        JOIN questions q ON q.id = aq.question_id
        JOIN attempt_answers aa
            ON aa.attempt_id = aq.attempt_id AND aa.question_id = aq.question_id
        WHERE aq.attempt_id = ?
        ORDER BY aq.position
        "#,
    )
    .bind(attempt_id)
    .fetch_all(&pool)
    .await?;

    let question_ids: Vec<i64> = graded.iter().map(|row| row.question_id).collect();
    let mut choices_by_question = fetch_review_choices(&pool, &question_ids).await?;

    let results = graded
        .into_iter()
        .map(|row| QuestionResult {
            question_id: row.question_id,
            title: row.title,
            explanation: row.explanation,
            selected_answer_ids: row.selected_answer_ids.0,
            is_correct: row.is_correct,
            answers: choices_by_question
                .remove(&row.question_id)
                .unwrap_or_default(),
        })
        .collect();

    Ok(Json(AttemptResultResponse {
        attempt: AttemptDetails {
            id: header.id,
            exam_id: header.exam_id,
            exam_title: header.exam_title,
            start_time: header.start_time,
            end_time: header.end_time,
            score: header.score,
        },
        results,
    }))
}

/// Fetches every answer choice for the given questions, correctness included.
async fn fetch_review_choices(
    pool: &SqlitePool,
    question_ids: &[i64],
) -> Result<HashMap<i64, Vec<ReviewChoice>>, AppError> {
    if question_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT question_id, id, text, is_correct FROM question_answers WHERE question_id IN (",
    );
    let mut separated = query.separated(",");
    for id in question_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");

    let rows: Vec<ReviewChoiceRow> = query.build_query_as().fetch_all(pool).await?;

    let mut by_question: HashMap<i64, Vec<ReviewChoice>> = HashMap::new();
    for row in rows {
        by_question
            .entry(row.question_id)
            .or_default()
            .push(ReviewChoice {
                id: row.id,
                text: row.text,
                is_correct: row.is_correct,
            });
    }

    Ok(by_question)
}
