//! AI explanation and quiz endpoints, plus quiz score recording.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth::parse_age;
use super::{ApiError, AppState, JsonBody};
use crate::auth::AuthUser;
use crate::prompts::{ExplainLength, ExplainRequest, Language, ALLOWED_MCQ_COUNTS};
use crate::sanitize::sanitize_topic;
use crate::store::{HistoryKind, NewHistoryEntry};

const DEFAULT_MCQ_COUNT: u32 = 5;
const UNKNOWN_TOPIC: &str = "Unknown Topic";

/// Largest quiz total accepted when recording a score
const MAX_QUIZ_TOTAL: u64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct ExplainBody {
    pub topic: Option<String>,
    pub language: Option<String>,
    pub size: Option<String>,
    pub age: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct McqBody {
    pub topic: Option<String>,
    pub count: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoreBody {
    pub topic: Option<String>,
    pub score: Option<Value>,
    pub total: Option<Value>,
}

fn required_topic(raw: Option<&str>) -> Result<String, ApiError> {
    raw.and_then(sanitize_topic)
        .ok_or_else(|| ApiError::validation("Topic is required"))
}

/// Quiz size: an integer or numeric string from the allowed set
pub fn parse_mcq_count(value: Option<&Value>) -> Result<u32, ApiError> {
    let count = match value {
        None | Some(Value::Null) => Some(DEFAULT_MCQ_COUNT as i64),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    count
        .and_then(|c| u32::try_from(c).ok())
        .filter(|c| ALLOWED_MCQ_COUNTS.contains(c))
        .ok_or_else(|| ApiError::validation("Count must be one of: 5, 10, 15, 20."))
}

fn parse_score_field(value: Option<&Value>) -> Option<u64> {
    match value {
        None | Some(Value::Null) => Some(0),
        Some(v) => v.as_u64(),
    }
}

/// POST /explain
pub async fn explain(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(body): JsonBody<ExplainBody>,
) -> Result<Json<Value>, ApiError> {
    let topic = required_topic(body.topic.as_deref())?;

    let language = match body.language.as_deref() {
        None => Language::default(),
        Some(name) => name
            .parse::<Language>()
            .map_err(|_| ApiError::validation("Invalid language selected"))?,
    };

    let length = match body.size.as_deref() {
        None => ExplainLength::default(),
        Some(size) => size
            .parse::<ExplainLength>()
            .map_err(|_| ApiError::validation("Invalid size selected"))?,
    };

    // Explicit age overrides the account's
    let age = match body.age.as_ref().filter(|a| !a.is_null()) {
        Some(value) => parse_age(value).ok_or_else(|| ApiError::validation("Age must be between 1 and 100"))?,
        None => {
            state
                .store
                .get_user(auth.user_id)?
                .ok_or_else(|| ApiError::not_found("User not found"))?
                .age
        }
    };

    let request = ExplainRequest {
        topic,
        language,
        length,
        age,
    };

    let explanation = state
        .ai
        .explain_topic(&request)
        .await
        .map_err(|e| ApiError::from_ai(e, "Something went wrong. Please try again."))?;

    state.store.add_history(NewHistoryEntry {
        user_id: auth.user_id,
        kind: HistoryKind::Explain,
        topic: &request.topic,
        response: &explanation,
        metadata: None,
    })?;

    Ok(Json(json!({ "explanation": explanation })))
}

/// POST /mcq
pub async fn mcq(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(body): JsonBody<McqBody>,
) -> Result<Json<Value>, ApiError> {
    let topic = required_topic(body.topic.as_deref())?;
    let count = parse_mcq_count(body.count.as_ref())?;

    let questions = state
        .ai
        .generate_mcq(&topic, count)
        .await
        .map_err(|e| ApiError::from_ai(e, "Failed to generate MCQs. Please try again."))?;

    state.store.add_history(NewHistoryEntry {
        user_id: auth.user_id,
        kind: HistoryKind::Mcq,
        topic: &topic,
        response: &questions,
        metadata: Some(json!({ "count": count })),
    })?;

    Ok(Json(json!({ "mcq": questions })))
}

/// POST /mcq/score
pub async fn save_score(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(body): JsonBody<ScoreBody>,
) -> Result<Json<Value>, ApiError> {
    let topic = body
        .topic
        .as_deref()
        .and_then(sanitize_topic)
        .unwrap_or_else(|| UNKNOWN_TOPIC.to_string());

    let (Some(score), Some(total)) = (
        parse_score_field(body.score.as_ref()),
        parse_score_field(body.total.as_ref()),
    ) else {
        return Err(ApiError::validation("Score and total must be non-negative integers"));
    };

    if total > MAX_QUIZ_TOTAL {
        return Err(ApiError::validation("Total cannot exceed 1000"));
    }

    if score > total {
        return Err(ApiError::validation("Score cannot exceed total"));
    }

    state.store.add_history(NewHistoryEntry {
        user_id: auth.user_id,
        kind: HistoryKind::McqScore,
        topic: &topic,
        response: &format!("Scored {}/{}", score, total),
        metadata: Some(json!({ "score": score, "total": total })),
    })?;

    Ok(Json(json!({ "message": "Score saved" })))
}
