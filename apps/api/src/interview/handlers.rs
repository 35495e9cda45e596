//! Axum route handlers for the interview session API.

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::ingest::{extract_text, DocumentFormat};
use crate::interview::parser::FeedbackBlock;
use crate::interview::session::{InterviewSession, Question, SessionError, SessionSnapshot, Stage};
use crate::interview::star::StarCoverage;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IntakeRequest {
    #[serde(default)]
    pub cv_text: Option<String>,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub company_info: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TailoringRequest {
    #[serde(default)]
    pub cv_text: Option<String>,
}

impl TailoringRequest {
    /// Every field is optional, so an empty body means "use the CV from intake".
    fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Invalid tailoring request: {e}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct TailoringResponse {
    pub tailoring: String,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub question: Question,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub star: Option<StarCoverage>,
    pub missing_star_elements: Vec<&'static str>,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub feedback: FeedbackBlock,
    pub complete: bool,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ModelAnswerResponse {
    pub model_answer: String,
    pub session: SessionSnapshot,
}

// ────────────────────────────────────────────────────────────────────────────
// Session lifecycle
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionSnapshot>) {
    let session = InterviewSession::new(state.llm.clone());
    let snapshot = session.snapshot();
    state.sessions.insert(session).await;
    (StatusCode::CREATED, Json(snapshot))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = state.sessions.wait(id).await?;
    Ok(Json(session.snapshot()))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let mut session = state.sessions.acquire(id).await?;
    session.reset();
    Ok(Json(session.snapshot()))
}

// ────────────────────────────────────────────────────────────────────────────
// Intake
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions/:id/intake
pub async fn handle_intake(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<IntakeRequest>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let Json(request) = payload?;
    let mut session = state.sessions.acquire(id).await?;
    session.submit_intake(
        request.cv_text.as_deref(),
        &request.job_description,
        &request.company_info,
    )?;
    Ok(Json(session.snapshot()))
}

/// POST /api/v1/sessions/:id/intake/upload
///
/// Multipart form: `cv` (PDF, DOCX or TXT file), `job_description`, `company_info`.
/// The CV is converted to text before intake; the file itself is not kept.
pub async fn handle_upload_intake(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, AppError> {
    let mut session = state.sessions.acquire(id).await?;
    if session.stage() != Stage::Intake {
        return Err(SessionError::InvalidStage {
            operation: "submit_intake",
            stage: session.stage(),
        }
        .into());
    }

    let mut cv: Option<(DocumentFormat, Bytes)> = None;
    let mut job_description = String::new();
    let mut company_info = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "cv" => {
                let format = DocumentFormat::detect(field.file_name(), field.content_type())?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read cv: {e}")))?;
                cv = Some((format, bytes));
            }
            "job_description" | "company_info" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read {name}: {e}")))?;
                if name == "job_description" {
                    job_description = text;
                } else {
                    company_info = text;
                }
            }
            _ => {}
        }
    }

    let cv_text = match cv {
        Some((format, bytes)) => {
            info!(
                "Session {id}: extracting {:?} CV ({} bytes)",
                format,
                bytes.len()
            );
            let limit = state.config.max_upload_bytes;
            let text = tokio::task::spawn_blocking(move || extract_text(&bytes, format, limit))
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("CV extraction task failed: {e}")))??;
            Some(text)
        }
        None => None,
    };

    session.submit_intake(cv_text.as_deref(), &job_description, &company_info)?;
    Ok(Json(session.snapshot()))
}

// ────────────────────────────────────────────────────────────────────────────
// Interview steps
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions/:id/summary
pub async fn handle_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SummaryResponse>, AppError> {
    let mut session = state.sessions.acquire(id).await?;
    let summary = session.request_summary().await?;
    Ok(Json(SummaryResponse {
        summary,
        session: session.snapshot(),
    }))
}

/// POST /api/v1/sessions/:id/tailoring
pub async fn handle_tailoring(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<TailoringResponse>, AppError> {
    let request = TailoringRequest::from_body(&body)?;
    let mut session = state.sessions.acquire(id).await?;
    let tailoring = session.request_tailoring(request.cv_text.as_deref()).await?;
    Ok(Json(TailoringResponse {
        tailoring,
        session: session.snapshot(),
    }))
}

/// POST /api/v1/sessions/:id/questions
pub async fn handle_next_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestionResponse>, AppError> {
    let mut session = state.sessions.acquire(id).await?;
    let question = session.next_question().await?;
    Ok(Json(QuestionResponse {
        question,
        session: session.snapshot(),
    }))
}

/// POST /api/v1/sessions/:id/answer
pub async fn handle_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, AppError> {
    let Json(request) = payload?;
    let mut session = state.sessions.acquire(id).await?;
    let star = session.submit_answer(&request.answer)?.star;
    Ok(Json(AnswerResponse {
        star,
        missing_star_elements: star.map(|s| s.missing()).unwrap_or_default(),
        session: session.snapshot(),
    }))
}

/// POST /api/v1/sessions/:id/feedback
pub async fn handle_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let mut session = state.sessions.acquire(id).await?;
    let feedback = session.request_feedback().await?;
    Ok(Json(FeedbackResponse {
        complete: feedback.is_complete(),
        feedback,
        session: session.snapshot(),
    }))
}

/// POST /api/v1/sessions/:id/questions/:index/model-answer
pub async fn handle_model_answer(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<ModelAnswerResponse>, AppError> {
    let mut session = state.sessions.acquire(id).await?;
    let model_answer = session.request_model_answer(index).await?;
    Ok(Json(ModelAnswerResponse {
        model_answer,
        session: session.snapshot(),
    }))
}

/// POST /api/v1/sessions/:id/finish
pub async fn handle_finish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let mut session = state.sessions.acquire(id).await?;
    session.finish()?;
    Ok(Json(session.snapshot()))
}
