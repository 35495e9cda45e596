//! Interview session: the stage machine that drives one coaching conversation.
//!
//! Flow: Intake → Summarize → TailorToCv → GenerateQuestion → AwaitAnswer →
//!       GenerateFeedback → GenerateQuestion (next round) | Advance (finished).
//!
//! Every operation checks its stage, builds its prompt and awaits the model before
//! touching any state. A failed call therefore leaves the session exactly as it was,
//! and the caller may retry the same operation.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::interview::parser::{split_feedback, split_questions, FeedbackBlock};
use crate::interview::prompts::Prompt;
use crate::interview::star::{assess, StarCoverage};
use crate::llm_client::{LanguageModel, LlmError, Turn};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intake,
    Summarize,
    TailorToCv,
    GenerateQuestion,
    AwaitAnswer,
    GenerateFeedback,
    Advance,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Intake => "intake",
            Stage::Summarize => "summarize",
            Stage::TailorToCv => "tailor_to_cv",
            Stage::GenerateQuestion => "generate_question",
            Stage::AwaitAnswer => "await_answer",
            Stage::GenerateFeedback => "generate_feedback",
            Stage::Advance => "advance",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("'{operation}' is not allowed in stage '{stage}'")]
    InvalidStage {
        operation: &'static str,
        stage: Stage,
    },

    #[error("Question {0} does not exist")]
    UnknownQuestion(usize),

    #[error("Language model call failed: {0}")]
    Service(#[from] LlmError),
}

/// Everything the candidate supplied plus what the model has produced so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionContext {
    pub job_description: String,
    pub company_info: String,
    pub cv_text: Option<String>,
    pub summary: Option<String>,
    pub tailoring: Option<String>,
    pub conversation_history: Vec<Turn>,
}

/// One interview round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub index: usize,
    pub text: String,
    pub answer: Option<String>,
    /// Local STAR keyword check, set together with `answer`.
    pub star: Option<StarCoverage>,
    pub feedback: Option<FeedbackBlock>,
    /// On-demand STAR model answer.
    pub model_answer: Option<String>,
}

/// Serializable view of a session returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub job_description: String,
    pub company_info: String,
    pub cv_text: Option<String>,
    pub summary: Option<String>,
    pub tailoring: Option<String>,
    pub history_turns: usize,
    pub questions: Vec<Question>,
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

pub struct InterviewSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    stage: Stage,
    context: SessionContext,
    questions: Vec<Question>,
    model: Arc<dyn LanguageModel>,
}

impl InterviewSession {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            stage: Stage::Intake,
            context: SessionContext::default(),
            questions: Vec::new(),
            model,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[cfg(test)]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    #[cfg(test)]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            stage: self.stage,
            created_at: self.created_at,
            job_description: self.context.job_description.clone(),
            company_info: self.context.company_info.clone(),
            cv_text: self.context.cv_text.clone(),
            summary: self.context.summary.clone(),
            tailoring: self.context.tailoring.clone(),
            history_turns: self.context.conversation_history.len(),
            questions: self.questions.clone(),
        }
    }

    /// Records the candidate's inputs. `cv` is `None` when no CV was supplied.
    pub fn submit_intake(
        &mut self,
        cv: Option<&str>,
        job_description: &str,
        company_info: &str,
    ) -> Result<(), SessionError> {
        self.expect_stage("submit_intake", &[Stage::Intake])?;

        let job_description = required("job_description", job_description)?;
        let company_info = required("company_info", company_info)?;
        let cv_text = cv.map(|cv| required("cv", cv)).transpose()?;

        info!(
            "Session {}: intake received (cv: {})",
            self.id,
            cv_text.is_some()
        );
        self.context = SessionContext {
            job_description,
            company_info,
            cv_text,
            ..Default::default()
        };
        self.stage = Stage::Summarize;
        Ok(())
    }

    /// Summarizes the role and company. Repeatable until the first question is asked;
    /// a repeat starts the conversation over so identical inputs give identical prompts.
    pub async fn request_summary(&mut self) -> Result<String, SessionError> {
        if !self.before_first_question(&[Stage::Summarize, Stage::TailorToCv]) {
            return Err(self.invalid("request_summary"));
        }

        let prompt = Prompt::Summarize {
            job_description: &self.context.job_description,
            company_info: &self.context.company_info,
        };
        let (prompt_text, reply) = self.complete(&[], prompt).await?;

        let summary = reply.trim().to_string();
        self.context.summary = Some(summary.clone());
        self.context.tailoring = None;
        self.context.conversation_history = vec![Turn::user(prompt_text), Turn::model(reply)];
        self.stage = if self.context.cv_text.is_some() {
            Stage::TailorToCv
        } else {
            Stage::GenerateQuestion
        };

        info!("Session {}: summary stored, next stage {}", self.id, self.stage);
        Ok(summary)
    }

    /// Produces CV-specific guidance. A supplied CV replaces the one given at intake.
    pub async fn request_tailoring(&mut self, cv_text: Option<&str>) -> Result<String, SessionError> {
        if !self.before_first_question(&[Stage::TailorToCv]) {
            return Err(self.invalid("request_tailoring"));
        }
        let Some(summary) = self.context.summary.as_deref() else {
            return Err(self.invalid("request_tailoring"));
        };

        let cv = match cv_text {
            Some(text) => required("cv", text)?,
            None => self.context.cv_text.clone().ok_or_else(|| {
                SessionError::Validation("cv is required for tailoring".to_string())
            })?,
        };

        let prompt = Prompt::Tailor {
            summary,
            cv_text: &cv,
        };
        let (prompt_text, reply) = self
            .complete(&self.context.conversation_history, prompt)
            .await?;

        let tailoring = reply.trim().to_string();
        self.context.cv_text = Some(cv);
        self.context.tailoring = Some(tailoring.clone());
        self.record(prompt_text, reply);
        self.stage = Stage::GenerateQuestion;

        info!("Session {}: tailoring stored", self.id);
        Ok(tailoring)
    }

    /// Asks the model for exactly one new question.
    pub async fn next_question(&mut self) -> Result<Question, SessionError> {
        self.expect_stage("next_question", &[Stage::GenerateQuestion])?;

        let prompt = Prompt::StartInterview {
            question_number: self.questions.len() + 1,
            asked: self.questions.iter().map(|q| q.text.as_str()).collect(),
        };
        let (prompt_text, reply) = self
            .complete(&self.context.conversation_history, prompt)
            .await?;

        let text = split_questions(&reply).collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(SessionError::Service(LlmError::EmptyContent));
        }

        let question = Question {
            index: self.questions.len(),
            text,
            answer: None,
            star: None,
            feedback: None,
            model_answer: None,
        };
        self.questions.push(question.clone());
        self.record(prompt_text, reply);
        self.stage = Stage::AwaitAnswer;

        info!("Session {}: question {} asked", self.id, question.index + 1);
        Ok(question)
    }

    pub fn submit_answer(&mut self, text: &str) -> Result<&Question, SessionError> {
        self.expect_stage("submit_answer", &[Stage::AwaitAnswer])?;
        let answer = required("answer", text)?;

        let stage = self.stage;
        let question = self
            .questions
            .last_mut()
            .ok_or(SessionError::InvalidStage {
                operation: "submit_answer",
                stage,
            })?;
        question.star = Some(assess(&answer));
        question.answer = Some(answer);
        self.stage = Stage::GenerateFeedback;

        info!("Session {}: answer recorded for question {}", self.id, question.index + 1);
        Ok(question)
    }

    /// Evaluates the latest answer and returns to `GenerateQuestion`.
    pub async fn request_feedback(&mut self) -> Result<FeedbackBlock, SessionError> {
        self.expect_stage("request_feedback", &[Stage::GenerateFeedback])?;
        let (question, answer) = match self.questions.last() {
            Some(Question {
                text,
                answer: Some(answer),
                ..
            }) => (text.as_str(), answer.as_str()),
            _ => return Err(self.invalid("request_feedback")),
        };

        let prompt = Prompt::Feedback { question, answer };
        let (prompt_text, reply) = self
            .complete(&self.context.conversation_history, prompt)
            .await?;

        let feedback = split_feedback(&reply);
        if !feedback.is_complete() {
            warn!(
                "Session {}: feedback had {} of 5 sections",
                self.id,
                feedback.populated()
            );
        }
        if let Some(current) = self.questions.last_mut() {
            current.feedback = Some(feedback.clone());
        }
        self.record(prompt_text, reply);
        self.stage = Stage::GenerateQuestion;

        Ok(feedback)
    }

    /// STAR model answer for an already asked question. Does not change the stage.
    pub async fn request_model_answer(&mut self, index: usize) -> Result<String, SessionError> {
        if self.stage == Stage::Intake {
            return Err(self.invalid("request_model_answer"));
        }
        let question = self
            .questions
            .get(index)
            .ok_or(SessionError::UnknownQuestion(index))?;

        let prompt = Prompt::ModelAnswer {
            question: &question.text,
        };
        let (prompt_text, reply) = self
            .complete(&self.context.conversation_history, prompt)
            .await?;

        let model_answer = reply.trim().to_string();
        self.questions[index].model_answer = Some(model_answer.clone());
        self.record(prompt_text, reply);
        Ok(model_answer)
    }

    /// Ends the interview. Requires at least one completed round.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        self.expect_stage("finish", &[Stage::GenerateQuestion])?;
        if self.questions.is_empty() {
            return Err(self.invalid("finish"));
        }
        self.stage = Stage::Advance;
        info!(
            "Session {}: finished after {} questions",
            self.id,
            self.questions.len()
        );
        Ok(())
    }

    /// Discards everything and returns to `Intake`.
    pub fn reset(&mut self) {
        self.context = SessionContext::default();
        self.questions.clear();
        self.stage = Stage::Intake;
        info!("Session {}: reset", self.id);
    }

    // ────────────────────────────────────────────────────────────────────────
    // Helpers
    // ────────────────────────────────────────────────────────────────────────

    /// Renders `prompt`, sends it with `history` and returns (prompt, reply).
    /// Touches no session state.
    async fn complete(
        &self,
        history: &[Turn],
        prompt: Prompt<'_>,
    ) -> Result<(String, String), SessionError> {
        let prompt_text = prompt.render();
        info!(
            "Session {}: sending '{}' prompt ({} history turns)",
            self.id,
            prompt.name(),
            history.len()
        );

        match self.model.send_message(history, &prompt_text).await {
            Ok(reply) => Ok((prompt_text, reply)),
            Err(e) => {
                warn!(
                    "Session {}: '{}' call failed, staying in stage {}: {e}",
                    self.id,
                    prompt.name(),
                    self.stage
                );
                Err(SessionError::Service(e))
            }
        }
    }

    fn record(&mut self, prompt_text: String, reply: String) {
        self.context.conversation_history.push(Turn::user(prompt_text));
        self.context.conversation_history.push(Turn::model(reply));
    }

    fn expect_stage(&self, operation: &'static str, allowed: &[Stage]) -> Result<(), SessionError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    /// True in one of `stages`, or in `GenerateQuestion` before any question exists.
    fn before_first_question(&self, stages: &[Stage]) -> bool {
        stages.contains(&self.stage)
            || (self.stage == Stage::GenerateQuestion && self.questions.is_empty())
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidStage {
            operation,
            stage: self.stage,
        }
    }
}

fn required(field: &str, value: &str) -> Result<String, SessionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SessionError::Validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}
