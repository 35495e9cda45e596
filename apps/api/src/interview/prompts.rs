//! Prompt templates for the interview workflow.
//!
//! Every piece of user-supplied text is wrapped in a named block bounded by
//! `#####` markers. Runs of five or more `#` inside user text are collapsed
//! before interpolation so a pasted job description can never close a block early.

use std::sync::OnceLock;

use regex::Regex;

use crate::llm_client::prompts::{CARL_METHOD, STAR_METHOD};

/// Block marker. User text must never contain this sequence after fencing.
pub const DELIMITER: &str = "#####";

pub const SUMMARIZE_TEMPLATE: &str = "\
You are preparing a candidate for a job interview at the company described below.

{job_description}

{company_info}

Write a short briefing for the candidate: the core responsibilities of the role, \
the skills and experience the interviewers will look for, and what the company \
appears to value. Reply with the briefing only.";

pub const TAILOR_TEMPLATE: &str = "\
Here is the briefing you wrote for this role, followed by the candidate's CV.

{summary}

{cv}

Tailor your coaching to this candidate: list the strengths from the CV they should \
emphasise, the gaps they should be ready to address, and the CV experiences that \
best fit the questions this role is likely to ask. Reply with the guidance only.";

pub const START_INTERVIEW_TEMPLATE: &str = "\
We are running a mock interview for the role discussed above. \
Ask interview question number {question_number}.

Questions already asked (do not repeat them):
{asked_questions}

Focus on the key skills and experiences the role requires. \
Ask exactly ONE question. Reply with the question text only: \
no numbering, no preamble, no answer.";

pub const FEEDBACK_TEMPLATE: &str = "\
Evaluate the candidate's answer to the interview question below.

{question}

{answer}

Use the {carl_method}

Reply in EXACTLY five paragraphs separated by a single blank line, in this order, \
without headings or numbering:
1. What was good about the answer.
2. What was weak or missing.
3. What the candidate should add.
4. A model answer to the question written with the CARL method.
5. One short sentence inviting the candidate to continue to the next question.";

pub const MODEL_ANSWER_TEMPLATE: &str = "\
Provide a model answer for the following interview question, written as the \
candidate would say it and tailored to the role discussed above.

{question}

Use the {star_method}

Reply with the model answer only.";

/// One renderable prompt. Fields borrow from the session; rendering has no side effects.
#[derive(Debug, Clone)]
pub enum Prompt<'a> {
    Summarize {
        job_description: &'a str,
        company_info: &'a str,
    },
    Tailor {
        summary: &'a str,
        cv_text: &'a str,
    },
    StartInterview {
        question_number: usize,
        asked: Vec<&'a str>,
    },
    Feedback {
        question: &'a str,
        answer: &'a str,
    },
    ModelAnswer {
        question: &'a str,
    },
}

impl Prompt<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Prompt::Summarize { .. } => "summarize",
            Prompt::Tailor { .. } => "tailor",
            Prompt::StartInterview { .. } => "start_interview",
            Prompt::Feedback { .. } => "feedback",
            Prompt::ModelAnswer { .. } => "model_answer",
        }
    }

    pub fn render(&self) -> String {
        match self {
            Prompt::Summarize {
                job_description,
                company_info,
            } => fill(
                SUMMARIZE_TEMPLATE,
                &[
                    ("job_description", block("JOB DESCRIPTION", job_description).as_str()),
                    ("company_info", block("COMPANY INFORMATION", company_info).as_str()),
                ],
            ),
            Prompt::Tailor { summary, cv_text } => fill(
                TAILOR_TEMPLATE,
                &[
                    ("summary", block("BRIEFING", summary).as_str()),
                    ("cv", block("CANDIDATE CV", cv_text).as_str()),
                ],
            ),
            Prompt::StartInterview {
                question_number,
                asked,
            } => {
                let asked_questions = if asked.is_empty() {
                    "None yet.".to_string()
                } else {
                    let listed = asked
                        .iter()
                        .enumerate()
                        .map(|(i, q)| format!("{}. {}", i + 1, q.trim()))
                        .collect::<Vec<_>>()
                        .join("\n");
                    block("ASKED QUESTIONS", &listed)
                };
                fill(
                    START_INTERVIEW_TEMPLATE,
                    &[
                        ("question_number", question_number.to_string().as_str()),
                        ("asked_questions", asked_questions.as_str()),
                    ],
                )
            }
            Prompt::Feedback { question, answer } => fill(
                FEEDBACK_TEMPLATE,
                &[
                    ("question", block("QUESTION", question).as_str()),
                    ("answer", block("CANDIDATE ANSWER", answer).as_str()),
                    ("carl_method", CARL_METHOD),
                ],
            ),
            Prompt::ModelAnswer { question } => fill(
                MODEL_ANSWER_TEMPLATE,
                &[
                    ("question", block("QUESTION", question).as_str()),
                    ("star_method", STAR_METHOD),
                ],
            ),
        }
    }
}

/// Wraps user text in a named delimiter block.
fn block(name: &str, text: &str) -> String {
    format!(
        "{DELIMITER} {name} {DELIMITER}\n{}\n{DELIMITER} END {name} {DELIMITER}",
        fence(text.trim())
    )
}

/// Collapses every run of 5+ `#` to four so the text cannot form a block marker.
pub fn fence(text: &str) -> String {
    static DELIMITER_RUN: OnceLock<Regex> = OnceLock::new();
    let re = DELIMITER_RUN.get_or_init(|| Regex::new(r"#{5,}").expect("valid delimiter regex"));
    re.replace_all(text, "####").into_owned()
}

/// Single-pass `{key}` substitution. Values are inserted verbatim and never rescanned,
/// so placeholder-looking text inside user input stays literal.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values
            .iter()
            .find(|(key, _)| tail.starts_with(key) && tail[key.len()..].starts_with('}'));
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
