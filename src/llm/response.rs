//! Cleanup and validation of generative-model quiz output.
//!
//! Model answers are untrusted, semi-structured text. The cleanup pass drops
//! everything before the first `{` and every backtick, then the remaining text
//! must parse as JSON and satisfy the schema of the active generation mode.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

use super::quiz_generation::{GenerationMode, OPTIONS_PER_QUESTION};
use crate::quiz::{QuestionDraft, QuizDraft};

/// Why a model answer could not be turned into a quiz
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is not valid JSON after cleanup: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("response does not match the {mode} schema: {source}")]
    Shape {
        mode: GenerationMode,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Single-question payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleQuestionQuiz {
    pub title: String,
    pub description: String,
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer: String,
}

/// One entry of the multi-question payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question_title: String,
    pub question_options: Vec<String>,
    pub answer: String,
}

/// Multi-question payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiQuestionQuiz {
    pub title: String,
    pub description: String,
    pub questions: Vec<GeneratedQuestion>,
}

/// Validated generation result, tagged by the schema it was parsed with
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedQuiz {
    SingleQuestion(SingleQuestionQuiz),
    MultiQuestion(MultiQuestionQuiz),
}

impl GeneratedQuiz {
    pub fn mode(&self) -> GenerationMode {
        match self {
            GeneratedQuiz::SingleQuestion(_) => GenerationMode::SingleQuestion,
            GeneratedQuiz::MultiQuestion(_) => GenerationMode::MultiQuestion,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            GeneratedQuiz::SingleQuestion(q) => &q.title,
            GeneratedQuiz::MultiQuestion(q) => &q.title,
        }
    }

    pub fn question_count(&self) -> usize {
        match self {
            GeneratedQuiz::SingleQuestion(_) => 1,
            GeneratedQuiz::MultiQuestion(q) => q.questions.len(),
        }
    }

    /// Convert into the records persisted for `video_url`
    pub fn into_draft(self, video_url: &str) -> QuizDraft {
        match self {
            GeneratedQuiz::SingleQuestion(q) => QuizDraft {
                title: q.title,
                description: q.description,
                video_url: video_url.to_string(),
                questions: vec![QuestionDraft {
                    question_title: q.question,
                    question_options: q.answers,
                    answer: q.correct_answer,
                }],
            },
            GeneratedQuiz::MultiQuestion(q) => QuizDraft {
                title: q.title,
                description: q.description,
                video_url: video_url.to_string(),
                questions: q
                    .questions
                    .into_iter()
                    .map(|item| QuestionDraft {
                        question_title: item.question_title,
                        question_options: item.question_options,
                        answer: item.answer,
                    })
                    .collect(),
            },
        }
    }
}

fn preamble_regex() -> &'static Regex {
    static PREAMBLE: OnceLock<Regex> = OnceLock::new();
    PREAMBLE.get_or_init(|| Regex::new(r"^[^{]*").expect("static regex"))
}

/// Strip any preamble before the first `{`, every backtick, and surrounding
/// whitespace. Text without a `{` cleans to an empty string.
pub fn sanitize_response(raw: &str) -> String {
    let without_preamble = preamble_regex().replace(raw, "");
    without_preamble.replace('`', "").trim().to_string()
}

/// Clean a raw model answer and parse it with the schema of `mode`
pub fn parse_quiz_response(mode: GenerationMode, raw: &str) -> Result<GeneratedQuiz, ResponseError> {
    let cleaned = sanitize_response(raw);
    let value: serde_json::Value = serde_json::from_str(&cleaned).map_err(ResponseError::InvalidJson)?;

    let quiz = match mode {
        GenerationMode::SingleQuestion => GeneratedQuiz::SingleQuestion(
            serde_json::from_value(value).map_err(|source| ResponseError::Shape { mode, source })?,
        ),
        GenerationMode::MultiQuestion => GeneratedQuiz::MultiQuestion(
            serde_json::from_value(value).map_err(|source| ResponseError::Shape { mode, source })?,
        ),
    };

    validate(&quiz)?;
    Ok(quiz)
}

fn validate(quiz: &GeneratedQuiz) -> Result<(), ResponseError> {
    let expected = quiz.mode().expected_questions();
    if quiz.question_count() != expected {
        return Err(ResponseError::Invalid(format!(
            "expected {} questions, got {}",
            expected,
            quiz.question_count()
        )));
    }

    match quiz {
        GeneratedQuiz::SingleQuestion(q) => {
            validate_question(1, &q.question, &q.answers, &q.correct_answer)
        }
        GeneratedQuiz::MultiQuestion(q) => {
            q.questions.iter().enumerate().try_for_each(|(i, item)| {
                validate_question(i + 1, &item.question_title, &item.question_options, &item.answer)
            })
        }
    }
}

fn validate_question(
    number: usize,
    title: &str,
    options: &[String],
    answer: &str,
) -> Result<(), ResponseError> {
    if title.trim().is_empty() {
        return Err(ResponseError::Invalid(format!("question {} has an empty title", number)));
    }

    if options.len() != OPTIONS_PER_QUESTION {
        return Err(ResponseError::Invalid(format!(
            "question {} has {} options, expected {}",
            number,
            options.len(),
            OPTIONS_PER_QUESTION
        )));
    }

    if !options.iter().any(|option| option == answer) {
        return Err(ResponseError::Invalid(format!(
            "question {}: answer '{}' is not one of its options",
            number, answer
        )));
    }

    Ok(())
}
