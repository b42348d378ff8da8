//! Quiz data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted quiz with its questions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub video_url: String,
    #[serde(skip_serializing)]
    pub owner_user_id: i64,
    pub questions: Vec<QuizQuestion>,
}

/// Persisted question; read-only once created
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub question_title: String,
    pub question_options: Vec<String>,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub quiz_id: i64,
}

/// Quiz content ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct QuizDraft {
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDraft {
    pub question_title: String,
    pub question_options: Vec<String>,
    pub answer: String,
}

/// Owner-editable fields. Anything else in an update request is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuizUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl QuizUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_quiz_hides_foreign_keys() {
        let now = Utc::now();
        let quiz = Quiz {
            id: 1,
            title: "T".to_string(),
            description: "D".to_string(),
            created_at: now,
            updated_at: now,
            video_url: "https://www.youtube.com/watch?v=x".to_string(),
            owner_user_id: 7,
            questions: vec![QuizQuestion {
                id: 3,
                question_title: "Q".to_string(),
                question_options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                answer: "a".to_string(),
                created_at: now,
                updated_at: now,
                quiz_id: 1,
            }],
        };

        let value = serde_json::to_value(&quiz).unwrap();
        assert!(value.get("owner_user_id").is_none());
        assert!(value["questions"][0].get("quiz_id").is_none());
        assert_eq!(value["questions"][0]["question_options"][3], "d");
        assert_eq!(value["video_url"], "https://www.youtube.com/watch?v=x");
    }

    #[test]
    fn test_update_ignores_unknown_fields() {
        let update: QuizUpdate = serde_json::from_str(
            r#"{"title": "New", "questions": [], "video_url": "https://evil"}"#,
        )
        .unwrap();
        assert_eq!(update.title.as_deref(), Some("New"));
        assert!(update.description.is_none());
        assert!(!update.is_empty());
        assert!(QuizUpdate::default().is_empty());
    }
}
