use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::auth::{TokenKind, User};
use crate::quiz::{Quiz, QuizDraft, QuizQuestion, QuizUpdate};

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    date_joined   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS auth_tokens (
    token      TEXT PRIMARY KEY,
    user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    kind       TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quizzes (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    title         TEXT NOT NULL,
    description   TEXT NOT NULL,
    video_url     TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    owner_user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS quiz_questions (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id          INTEGER NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
    question_title   TEXT NOT NULL,
    question_options TEXT NOT NULL,
    answer           TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quizzes_owner ON quizzes(owner_user_id);
CREATE INDEX IF NOT EXISTS idx_questions_quiz ON quiz_questions(quiz_id);
CREATE INDEX IF NOT EXISTS idx_tokens_user ON auth_tokens(user_id);
"#;

const QUIZ_COLUMNS: &str = "id, title, description, video_url, created_at, updated_at, owner_user_id";
const USER_COLUMNS: &str = "id, username, email, password_hash, date_joined";

/// SQLite-backed repository for users, tokens and quizzes
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        let store = Self::from_connection(conn)?;
        info!("🗄️  Opened database {}", path.display());
        Ok(store)
    }

    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(DDL).context("failed to create schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("database connection lock poisoned"))
    }

    // Users

    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let conn = self.lock()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (username, email, password_hash, date_joined) VALUES (?1, ?2, ?3, ?4)",
            params![username, email, password_hash, now],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Created user {} ({})", username, id);
        Ok(User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            date_joined: now,
        })
    }

    pub fn username_exists(&self, username: &str) -> Result<bool> {
        let conn = self.lock()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            params![username],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        let conn = self.lock()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower(?1))",
            params![email],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    // Tokens

    pub fn insert_token(
        &self,
        token: &str,
        user_id: i64,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO auth_tokens (token, user_id, kind, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![token, user_id, kind.as_str(), expires_at],
        )?;
        Ok(())
    }

    /// Resolve a token of the given kind to its user. Expired tokens are
    /// deleted and resolve to `None`.
    pub fn find_token_user(&self, token: &str, kind: TokenKind) -> Result<Option<User>> {
        let conn = self.lock()?;
        let found: Option<(i64, DateTime<Utc>)> = conn
            .query_row(
                "SELECT user_id, expires_at FROM auth_tokens WHERE token = ?1 AND kind = ?2",
                params![token, kind.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((user_id, expires_at)) = found else {
            return Ok(None);
        };

        if expires_at <= Utc::now() {
            conn.execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])?;
            debug!("Discarded expired {} token for user {}", kind.as_str(), user_id);
            return Ok(None);
        }

        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![user_id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn delete_user_tokens(&self, user_id: i64) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM auth_tokens WHERE user_id = ?1", params![user_id])?;
        Ok(deleted)
    }

    // Quizzes

    /// Insert a quiz and all of its questions in one transaction
    pub fn create_quiz(&self, owner_user_id: i64, draft: &QuizDraft) -> Result<Quiz> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        tx.execute(
            "INSERT INTO quizzes (title, description, video_url, created_at, updated_at, owner_user_id)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
            params![draft.title, draft.description, draft.video_url, now, owner_user_id],
        )?;
        let quiz_id = tx.last_insert_rowid();

        let mut questions = Vec::with_capacity(draft.questions.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO quiz_questions (quiz_id, question_title, question_options, answer, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            )?;
            for question in &draft.questions {
                let options_json = serde_json::to_string(&question.question_options)?;
                stmt.execute(params![
                    quiz_id,
                    question.question_title,
                    options_json,
                    question.answer,
                    now
                ])?;
                questions.push(QuizQuestion {
                    id: tx.last_insert_rowid(),
                    question_title: question.question_title.clone(),
                    question_options: question.question_options.clone(),
                    answer: question.answer.clone(),
                    created_at: now,
                    updated_at: now,
                    quiz_id,
                });
            }
        }

        tx.commit()?;
        info!("💾 Stored quiz {} with {} questions", quiz_id, questions.len());

        Ok(Quiz {
            id: quiz_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            created_at: now,
            updated_at: now,
            video_url: draft.video_url.clone(),
            owner_user_id,
            questions,
        })
    }

    pub fn list_quizzes(&self, owner_user_id: i64) -> Result<Vec<Quiz>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM quizzes WHERE owner_user_id = ?1 ORDER BY created_at DESC, id DESC",
            QUIZ_COLUMNS
        ))?;
        let rows = stmt.query_map(params![owner_user_id], quiz_from_row)?;

        let mut quizzes = Vec::new();
        for row in rows {
            let mut quiz = row?;
            quiz.questions = load_questions(&conn, quiz.id)?;
            quizzes.push(quiz);
        }
        Ok(quizzes)
    }

    /// Fetch a quiz only if it belongs to `owner_user_id`
    pub fn get_quiz(&self, owner_user_id: i64, quiz_id: i64) -> Result<Option<Quiz>> {
        let conn = self.lock()?;
        fetch_owned_quiz(&conn, owner_user_id, quiz_id)
    }

    /// Change title and/or description of an owned quiz
    pub fn update_quiz(&self, owner_user_id: i64, quiz_id: i64, update: &QuizUpdate) -> Result<Option<Quiz>> {
        let conn = self.lock()?;
        if !update.is_empty() {
            let changed = conn.execute(
                "UPDATE quizzes
                 SET title = COALESCE(?1, title), description = COALESCE(?2, description), updated_at = ?3
                 WHERE id = ?4 AND owner_user_id = ?5",
                params![update.title, update.description, Utc::now(), quiz_id, owner_user_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
        }
        fetch_owned_quiz(&conn, owner_user_id, quiz_id)
    }

    /// Delete an owned quiz; its questions go with it
    pub fn delete_quiz(&self, owner_user_id: i64, quiz_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM quizzes WHERE id = ?1 AND owner_user_id = ?2",
            params![quiz_id, owner_user_id],
        )?;
        Ok(deleted > 0)
    }

    pub fn count_quizzes(&self) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM quizzes", [], |row| row.get(0))?)
    }

    pub fn count_questions(&self) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM quiz_questions", [], |row| row.get(0))?)
    }
}

fn fetch_owned_quiz(conn: &Connection, owner_user_id: i64, quiz_id: i64) -> Result<Option<Quiz>> {
    let quiz = conn
        .query_row(
            &format!("SELECT {} FROM quizzes WHERE id = ?1 AND owner_user_id = ?2", QUIZ_COLUMNS),
            params![quiz_id, owner_user_id],
            quiz_from_row,
        )
        .optional()?;

    match quiz {
        Some(mut quiz) => {
            quiz.questions = load_questions(conn, quiz.id)?;
            Ok(Some(quiz))
        }
        None => Ok(None),
    }
}

fn load_questions(conn: &Connection, quiz_id: i64) -> Result<Vec<QuizQuestion>> {
    let mut stmt = conn.prepare(
        "SELECT id, question_title, question_options, answer, created_at, updated_at, quiz_id
         FROM quiz_questions WHERE quiz_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![quiz_id], question_from_row)?;

    let mut questions = Vec::new();
    for row in rows {
        questions.push(row?);
    }
    Ok(questions)
}

fn quiz_from_row(row: &Row<'_>) -> rusqlite::Result<Quiz> {
    Ok(Quiz {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        video_url: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        owner_user_id: row.get(6)?,
        questions: Vec::new(),
    })
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<QuizQuestion> {
    let options_json: String = row.get(2)?;
    let question_options = serde_json::from_str(&options_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(QuizQuestion {
        id: row.get(0)?,
        question_title: row.get(1)?,
        question_options,
        answer: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        quiz_id: row.get(6)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        date_joined: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuestionDraft;
    use chrono::Duration;

    fn draft(questions: usize) -> QuizDraft {
        QuizDraft {
            title: "Sample Quiz".to_string(),
            description: "A sample quiz for testing.".to_string(),
            video_url: "https://www.youtube.com/watch?v=PPzIWFJU_3s".to_string(),
            questions: (0..questions)
                .map(|i| QuestionDraft {
                    question_title: format!("Question {}", i),
                    question_options: vec!["Option 1".into(), "Option 2".into(), "Option 3".into(), "Option 4".into()],
                    answer: "Option 1".to_string(),
                })
                .collect(),
        }
    }

    fn store_with_users() -> (Store, User, User) {
        let store = Store::memory().unwrap();
        let alice = store.create_user("alice", "alice@example.com", "hash").unwrap();
        let bob = store.create_user("bob", "bob@example.com", "hash").unwrap();
        (store, alice, bob)
    }

    #[test]
    fn test_create_and_fetch_round_trip() {
        let (store, alice, _) = store_with_users();
        let created = store.create_quiz(alice.id, &draft(10)).unwrap();

        let fetched = store.get_quiz(alice.id, created.id).unwrap().unwrap();
        assert_eq!(fetched.title, created.title);
        assert_eq!(fetched.description, created.description);
        assert_eq!(fetched.video_url, created.video_url);
        assert_eq!(fetched.questions, created.questions);
        assert_eq!(fetched.questions.len(), 10);
    }

    #[test]
    fn test_ownership_scoping() {
        let (store, alice, bob) = store_with_users();
        let quiz = store.create_quiz(alice.id, &draft(1)).unwrap();

        assert!(store.get_quiz(bob.id, quiz.id).unwrap().is_none());
        assert!(store.list_quizzes(bob.id).unwrap().is_empty());
        assert!(!store.delete_quiz(bob.id, quiz.id).unwrap());
        assert!(store
            .update_quiz(bob.id, quiz.id, &QuizUpdate { title: Some("x".into()), description: None })
            .unwrap()
            .is_none());
        assert_eq!(store.count_quizzes().unwrap(), 1);
    }

    #[test]
    fn test_update_only_touches_title_and_description() {
        let (store, alice, _) = store_with_users();
        let quiz = store.create_quiz(alice.id, &draft(3)).unwrap();

        let updated = store
            .update_quiz(
                alice.id,
                quiz.id,
                &QuizUpdate {
                    title: Some("Updated Sample Quiz".into()),
                    description: None,
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "Updated Sample Quiz");
        assert_eq!(updated.description, quiz.description);
        assert_eq!(updated.video_url, quiz.video_url);
        assert_eq!(updated.questions, quiz.questions);
        assert!(updated.updated_at >= quiz.updated_at);
    }

    #[test]
    fn test_delete_cascades_to_questions() {
        let (store, alice, _) = store_with_users();
        let quiz = store.create_quiz(alice.id, &draft(10)).unwrap();
        store.create_quiz(alice.id, &draft(1)).unwrap();
        assert_eq!(store.count_questions().unwrap(), 11);

        assert!(store.delete_quiz(alice.id, quiz.id).unwrap());
        assert!(store.get_quiz(alice.id, quiz.id).unwrap().is_none());
        assert_eq!(store.count_questions().unwrap(), 1);
    }

    #[test]
    fn test_list_is_newest_first() {
        let (store, alice, _) = store_with_users();
        let first = store.create_quiz(alice.id, &draft(1)).unwrap();
        let second = store.create_quiz(alice.id, &draft(1)).unwrap();

        let ids: Vec<i64> = store.list_quizzes(alice.id).unwrap().iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_quiz_requires_existing_owner() {
        let store = Store::memory().unwrap();
        assert!(store.create_quiz(999, &draft(1)).is_err());
        assert_eq!(store.count_quizzes().unwrap(), 0);
        assert_eq!(store.count_questions().unwrap(), 0);
    }

    #[test]
    fn test_users_are_unique() {
        let (store, _, _) = store_with_users();
        assert!(store.username_exists("alice").unwrap());
        assert!(store.email_exists("ALICE@example.com").unwrap());
        assert!(!store.username_exists("carol").unwrap());
        assert!(store.create_user("alice", "other@example.com", "hash").is_err());
        assert_eq!(store.find_user_by_username("bob").unwrap().unwrap().email, "bob@example.com");
    }

    #[test]
    fn test_tokens_expire_and_revoke() {
        let (store, alice, _) = store_with_users();
        store
            .insert_token("live", alice.id, TokenKind::Access, Utc::now() + Duration::minutes(5))
            .unwrap();
        store
            .insert_token("stale", alice.id, TokenKind::Access, Utc::now() - Duration::minutes(5))
            .unwrap();

        assert_eq!(store.find_token_user("live", TokenKind::Access).unwrap().unwrap().id, alice.id);
        assert!(store.find_token_user("live", TokenKind::Refresh).unwrap().is_none());
        assert!(store.find_token_user("stale", TokenKind::Access).unwrap().is_none());

        assert_eq!(store.delete_user_tokens(alice.id).unwrap(), 1);
        assert!(store.find_token_user("live", TokenKind::Access).unwrap().is_none());
    }

    #[test]
    fn test_open_on_disk() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("quiz.sqlite3");
        {
            let store = Store::open(&path).unwrap();
            let user = store.create_user("alice", "a@example.com", "hash").unwrap();
            store.create_quiz(user.id, &draft(2)).unwrap();
        }
        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.count_quizzes().unwrap(), 1);
    }
}
