use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use super::LLM;

/// Number of answer options every generated question carries
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Number of questions requested in multi-question mode
pub const MULTI_QUESTION_COUNT: usize = 10;

/// Prompt/JSON-schema variant used for quiz generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// `title`, `description`, `question`, `answers`, `correct_answer`
    SingleQuestion,
    /// `title`, `description`, `questions[10]`
    #[default]
    MultiQuestion,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::SingleQuestion => "single_question",
            GenerationMode::MultiQuestion => "multi_question",
        }
    }

    /// Number of questions a valid response contains
    pub fn expected_questions(&self) -> usize {
        match self {
            GenerationMode::SingleQuestion => 1,
            GenerationMode::MultiQuestion => MULTI_QUESTION_COUNT,
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single_question" | "single" => Ok(GenerationMode::SingleQuestion),
            "multi_question" | "multi" => Ok(GenerationMode::MultiQuestion),
            other => Err(anyhow!("unknown generation mode '{}'", other)),
        }
    }
}

const SINGLE_QUESTION_PROMPT: &str = "You will receive a transcript of a YouTube video. Using the content of this transcript, generate a quiz in the following structure:

1. Create a title for the quiz.
2. Create a description for the quiz.
3. Generate one question directly based on the transcript.
4. Generate four answer options, where exactly one is correct and the other three are incorrect but plausible.
5. Save the correct answer separately in the field 'correct_answer'.

Your answer must strictly follow this JSON structure:
{
  \"title\": \"generated title\",
  \"description\": \"generated description\",
  \"question\": \"generated question\",
  \"answers\": [\"answer a\", \"answer b\", \"answer c\", \"answer d\"],
  \"correct_answer\": \"The correct answer from 'answers'\"
}

Only use information from the transcript and do not add anything unrelated. Make the question clear and specific.

Transcript:
";

const MULTI_QUESTION_PROMPT: &str = "Based on the following transcript, generate a quiz in valid JSON format.

The quiz must follow this exact structure:

{
  \"title\": \"Create a concise quiz title based on the topic of the transcript.\",
  \"description\": \"Summarize the transcript in no more than 150 characters. Do not include any quiz questions or answers.\",
  \"questions\": [
    {
      \"question_title\": \"The question goes here.\",
      \"question_options\": [\"Option A\", \"Option B\", \"Option C\", \"Option D\"],
      \"answer\": \"The correct answer from the above options\"
    },
    ... (exactly 10 questions)
  ]
}

Requirements:
- Each question must have exactly 4 distinct answer options.
- Only one correct answer is allowed per question, and it must be present in 'question_options'.
- The output must be valid JSON and parsable as-is.
- Do not include explanations, comments, or any text outside the JSON.
Transcript:
";

/// Build the fixed prompt for a transcript
pub fn build_prompt(mode: GenerationMode, transcript: &str) -> String {
    let template = match mode {
        GenerationMode::SingleQuestion => SINGLE_QUESTION_PROMPT,
        GenerationMode::MultiQuestion => MULTI_QUESTION_PROMPT,
    };
    format!("{}{}", template, transcript)
}

/// Sends transcripts to the generative-language provider
#[derive(Clone)]
pub struct QuizGenerator {
    llm: Arc<dyn LLM>,
    mode: GenerationMode,
}

impl QuizGenerator {
    pub fn new(llm: Arc<dyn LLM>, mode: GenerationMode) -> Self {
        Self { llm, mode }
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// Request a quiz for the transcript and return the raw model text.
    /// The answer is not retried or validated here.
    pub async fn generate(&self, transcript: &str) -> Result<String> {
        let prompt = build_prompt(self.mode, transcript);

        info!("🤖 Requesting {} quiz from {} ({} transcript chars)",
              self.mode, self.llm.name(), transcript.len());

        let response = self.llm.generate(&prompt).await?;

        debug!("Quiz generation completed (tokens: {:?}, {} chars)",
               response.tokens_used, response.content.len());

        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingLLM {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LLM for RecordingLLM {
        async fn generate(&self, prompt: &str) -> Result<LLMResponse> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(LLMResponse {
                content: "{}".to_string(),
                tokens_used: Some(7),
            })
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("single_question".parse::<GenerationMode>().unwrap(), GenerationMode::SingleQuestion);
        assert_eq!("MULTI".parse::<GenerationMode>().unwrap(), GenerationMode::MultiQuestion);
        assert!("five".parse::<GenerationMode>().is_err());
        assert_eq!(GenerationMode::default(), GenerationMode::MultiQuestion);
        assert_eq!(GenerationMode::SingleQuestion.expected_questions(), 1);
        assert_eq!(GenerationMode::MultiQuestion.expected_questions(), MULTI_QUESTION_COUNT);
    }

    #[test]
    fn test_prompt_ends_with_transcript() {
        let prompt = build_prompt(GenerationMode::SingleQuestion, "the transcript");
        assert!(prompt.contains("\"correct_answer\""));
        assert!(prompt.ends_with("Transcript:\nthe transcript"));

        let prompt = build_prompt(GenerationMode::MultiQuestion, "other text");
        assert!(prompt.contains("exactly 10 questions"));
        assert!(prompt.contains("\"question_options\""));
        assert!(prompt.ends_with("other text"));
    }

    #[tokio::test]
    async fn test_generator_sends_one_prompt() {
        let llm = Arc::new(RecordingLLM {
            prompts: Mutex::new(Vec::new()),
        });
        let generator = QuizGenerator::new(llm.clone(), GenerationMode::MultiQuestion);

        let raw = generator.generate("hello world").await.unwrap();
        assert_eq!(raw, "{}");

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].ends_with("hello world"));
    }
}
