//! Quiz generation from content summaries.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};
use uuid::Uuid;

use super::{parse_json_reply, truncate_chars, CompletionBackend};
use crate::core::RetryPolicy;
use crate::domain::{Difficulty, Quiz, QuizType};
use crate::error::{ProviderError, ValidationError};

/// Characters of combined summaries sent to the model
const MAX_PROMPT_CHARS: usize = 12000;

const SYSTEM_PROMPT: &str = "You are a tutor writing quizzes for self-study. \
Reply with a single JSON object and nothing else.";

/// Everything needed to ask for one quiz
#[derive(Debug, Clone)]
pub struct QuizRequest {
    pub summaries: Vec<String>,
    pub category: String,
    pub num_questions: u32,
    pub difficulty: Difficulty,
    pub quiz_type: QuizType,
}

impl QuizRequest {
    /// Checks that need no I/O
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.num_questions == 0 {
            return Err(ValidationError::NonPositiveQuestionCount);
        }
        if self.summaries.iter().all(|s| s.trim().is_empty()) {
            return Err(ValidationError::BlankSummaries);
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        let combined = self
            .summaries
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let format_rule = match self.quiz_type {
            QuizType::Mcq => "Each question has exactly 4 options in \"choice\"",
            QuizType::TrueFalse => "Each question has exactly 2 options in \"choice\": \"True\" and \"False\"",
            QuizType::FillInBlank => {
                "Each question contains a blank written as _____ and at least 2 candidate answers in \"choice\""
            }
        };

        format!(
            "Create a {n}-question {kind} quiz based on the following content from the {category} category.\n\n\
             Content:\n{content}\n\n\
             Requirements:\n\
             - {format_rule}\n\
             - Include an explanation of the correct answer for every question\n\
             - Difficulty: {difficulty}\n\
             - Focus on key concepts and facts\n\n\
             Return JSON of the form:\n\
             {{\"title\": string, \"questions\": [{{\"number\": int, \"topic\": string, \
             \"question\": string, \"choice\": [string], \"explanation\": string}}]}}",
            n = self.num_questions,
            kind = self.quiz_type.describe(),
            category = self.category,
            content = truncate_chars(&combined, MAX_PROMPT_CHARS),
            format_rule = format_rule,
            difficulty = self.difficulty,
        )
    }
}

/// Produces quizzes through a completion backend
pub struct QuizGenerator {
    backend: Arc<dyn CompletionBackend>,
    retry: RetryPolicy,
}

impl QuizGenerator {
    /// Three attempts, one second apart
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::fixed(3, Duration::from_secs(1)),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Generate and shape-check a quiz. A reply that breaks the shape rules
    /// for the requested type is an error, not a partial quiz.
    #[instrument(skip(self, request), fields(
        category = %request.category,
        quiz_type = %request.quiz_type,
        num_questions = request.num_questions
    ))]
    pub async fn generate(&self, request: &QuizRequest) -> Result<Quiz, ProviderError> {
        request
            .validate()
            .map_err(|e| ProviderError::Validation(e.to_string()))?;

        let prompt = request.prompt();
        let (backend, prompt) = (&self.backend, prompt.as_str());
        let raw = self
            .retry
            .run("generate_quiz", || async move {
                backend.complete_json(SYSTEM_PROMPT, prompt).await
            })
            .await?;

        let mut quiz: Quiz = parse_json_reply(&raw)?;
        quiz.validate(request.quiz_type)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        quiz.quiz_id = Uuid::new_v4().to_string();

        info!(
            quiz_id = %quiz.quiz_id,
            questions = quiz.questions.len(),
            "Generated quiz"
        );
        Ok(quiz)
    }
}
