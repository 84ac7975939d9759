//! Quiz types and their shape rules.
//!
//! Quizzes are produced by the quiz provider and returned to the caller;
//! they are never persisted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;

/// A generated quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    /// Assigned locally after generation
    #[serde(default)]
    pub quiz_id: String,
    pub title: String,
    pub questions: Vec<QuizQuestion>,
}

/// A single quiz question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub number: u32,
    #[serde(default)]
    pub topic: String,
    pub question: String,
    pub explanation: String,
    #[serde(default)]
    pub choice: Vec<String>,
}

/// Kind of quiz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    /// Multiple choice, exactly 4 choices
    Mcq,
    /// Fill in the blank, at least 2 choices
    FillInBlank,
    /// True/false, exactly 2 choices
    TrueFalse,
}

impl QuizType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizType::Mcq => "mcq",
            QuizType::FillInBlank => "fill_in_blank",
            QuizType::TrueFalse => "true_false",
        }
    }

    /// Human description used in prompts
    pub fn describe(&self) -> &'static str {
        match self {
            QuizType::Mcq => "multiple choice",
            QuizType::FillInBlank => "fill-in-the-blank",
            QuizType::TrueFalse => "true/false",
        }
    }

    /// Whether `count` choices is a legal shape for this type
    pub fn accepts_choice_count(&self, count: usize) -> bool {
        match self {
            QuizType::Mcq => count == 4,
            QuizType::TrueFalse => count == 2,
            QuizType::FillInBlank => count >= 2,
        }
    }
}

impl std::fmt::Display for QuizType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown quiz type string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported quiz type: {0}")]
pub struct UnsupportedQuizType(pub String);

impl std::str::FromStr for QuizType {
    type Err = UnsupportedQuizType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "mcq" | "multiple_choice" => Ok(QuizType::Mcq),
            "fill_in_blank" | "fill_in_the_blank" => Ok(QuizType::FillInBlank),
            "true_false" | "true_or_false" => Ok(QuizType::TrueFalse),
            _ => Err(UnsupportedQuizType(s.to_string())),
        }
    }
}

/// Target difficulty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[default]
    Mixed,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "mixed" => Ok(Difficulty::Mixed),
            _ => Err(ValidationError::InvalidDifficulty(s.to_string())),
        }
    }
}

/// A generated quiz that breaks the shape rules for its type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizShapeError {
    #[error("Quiz has no questions")]
    NoQuestions,

    #[error("Question {number} has {actual} choices; a {quiz_type} question needs {expected}")]
    ChoiceCount {
        number: u32,
        actual: usize,
        quiz_type: QuizType,
        expected: &'static str,
    },

    #[error("Explanation is missing for question {0}")]
    MissingExplanation(u32),

    #[error("Question {0} has empty text")]
    EmptyQuestion(u32),
}

impl Quiz {
    /// Check every question against the rules for `quiz_type`
    pub fn validate(&self, quiz_type: QuizType) -> Result<(), QuizShapeError> {
        if self.questions.is_empty() {
            return Err(QuizShapeError::NoQuestions);
        }

        for q in &self.questions {
            if q.question.trim().is_empty() {
                return Err(QuizShapeError::EmptyQuestion(q.number));
            }
            if !quiz_type.accepts_choice_count(q.choice.len()) {
                let expected = match quiz_type {
                    QuizType::Mcq => "exactly 4",
                    QuizType::TrueFalse => "exactly 2",
                    QuizType::FillInBlank => "at least 2",
                };
                return Err(QuizShapeError::ChoiceCount {
                    number: q.number,
                    actual: q.choice.len(),
                    quiz_type,
                    expected,
                });
            }
            if q.explanation.trim().is_empty() {
                return Err(QuizShapeError::MissingExplanation(q.number));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(number: u32, choices: usize, explanation: &str) -> QuizQuestion {
        QuizQuestion {
            number,
            topic: "Rust".to_string(),
            question: format!("Question {}?", number),
            explanation: explanation.to_string(),
            choice: (0..choices).map(|i| format!("option {}", i)).collect(),
        }
    }

    fn quiz(questions: Vec<QuizQuestion>) -> Quiz {
        Quiz {
            quiz_id: String::new(),
            title: "Test".to_string(),
            questions,
        }
    }

    #[test]
    fn test_quiz_type_parsing() {
        assert_eq!("mcq".parse::<QuizType>().unwrap(), QuizType::Mcq);
        assert_eq!("multiple choice".parse::<QuizType>().unwrap(), QuizType::Mcq);
        assert_eq!(
            "fill_in_the_blank".parse::<QuizType>().unwrap(),
            QuizType::FillInBlank
        );
        assert_eq!(
            "True-False".parse::<QuizType>().unwrap(),
            QuizType::TrueFalse
        );
        let err = "essay".parse::<QuizType>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported quiz type: essay");
    }

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(Difficulty::default(), Difficulty::Mixed);
        assert!(matches!(
            "impossible".parse::<Difficulty>(),
            Err(ValidationError::InvalidDifficulty(_))
        ));
    }

    #[test]
    fn test_mcq_requires_four_choices() {
        assert!(quiz(vec![question(1, 4, "because")])
            .validate(QuizType::Mcq)
            .is_ok());
        assert!(matches!(
            quiz(vec![question(1, 3, "because")]).validate(QuizType::Mcq),
            Err(QuizShapeError::ChoiceCount { actual: 3, .. })
        ));
    }

    #[test]
    fn test_true_false_requires_two_choices() {
        assert!(quiz(vec![question(1, 2, "because")])
            .validate(QuizType::TrueFalse)
            .is_ok());
        assert!(quiz(vec![question(1, 4, "because")])
            .validate(QuizType::TrueFalse)
            .is_err());
    }

    #[test]
    fn test_fill_in_blank_requires_at_least_two() {
        assert!(quiz(vec![question(1, 2, "x"), question(2, 5, "y")])
            .validate(QuizType::FillInBlank)
            .is_ok());
        assert!(quiz(vec![question(1, 1, "x")])
            .validate(QuizType::FillInBlank)
            .is_err());
    }

    #[test]
    fn test_explanation_required() {
        assert_eq!(
            quiz(vec![question(7, 4, "   ")]).validate(QuizType::Mcq),
            Err(QuizShapeError::MissingExplanation(7))
        );
    }

    #[test]
    fn test_empty_quiz_rejected() {
        assert_eq!(
            quiz(Vec::new()).validate(QuizType::Mcq),
            Err(QuizShapeError::NoQuestions)
        );
    }
}
