//! Domain types produced by the providers.
//!
//! - CategoryResult: categorization output
//! - Quiz: generated quizzes and their shape rules

pub mod category;
pub mod quiz;

// Re-export commonly used types
pub use category::CategoryResult;
pub use quiz::{Difficulty, Quiz, QuizQuestion, QuizShapeError, QuizType, UnsupportedQuizType};
