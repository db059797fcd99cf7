use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::bson_datetime_as_chrono;

/// One of the four labeled answer options. Selections outside this set
/// are rejected at deserialization, before anything touches the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
        }
    }
}

/// Quiz question stored in the "quiz_questions" collection.
/// Immutable once created; authored out-of-band via the import endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: AnswerOption,
    pub category: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: i32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

fn default_difficulty() -> i32 {
    1
}

/// Student-facing view of a question: the correct answer never leaves
/// the server while a session is open.
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub category: String,
}

impl From<QuizQuestion> for QuestionView {
    fn from(question: QuizQuestion) -> Self {
        QuestionView {
            id: question.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: question.title,
            description: question.description,
            option_a: question.option_a,
            option_b: question.option_b,
            option_c: question.option_c,
            option_d: question.option_d,
            category: question.category,
        }
    }
}

/// One question in a bulk import payload
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct NewQuestion {
    #[validate(length(min = 1, max = 300, message = "Title must not be empty"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: String,

    #[validate(length(min = 1, message = "Option A must not be empty"))]
    pub option_a: String,

    #[validate(length(min = 1, message = "Option B must not be empty"))]
    pub option_b: String,

    #[validate(length(min = 1, message = "Option C must not be empty"))]
    pub option_c: String,

    #[validate(length(min = 1, message = "Option D must not be empty"))]
    pub option_d: String,

    pub correct_answer: AnswerOption,

    #[validate(length(min = 1, max = 100, message = "Category must not be empty"))]
    pub category: String,

    #[validate(range(min = 1, max = 5, message = "Difficulty must be between 1 and 5"))]
    #[serde(default = "default_difficulty")]
    pub difficulty: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportQuestionsRequest {
    #[validate(length(min = 1, message = "At least one question is required"), nested)]
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Serialize)]
pub struct ImportQuestionsResponse {
    pub imported: usize,
}
