use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::question::AnswerOption;
use super::user::bson_datetime_as_chrono;

/// Ledger row in "student_answers": at most one per (session, question),
/// guaranteed by upsert-by-key. Last write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentAnswer {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub session_id: ObjectId,
    pub question_id: ObjectId,
    #[serde(default)]
    pub selected_answer: Option<AnswerOption>,
    #[serde(default)]
    pub marked_for_review: bool,
    #[serde(with = "bson_datetime_as_chrono")]
    pub answered_at: DateTime<Utc>,
}

impl StudentAnswer {
    /// Merge a selection into the ledger row, preserving the review flag.
    pub fn with_selection(
        existing: Option<StudentAnswer>,
        session_id: ObjectId,
        question_id: ObjectId,
        option: AnswerOption,
        now: DateTime<Utc>,
    ) -> StudentAnswer {
        let marked_for_review = existing
            .as_ref()
            .map(|answer| answer.marked_for_review)
            .unwrap_or(false);

        StudentAnswer {
            id: existing.and_then(|answer| answer.id),
            session_id,
            question_id,
            selected_answer: Some(option),
            marked_for_review,
            answered_at: now,
        }
    }

    /// Flip the review flag, preserving any recorded selection.
    pub fn with_review_toggled(
        existing: Option<StudentAnswer>,
        session_id: ObjectId,
        question_id: ObjectId,
        now: DateTime<Utc>,
    ) -> StudentAnswer {
        let (id, selected_answer, marked_for_review) = match existing {
            Some(answer) => (answer.id, answer.selected_answer, answer.marked_for_review),
            None => (None, None, false),
        };

        StudentAnswer {
            id,
            session_id,
            question_id,
            selected_answer,
            marked_for_review: !marked_for_review,
            answered_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordSelectionRequest {
    pub question_id: String,
    pub selected_answer: AnswerOption,
}

#[derive(Debug, Deserialize)]
pub struct ToggleReviewRequest {
    pub question_id: String,
}

/// Ledger row as rendered to the client for rehydration
#[derive(Debug, Serialize)]
pub struct AnswerView {
    pub question_id: String,
    pub selected_answer: Option<AnswerOption>,
    pub marked_for_review: bool,
    pub answered_at: DateTime<Utc>,
}

impl From<StudentAnswer> for AnswerView {
    fn from(answer: StudentAnswer) -> Self {
        AnswerView {
            question_id: answer.question_id.to_hex(),
            selected_answer: answer.selected_answer,
            marked_for_review: answer.marked_for_review,
            answered_at: answer.answered_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_selection_converges_to_last_write() {
        let session_id = ObjectId::new();
        let question_id = ObjectId::new();
        let now = Utc::now();

        let first = StudentAnswer::with_selection(None, session_id, question_id, AnswerOption::A, now);
        let second = StudentAnswer::with_selection(
            Some(first),
            session_id,
            question_id,
            AnswerOption::A,
            now,
        );

        assert_eq!(second.selected_answer, Some(AnswerOption::A));
        assert!(!second.marked_for_review);

        let third = StudentAnswer::with_selection(
            Some(second),
            session_id,
            question_id,
            AnswerOption::C,
            now,
        );
        assert_eq!(third.selected_answer, Some(AnswerOption::C));
    }

    #[test]
    fn selection_preserves_review_flag() {
        let session_id = ObjectId::new();
        let question_id = ObjectId::new();
        let now = Utc::now();

        let flagged = StudentAnswer::with_review_toggled(None, session_id, question_id, now);
        assert!(flagged.marked_for_review);
        assert_eq!(flagged.selected_answer, None);

        let answered = StudentAnswer::with_selection(
            Some(flagged),
            session_id,
            question_id,
            AnswerOption::B,
            now,
        );
        assert!(answered.marked_for_review);
        assert_eq!(answered.selected_answer, Some(AnswerOption::B));
    }

    #[test]
    fn double_toggle_restores_flag_and_keeps_selection() {
        let session_id = ObjectId::new();
        let question_id = ObjectId::new();
        let now = Utc::now();

        let answered =
            StudentAnswer::with_selection(None, session_id, question_id, AnswerOption::D, now);
        let toggled =
            StudentAnswer::with_review_toggled(Some(answered), session_id, question_id, now);
        assert!(toggled.marked_for_review);
        assert_eq!(toggled.selected_answer, Some(AnswerOption::D));

        let toggled_back =
            StudentAnswer::with_review_toggled(Some(toggled), session_id, question_id, now);
        assert!(!toggled_back.marked_for_review);
        assert_eq!(toggled_back.selected_answer, Some(AnswerOption::D));
    }
}
