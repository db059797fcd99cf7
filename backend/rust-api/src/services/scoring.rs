use std::collections::HashMap;

use mongodb::bson::oid::ObjectId;

use crate::models::answer::StudentAnswer;
use crate::models::question::QuizQuestion;
use crate::models::session::ScoreSummary;

/// Percentage score rounded half-up. An empty question set is a defined
/// score of zero, not a fault.
pub fn percentage(correct: u32, total: u32) -> i32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 * 100.0) / total as f64).round() as i32
}

/// Tally a completed answer set against the fixed question set.
///
/// A question with no recorded answer, or with a cleared selection,
/// counts as incorrect. Ledger rows referencing questions outside the
/// set contribute nothing.
pub fn score_answers(questions: &[QuizQuestion], answers: &[StudentAnswer]) -> ScoreSummary {
    let selections: HashMap<ObjectId, _> = answers
        .iter()
        .filter_map(|answer| {
            answer
                .selected_answer
                .map(|option| (answer.question_id, option))
        })
        .collect();

    let total_questions = questions.len() as u32;
    let correct_answers = questions
        .iter()
        .filter(|question| match question.id {
            Some(id) => selections.get(&id) == Some(&question.correct_answer),
            None => false,
        })
        .count() as u32;

    ScoreSummary {
        total_questions,
        correct_answers,
        score: percentage(correct_answers, total_questions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::AnswerOption;
    use chrono::Utc;

    fn question(correct: AnswerOption) -> QuizQuestion {
        QuizQuestion {
            id: Some(ObjectId::new()),
            title: "Q".to_string(),
            description: "desc".to_string(),
            option_a: "a".to_string(),
            option_b: "b".to_string(),
            option_c: "c".to_string(),
            option_d: "d".to_string(),
            correct_answer: correct,
            category: "general".to_string(),
            difficulty: 1,
            created_at: Utc::now(),
        }
    }

    fn answer(session_id: ObjectId, question_id: ObjectId, option: AnswerOption) -> StudentAnswer {
        StudentAnswer {
            id: None,
            session_id,
            question_id,
            selected_answer: Some(option),
            marked_for_review: false,
            answered_at: Utc::now(),
        }
    }

    #[test]
    fn empty_question_set_scores_zero() {
        assert_eq!(percentage(0, 0), 0);

        let summary = score_answers(&[], &[]);
        assert_eq!(summary.total_questions, 0);
        assert_eq!(summary.correct_answers, 0);
        assert_eq!(summary.score, 0);
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(percentage(1, 3), 33); // 33.33...
        assert_eq!(percentage(2, 3), 67); // 66.66...
        assert_eq!(percentage(1, 8), 13); // 12.5 rounds up
        assert_eq!(percentage(1, 40), 3); // 2.5 rounds up
        assert_eq!(percentage(10, 10), 100);
    }

    #[test]
    fn half_answered_set_scores_fifty() {
        let session_id = ObjectId::new();
        let questions: Vec<QuizQuestion> =
            (0..10).map(|_| question(AnswerOption::B)).collect();

        // Questions 1-5 answered correctly, 6-10 left blank
        let answers: Vec<StudentAnswer> = questions[..5]
            .iter()
            .map(|q| answer(session_id, q.id.unwrap(), AnswerOption::B))
            .collect();

        let summary = score_answers(&questions, &answers);
        assert_eq!(summary.total_questions, 10);
        assert_eq!(summary.correct_answers, 5);
        assert_eq!(summary.score, 50);
    }

    #[test]
    fn wrong_selections_count_incorrect() {
        let session_id = ObjectId::new();
        let questions = vec![question(AnswerOption::A), question(AnswerOption::D)];

        let answers = vec![
            answer(session_id, questions[0].id.unwrap(), AnswerOption::A),
            answer(session_id, questions[1].id.unwrap(), AnswerOption::B),
        ];

        let summary = score_answers(&questions, &answers);
        assert_eq!(summary.correct_answers, 1);
        assert_eq!(summary.score, 50);
    }

    #[test]
    fn answers_outside_question_set_are_ignored() {
        let session_id = ObjectId::new();
        let questions = vec![question(AnswerOption::C)];

        let answers = vec![
            answer(session_id, questions[0].id.unwrap(), AnswerOption::C),
            answer(session_id, ObjectId::new(), AnswerOption::C),
        ];

        let summary = score_answers(&questions, &answers);
        assert_eq!(summary.total_questions, 1);
        assert_eq!(summary.correct_answers, 1);
        assert_eq!(summary.score, 100);
    }

    #[test]
    fn cleared_selection_counts_incorrect() {
        let session_id = ObjectId::new();
        let questions = vec![question(AnswerOption::A)];

        let flagged_only = StudentAnswer {
            id: None,
            session_id,
            question_id: questions[0].id.unwrap(),
            selected_answer: None,
            marked_for_review: true,
            answered_at: Utc::now(),
        };

        let summary = score_answers(&questions, &[flagged_only]);
        assert_eq!(summary.correct_answers, 0);
        assert_eq!(summary.score, 0);
    }
}
