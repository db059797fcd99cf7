use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Database;

use crate::models::question::{ImportQuestionsRequest, QuestionView, QuizQuestion};

/// Question bank access. Questions are authored out-of-band and imported
/// in bulk; once created they are immutable (no update or delete path).
pub struct QuestionService {
    mongo: Database,
}

impl QuestionService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn questions(&self) -> mongodb::Collection<QuizQuestion> {
        self.mongo.collection("quiz_questions")
    }

    pub async fn import(&self, req: ImportQuestionsRequest) -> Result<usize> {
        let now = Utc::now();
        let documents: Vec<QuizQuestion> = req
            .questions
            .into_iter()
            .map(|q| QuizQuestion {
                id: None,
                title: q.title,
                description: q.description,
                option_a: q.option_a,
                option_b: q.option_b,
                option_c: q.option_c,
                option_d: q.option_d,
                correct_answer: q.correct_answer,
                category: q.category,
                difficulty: q.difficulty,
                created_at: now,
            })
            .collect();

        let inserted = self
            .questions()
            .insert_many(&documents)
            .await
            .context("Failed to insert questions")?;

        let count = inserted.inserted_ids.len();
        tracing::info!("Imported {} quiz questions", count);
        Ok(count)
    }

    /// Student-facing question list: fixed order, correct answers withheld
    pub async fn list_views(&self) -> Result<Vec<QuestionView>> {
        let cursor = self
            .questions()
            .find(doc! {})
            .sort(doc! { "created_at": 1 })
            .await
            .context("Failed to query questions")?;

        let questions: Vec<QuizQuestion> = cursor
            .try_collect()
            .await
            .context("Failed to collect questions")?;

        Ok(questions.into_iter().map(QuestionView::from).collect())
    }

    pub async fn count(&self) -> Result<u64> {
        self.questions()
            .count_documents(doc! {})
            .await
            .context("Failed to count questions")
    }
}
