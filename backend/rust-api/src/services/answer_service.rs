use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::ReplaceOptions;
use mongodb::Database;

use crate::metrics::ANSWERS_RECORDED_TOTAL;
use crate::middlewares::auth::Principal;
use crate::models::answer::{RecordSelectionRequest, StudentAnswer, ToggleReviewRequest};
use crate::models::question::QuizQuestion;
use crate::models::session::{QuizSession, SessionStatus};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// The per-session answer ledger: one row per (session, question) pair,
/// maintained by upsert so rapid repeated selections collapse into a
/// single last-write-wins entry.
pub struct AnswerService {
    mongo: Database,
}

impl AnswerService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn answers(&self) -> mongodb::Collection<StudentAnswer> {
        self.mongo.collection("student_answers")
    }

    /// Record (or change) the selected option for one question.
    /// Preserves an existing review flag and stamps `answered_at`.
    pub async fn record_selection(
        &self,
        principal: &Principal,
        session_id: &ObjectId,
        req: &RecordSelectionRequest,
    ) -> Result<StudentAnswer> {
        let question_id = parse_question_id(&req.question_id)?;

        self.writable_session(principal, session_id).await?;
        self.known_question(&question_id).await?;

        let existing = self.find_entry(session_id, &question_id).await?;
        let merged = StudentAnswer::with_selection(
            existing,
            *session_id,
            question_id,
            req.selected_answer,
            Utc::now(),
        );

        self.upsert_entry(session_id, &question_id, &merged).await?;

        ANSWERS_RECORDED_TOTAL
            .with_label_values(&["selection"])
            .inc();

        tracing::info!(
            "Answer recorded: session={} question={} option={}",
            session_id.to_hex(),
            question_id.to_hex(),
            req.selected_answer.as_str()
        );

        Ok(merged)
    }

    /// Flip the review flag for one question, keeping any selection.
    pub async fn toggle_review(
        &self,
        principal: &Principal,
        session_id: &ObjectId,
        req: &ToggleReviewRequest,
    ) -> Result<StudentAnswer> {
        let question_id = parse_question_id(&req.question_id)?;

        self.writable_session(principal, session_id).await?;
        self.known_question(&question_id).await?;

        let existing = self.find_entry(session_id, &question_id).await?;
        let merged =
            StudentAnswer::with_review_toggled(existing, *session_id, question_id, Utc::now());

        self.upsert_entry(session_id, &question_id, &merged).await?;

        ANSWERS_RECORDED_TOTAL.with_label_values(&["review"]).inc();

        Ok(merged)
    }

    /// All recorded answers for a session; order is irrelevant
    pub async fn load_for_session(&self, session_id: &ObjectId) -> Result<Vec<StudentAnswer>> {
        let cursor = self
            .answers()
            .find(doc! { "session_id": session_id })
            .await
            .context("Failed to query answers")?;

        cursor
            .try_collect()
            .await
            .context("Failed to collect answers")
    }

    async fn find_entry(
        &self,
        session_id: &ObjectId,
        question_id: &ObjectId,
    ) -> Result<Option<StudentAnswer>> {
        self.answers()
            .find_one(doc! { "session_id": session_id, "question_id": question_id })
            .await
            .context("Failed to query ledger entry")
    }

    async fn upsert_entry(
        &self,
        session_id: &ObjectId,
        question_id: &ObjectId,
        entry: &StudentAnswer,
    ) -> Result<()> {
        let collection = self.answers();
        let filter = doc! { "session_id": session_id, "question_id": question_id };

        retry_async_with_config(RetryConfig::aggressive(), || async {
            collection
                .replace_one(filter.clone(), entry)
                .with_options(ReplaceOptions::builder().upsert(true).build())
                .await
                .map(|_| ())
        })
        .await
        .context("Failed to upsert ledger entry")?;

        Ok(())
    }

    /// Only the owning student of an active, in-window session may write
    async fn writable_session(
        &self,
        principal: &Principal,
        session_id: &ObjectId,
    ) -> Result<QuizSession> {
        let session = self
            .mongo
            .collection::<QuizSession>("quiz_sessions")
            .find_one(doc! { "_id": session_id })
            .await
            .context("Failed to query session")?
            .ok_or_else(|| anyhow!("Session not found"))?;

        if session.student_id != principal.id {
            bail!("Session not found");
        }

        if session.status != SessionStatus::Active {
            bail!("Session is not active");
        }

        if session.is_overdue(Utc::now()) {
            bail!("Session time has run out");
        }

        Ok(session)
    }

    /// The referenced question must belong to the fixed question set
    async fn known_question(&self, question_id: &ObjectId) -> Result<()> {
        let count = self
            .mongo
            .collection::<QuizQuestion>("quiz_questions")
            .count_documents(doc! { "_id": question_id })
            .await
            .context("Failed to verify question")?;

        if count == 0 {
            bail!("Question not found");
        }

        Ok(())
    }
}

fn parse_question_id(value: &str) -> Result<ObjectId> {
    ObjectId::parse_str(value).map_err(|_| anyhow!("Invalid question id"))
}
