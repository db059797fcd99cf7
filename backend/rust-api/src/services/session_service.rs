use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use redis::aio::ConnectionManager;

use crate::metrics::{
    record_cache_hit, record_cache_miss, track_cache_operation, QUIZ_SESSIONS_TOTAL,
    SESSIONS_ACTIVE,
};
use crate::middlewares::auth::Principal;
use crate::models::answer::{AnswerView, StudentAnswer};
use crate::models::question::{QuestionView, QuizQuestion};
use crate::models::session::{QuizSession, SessionOutcome, SessionSnapshot, SessionView};
use crate::models::user::{User, UserRole};
use crate::utils::time::chrono_to_bson;

use super::scoring;

const NON_TERMINAL_STATUSES: [&str; 3] = ["not_started", "active", "paused"];

pub struct SessionService {
    mongo: Database,
    redis: ConnectionManager,
}

impl SessionService {
    pub fn new(mongo: Database, redis: ConnectionManager) -> Self {
        Self { mongo, redis }
    }

    fn sessions(&self) -> mongodb::Collection<QuizSession> {
        self.mongo.collection("quiz_sessions")
    }

    fn answers(&self) -> mongodb::Collection<StudentAnswer> {
        self.mongo.collection("student_answers")
    }

    fn questions(&self) -> mongodb::Collection<QuizQuestion> {
        self.mongo.collection("quiz_questions")
    }

    /// Grant a student one attempt (university admin). Rejected while the
    /// student still has a non-terminal session.
    pub async fn grant(
        &self,
        principal: &Principal,
        student_id: &ObjectId,
        duration_minutes: i64,
    ) -> Result<QuizSession> {
        let university_id = principal
            .university_id
            .ok_or_else(|| anyhow!("Granting admin has no university"))?;

        let student = self
            .mongo
            .collection::<User>("users")
            .find_one(doc! { "_id": student_id })
            .await
            .context("Failed to query student")?
            .ok_or_else(|| anyhow!("Student not found"))?;

        if student.role != UserRole::Student || student.university_id != Some(university_id) {
            bail!("Student not found");
        }

        let open_attempts = self
            .sessions()
            .count_documents(doc! {
                "student_id": student_id,
                "status": { "$in": NON_TERMINAL_STATUSES.to_vec() },
            })
            .await
            .context("Failed to count open sessions")?;

        if open_attempts > 0 {
            bail!("Student already has an open attempt");
        }

        let mut session = QuizSession::granted(*student_id, university_id, duration_minutes, Utc::now());
        let insert_result = self
            .sessions()
            .insert_one(&session)
            .await
            .context("Failed to insert session")?;
        session.id = insert_result.inserted_id.as_object_id();

        QUIZ_SESSIONS_TOTAL.with_label_values(&["granted"]).inc();
        tracing::info!(
            "Attempt granted: student={} session={:?}",
            student_id.to_hex(),
            session.id.map(|id| id.to_hex())
        );

        Ok(session)
    }

    /// Start (or resume) the student's attempt.
    ///
    /// An active session resumes with its recorded answers; a granted one
    /// begins its countdown. With neither present, the attempt is granted
    /// on the spot with the configured default window.
    pub async fn start(
        &self,
        principal: &Principal,
        default_minutes: i64,
    ) -> Result<SessionSnapshot> {
        let questions = self.load_question_set().await?;
        if questions.is_empty() {
            bail!("No quiz questions available");
        }

        if let Some(active) = self.find_for_student(principal.id, "active").await? {
            tracing::info!(
                "Resuming active session {} for student {}",
                active.id.map(|id| id.to_hex()).unwrap_or_default(),
                principal.id.to_hex()
            );
            return self.snapshot(active, questions).await;
        }

        let now = Utc::now();
        let mut session = match self.find_for_student(principal.id, "not_started").await? {
            Some(granted) => granted,
            None => {
                let university_id = principal
                    .university_id
                    .ok_or_else(|| anyhow!("Student has no university"))?;
                let mut session =
                    QuizSession::granted(principal.id, university_id, default_minutes, now);
                let insert_result = self
                    .sessions()
                    .insert_one(&session)
                    .await
                    .context("Failed to insert session")?;
                session.id = insert_result.inserted_id.as_object_id();
                QUIZ_SESSIONS_TOTAL.with_label_values(&["granted"]).inc();
                session
            }
        };

        if session.duration_minutes != default_minutes {
            tracing::warn!(
                "Session {} carries duration {}min while the configured default is {}min; the stored value wins",
                session.id.map(|id| id.to_hex()).unwrap_or_default(),
                session.duration_minutes,
                default_minutes
            );
        }

        session
            .begin(now)
            .map_err(|e| anyhow!(e))
            .context("Cannot start session")?;

        let session_id = session.id.ok_or_else(|| anyhow!("Session has no id"))?;
        let update_result = self
            .sessions()
            .update_one(
                doc! { "_id": session_id, "status": "not_started" },
                doc! { "$set": {
                    "status": "active",
                    "started_at": chrono_to_bson(now),
                }},
            )
            .await
            .context("Failed to persist session start")?;

        if update_result.modified_count == 0 {
            bail!("Session was started concurrently");
        }

        QUIZ_SESSIONS_TOTAL.with_label_values(&["started"]).inc();
        SESSIONS_ACTIVE.inc();
        self.cache_session(&session).await;

        tracing::info!(
            "Session started: {} student={} window={}min",
            session_id.to_hex(),
            principal.id.to_hex(),
            session.duration_minutes
        );

        self.snapshot(session, questions).await
    }

    /// The student's open attempt with its ledger, if any
    pub async fn current(&self, principal: &Principal) -> Result<Option<SessionSnapshot>> {
        let session = match self.find_open_for_student(principal.id).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        let questions = self.load_question_set().await?;
        self.snapshot(session, questions).await.map(Some)
    }

    /// Submit the attempt and score it. Allowed from `active` only; a
    /// submit landing past the deadline still scores but the session
    /// expires rather than completes.
    pub async fn submit(&self, principal: &Principal, session_id: &ObjectId) -> Result<QuizSession> {
        let mut session = self.load_session(session_id).await?;

        if session.student_id != principal.id {
            bail!("Session not found");
        }

        let now = Utc::now();
        let outcome = if session.is_overdue(now) {
            SessionOutcome::TimedOut
        } else {
            SessionOutcome::Submitted
        };

        self.finish_session(&mut session, outcome, now).await?;

        let event = match outcome {
            SessionOutcome::Submitted => "completed",
            SessionOutcome::TimedOut => "expired",
            SessionOutcome::ForceStopped => "force_stopped",
        };
        QUIZ_SESSIONS_TOTAL.with_label_values(&[event]).inc();
        SESSIONS_ACTIVE.dec();

        tracing::info!(
            "Session submitted: {} outcome={:?} score={:?}",
            session_id.to_hex(),
            outcome,
            session.score
        );

        Ok(session)
    }

    /// Administrative stop of any active session. Scores whatever the
    /// ledger holds at stop time, so terminal sessions always carry a
    /// defined score.
    pub async fn force_stop(
        &self,
        principal: &Principal,
        session_id: &ObjectId,
    ) -> Result<QuizSession> {
        let mut session = self.load_session(session_id).await?;

        match principal.role {
            UserRole::SuperAdmin => {}
            UserRole::UniversityAdmin => {
                if principal.university_id != Some(session.university_id) {
                    bail!("Session not found");
                }
            }
            UserRole::Student => bail!("Forbidden"),
        }

        self.finish_session(&mut session, SessionOutcome::ForceStopped, Utc::now())
            .await?;

        QUIZ_SESSIONS_TOTAL.with_label_values(&["force_stopped"]).inc();
        SESSIONS_ACTIVE.dec();

        tracing::info!(
            "Session force-stopped: {} by {} score={:?}",
            session_id.to_hex(),
            principal.id.to_hex(),
            session.score
        );

        Ok(session)
    }

    /// Server-side timeout enforcement: expire every active session whose
    /// deadline has passed, scoring recorded answers. Returns how many
    /// sessions were expired.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut cursor = self
            .sessions()
            .find(doc! { "status": "active" })
            .await
            .context("Failed to query active sessions")?;

        let mut expired = 0u64;
        while let Some(mut session) = cursor
            .try_next()
            .await
            .context("Failed to advance session cursor")?
        {
            if !session.is_overdue(now) {
                continue;
            }

            match self
                .finish_session(&mut session, SessionOutcome::TimedOut, now)
                .await
            {
                Ok(()) => {
                    expired += 1;
                    QUIZ_SESSIONS_TOTAL.with_label_values(&["expired"]).inc();
                    SESSIONS_ACTIVE.dec();
                    tracing::info!(
                        "Expired overdue session {} (deadline {:?})",
                        session.id.map(|id| id.to_hex()).unwrap_or_default(),
                        session.deadline()
                    );
                }
                Err(e) => {
                    // Lost a race with a submit or another sweeper; not fatal
                    tracing::warn!(
                        "Failed to expire session {}: {}",
                        session.id.map(|id| id.to_hex()).unwrap_or_default(),
                        e
                    );
                }
            }
        }

        Ok(expired)
    }

    /// Terminal sessions of one student, newest first
    pub async fn results_for_student(&self, principal: &Principal) -> Result<Vec<SessionView>> {
        let cursor = self
            .sessions()
            .find(doc! {
                "student_id": principal.id,
                "status": { "$in": ["completed", "expired"] },
            })
            .sort(doc! { "completed_at": -1 })
            .await
            .context("Failed to query results")?;

        let sessions: Vec<QuizSession> = cursor
            .try_collect()
            .await
            .context("Failed to collect results")?;

        Ok(sessions.into_iter().map(SessionView::from).collect())
    }

    /// Sessions scoped to one university (university admin view)
    pub async fn list_for_university(&self, university_id: &ObjectId) -> Result<Vec<SessionView>> {
        self.list(doc! { "university_id": university_id }).await
    }

    /// All sessions (super admin view)
    pub async fn list_all(&self) -> Result<Vec<SessionView>> {
        self.list(doc! {}).await
    }

    async fn list(&self, filter: mongodb::bson::Document) -> Result<Vec<SessionView>> {
        let cursor = self
            .sessions()
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .limit(500)
            .await
            .context("Failed to query sessions")?;

        let sessions: Vec<QuizSession> = cursor
            .try_collect()
            .await
            .context("Failed to collect sessions")?;

        Ok(sessions.into_iter().map(SessionView::from).collect())
    }

    /// Session lookup for the countdown stream: Redis first, Mongo on miss
    pub async fn get_session(&self, session_id: &ObjectId) -> Result<QuizSession> {
        if let Some(cached) = self.cached_session(session_id).await {
            record_cache_hit();
            return Ok(cached);
        }
        record_cache_miss();

        let session = self.load_session(session_id).await?;
        self.cache_session(&session).await;
        Ok(session)
    }

    pub async fn load_session(&self, session_id: &ObjectId) -> Result<QuizSession> {
        self.sessions()
            .find_one(doc! { "_id": session_id })
            .await
            .context("Failed to query session")?
            .ok_or_else(|| anyhow!("Session not found"))
    }

    pub async fn load_question_set(&self) -> Result<Vec<QuizQuestion>> {
        let cursor = self
            .questions()
            .find(doc! {})
            .sort(doc! { "created_at": 1 })
            .await
            .context("Failed to query questions")?;

        cursor
            .try_collect()
            .await
            .context("Failed to collect questions")
    }

    async fn load_answers(&self, session_id: &ObjectId) -> Result<Vec<StudentAnswer>> {
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

    /// Score, transition and persist with a status guard so a terminal
    /// session can never be finished twice.
    async fn finish_session(
        &self,
        session: &mut QuizSession,
        outcome: SessionOutcome,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session.id.ok_or_else(|| anyhow!("Session has no id"))?;

        let questions = self.load_question_set().await?;
        let answers = self.load_answers(&session_id).await?;
        let summary = scoring::score_answers(&questions, &answers);

        session.finish(outcome, summary, now).map_err(|e| anyhow!(e))?;

        let update_result = self
            .sessions()
            .update_one(
                doc! {
                    "_id": session_id,
                    "status": { "$in": ["active", "paused"] },
                },
                doc! { "$set": {
                    "status": session.status.as_str(),
                    "completed_at": chrono_to_bson(now),
                    "time_taken_minutes": session.time_taken_minutes,
                    "total_questions": summary.total_questions as i64,
                    "correct_answers": summary.correct_answers as i64,
                    "score": summary.score,
                }},
            )
            .await
            .context("Failed to persist session completion")?;

        if update_result.modified_count == 0 {
            bail!("Session already reached a terminal state");
        }

        self.invalidate_cache(&session_id).await;
        Ok(())
    }

    async fn find_for_student(
        &self,
        student_id: ObjectId,
        status: &str,
    ) -> Result<Option<QuizSession>> {
        self.sessions()
            .find_one(doc! { "student_id": student_id, "status": status })
            .await
            .context("Failed to query session")
    }

    async fn find_open_for_student(&self, student_id: ObjectId) -> Result<Option<QuizSession>> {
        self.sessions()
            .find_one(doc! {
                "student_id": student_id,
                "status": { "$in": NON_TERMINAL_STATUSES.to_vec() },
            })
            .await
            .context("Failed to query open session")
    }

    async fn snapshot(
        &self,
        session: QuizSession,
        questions: Vec<QuizQuestion>,
    ) -> Result<SessionSnapshot> {
        let session_id = session.id.ok_or_else(|| anyhow!("Session has no id"))?;
        let answers = self.load_answers(&session_id).await?;
        let now = Utc::now();

        Ok(SessionSnapshot {
            remaining_seconds: session.remaining_seconds(now),
            deadline: session.deadline(),
            answers: answers.into_iter().map(AnswerView::from).collect(),
            questions: questions.into_iter().map(QuestionView::from).collect(),
            session: SessionView::from(session),
        })
    }

    // --- Redis session cache -------------------------------------------------

    fn cache_key(session_id: &ObjectId) -> String {
        format!("session:{}", session_id.to_hex())
    }

    async fn cache_session(&self, session: &QuizSession) {
        let Some(session_id) = session.id else {
            return;
        };
        let Ok(payload) = serde_json::to_string(session) else {
            return;
        };

        let mut conn = self.redis.clone();
        let key = Self::cache_key(&session_id);
        let result = track_cache_operation("setex", async {
            redis::cmd("SETEX")
                .arg(&key)
                .arg(3600)
                .arg(payload)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to cache session")
        })
        .await;

        if let Err(e) = result {
            tracing::debug!("Session cache write failed: {}", e);
        }
    }

    async fn cached_session(&self, session_id: &ObjectId) -> Option<QuizSession> {
        let mut conn = self.redis.clone();
        let key = Self::cache_key(session_id);

        let cached: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .ok()?;

        cached.and_then(|json| serde_json::from_str(&json).ok())
    }

    async fn invalidate_cache(&self, session_id: &ObjectId) {
        let mut conn = self.redis.clone();
        let key = Self::cache_key(session_id);
        let result = track_cache_operation("del", async {
            redis::cmd("DEL")
                .arg(&key)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to drop cached session")
        })
        .await;

        if let Err(e) = result {
            tracing::debug!("Session cache invalidation failed: {}", e);
        }
    }
}
