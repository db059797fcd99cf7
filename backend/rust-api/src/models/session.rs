use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::user::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Session lifecycle. `paused` exists in the stored schema for forward
/// compatibility; no transition currently produces it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    Active,
    Paused,
    Completed,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Expired)
    }
}

/// Why a session reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The student submitted within the allotted window
    Submitted,
    /// The allotted window ran out before a submit landed
    TimedOut,
    /// An administrator stopped the attempt
    ForceStopped,
}

/// Scoring result written onto the session at termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub total_questions: u32,
    pub correct_answers: u32,
    pub score: i32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionTransitionError {
    #[error("session has already been started")]
    AlreadyStarted,
    #[error("session has not been started")]
    NotStarted,
    #[error("session already reached a terminal state")]
    AlreadyFinished,
}

/// One student's timed attempt, stored in "quiz_sessions".
///
/// Lifecycle transitions are plain methods so the state machine is
/// checked without a database; the session service persists the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSession {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student_id: ObjectId,
    pub university_id: ObjectId,
    pub status: SessionStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl QuizSession {
    /// A freshly granted attempt: nothing started, nothing scored.
    pub fn granted(
        student_id: ObjectId,
        university_id: ObjectId,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Self {
        QuizSession {
            id: None,
            student_id,
            university_id,
            status: SessionStatus::NotStarted,
            started_at: None,
            completed_at: None,
            duration_minutes,
            time_taken_minutes: None,
            total_questions: None,
            correct_answers: None,
            score: None,
            created_at: now,
        }
    }

    /// `not_started -> active`. The only entry into the timed window.
    pub fn begin(&mut self, now: DateTime<Utc>) -> Result<(), SessionTransitionError> {
        match self.status {
            SessionStatus::NotStarted => {
                self.status = SessionStatus::Active;
                self.started_at = Some(now);
                Ok(())
            }
            SessionStatus::Completed | SessionStatus::Expired => {
                Err(SessionTransitionError::AlreadyFinished)
            }
            SessionStatus::Active | SessionStatus::Paused => {
                Err(SessionTransitionError::AlreadyStarted)
            }
        }
    }

    /// Wall-clock deadline of the attempt; None until started.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.started_at
            .map(|started| started + Duration::minutes(self.duration_minutes))
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, SessionStatus::Active)
            && self.deadline().map(|d| now > d).unwrap_or(false)
    }

    /// Seconds left on the clock, clamped at zero.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        match self.deadline() {
            Some(deadline) => (deadline - now).num_seconds().max(0),
            None => self.duration_minutes * 60,
        }
    }

    /// `active -> {completed, expired}` with the scored summary attached.
    ///
    /// Submitted and force-stopped attempts complete; timed-out attempts
    /// expire. Every terminal session carries a score, force-stop included.
    pub fn finish(
        &mut self,
        outcome: SessionOutcome,
        summary: ScoreSummary,
        now: DateTime<Utc>,
    ) -> Result<(), SessionTransitionError> {
        match self.status {
            SessionStatus::Active | SessionStatus::Paused => {}
            SessionStatus::NotStarted => return Err(SessionTransitionError::NotStarted),
            SessionStatus::Completed | SessionStatus::Expired => {
                return Err(SessionTransitionError::AlreadyFinished)
            }
        }

        self.status = match outcome {
            SessionOutcome::Submitted | SessionOutcome::ForceStopped => SessionStatus::Completed,
            SessionOutcome::TimedOut => SessionStatus::Expired,
        };
        self.completed_at = Some(now);
        self.time_taken_minutes = self
            .started_at
            .map(|started| (now - started).num_minutes().max(0));
        self.total_questions = Some(summary.total_questions);
        self.correct_answers = Some(summary.correct_answers);
        self.score = Some(summary.score);
        Ok(())
    }
}

/// University admin request to grant a student an attempt
#[derive(Debug, Default, Deserialize)]
pub struct GrantSessionRequest {
    /// Overrides the configured default window when present
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

/// Everything a client needs to render an attempt: the session, the
/// question set (without correct answers), the recorded ledger for
/// rehydration, and the countdown state.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session: SessionView,
    pub questions: Vec<super::question::QuestionView>,
    pub answers: Vec<super::answer::AnswerView>,
    pub remaining_seconds: i64,
    pub deadline: Option<DateTime<Utc>>,
}

/// Session as rendered to clients
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: String,
    pub student_id: String,
    pub university_id: String,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    pub time_taken_minutes: Option<i64>,
    pub total_questions: Option<u32>,
    pub correct_answers: Option<u32>,
    pub score: Option<i32>,
}

impl From<QuizSession> for SessionView {
    fn from(session: QuizSession) -> Self {
        SessionView {
            id: session.id.map(|id| id.to_hex()).unwrap_or_default(),
            student_id: session.student_id.to_hex(),
            university_id: session.university_id.to_hex(),
            status: session.status,
            started_at: session.started_at,
            completed_at: session.completed_at,
            duration_minutes: session.duration_minutes,
            time_taken_minutes: session.time_taken_minutes,
            total_questions: session.total_questions,
            correct_answers: session.correct_answers,
            score: session.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> QuizSession {
        QuizSession::granted(ObjectId::new(), ObjectId::new(), 55, Utc::now())
    }

    fn summary() -> ScoreSummary {
        ScoreSummary {
            total_questions: 10,
            correct_answers: 5,
            score: 50,
        }
    }

    #[test]
    fn begin_only_from_not_started() {
        let now = Utc::now();
        let mut s = session();
        assert!(s.begin(now).is_ok());
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.started_at, Some(now));

        assert_eq!(s.begin(now), Err(SessionTransitionError::AlreadyStarted));
    }

    #[test]
    fn submit_completes_and_records_summary() {
        let now = Utc::now();
        let mut s = session();
        s.begin(now).unwrap();

        let later = now + Duration::minutes(12);
        s.finish(SessionOutcome::Submitted, summary(), later).unwrap();

        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.completed_at, Some(later));
        assert_eq!(s.time_taken_minutes, Some(12));
        assert_eq!(s.total_questions, Some(10));
        assert_eq!(s.correct_answers, Some(5));
        assert_eq!(s.score, Some(50));
    }

    #[test]
    fn second_submit_is_rejected() {
        let now = Utc::now();
        let mut s = session();
        s.begin(now).unwrap();
        s.finish(SessionOutcome::Submitted, summary(), now).unwrap();

        assert_eq!(
            s.finish(SessionOutcome::Submitted, summary(), now),
            Err(SessionTransitionError::AlreadyFinished)
        );
    }

    #[test]
    fn submit_before_start_is_rejected() {
        let mut s = session();
        assert_eq!(
            s.finish(SessionOutcome::Submitted, summary(), Utc::now()),
            Err(SessionTransitionError::NotStarted)
        );
    }

    #[test]
    fn timeout_expires_instead_of_completing() {
        let now = Utc::now();
        let mut s = session();
        s.begin(now).unwrap();

        let past_deadline = now + Duration::minutes(56);
        assert!(s.is_overdue(past_deadline));
        s.finish(SessionOutcome::TimedOut, summary(), past_deadline)
            .unwrap();

        assert_eq!(s.status, SessionStatus::Expired);
        assert!(s.score.is_some());
    }

    #[test]
    fn force_stop_completes_with_score() {
        let now = Utc::now();
        let mut s = session();
        s.begin(now).unwrap();

        let stop_summary = ScoreSummary {
            total_questions: 10,
            correct_answers: 2,
            score: 20,
        };
        s.finish(SessionOutcome::ForceStopped, stop_summary, now)
            .unwrap();

        assert_eq!(s.status, SessionStatus::Completed);
        assert!(s.completed_at.is_some());
        assert_eq!(s.score, Some(20));
    }

    #[test]
    fn remaining_seconds_clamps_at_zero() {
        let now = Utc::now();
        let mut s = session();
        s.begin(now).unwrap();

        assert_eq!(s.remaining_seconds(now), 55 * 60);
        assert_eq!(s.remaining_seconds(now + Duration::hours(2)), 0);
    }
}
