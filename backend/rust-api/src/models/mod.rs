pub mod answer;
pub mod audit_log;
pub mod license;
pub mod notification;
pub mod question;
pub mod refresh_token;
pub mod session;
pub mod timer;
pub mod university;
pub mod user;

pub use answer::{AnswerView, RecordSelectionRequest, StudentAnswer, ToggleReviewRequest};
pub use question::{AnswerOption, QuestionView, QuizQuestion};
pub use session::{
    QuizSession, ScoreSummary, SessionOutcome, SessionStatus, SessionTransitionError, SessionView,
};
pub use university::{LicenseStatus, University};
pub use user::{User, UserProfile, UserRole};
