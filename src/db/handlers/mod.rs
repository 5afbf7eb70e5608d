//! Database access layer.
//!
//! Each submodule wraps one table (or a small cluster of tables) behind a
//! repository struct borrowing a `PgConnection`. Handlers that span tables
//! open their own transactions on that connection.

pub mod agencies;
pub mod attendance;
pub mod lessons;
pub mod repository;
pub mod student_payments;
pub mod tokens;
pub mod tutor_payments;
pub mod users;

pub use agencies::Agencies;
pub use attendance::LessonInstances;
pub use lessons::{EnrollmentOutcome, Lessons};
pub use repository::Repository;
pub use student_payments::{RecordOutcome, StudentPayments};
pub use tokens::Tokens;
pub use tutor_payments::TutorPayments;
pub use users::Users;
