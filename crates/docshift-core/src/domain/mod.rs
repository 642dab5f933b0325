//! Domain model (ids, job requests, outcomes, errors).

pub mod errors;
pub mod ids;
pub mod job;
pub mod outcome;

pub use self::errors::{InputError, JobError, TimeoutError};
pub use self::ids::{JobId, ParseJobIdError};
pub use self::job::JobRequest;
pub use self::outcome::Outcome;
