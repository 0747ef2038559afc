//! Learning-management domain: the in-memory state, its rules and the
//! persistent store wrapping it.

pub mod error;
pub mod password;
pub mod seed;
pub mod state;
pub mod store;
pub mod validation;

pub use error::LmsError;
pub use state::{score_answers, CourseCascade, LmsState};
pub use store::{LmsStore, StoreOptions};
