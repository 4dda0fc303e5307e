pub mod area;
pub mod config;
pub mod error;
pub mod form;
pub mod handler;
pub mod history;
pub mod result;
pub mod validate;

pub use area::{QuarterDiskRule, is_hit};
pub use config::HitcheckConfig;
pub use error::CheckError;
pub use handler::{CheckHandler, FormRequest, Reply};
pub use history::ResultLog;
pub use result::CheckResult;
pub use validate::{Submission, ValidationError, validate};
