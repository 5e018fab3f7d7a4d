pub mod error;
pub mod export;
pub mod report;
pub mod validator;

pub use error::AuditError;
pub use export::{export, export_all, SerializedChain, EXPORT_FORMAT};
pub use report::{Finding, ValidationReport};
pub use validator::Validator;
