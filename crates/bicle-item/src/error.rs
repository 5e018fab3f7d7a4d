use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("item title is empty")]
    EmptyTitle,

    #[error("item url is empty")]
    EmptyUrl,

    #[error("category `{0}` is not allowed")]
    CategoryNotAllowed(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}
