use thiserror::Error;

use crate::api::{Credits, RowId, UserId};

/// Everything the coupon core can refuse to do, typed so the HTTP layer can
/// map each refusal to a status code and callers can branch on money-safety
/// cases.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid selections: {0}")]
    InvalidSelections(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient funds: balance {balance} does not cover {stake}")]
    InsufficientFunds { balance: Credits, stake: Credits },

    #[error("user {user} already holds an open position on question {question}")]
    DuplicatePosition { user: UserId, question: RowId },

    #[error("question {0} is not open for new selections")]
    QuestionNotOpen(RowId),

    #[error("question {0} was already resolved")]
    AlreadyResolved(RowId),

    #[error("no such user: {0}")]
    UnknownUser(UserId),

    #[error("no such coupon: {0}")]
    UnknownCoupon(RowId),

    #[error("no such question: {0}")]
    UnknownQuestion(RowId),

    #[error("could not allocate a unique coupon code")]
    CodeAllocation,

    #[error("storage operation timed out")]
    Timeout,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
