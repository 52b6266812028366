use log::debug;
use reqwest::StatusCode;

use crate::error::Error;

pub fn map_err_and_code(e: Error) -> (StatusCode, String) {
    debug!("Error: {}", e);
    let code = match &e {
        Error::InvalidSelections(_) | Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        Error::DuplicatePosition { .. } | Error::QuestionNotOpen(_) | Error::AlreadyResolved(_) => {
            StatusCode::CONFLICT
        }
        Error::UnknownUser(_) | Error::UnknownCoupon(_) | Error::UnknownQuestion(_) => {
            StatusCode::NOT_FOUND
        }
        Error::Timeout => StatusCode::GATEWAY_TIMEOUT,
        Error::CodeAllocation | Error::Database(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (code, e.to_string())
}
