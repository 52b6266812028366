use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::*;

// Requests
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CreateUserRequest {
    pub user: UserId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DepositRequest {
    pub user: UserId,
    pub amount: Credits,
    pub request_id: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SelectionRequest {
    pub question: RowId,
    pub vote: Vote,
    pub odds: Decimal,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CreateCouponRequest {
    pub user: UserId,
    pub selections: Vec<SelectionRequest>,
    pub stake: Credits,
    pub request_id: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NewQuestionRequest {
    pub title: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResolveQuestionRequest {
    pub question: RowId,
    pub outcome: QuestionOutcome,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VoteRequest {
    pub user: UserId,
    pub question: RowId,
    pub vote: Vote,
    pub odds: Decimal,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct UserRequest {
    pub user: UserId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CouponRequest {
    pub coupon: RowId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QuestionRequest {
    pub question: RowId,
}
