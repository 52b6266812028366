use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type Credits = u32;
pub type UserId = String;
pub type RowId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    Yes,
    No,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionOutcome {
    Yes,
    No,
    Void,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionStatus {
    Open,
    Closed,
    Voided,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionStatus {
    Pending,
    Won,
    Lost,
    Void,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponStatus {
    Pending,
    Won,
    Lost,
    PartiallyWon,
    Cancelled,
}
impl CouponStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: RowId,
    pub title: String,
    pub status: QuestionStatus,
    pub outcome: Option<QuestionOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Selection {
    pub id: RowId,
    pub coupon: RowId,
    pub question: RowId,
    pub vote: Vote,
    pub odds: Decimal,
    pub status: SelectionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    pub id: RowId,
    pub user: UserId,
    pub code: String,
    pub stake: Credits,
    pub total_odds: Decimal,
    pub potential_win: Credits,
    pub status: CouponStatus,
    pub selections_count: u32,
    pub correct_selections: u32,
    pub credited: Option<Credits>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub selections: Vec<Selection>,
}

/// One open position per user and question, kept for the aggregate vote
/// counts independent of any coupon's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub user: UserId,
    pub question: RowId,
    pub vote: Vote,
    pub odds: Decimal,
    pub amount: Credits,
    pub potential_win: Credits,
    pub status: SelectionStatus,
}

// Events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QuestionResolved {
    pub question: RowId,
    pub outcome: QuestionOutcome,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CouponSettled {
    pub coupon: RowId,
    pub user: UserId,
    pub status: CouponStatus,
    pub credited: Credits,
}
