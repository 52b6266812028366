use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use log::{debug, error, warn};
use tokio::time::{sleep, timeout};

use crate::api::*;
use crate::db::Store;
use crate::error::{Error, Result};
use crate::odds;

/// How a selection leaves `Pending` once its question has an outcome.
pub fn selection_outcome(vote: Vote, outcome: QuestionOutcome) -> SelectionStatus {
    match outcome {
        QuestionOutcome::Void => SelectionStatus::Void,
        QuestionOutcome::Yes => match vote {
            Vote::Yes => SelectionStatus::Won,
            Vote::No => SelectionStatus::Lost,
        },
        QuestionOutcome::No => match vote {
            Vote::No => SelectionStatus::Won,
            Vote::Yes => SelectionStatus::Lost,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponResolution {
    StillPending,
    Terminal { status: CouponStatus, payout: Credits },
}

/// Aggregates a coupon's full selection set into its next lifecycle step.
/// A single lost leg kills the parlay no matter how many legs are still
/// pending; void legs drop out of the payout odds instead of failing it.
pub fn resolve_coupon(
    stake: Credits,
    potential_win: Credits,
    selections: &[Selection],
) -> Result<CouponResolution> {
    if selections
        .iter()
        .any(|s| s.status == SelectionStatus::Lost)
    {
        return Ok(CouponResolution::Terminal {
            status: CouponStatus::Lost,
            payout: 0,
        });
    }
    if selections
        .iter()
        .any(|s| s.status == SelectionStatus::Pending)
    {
        return Ok(CouponResolution::StillPending);
    }
    let won = selections
        .iter()
        .filter(|s| s.status == SelectionStatus::Won)
        .count();
    if won == selections.len() {
        return Ok(CouponResolution::Terminal {
            status: CouponStatus::Won,
            payout: potential_win,
        });
    }
    if won == 0 {
        // Every leg pushed: the wager never happened, the stake comes back.
        return Ok(CouponResolution::Terminal {
            status: CouponStatus::Cancelled,
            payout: stake,
        });
    }
    let payout = odds::potential_win(stake, odds::effective_odds(selections))?;
    Ok(CouponResolution::Terminal {
        status: CouponStatus::PartiallyWon,
        payout,
    })
}

/// Per-question outcome of a settlement pass: which coupons turned terminal
/// and which failed, so the orchestrator can decide abort-vs-continue
/// instead of errors vanishing inside the fan-out loop.
#[derive(Debug, Clone)]
pub struct SettlementReport {
    pub question: RowId,
    pub outcome: QuestionOutcome,
    pub touched: usize,
    pub settled: Vec<CouponSettled>,
    pub failed: Vec<(RowId, String)>,
}

pub struct SettlementEngine {
    store: Arc<dyn Store>,
    workers: usize,
    retries: u32,
    op_timeout: Duration,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn Store>, workers: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
            retries: 3,
            op_timeout: Duration::from_secs(10),
        }
    }

    /// Fans a question outcome out over every coupon holding a pending leg
    /// on it. Coupons settle in parallel up to the worker bound; a single
    /// coupon is linearized by the store's terminal compare-and-set.
    pub async fn handle_question_resolved(
        &self,
        event: QuestionResolved,
    ) -> Result<SettlementReport> {
        let resolved = self
            .store
            .resolve_predictions(event.question, event.outcome)
            .await?;
        debug!(
            "resolved {} predictions for question {}",
            resolved, event.question
        );
        let pending = self
            .store
            .pending_selections_by_question(event.question)
            .await?;
        let mut coupons: Vec<RowId> = pending.iter().map(|s| s.coupon).collect();
        coupons.sort_unstable();
        coupons.dedup();
        let mut report = SettlementReport {
            question: event.question,
            outcome: event.outcome,
            touched: coupons.len(),
            settled: Vec::new(),
            failed: Vec::new(),
        };
        let results: Vec<(RowId, Result<Option<CouponSettled>>)> = stream::iter(coupons)
            .map(|coupon| async move {
                (
                    coupon,
                    self.settle_with_retry(coupon, event.question, event.outcome)
                        .await,
                )
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;
        for (coupon, result) in results {
            match result {
                Ok(Some(settled)) => report.settled.push(settled),
                Ok(None) => {}
                Err(e) => {
                    error!(
                        "settling coupon {} for question {} failed: {}",
                        coupon, event.question, e
                    );
                    report.failed.push((coupon, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    async fn settle_with_retry(
        &self,
        coupon: RowId,
        question: RowId,
        outcome: QuestionOutcome,
    ) -> Result<Option<CouponSettled>> {
        let mut attempt = 0;
        loop {
            let result = match timeout(
                self.op_timeout,
                self.store.settle_coupon(coupon, question, outcome),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout),
            };
            match result {
                Err(e @ (Error::Database(_) | Error::Timeout)) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "retrying settlement of coupon {} after {} (attempt {})",
                        coupon, e, attempt
                    );
                    sleep(Duration::from_millis(50 * attempt as u64)).await;
                }
                other => return other,
            }
        }
    }
}
