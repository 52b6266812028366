use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::api::*;
use crate::db::{CouponDraft, CreatedCoupon, SelectionDraft, Store};
use crate::error::{Error, Result};
use crate::odds;
use crate::settlement::{SettlementEngine, SettlementReport};

/// Orchestrating façade over the ledger, coupon store, prediction tracker
/// and settlement engine. One instance serves the whole process; storage is
/// injected so tests run against an in-memory database.
pub struct Parlay {
    store: Arc<dyn Store>,
    settlement: SettlementEngine,
    settled_tx: broadcast::Sender<CouponSettled>,
    op_timeout: Duration,
}

impl Parlay {
    pub fn new(store: Box<dyn Store>, workers: usize) -> Self {
        let store: Arc<dyn Store> = Arc::from(store);
        let (settled_tx, _) = broadcast::channel(256);
        Self {
            settlement: SettlementEngine::new(store.clone(), workers),
            store,
            settled_tx,
            op_timeout: Duration::from_secs(10),
        }
    }

    pub async fn create_user(&self, user: &UserId) -> Result<()> {
        if user.trim().is_empty() {
            return Err(Error::Validation("user id must not be empty".to_string()));
        }
        self.store.create_user(user).await
    }

    pub async fn deposit(&self, user: &UserId, amount: Credits, request_id: &str) -> Result<Credits> {
        if amount == 0 {
            return Err(Error::Validation(
                "deposit amount must be positive".to_string(),
            ));
        }
        check_request_id(request_id)?;
        let key = format!("deposit:{}:{}", user, request_id);
        self.with_timeout(self.store.credit(user, amount, &key))
            .await?;
        self.store.balance(user).await
    }

    pub async fn balance(&self, user: &UserId) -> Result<Credits> {
        self.store.balance(user).await
    }

    /// Builds and persists a coupon: validation, combined odds, stake
    /// reservation, selection and prediction writes, all or nothing. A
    /// client retry carrying the same request id gets the original coupon
    /// back instead of a second charge.
    pub async fn create_coupon(
        &self,
        user: &UserId,
        selections: Vec<SelectionRequest>,
        stake: Credits,
        request_id: &str,
    ) -> Result<CreatedCoupon> {
        check_request_id(request_id)?;
        if stake == 0 {
            return Err(Error::Validation("stake must be positive".to_string()));
        }
        let mut seen = HashSet::new();
        for selection in &selections {
            if !seen.insert(selection.question) {
                return Err(Error::InvalidSelections(format!(
                    "question {} appears more than once",
                    selection.question
                )));
            }
        }
        let legs: Vec<Decimal> = selections.iter().map(|s| s.odds).collect();
        let total_odds = odds::total_odds(&legs)?;
        let potential_win = odds::potential_win(stake, total_odds)?;
        // Friendlier rejection before any money moves; the store re-checks
        // inside the transaction.
        for selection in &selections {
            let question = self.store.get_question(selection.question).await?;
            if question.status != QuestionStatus::Open {
                return Err(Error::QuestionNotOpen(question.id));
            }
        }
        let draft = CouponDraft {
            user: user.clone(),
            request_id: request_id.to_string(),
            stake,
            total_odds,
            potential_win,
            selections: split_stake(&selections, stake)?,
        };
        let created = self.with_timeout(self.store.create_coupon(draft)).await?;
        if created.replayed {
            debug!(
                "request {} replayed, returning coupon {}",
                request_id, created.coupon.code
            );
        } else {
            info!(
                "user {} staked {} on coupon {} at odds {}",
                user, stake, created.coupon.code, created.coupon.total_odds
            );
        }
        Ok(created)
    }

    pub async fn get_coupon(&self, coupon: RowId) -> Result<Coupon> {
        self.store.get_coupon(coupon).await
    }

    pub async fn list_user_coupons(&self, user: &UserId) -> Result<Vec<Coupon>> {
        self.store.list_user_coupons(user).await
    }

    pub async fn create_question(&self, title: String) -> Result<RowId> {
        if title.trim().is_empty() {
            return Err(Error::Validation(
                "question title must not be empty".to_string(),
            ));
        }
        self.store.create_question(title).await
    }

    pub async fn get_question(&self, question: RowId) -> Result<Question> {
        self.store.get_question(question).await
    }

    pub async fn list_open_questions(&self) -> Result<Vec<Question>> {
        self.store.list_open_questions().await
    }

    /// Closes (or voids) a question. The caller is expected to feed the
    /// matching `QuestionResolved` event into the settlement consumer.
    pub async fn resolve_question(&self, question: RowId, outcome: QuestionOutcome) -> Result<()> {
        self.with_timeout(self.store.resolve_question(question, outcome))
            .await
    }

    /// Settles everything the question outcome touches and broadcasts one
    /// `CouponSettled` per coupon that turned terminal.
    pub async fn handle_question_resolved(
        &self,
        event: QuestionResolved,
    ) -> Result<SettlementReport> {
        let report = self.settlement.handle_question_resolved(event).await?;
        for settled in &report.settled {
            debug!(
                "coupon {} settled as {} with {} credits for user {}",
                settled.coupon, settled.status, settled.credited, settled.user
            );
            let _ = self.settled_tx.send(settled.clone());
        }
        if !report.failed.is_empty() {
            warn!(
                "{} coupons failed to settle for question {}",
                report.failed.len(),
                report.question
            );
        }
        Ok(report)
    }

    pub fn subscribe_settlements(&self) -> broadcast::Receiver<CouponSettled> {
        self.settled_tx.subscribe()
    }

    /// Records a bare yes/no position, independent of any coupon. The same
    /// uniqueness rule applies: one open position per user and question.
    pub async fn cast_vote(
        &self,
        user: &UserId,
        question: RowId,
        vote: Vote,
        vote_odds: Decimal,
    ) -> Result<()> {
        if vote_odds <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "vote odds must be positive, got {}",
                vote_odds
            )));
        }
        let open = self.store.get_question(question).await?;
        if open.status != QuestionStatus::Open {
            return Err(Error::QuestionNotOpen(question));
        }
        self.store
            .upsert_prediction(Prediction {
                user: user.clone(),
                question,
                vote,
                odds: vote_odds,
                amount: 0,
                potential_win: 0,
                status: SelectionStatus::Pending,
            })
            .await
    }

    pub async fn vote_tally(&self, question: RowId) -> Result<(u32, u32)> {
        self.store.vote_tally(question).await
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }
}

fn check_request_id(request_id: &str) -> Result<()> {
    if request_id.trim().is_empty() {
        return Err(Error::Validation(
            "request id must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Mirrors the coupon stake onto its legs for the per-question prediction
/// rows. Integer division loses the remainder, so it goes to the last leg
/// and the split always sums back to the stake.
fn split_stake(selections: &[SelectionRequest], stake: Credits) -> Result<Vec<SelectionDraft>> {
    let share = stake / selections.len() as u32;
    let remainder = stake % selections.len() as u32;
    selections
        .iter()
        .enumerate()
        .map(|(i, selection)| {
            let amount = if i == selections.len() - 1 {
                share + remainder
            } else {
                share
            };
            Ok(SelectionDraft {
                question: selection.question,
                vote: selection.vote,
                odds: selection.odds,
                prediction_amount: amount,
                prediction_win: odds::potential_win(amount, selection.odds)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::SqliteStore;
    use rust_decimal_macros::dec;

    async fn service() -> Parlay {
        Parlay::new(Box::new(SqliteStore::new(None).await.unwrap()), 4)
    }

    async fn funded_user(parlay: &Parlay, name: &str, balance: Credits) -> UserId {
        let user: UserId = name.to_string();
        parlay.create_user(&user).await.unwrap();
        parlay
            .deposit(&user, balance, &format!("seed-{}", name))
            .await
            .unwrap();
        user
    }

    fn two_legs(q1: RowId, q2: RowId) -> Vec<SelectionRequest> {
        vec![
            SelectionRequest {
                question: q1,
                vote: Vote::Yes,
                odds: dec!(1.5),
            },
            SelectionRequest {
                question: q2,
                vote: Vote::No,
                odds: dec!(2.0),
            },
        ]
    }

    #[tokio::test]
    async fn combines_odds_and_reserves_the_stake() {
        let parlay = service().await;
        let alice = funded_user(&parlay, "alice", 1000).await;
        let q1 = parlay.create_question("Will it rain tomorrow?".into()).await.unwrap();
        let q2 = parlay.create_question("Will the match go to penalties?".into()).await.unwrap();

        let created = parlay
            .create_coupon(&alice, two_legs(q1, q2), 100, "r-1")
            .await
            .unwrap();
        assert!(!created.replayed);
        let coupon = created.coupon;
        assert_eq!(coupon.total_odds, dec!(3.00));
        assert_eq!(coupon.potential_win, 300);
        assert_eq!(coupon.status, CouponStatus::Pending);
        assert_eq!(coupon.selections_count, 2);
        assert_eq!(coupon.correct_selections, 0);
        assert!(coupon.code.starts_with("CPN-"));
        assert!(coupon.resolved_at.is_none());
        assert_eq!(coupon.selections.len(), 2);
        assert_eq!(parlay.balance(&alice).await.unwrap(), 900);
    }

    #[tokio::test]
    async fn insufficient_funds_leaves_no_trace() {
        let parlay = service().await;
        let bob = funded_user(&parlay, "bob", 50).await;
        let q1 = parlay.create_question("Will the index close green?".into()).await.unwrap();
        let q2 = parlay.create_question("Will volume double?".into()).await.unwrap();

        match parlay.create_coupon(&bob, two_legs(q1, q2), 100, "r-1").await {
            Err(Error::InsufficientFunds { balance, stake }) => {
                assert_eq!(balance, 50);
                assert_eq!(stake, 100);
            }
            other => panic!("expected InsufficientFunds, got {:?}", other.err()),
        }
        assert_eq!(parlay.balance(&bob).await.unwrap(), 50);
        assert!(parlay.list_user_coupons(&bob).await.unwrap().is_empty());
        assert_eq!(parlay.vote_tally(q1).await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn duplicate_request_returns_the_original_coupon() {
        let parlay = service().await;
        let carol = funded_user(&parlay, "carol", 50).await;
        let q1 = parlay.create_question("Will the opener survive?".into()).await.unwrap();
        let legs = vec![SelectionRequest {
            question: q1,
            vote: Vote::Yes,
            odds: dec!(1.9),
        }];

        // Two concurrent submissions sharing one request id: the balance
        // only covers one stake, so anything but a single debit would fail.
        let (a, b) = tokio::join!(
            parlay.create_coupon(&carol, legs.clone(), 50, "r-1"),
            parlay.create_coupon(&carol, legs.clone(), 50, "r-1"),
        );
        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a.coupon.id, b.coupon.id);
        assert_eq!(a.coupon.code, b.coupon.code);
        assert!(a.replayed != b.replayed);
        assert_eq!(parlay.balance(&carol).await.unwrap(), 0);
        assert_eq!(parlay.list_user_coupons(&carol).await.unwrap().len(), 1);

        // A later retry still replays instead of charging.
        let c = parlay.create_coupon(&carol, legs, 50, "r-1").await.unwrap();
        assert!(c.replayed);
        assert_eq!(c.coupon.id, a.coupon.id);
        assert_eq!(parlay.balance(&carol).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejects_malformed_coupons() {
        let parlay = service().await;
        let dave = funded_user(&parlay, "dave", 1000).await;
        let q1 = parlay.create_question("Will the session end early?".into()).await.unwrap();

        assert!(matches!(
            parlay.create_coupon(&dave, vec![], 100, "r-1").await,
            Err(Error::InvalidSelections(_))
        ));
        assert!(matches!(
            parlay
                .create_coupon(
                    &dave,
                    vec![SelectionRequest {
                        question: q1,
                        vote: Vote::Yes,
                        odds: dec!(0),
                    }],
                    100,
                    "r-2",
                )
                .await,
            Err(Error::InvalidSelections(_))
        ));
        let doubled = vec![
            SelectionRequest {
                question: q1,
                vote: Vote::Yes,
                odds: dec!(1.5),
            },
            SelectionRequest {
                question: q1,
                vote: Vote::No,
                odds: dec!(2.5),
            },
        ];
        assert!(matches!(
            parlay.create_coupon(&dave, doubled, 100, "r-3").await,
            Err(Error::InvalidSelections(_))
        ));
        assert!(matches!(
            parlay
                .create_coupon(
                    &dave,
                    vec![SelectionRequest {
                        question: q1,
                        vote: Vote::Yes,
                        odds: dec!(1.5),
                    }],
                    0,
                    "r-4",
                )
                .await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            parlay
                .create_coupon(
                    &dave,
                    vec![SelectionRequest {
                        question: 9999,
                        vote: Vote::Yes,
                        odds: dec!(1.5),
                    }],
                    100,
                    "r-5",
                )
                .await,
            Err(Error::UnknownQuestion(9999))
        ));
        assert_eq!(parlay.balance(&dave).await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn resolved_questions_accept_no_new_legs() {
        let parlay = service().await;
        let erin = funded_user(&parlay, "erin", 1000).await;
        let q1 = parlay.create_question("Will the vote pass?".into()).await.unwrap();
        parlay.resolve_question(q1, QuestionOutcome::Yes).await.unwrap();

        assert!(matches!(
            parlay
                .create_coupon(
                    &erin,
                    vec![SelectionRequest {
                        question: q1,
                        vote: Vote::Yes,
                        odds: dec!(1.5),
                    }],
                    100,
                    "r-1",
                )
                .await,
            Err(Error::QuestionNotOpen(_))
        ));
        assert_eq!(parlay.balance(&erin).await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn second_position_on_a_question_rolls_everything_back() {
        let parlay = service().await;
        let frank = funded_user(&parlay, "frank", 1000).await;
        let q1 = parlay.create_question("Will the record fall?".into()).await.unwrap();
        let q2 = parlay.create_question("Will the crowd sell out?".into()).await.unwrap();
        parlay.cast_vote(&frank, q1, Vote::Yes, dec!(1.5)).await.unwrap();

        match parlay.create_coupon(&frank, two_legs(q1, q2), 100, "r-1").await {
            Err(Error::DuplicatePosition { question, .. }) => assert_eq!(question, q1),
            other => panic!("expected DuplicatePosition, got {:?}", other.err()),
        }
        // The whole unit rolled back: stake intact, no coupon, no stray leg.
        assert_eq!(parlay.balance(&frank).await.unwrap(), 1000);
        assert!(parlay.list_user_coupons(&frank).await.unwrap().is_empty());
        assert_eq!(parlay.vote_tally(q2).await.unwrap(), (0, 0));
    }

    #[test]
    fn stake_split_keeps_the_remainder() {
        let legs = vec![
            SelectionRequest {
                question: 1,
                vote: Vote::Yes,
                odds: dec!(1.5),
            },
            SelectionRequest {
                question: 2,
                vote: Vote::Yes,
                odds: dec!(2.0),
            },
            SelectionRequest {
                question: 3,
                vote: Vote::No,
                odds: dec!(3.0),
            },
        ];
        let split = split_stake(&legs, 100).unwrap();
        let amounts: Vec<Credits> = split.iter().map(|s| s.prediction_amount).collect();
        assert_eq!(amounts, vec![33, 33, 34]);
        assert_eq!(amounts.iter().sum::<Credits>(), 100);
    }

    #[tokio::test]
    async fn votes_aggregate_per_question() {
        let parlay = service().await;
        let q1 = parlay.create_question("Will the derby draw?".into()).await.unwrap();
        for name in ["gina", "hank"] {
            let user = funded_user(&parlay, name, 10).await;
            parlay.cast_vote(&user, q1, Vote::Yes, dec!(2.1)).await.unwrap();
        }
        let ida = funded_user(&parlay, "ida", 10).await;
        parlay.cast_vote(&ida, q1, Vote::No, dec!(1.7)).await.unwrap();
        assert_eq!(parlay.vote_tally(q1).await.unwrap(), (2, 1));
        // Voting twice is the race the uniqueness constraint exists for.
        assert!(matches!(
            parlay.cast_vote(&ida, q1, Vote::No, dec!(1.7)).await,
            Err(Error::DuplicatePosition { .. })
        ));
    }
}
