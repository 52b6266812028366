use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use log::debug;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{query, Row, SqliteConnection, SqlitePool};

use crate::api::*;
use crate::error::{Error, Result};
use crate::settlement;

/// Everything the creation transaction persists, precomputed by the service.
#[derive(Debug, Clone)]
pub struct CouponDraft {
    pub user: UserId,
    pub request_id: String,
    pub stake: Credits,
    pub total_odds: Decimal,
    pub potential_win: Credits,
    pub selections: Vec<SelectionDraft>,
}
#[derive(Debug, Clone)]
pub struct SelectionDraft {
    pub question: RowId,
    pub vote: Vote,
    pub odds: Decimal,
    /// Share of the coupon stake mirrored into the user's prediction row.
    pub prediction_amount: Credits,
    pub prediction_win: Credits,
}
#[derive(Debug, Clone)]
pub struct CreatedCoupon {
    pub coupon: Coupon,
    /// The request id had already been applied and the original coupon is
    /// returned instead of a new one.
    pub replayed: bool,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    Applied,
    Replayed,
}

#[async_trait]
pub trait Ledger {
    async fn create_user(&self, user: &UserId) -> Result<()>;
    async fn balance(&self, user: &UserId) -> Result<Credits>;
    /// Debits `amount` if the balance covers it. A key that was already
    /// applied returns `Replayed` without debiting again.
    async fn reserve(&self, user: &UserId, amount: Credits, key: &str) -> Result<LedgerOutcome>;
    /// Credits `amount`, at most once per key.
    async fn credit(&self, user: &UserId, amount: Credits, key: &str) -> Result<LedgerOutcome>;
}

#[async_trait]
pub trait CouponStore {
    /// The whole creation unit in one transaction: request replay check,
    /// question re-check, stake debit, coupon + selections insert,
    /// prediction upserts. Nothing survives a failure of any step.
    async fn create_coupon(&self, draft: CouponDraft) -> Result<CreatedCoupon>;
    async fn get_coupon(&self, coupon: RowId) -> Result<Coupon>;
    async fn list_user_coupons(&self, user: &UserId) -> Result<Vec<Coupon>>;
    async fn pending_selections_by_question(&self, question: RowId) -> Result<Vec<Selection>>;
    /// Applies a question outcome to one coupon: resolves its legs on that
    /// question, recomputes the aggregate and, when the coupon newly turns
    /// terminal, pays out in the same transaction. Returns the settlement
    /// event in that case, `None` when the coupon stays pending or was
    /// already terminal.
    async fn settle_coupon(
        &self,
        coupon: RowId,
        question: RowId,
        outcome: QuestionOutcome,
    ) -> Result<Option<CouponSettled>>;
}

#[async_trait]
pub trait PredictionTracker {
    /// Single atomic insert guarded by the `(user, question)` primary key;
    /// a conflict surfaces as `DuplicatePosition` for the caller to judge.
    async fn upsert_prediction(&self, prediction: Prediction) -> Result<()>;
    async fn vote_tally(&self, question: RowId) -> Result<(u32, u32)>;
    async fn resolve_predictions(&self, question: RowId, outcome: QuestionOutcome) -> Result<u64>;
}

#[async_trait]
pub trait QuestionStore {
    async fn create_question(&self, title: String) -> Result<RowId>;
    async fn get_question(&self, question: RowId) -> Result<Question>;
    async fn list_open_questions(&self) -> Result<Vec<Question>>;
    async fn resolve_question(&self, question: RowId, outcome: QuestionOutcome) -> Result<()>;
}

pub trait Store: Ledger + CouponStore + PredictionTracker + QuestionStore + Send + Sync {}
impl<T> Store for T where T: Ledger + CouponStore + PredictionTracker + QuestionStore + Send + Sync {}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(conn: Option<String>) -> Result<Self> {
        let pool = match conn {
            Some(url) => {
                let options = SqliteConnectOptions::from_str(url.as_str())?
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .busy_timeout(Duration::from_secs(5));
                SqlitePoolOptions::new().connect_with(options).await?
            }
            // A pool of more than one connection would hand every connection
            // its own empty in-memory database.
            None => {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect("sqlite::memory:")
                    .await?
            }
        };
        for statement in [
            "CREATE TABLE IF NOT EXISTS users (\
                id TEXT PRIMARY KEY,\
                balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0)\
                )",
            "CREATE TABLE IF NOT EXISTS ledger_entries (\
                entry_key TEXT PRIMARY KEY,\
                user TEXT NOT NULL,\
                delta INTEGER NOT NULL,\
                created_at INTEGER NOT NULL\
                )",
            "CREATE TABLE IF NOT EXISTS questions (\
                id INTEGER PRIMARY KEY,\
                title TEXT NOT NULL,\
                status TEXT NOT NULL DEFAULT 'Open',\
                outcome TEXT\
                )",
            "CREATE TABLE IF NOT EXISTS coupons (\
                id INTEGER PRIMARY KEY,\
                user TEXT NOT NULL,\
                code TEXT NOT NULL UNIQUE,\
                request_id TEXT NOT NULL UNIQUE,\
                stake INTEGER NOT NULL,\
                total_odds TEXT NOT NULL,\
                potential_win INTEGER NOT NULL,\
                status TEXT NOT NULL DEFAULT 'Pending',\
                selections_count INTEGER NOT NULL,\
                correct_selections INTEGER NOT NULL DEFAULT 0,\
                credited INTEGER,\
                created_at INTEGER NOT NULL,\
                resolved_at INTEGER\
                )",
            "CREATE TABLE IF NOT EXISTS selections (\
                id INTEGER PRIMARY KEY,\
                coupon INTEGER NOT NULL,\
                question INTEGER NOT NULL,\
                vote TEXT NOT NULL,\
                odds TEXT NOT NULL,\
                status TEXT NOT NULL DEFAULT 'Pending'\
                )",
            "CREATE TABLE IF NOT EXISTS predictions (\
                user TEXT NOT NULL,\
                question INTEGER NOT NULL,\
                vote TEXT NOT NULL,\
                odds TEXT NOT NULL,\
                amount INTEGER NOT NULL,\
                potential_win INTEGER NOT NULL,\
                status TEXT NOT NULL DEFAULT 'Pending',\
                PRIMARY KEY (user, question)\
                )",
            "CREATE INDEX IF NOT EXISTS selections_by_question \
                ON selections (question, status)",
            "CREATE INDEX IF NOT EXISTS coupons_by_user ON coupons (user)",
        ] {
            query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }
}

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CODE_ATTEMPTS: usize = 5;

fn coupon_code() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("CPN-{}-{}", Utc::now().timestamp_millis(), suffix)
}

fn stake_key(request_id: &str) -> String {
    format!("stake:{}", request_id)
}
fn payout_key(coupon: RowId) -> String {
    format!("payout:{}", coupon)
}

/// Request ids dedupe retries of one client call; a different user replaying
/// someone else's id must not be handed their coupon.
fn replay_for(coupon: Coupon, user: &UserId) -> Result<CreatedCoupon> {
    if coupon.user != *user {
        return Err(Error::Validation(
            "request id was already used by a different user".to_string(),
        ));
    }
    Ok(CreatedCoupon {
        coupon,
        replayed: true,
    })
}

fn unique_violation(e: &sqlx::Error, needle: &str) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            let message = db.message();
            message.contains("UNIQUE constraint failed") && message.contains(needle)
        }
        _ => false,
    }
}

/// Ledger write shared by the standalone trait operations and the composite
/// transactions. The caller owns the surrounding transaction; debits are
/// guarded so the balance can never go below zero.
async fn apply_entry(
    conn: &mut SqliteConnection,
    user: &UserId,
    delta: i64,
    key: &str,
) -> Result<LedgerOutcome> {
    let existing = query("SELECT delta FROM ledger_entries WHERE entry_key = ?")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
    if existing.is_some() {
        return Ok(LedgerOutcome::Replayed);
    }
    query("INSERT INTO ledger_entries (entry_key, user, delta, created_at) VALUES (?,?,?,?)")
        .bind(key)
        .bind(user)
        .bind(delta)
        .bind(Utc::now().timestamp())
        .execute(&mut *conn)
        .await?;
    let updated = if delta < 0 {
        query("UPDATE users SET balance = balance + ? WHERE id = ? AND balance >= ?")
            .bind(delta)
            .bind(user)
            .bind(-delta)
            .execute(&mut *conn)
            .await?
    } else {
        query("UPDATE users SET balance = balance + ? WHERE id = ?")
            .bind(delta)
            .bind(user)
            .execute(&mut *conn)
            .await?
    };
    if updated.rows_affected() == 0 {
        let row = query("SELECT balance FROM users WHERE id = ?")
            .bind(user)
            .fetch_optional(&mut *conn)
            .await?;
        return match row {
            Some(row) => Err(Error::InsufficientFunds {
                balance: row.get("balance"),
                stake: (-delta) as Credits,
            }),
            None => Err(Error::UnknownUser(user.clone())),
        };
    }
    Ok(LedgerOutcome::Applied)
}

async fn insert_prediction(conn: &mut SqliteConnection, p: &Prediction) -> Result<()> {
    let inserted = query(
        "INSERT INTO predictions ( \
            user, \
            question, \
            vote, \
            odds, \
            amount, \
            potential_win, \
            status) \
            VALUES (?,?,?,?,?,?,?)",
    )
    .bind(&p.user)
    .bind(p.question)
    .bind(p.vote.to_string())
    .bind(p.odds.to_string())
    .bind(p.amount)
    .bind(p.potential_win)
    .bind(p.status.to_string())
    .execute(&mut *conn)
    .await;
    match inserted {
        Ok(_) => Ok(()),
        Err(e) if unique_violation(&e, "predictions") => Err(Error::DuplicatePosition {
            user: p.user.clone(),
            question: p.question,
        }),
        Err(e) => Err(e.into()),
    }
}

fn selection_from_row(row: &SqliteRow) -> Result<Selection> {
    Ok(Selection {
        id: row.get("id"),
        coupon: row.get("coupon"),
        question: row.get("question"),
        vote: Vote::from_str(row.get("vote"))?,
        odds: Decimal::from_str(row.get("odds")).context("invalid stored selection odds")?,
        status: SelectionStatus::from_str(row.get("status"))?,
    })
}

fn question_from_row(row: &SqliteRow) -> Result<Question> {
    let outcome = match row.get::<Option<&str>, _>("outcome") {
        Some(outcome) => Some(QuestionOutcome::from_str(outcome)?),
        None => None,
    };
    Ok(Question {
        id: row.get("id"),
        title: row.get("title"),
        status: QuestionStatus::from_str(row.get("status"))?,
        outcome,
    })
}

async fn load_selections(conn: &mut SqliteConnection, coupon: RowId) -> Result<Vec<Selection>> {
    let rows = query(
        "SELECT id, coupon, question, vote, odds, status \
            FROM selections WHERE coupon = ? ORDER BY id",
    )
    .bind(coupon)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(selection_from_row).collect()
}

async fn load_coupon(conn: &mut SqliteConnection, coupon: RowId) -> Result<Coupon> {
    let row = query(
        "SELECT id, user, code, stake, total_odds, potential_win, status, \
            selections_count, correct_selections, credited, created_at, resolved_at \
            FROM coupons WHERE id = ?",
    )
    .bind(coupon)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(Error::UnknownCoupon(coupon))?;
    let selections = load_selections(conn, coupon).await?;
    Ok(Coupon {
        id: row.get("id"),
        user: row.get("user"),
        code: row.get("code"),
        stake: row.get("stake"),
        total_odds: Decimal::from_str(row.get("total_odds"))
            .context("invalid stored coupon odds")?,
        potential_win: row.get("potential_win"),
        status: CouponStatus::from_str(row.get("status"))?,
        selections_count: row.get("selections_count"),
        correct_selections: row.get("correct_selections"),
        credited: row.get("credited"),
        created_at: Utc.timestamp_opt(row.get("created_at"), 0).unwrap(),
        resolved_at: row
            .get::<Option<i64>, _>("resolved_at")
            .map(|at| Utc.timestamp_opt(at, 0).unwrap()),
        selections,
    })
}

#[async_trait]
impl Ledger for SqliteStore {
    async fn create_user(&self, user: &UserId) -> Result<()> {
        query("INSERT OR IGNORE INTO users (id) VALUES (?)")
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
    async fn balance(&self, user: &UserId) -> Result<Credits> {
        let row = query("SELECT balance FROM users WHERE id = ?")
            .bind(user)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::UnknownUser(user.clone()))?;
        Ok(row.get("balance"))
    }
    async fn reserve(&self, user: &UserId, amount: Credits, key: &str) -> Result<LedgerOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = apply_entry(&mut tx, user, -(amount as i64), key).await?;
        tx.commit().await?;
        Ok(outcome)
    }
    async fn credit(&self, user: &UserId, amount: Credits, key: &str) -> Result<LedgerOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = apply_entry(&mut tx, user, amount as i64, key).await?;
        tx.commit().await?;
        Ok(outcome)
    }
}

#[async_trait]
impl CouponStore for SqliteStore {
    async fn create_coupon(&self, draft: CouponDraft) -> Result<CreatedCoupon> {
        let mut tx = self.pool.begin().await?;
        // A retried request returns the coupon the first attempt created.
        if let Some(row) = query("SELECT id FROM coupons WHERE request_id = ?")
            .bind(draft.request_id.as_str())
            .fetch_optional(&mut *tx)
            .await?
        {
            let coupon = load_coupon(&mut tx, row.get("id")).await?;
            return replay_for(coupon, &draft.user);
        }
        // Re-checked inside the transaction so a selection can never be born
        // pending on a question whose settlement pass already ran.
        for selection in &draft.selections {
            let row = query("SELECT status FROM questions WHERE id = ?")
                .bind(selection.question)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(Error::UnknownQuestion(selection.question))?;
            if QuestionStatus::from_str(row.get("status"))? != QuestionStatus::Open {
                return Err(Error::QuestionNotOpen(selection.question));
            }
        }
        apply_entry(
            &mut tx,
            &draft.user,
            -(draft.stake as i64),
            stake_key(draft.request_id.as_str()).as_str(),
        )
        .await?;
        let created_at = Utc::now().timestamp();
        let mut coupon_id = None;
        for _ in 0..CODE_ATTEMPTS {
            let code = coupon_code();
            let inserted = query(
                "INSERT INTO coupons ( \
                    user, \
                    code, \
                    request_id, \
                    stake, \
                    total_odds, \
                    potential_win, \
                    selections_count, \
                    created_at) \
                    VALUES (?,?,?,?,?,?,?,?)",
            )
            .bind(&draft.user)
            .bind(code.as_str())
            .bind(draft.request_id.as_str())
            .bind(draft.stake)
            .bind(draft.total_odds.to_string())
            .bind(draft.potential_win)
            .bind(draft.selections.len() as u32)
            .bind(created_at)
            .execute(&mut *tx)
            .await;
            match inserted {
                Ok(done) => {
                    coupon_id = Some(done.last_insert_rowid());
                    break;
                }
                Err(e) if unique_violation(&e, "coupons.code") => {
                    debug!("coupon code {} already taken, regenerating", code);
                    continue;
                }
                Err(e) if unique_violation(&e, "coupons.request_id") => {
                    // Lost the race against a concurrent retry of the same
                    // request; hand back whatever the winner created.
                    drop(tx);
                    let row = query("SELECT id FROM coupons WHERE request_id = ?")
                        .bind(draft.request_id.as_str())
                        .fetch_one(&self.pool)
                        .await?;
                    let coupon = self.get_coupon(row.get("id")).await?;
                    return replay_for(coupon, &draft.user);
                }
                Err(e) => return Err(e.into()),
            }
        }
        let coupon_id = match coupon_id {
            Some(id) => id,
            None => return Err(Error::CodeAllocation),
        };
        for selection in &draft.selections {
            query(
                "INSERT INTO selections ( \
                    coupon, \
                    question, \
                    vote, \
                    odds) \
                    VALUES (?,?,?,?)",
            )
            .bind(coupon_id)
            .bind(selection.question)
            .bind(selection.vote.to_string())
            .bind(selection.odds.to_string())
            .execute(&mut *tx)
            .await?;
            insert_prediction(
                &mut tx,
                &Prediction {
                    user: draft.user.clone(),
                    question: selection.question,
                    vote: selection.vote,
                    odds: selection.odds,
                    amount: selection.prediction_amount,
                    potential_win: selection.prediction_win,
                    status: SelectionStatus::Pending,
                },
            )
            .await?;
        }
        let coupon = load_coupon(&mut tx, coupon_id).await?;
        tx.commit().await?;
        Ok(CreatedCoupon {
            coupon,
            replayed: false,
        })
    }

    async fn get_coupon(&self, coupon: RowId) -> Result<Coupon> {
        let mut conn = self.pool.acquire().await?;
        load_coupon(&mut conn, coupon).await
    }

    async fn list_user_coupons(&self, user: &UserId) -> Result<Vec<Coupon>> {
        let mut conn = self.pool.acquire().await?;
        let rows = query("SELECT id FROM coupons WHERE user = ? ORDER BY id")
            .bind(user)
            .fetch_all(&mut *conn)
            .await?;
        let mut coupons = Vec::with_capacity(rows.len());
        for row in rows {
            coupons.push(load_coupon(&mut conn, row.get("id")).await?);
        }
        Ok(coupons)
    }

    async fn pending_selections_by_question(&self, question: RowId) -> Result<Vec<Selection>> {
        let rows = query(
            "SELECT id, coupon, question, vote, odds, status \
                FROM selections WHERE question = ? AND status = 'Pending'",
        )
        .bind(question)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(selection_from_row).collect()
    }

    async fn settle_coupon(
        &self,
        coupon: RowId,
        question: RowId,
        outcome: QuestionOutcome,
    ) -> Result<Option<CouponSettled>> {
        let mut tx = self.pool.begin().await?;
        let legs = query(
            "SELECT id, vote FROM selections \
                WHERE coupon = ? AND question = ? AND status = 'Pending'",
        )
        .bind(coupon)
        .bind(question)
        .fetch_all(&mut *tx)
        .await?;
        for leg in legs {
            let vote = Vote::from_str(leg.get("vote"))?;
            let status = settlement::selection_outcome(vote, outcome);
            query("UPDATE selections SET status = ? WHERE id = ?")
                .bind(status.to_string())
                .bind(leg.get::<RowId, _>("id"))
                .execute(&mut *tx)
                .await?;
        }
        let current = load_coupon(&mut tx, coupon).await?;
        let correct = current
            .selections
            .iter()
            .filter(|s| s.status == SelectionStatus::Won)
            .count() as u32;
        if current.status.is_terminal() {
            // Late legs of an already-terminal coupon still count towards
            // the won tally; status and money stay frozen.
            query("UPDATE coupons SET correct_selections = ? WHERE id = ?")
                .bind(correct)
                .bind(coupon)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(None);
        }
        match settlement::resolve_coupon(current.stake, current.potential_win, &current.selections)?
        {
            settlement::CouponResolution::StillPending => {
                query("UPDATE coupons SET correct_selections = ? WHERE id = ?")
                    .bind(correct)
                    .bind(coupon)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(None)
            }
            settlement::CouponResolution::Terminal { status, payout } => {
                let updated = query(
                    "UPDATE coupons SET \
                        status = ?, \
                        correct_selections = ?, \
                        credited = ?, \
                        resolved_at = ? \
                        WHERE id = ? AND status = 'Pending'",
                )
                .bind(status.to_string())
                .bind(correct)
                .bind(payout)
                .bind(Utc::now().timestamp())
                .bind(coupon)
                .execute(&mut *tx)
                .await?;
                if updated.rows_affected() == 0 {
                    // A concurrent pass won the terminal transition; dropping
                    // the transaction rolls our leg updates back with it.
                    return Ok(None);
                }
                if payout > 0 {
                    apply_entry(&mut tx, &current.user, payout as i64, &payout_key(coupon))
                        .await?;
                }
                tx.commit().await?;
                Ok(Some(CouponSettled {
                    coupon,
                    user: current.user,
                    status,
                    credited: payout,
                }))
            }
        }
    }
}

#[async_trait]
impl PredictionTracker for SqliteStore {
    async fn upsert_prediction(&self, prediction: Prediction) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_prediction(&mut conn, &prediction).await
    }

    async fn vote_tally(&self, question: RowId) -> Result<(u32, u32)> {
        let yes = query(
            "SELECT COUNT(*) AS count FROM predictions \
                WHERE question = ? AND vote = 'Yes'",
        )
        .bind(question)
        .fetch_one(&self.pool)
        .await?;
        let no = query(
            "SELECT COUNT(*) AS count FROM predictions \
                WHERE question = ? AND vote = 'No'",
        )
        .bind(question)
        .fetch_one(&self.pool)
        .await?;
        Ok((yes.get("count"), no.get("count")))
    }

    async fn resolve_predictions(&self, question: RowId, outcome: QuestionOutcome) -> Result<u64> {
        let updated = match outcome {
            QuestionOutcome::Void => {
                query(
                    "UPDATE predictions SET status = 'Void' \
                        WHERE question = ? AND status = 'Pending'",
                )
                .bind(question)
                .execute(&self.pool)
                .await?
            }
            QuestionOutcome::Yes | QuestionOutcome::No => {
                let winning_vote = match outcome {
                    QuestionOutcome::Yes => Vote::Yes,
                    _ => Vote::No,
                };
                query(
                    "UPDATE predictions \
                        SET status = CASE WHEN vote = ? THEN 'Won' ELSE 'Lost' END \
                        WHERE question = ? AND status = 'Pending'",
                )
                .bind(winning_vote.to_string())
                .bind(question)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(updated.rows_affected())
    }
}

#[async_trait]
impl QuestionStore for SqliteStore {
    async fn create_question(&self, title: String) -> Result<RowId> {
        let done = query("INSERT INTO questions (title) VALUES (?)")
            .bind(title.as_str())
            .execute(&self.pool)
            .await?;
        Ok(done.last_insert_rowid())
    }

    async fn get_question(&self, question: RowId) -> Result<Question> {
        let row = query("SELECT id, title, status, outcome FROM questions WHERE id = ?")
            .bind(question)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::UnknownQuestion(question))?;
        question_from_row(&row)
    }

    async fn list_open_questions(&self) -> Result<Vec<Question>> {
        let rows = query(
            "SELECT id, title, status, outcome FROM questions \
                WHERE status = 'Open' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(question_from_row).collect()
    }

    async fn resolve_question(&self, question: RowId, outcome: QuestionOutcome) -> Result<()> {
        let status = match outcome {
            QuestionOutcome::Void => QuestionStatus::Voided,
            _ => QuestionStatus::Closed,
        };
        let updated = query(
            "UPDATE questions SET \
                status = ?, \
                outcome = ? \
                WHERE id = ? AND status = 'Open'",
        )
        .bind(status.to_string())
        .bind(outcome.to_string())
        .bind(question)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            let exists = query("SELECT id FROM questions WHERE id = ?")
                .bind(question)
                .fetch_optional(&self.pool)
                .await?;
            return match exists {
                Some(_) => Err(Error::AlreadyResolved(question)),
                None => Err(Error::UnknownQuestion(question)),
            };
        }
        Ok(())
    }
}
