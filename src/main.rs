use crate::api::*;
use crate::db::SqliteStore;
use crate::parlay::Parlay;
use anyhow::Result;
use axum::extract::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use axum_macros::debug_handler;
use clap::Parser;
use env_logger::{Builder, WriteStyle};
use log::{debug, error, warn, LevelFilter};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

mod api;
#[cfg(test)]
mod client;
mod db;
mod error;
mod odds;
mod parlay;
mod settlement;

struct AppState {
    parlay: Arc<Parlay>,
    events: mpsc::Sender<QuestionResolved>,
}

#[debug_handler]
async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .parlay
        .create_user(&request.user)
        .await
        .map_err(map_err_and_code)?;
    debug!("Created user {}", request.user);
    Ok(StatusCode::CREATED)
}
#[debug_handler]
async fn deposit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, (StatusCode, String)> {
    let balance = state
        .parlay
        .deposit(&request.user, request.amount, &request.request_id)
        .await
        .map_err(map_err_and_code)?;
    debug!(
        "Deposited {} credits for user {}, balance now {}",
        request.amount, request.user, balance
    );
    Ok(Json(DepositResponse { balance }))
}
async fn get_balance(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UserRequest>,
) -> Result<Json<Credits>, (StatusCode, String)> {
    let balance = state
        .parlay
        .balance(&request.user)
        .await
        .map_err(map_err_and_code)?;
    Ok(Json(balance))
}
#[debug_handler]
async fn new_coupon(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Coupon>), (StatusCode, String)> {
    let created = state
        .parlay
        .create_coupon(
            &request.user,
            request.selections,
            request.stake,
            &request.request_id,
        )
        .await
        .map_err(map_err_and_code)?;
    let code = if created.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((code, Json(created.coupon)))
}
async fn get_coupon(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CouponRequest>,
) -> Result<Json<Coupon>, (StatusCode, String)> {
    let coupon = state
        .parlay
        .get_coupon(request.coupon)
        .await
        .map_err(map_err_and_code)?;
    Ok(Json(coupon))
}
async fn get_user_coupons(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UserRequest>,
) -> Result<Json<Vec<Coupon>>, (StatusCode, String)> {
    let coupons = state
        .parlay
        .list_user_coupons(&request.user)
        .await
        .map_err(map_err_and_code)?;
    Ok(Json(coupons))
}
async fn new_question(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewQuestionRequest>,
) -> Result<(StatusCode, Json<RowId>), (StatusCode, String)> {
    let id = state
        .parlay
        .create_question(request.title.clone())
        .await
        .map_err(map_err_and_code)?;
    debug!("Created question {}: {}", id, request.title);
    Ok((StatusCode::CREATED, id.into()))
}
async fn get_question(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<Question>, (StatusCode, String)> {
    let question = state
        .parlay
        .get_question(request.question)
        .await
        .map_err(map_err_and_code)?;
    Ok(Json(question))
}
async fn get_questions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Question>>, (StatusCode, String)> {
    let questions = state
        .parlay
        .list_open_questions()
        .await
        .map_err(map_err_and_code)?;
    Ok(Json(questions))
}
#[debug_handler]
async fn resolve_question(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResolveQuestionRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .parlay
        .resolve_question(request.question, request.outcome)
        .await
        .map_err(map_err_and_code)?;
    debug!(
        "Question {} resolved as {}",
        request.question, request.outcome
    );
    let event = QuestionResolved {
        question: request.question,
        outcome: request.outcome,
    };
    state
        .events
        .send(event)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}
async fn vote(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VoteRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .parlay
        .cast_vote(&request.user, request.question, request.vote, request.odds)
        .await
        .map_err(map_err_and_code)?;
    debug!(
        "Recorded {} vote on question {} for user {}",
        request.vote, request.question, request.user
    );
    Ok(StatusCode::CREATED)
}
async fn get_vote_tally(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<VoteTallyResponse>, (StatusCode, String)> {
    let (yes, no) = state
        .parlay
        .vote_tally(request.question)
        .await
        .map_err(map_err_and_code)?;
    Ok(Json(VoteTallyResponse { yes, no }))
}

#[derive(Parser)]
struct Args {
    #[arg(short, long, default_value_t = 8081)]
    port: u16,
    #[arg(short, long)]
    db: Option<String>,
    #[arg(short, long, default_value_t = 8)]
    workers: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    Builder::default()
        .filter_level(LevelFilter::Debug)
        .write_style(WriteStyle::Always)
        .init();
    let cli = Args::parse();
    let (_port, handle) = run_server(Some(cli.port), cli.db, cli.workers).await;
    handle.await?;
    Ok(())
}

async fn run_server(
    port: Option<u16>,
    db_conn: Option<String>,
    workers: usize,
) -> (u16, JoinHandle<()>) {
    let store = SqliteStore::new(db_conn).await.unwrap();
    let parlay = Arc::new(Parlay::new(Box::new(store), workers));

    // Question-lifecycle events queue up here and settle in the background.
    let (events_tx, mut events_rx) = mpsc::channel::<QuestionResolved>(1024);
    {
        let parlay = parlay.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match parlay.handle_question_resolved(event).await {
                    Ok(report) => debug!(
                        "question {} resolved {}: {} coupons touched, {} settled, {} failed",
                        report.question,
                        report.outcome,
                        report.touched,
                        report.settled.len(),
                        report.failed.len()
                    ),
                    Err(e) => error!(
                        "settlement run for question {} failed: {}",
                        event.question, e
                    ),
                }
            }
        });
    }
    // Stand-in for the external notification collaborator.
    {
        let mut settled_rx = parlay.subscribe_settlements();
        tokio::spawn(async move {
            loop {
                match settled_rx.recv().await {
                    Ok(settled) => debug!(
                        "notify user {}: coupon {} is {} (+{} credits)",
                        settled.user, settled.coupon, settled.status, settled.credited
                    ),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("notification stream lagged, {} events dropped", skipped)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
    let state = Arc::new(AppState {
        parlay,
        events: events_tx,
    });
    let app = Router::new()
        .route("/create_user", post(create_user))
        .route("/deposit", post(deposit))
        .route("/get_balance", post(get_balance))
        .route("/new_coupon", post(new_coupon))
        .route("/get_coupon", post(get_coupon))
        .route("/get_user_coupons", post(get_user_coupons))
        .route("/new_question", post(new_question))
        .route("/get_question", post(get_question))
        .route("/get_questions", get(get_questions))
        .route("/resolve_question", post(resolve_question))
        .route("/vote", post(vote))
        .route("/get_vote_tally", post(get_vote_tally))
        .with_state(state);

    let addr = "127.0.0.1:".to_string() + port.unwrap_or(0).to_string().as_str();
    let server = axum::Server::bind(&addr.parse().unwrap()).serve(app.into_make_service());
    let port = server.local_addr().port();
    debug!("Listening on {}", server.local_addr());
    let handle = tokio::spawn(async move {
        server.await.unwrap();
    });
    (port, handle)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::Client;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[tokio::test]
    async fn coupon_lifecycle_over_http() {
        let (port, _) = run_server(None, None, 4).await;
        let client = Client::new("http://127.0.0.1:".to_string() + port.to_string().as_str());
        let alice: UserId = "alice".to_string();

        client.create_user(&alice).await.unwrap();
        assert_eq!(client.deposit(&alice, 1000, "d-1").await.unwrap(), 1000);
        // A retried deposit applies once.
        assert_eq!(client.deposit(&alice, 1000, "d-1").await.unwrap(), 1000);

        let q1 = client
            .new_question("Will it rain at the derby?".to_string())
            .await
            .unwrap();
        let q2 = client
            .new_question("Will the favourite win?".to_string())
            .await
            .unwrap();
        assert_eq!(client.get_questions().await.unwrap().len(), 2);

        let request = CreateCouponRequest {
            user: alice.clone(),
            selections: vec![
                SelectionRequest {
                    question: q1,
                    vote: Vote::Yes,
                    odds: dec!(1.5),
                },
                SelectionRequest {
                    question: q2,
                    vote: Vote::Yes,
                    odds: dec!(2.0),
                },
            ],
            stake: 100,
            request_id: "r-1".to_string(),
        };
        let coupon = client.new_coupon(request.clone()).await.unwrap();
        assert_eq!(coupon.total_odds, dec!(3.00));
        assert_eq!(coupon.potential_win, 300);
        assert_eq!(coupon.status, CouponStatus::Pending);
        assert_eq!(client.get_balance(&alice).await.unwrap(), 900);

        // A retried submission returns the same coupon without charging.
        let replay = client.new_coupon(request).await.unwrap();
        assert_eq!(replay.id, coupon.id);
        assert_eq!(replay.code, coupon.code);
        assert_eq!(client.get_balance(&alice).await.unwrap(), 900);

        client.resolve_question(q1, QuestionOutcome::Yes).await.unwrap();
        client.resolve_question(q2, QuestionOutcome::Yes).await.unwrap();
        let resolved = client.get_question(q1).await.unwrap();
        assert_eq!(resolved.status, QuestionStatus::Closed);
        assert_eq!(resolved.outcome, Some(QuestionOutcome::Yes));

        // Settlement runs on the background consumer; poll until terminal.
        let mut settled = None;
        for _ in 0..50 {
            let current = client.get_coupon(coupon.id).await.unwrap();
            if current.status.is_terminal() {
                settled = Some(current);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let settled = settled.expect("coupon never settled");
        assert_eq!(settled.status, CouponStatus::Won);
        assert_eq!(settled.credited, Some(300));
        assert_eq!(settled.correct_selections, 2);
        assert_eq!(client.get_balance(&alice).await.unwrap(), 1200);

        let coupons = client.get_user_coupons(&alice).await.unwrap();
        assert_eq!(coupons.len(), 1);
    }

    #[tokio::test]
    async fn votes_tally_over_http() {
        let (port, _) = run_server(None, None, 4).await;
        let client = Client::new("http://127.0.0.1:".to_string() + port.to_string().as_str());

        let question = client
            .new_question("Will the incumbent concede?".to_string())
            .await
            .unwrap();
        for user in ["bob", "carol"] {
            let user: UserId = user.to_string();
            client.create_user(&user).await.unwrap();
            client.vote(&user, question, Vote::Yes, dec!(1.8)).await.unwrap();
        }
        let dave: UserId = "dave".to_string();
        client.create_user(&dave).await.unwrap();
        client.vote(&dave, question, Vote::No, dec!(2.2)).await.unwrap();
        // A second vote from the same user is refused.
        assert!(client.vote(&dave, question, Vote::No, dec!(2.2)).await.is_err());

        let tally = client.get_vote_tally(question).await.unwrap();
        assert_eq!(tally, VoteTallyResponse { yes: 2, no: 1 });
    }
}
