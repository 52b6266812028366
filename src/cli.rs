#![allow(unused)]
use std::str::FromStr;

use anyhow::Result;
use api::*;
use clap::{Parser, Subcommand};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;

use crate::client::Client;

mod api;
mod client;
mod error;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,
}
#[derive(Subcommand)]
enum Commands {
    CreateUser {
        #[arg(short, long)]
        user: UserId,
    },
    Deposit {
        #[arg(short, long)]
        user: UserId,
        #[arg(short, long)]
        amount: Credits,
    },
    Balance {
        #[arg(short, long)]
        user: UserId,
    },
    NewQuestion {
        #[arg(short, long)]
        title: String,
    },
    GetQuestions,
    ResolveQuestion {
        #[arg(short, long)]
        question: RowId,
        #[arg(short, long, value_parser = parse_outcome)]
        outcome: QuestionOutcome,
    },
    Vote {
        #[arg(short, long)]
        user: UserId,
        #[arg(short, long)]
        question: RowId,
        #[arg(short, long, value_parser = parse_vote)]
        vote: Vote,
        #[arg(short, long)]
        odds: Decimal,
    },
    NewCoupon {
        #[arg(short, long)]
        user: UserId,
        #[arg(short, long)]
        stake: Credits,
        /// Selections as question:vote:odds, e.g. 3:yes:1.85
        #[arg(short = 'l', long = "leg", value_parser = parse_selection)]
        legs: Vec<SelectionRequest>,
    },
    GetCoupon {
        #[arg(short, long)]
        coupon: RowId,
    },
    GetCoupons {
        #[arg(short, long)]
        user: UserId,
    },
    Tally {
        #[arg(short, long)]
        question: RowId,
    },
}

fn parse_vote(s: &str) -> std::result::Result<Vote, String> {
    match s.to_ascii_lowercase().as_str() {
        "yes" => Ok(Vote::Yes),
        "no" => Ok(Vote::No),
        other => Err(format!("expected yes or no, got {}", other)),
    }
}
fn parse_outcome(s: &str) -> std::result::Result<QuestionOutcome, String> {
    match s.to_ascii_lowercase().as_str() {
        "yes" => Ok(QuestionOutcome::Yes),
        "no" => Ok(QuestionOutcome::No),
        "void" => Ok(QuestionOutcome::Void),
        other => Err(format!("expected yes, no or void, got {}", other)),
    }
}
fn parse_selection(s: &str) -> std::result::Result<SelectionRequest, String> {
    let mut parts = s.splitn(3, ':');
    let question = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| format!("missing question id in {}", s))?;
    let vote = parse_vote(parts.next().ok_or_else(|| format!("missing vote in {}", s))?)?;
    let odds = parts
        .next()
        .and_then(|p| Decimal::from_str(p).ok())
        .filter(|odds| *odds > Decimal::ZERO)
        .ok_or_else(|| format!("missing or invalid odds in {}", s))?;
    Ok(SelectionRequest {
        question,
        vote,
        odds,
    })
}

fn request_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let client = Client::new(cli.url);

    match cli.command {
        Commands::CreateUser { user } => {
            client.create_user(&user).await?;
            println!("Created user {}", user);
        }
        Commands::Deposit { user, amount } => {
            let balance = client.deposit(&user, amount, &request_id()).await?;
            println!("Balance for {}: {} credits", user, balance);
        }
        Commands::Balance { user } => {
            let balance = client.get_balance(&user).await?;
            println!("Balance for {}: {} credits", user, balance);
        }
        Commands::NewQuestion { title } => {
            let id = client.new_question(title).await?;
            println!("Created question {}", id);
        }
        Commands::GetQuestions => {
            let questions = client.get_questions().await?;
            println!("{:#?}", questions);
        }
        Commands::ResolveQuestion { question, outcome } => {
            client.resolve_question(question, outcome).await?;
            println!("Resolved question {} as {}", question, outcome);
        }
        Commands::Vote {
            user,
            question,
            vote,
            odds,
        } => {
            client.vote(&user, question, vote, odds).await?;
            println!("Recorded {} vote on question {}", vote, question);
        }
        Commands::NewCoupon { user, stake, legs } => {
            let request = CreateCouponRequest {
                user,
                selections: legs,
                stake,
                request_id: request_id(),
            };
            let coupon = client.new_coupon(request).await?;
            println!(
                "Coupon {} at odds {} pays {} if every leg wins",
                coupon.code, coupon.total_odds, coupon.potential_win
            );
        }
        Commands::GetCoupon { coupon } => {
            let coupon = client.get_coupon(coupon).await?;
            println!("{:#?}", coupon);
        }
        Commands::GetCoupons { user } => {
            let coupons = client.get_user_coupons(&user).await?;
            println!("{:#?}", coupons);
        }
        Commands::Tally { question } => {
            let tally = client.get_vote_tally(question).await?;
            println!("Yes: {} votes | No: {} votes", tally.yes, tally.no);
        }
    }
    Ok(())
}
