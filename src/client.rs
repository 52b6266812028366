use anyhow::{bail, Result};
use rust_decimal::Decimal;

use crate::api::*;

pub struct Client {
    url: String,
    client: reqwest::Client,
}
impl Client {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::new();
        Self { url, client }
    }
    pub async fn create_user(&self, user: &UserId) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone() + "/create_user")
            .json(&CreateUserRequest { user: user.clone() })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(())
    }
    pub async fn deposit(&self, user: &UserId, amount: Credits, request_id: &str) -> Result<Credits> {
        let response = self
            .client
            .post(self.url.clone() + "/deposit")
            .json(&DepositRequest {
                user: user.clone(),
                amount,
                request_id: request_id.to_string(),
            })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<DepositResponse>().await?.balance)
    }
    pub async fn get_balance(&self, user: &UserId) -> Result<Credits> {
        let response = self
            .client
            .post(self.url.clone() + "/get_balance")
            .json(&UserRequest { user: user.clone() })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<Credits>().await?)
    }
    pub async fn new_coupon(&self, request: CreateCouponRequest) -> Result<Coupon> {
        let response = self
            .client
            .post(self.url.clone() + "/new_coupon")
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<Coupon>().await?)
    }
    pub async fn get_coupon(&self, coupon: RowId) -> Result<Coupon> {
        let response = self
            .client
            .post(self.url.clone() + "/get_coupon")
            .json(&CouponRequest { coupon })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<Coupon>().await?)
    }
    pub async fn get_user_coupons(&self, user: &UserId) -> Result<Vec<Coupon>> {
        let response = self
            .client
            .post(self.url.clone() + "/get_user_coupons")
            .json(&UserRequest { user: user.clone() })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<Vec<Coupon>>().await?)
    }
    pub async fn new_question(&self, title: String) -> Result<RowId> {
        let response = self
            .client
            .post(self.url.clone() + "/new_question")
            .json(&NewQuestionRequest { title })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<RowId>().await?)
    }
    pub async fn get_question(&self, question: RowId) -> Result<Question> {
        let response = self
            .client
            .post(self.url.clone() + "/get_question")
            .json(&QuestionRequest { question })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<Question>().await?)
    }
    pub async fn get_questions(&self) -> Result<Vec<Question>> {
        let response = self
            .client
            .get(self.url.clone() + "/get_questions")
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<Vec<Question>>().await?)
    }
    pub async fn resolve_question(&self, question: RowId, outcome: QuestionOutcome) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone() + "/resolve_question")
            .json(&ResolveQuestionRequest { question, outcome })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(())
    }
    pub async fn vote(
        &self,
        user: &UserId,
        question: RowId,
        vote: Vote,
        odds: Decimal,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone() + "/vote")
            .json(&VoteRequest {
                user: user.clone(),
                question,
                vote,
                odds,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(())
    }
    pub async fn get_vote_tally(&self, question: RowId) -> Result<VoteTallyResponse> {
        let response = self
            .client
            .post(self.url.clone() + "/get_vote_tally")
            .json(&QuestionRequest { question })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<VoteTallyResponse>().await?)
    }
}
