use serde::{Deserialize, Serialize};

use super::*;

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct DepositResponse {
    pub balance: Credits,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct VoteTallyResponse {
    pub yes: u32,
    pub no: u32,
}
