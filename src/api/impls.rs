use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use anyhow::bail;

use super::*;

impl Display for Vote {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Yes => "Yes",
            Self::No => "No",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for Vote {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Yes" => Ok(Self::Yes),
            "No" => Ok(Self::No),
            e => bail!("Couldn't deserialize to Vote: {}", e),
        }
    }
}
impl Display for QuestionOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Yes => "Yes",
            Self::No => "No",
            Self::Void => "Void",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for QuestionOutcome {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Yes" => Ok(Self::Yes),
            "No" => Ok(Self::No),
            "Void" => Ok(Self::Void),
            e => bail!("Couldn't deserialize to QuestionOutcome: {}", e),
        }
    }
}
impl Display for QuestionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::Voided => "Voided",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for QuestionStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Self::Open),
            "Closed" => Ok(Self::Closed),
            "Voided" => Ok(Self::Voided),
            e => bail!("Couldn't deserialize to QuestionStatus: {}", e),
        }
    }
}
impl Display for SelectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Pending => "Pending",
            Self::Won => "Won",
            Self::Lost => "Lost",
            Self::Void => "Void",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for SelectionStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Won" => Ok(Self::Won),
            "Lost" => Ok(Self::Lost),
            "Void" => Ok(Self::Void),
            e => bail!("Couldn't deserialize to SelectionStatus: {}", e),
        }
    }
}
impl Display for CouponStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Pending => "Pending",
            Self::Won => "Won",
            Self::Lost => "Lost",
            Self::PartiallyWon => "PartiallyWon",
            Self::Cancelled => "Cancelled",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for CouponStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Won" => Ok(Self::Won),
            "Lost" => Ok(Self::Lost),
            "PartiallyWon" => Ok(Self::PartiallyWon),
            "Cancelled" => Ok(Self::Cancelled),
            e => bail!("Couldn't deserialize to CouponStatus: {}", e),
        }
    }
}
