use chrono::NaiveDate;
use garde::Validate;
use serde::{Deserialize, Serialize};

use casting_core::HttpError;

const MAX_AGE: u32 = 150;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: u64,
    pub name: String,
    pub age: u32,
    pub gender: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewActor {
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(range(max = MAX_AGE))]
    pub age: u32,
    #[garde(length(min = 1))]
    pub gender: String,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ActorPatch {
    #[garde(length(min = 1))]
    pub name: Option<String>,
    #[garde(range(max = MAX_AGE))]
    pub age: Option<u32>,
    #[garde(length(min = 1))]
    pub gender: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub country: String,
    pub release_date: NaiveDate,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewMovie {
    #[garde(length(min = 1))]
    pub title: String,
    #[garde(length(min = 1))]
    pub country: String,
    #[garde(skip)]
    pub release_date: NaiveDate,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct MoviePatch {
    #[garde(length(min = 1))]
    pub title: Option<String>,
    #[garde(length(min = 1))]
    pub country: Option<String>,
    #[garde(skip)]
    pub release_date: Option<NaiveDate>,
}

/// Collapse a validation report into the message of a 422 response,
/// one `field: reason` entry per failure.
pub fn unprocessable(report: &garde::Report) -> HttpError {
    let message = report
        .iter()
        .map(|(path, error)| format!("{path}: {}", error.message()))
        .collect::<Vec<_>>()
        .join("; ");
    HttpError::Unprocessable(message)
}
