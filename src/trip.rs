//! Trip metadata, budget tiers and the interview question list

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Party size bounds accepted by the start form
pub const MIN_PARTY_SIZE: u32 = 1;
pub const MAX_PARTY_SIZE: u32 = 20;

/// Interview questions asked after the trip details are collected
const DEFAULT_QUESTIONS: &[&str] = &[
    "What's the primary purpose of your trip? (relaxation and personal time, family retreat, couple's retreat, adventure, etc.)",
    "What activities interest you? (sightseeing, trekking, cultural experiences, etc.)",
    "Any dietary preferences we should consider?",
    "Preferred accommodation type? (hotel, hostel, air-bnb, resort, etc.)",
    "Do you want any specific thing in your accomodation? (swimming pool, gym, spa, etc.)",
    "Preferred accommodation location? (city center, quiet area, next to nature, specific landmark, etc.)",
];

/// Input that cannot start or advance an interview.
///
/// These never reach the user as failures: the offending action is simply
/// not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("destination is required")]
    EmptyDestination,
    #[error("end date must not be before start date")]
    InvalidDateRange,
    #[error("number of people must be between 1 and 20")]
    PartySizeOutOfRange,
    #[error("answer is empty")]
    EmptyAnswer,
}

/// Spending level for the trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BudgetTier {
    #[serde(rename = "Low Budget")]
    #[default]
    Low,
    #[serde(rename = "Low To Moderate")]
    LowToModerate,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Moderate To High")]
    ModerateToHigh,
    #[serde(rename = "Luxury")]
    Luxury,
}

impl BudgetTier {
    /// All tiers in the order they are offered
    pub const ALL: [BudgetTier; 5] = [
        BudgetTier::Low,
        BudgetTier::LowToModerate,
        BudgetTier::Moderate,
        BudgetTier::ModerateToHigh,
        BudgetTier::Luxury,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BudgetTier::Low => "Low Budget",
            BudgetTier::LowToModerate => "Low To Moderate",
            BudgetTier::Moderate => "Moderate",
            BudgetTier::ModerateToHigh => "Moderate To High",
            BudgetTier::Luxury => "Luxury",
        }
    }
}

impl std::fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Basic trip details captured when an interview starts.
///
/// Only constructible through [`TripMetadata::new`], so every instance has a
/// non-empty destination, an ordered date range and a party size in range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripMetadata {
    destination: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    party_size: u32,
    budget: BudgetTier,
}

impl TripMetadata {
    pub fn new(
        destination: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        party_size: u32,
        budget: BudgetTier,
    ) -> Result<Self, ValidationError> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(ValidationError::EmptyDestination);
        }
        if end_date < start_date {
            return Err(ValidationError::InvalidDateRange);
        }
        if !(MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&party_size) {
            return Err(ValidationError::PartySizeOutOfRange);
        }
        Ok(Self {
            destination: destination.to_string(),
            start_date,
            end_date,
            party_size,
            budget,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    #[allow(dead_code)] // Accessor for API completeness
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    #[allow(dead_code)] // Accessor for API completeness
    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn party_size(&self) -> u32 {
        self.party_size
    }

    pub fn budget(&self) -> BudgetTier {
        self.budget
    }

    /// Inclusive number of days between start and end
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Date range as shown to the model, e.g. `Jun 01 to Jun 05`
    pub fn formatted_dates(&self) -> String {
        format!(
            "{} to {}",
            self.start_date.format("%b %d"),
            self.end_date.format("%b %d")
        )
    }

    /// Metadata as `(key, value)` pairs, in the order they lead the prompt
    pub fn response_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Destination", self.destination.clone()),
            ("Dates", self.formatted_dates()),
            ("Duration", format!("{} days", self.duration_days())),
            ("Budget", self.budget.label().to_string()),
            ("Number of People", self.party_size.to_string()),
        ]
    }

    /// Opening assistant message for a fresh interview
    pub fn greeting(&self, first_question: &str) -> String {
        format!(
            "Hello! Let's plan your {}-day trip to {}!\n{first_question}",
            self.duration_days(),
            self.destination
        )
    }
}

/// Ordered, immutable list of interview questions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionList {
    questions: Arc<[String]>,
}

#[allow(clippy::len_without_is_empty)] // Never empty by construction
impl QuestionList {
    /// Build a custom list. Returns `None` for an empty list, since an
    /// interview needs at least one question to have a first step.
    #[allow(dead_code)] // Only the built-in list is served today
    pub fn new(questions: Vec<String>) -> Option<Self> {
        if questions.is_empty() {
            return None;
        }
        Some(Self {
            questions: questions.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.questions.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(String::as_str)
    }
}

impl Default for QuestionList {
    fn default() -> Self {
        Self {
            questions: DEFAULT_QUESTIONS.iter().map(|q| (*q).to_string()).collect(),
        }
    }
}
