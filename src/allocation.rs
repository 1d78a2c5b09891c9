//! # Allocation Policy
//! Pure, testable logic that maps `(success probability, budget, channel)` →
//! [`AllocationDecision`]. No I/O.
//!
//! Policy: a likely success (p > 0.5) puts 60% on the preferred channel and
//! 40% on a secondary bucket; otherwise 70% goes to a testing bucket on the
//! telephone fallback channel and 30% to a low-risk bucket. Each amount is the
//! truncated share of the budget; the remainder (at most one unit) is not
//! redistributed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Probability above which the preferred channel becomes primary.
pub const SUCCESS_THRESHOLD: f64 = 0.5;
/// Channel used when the campaign is unlikely to succeed.
pub const FALLBACK_CHANNEL: &str = "telephone";

const PRIMARY_SHARE_PCT: u64 = 60;
const SECONDARY_SHARE_PCT: u64 = 40;
const TESTING_SHARE_PCT: u64 = 70;
const LOW_RISK_SHARE_PCT: u64 = 30;

/// Budget bucket names as they appear in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Primary,
    Secondary,
    Testing,
    LowRisk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationDecision {
    /// Channel that receives the main spend.
    pub primary: String,
    pub budget_split: BTreeMap<Bucket, u64>,
}

impl AllocationDecision {
    pub fn total(&self) -> u64 {
        self.budget_split.values().sum()
    }
}

pub fn allocate(probability: f64, budget: u64, preferred_channel: &str) -> AllocationDecision {
    let (primary, shares) = if probability > SUCCESS_THRESHOLD {
        (
            preferred_channel.to_string(),
            [
                (Bucket::Primary, PRIMARY_SHARE_PCT),
                (Bucket::Secondary, SECONDARY_SHARE_PCT),
            ],
        )
    } else {
        (
            FALLBACK_CHANNEL.to_string(),
            [
                (Bucket::Testing, TESTING_SHARE_PCT),
                (Bucket::LowRisk, LOW_RISK_SHARE_PCT),
            ],
        )
    };

    let budget_split = shares
        .into_iter()
        .map(|(bucket, pct)| (bucket, share_of(budget, pct)))
        .collect();

    AllocationDecision {
        primary,
        budget_split,
    }
}

/// `budget * pct / 100`, truncated, without intermediate overflow.
fn share_of(budget: u64, pct: u64) -> u64 {
    ((budget as u128 * pct as u128) / 100) as u64
}
