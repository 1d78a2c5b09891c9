//! # Feature Normalizer
//! Maps a partial campaign/customer record onto the complete, canonically
//! ordered feature record the classifier was trained on.
//!
//! Every recognized attribute that the caller leaves out is filled with a
//! fixed default (the Bank Marketing dataset's most common profile). Pure, no
//! I/O, never fails. Unknown JSON keys are ignored by the deserializer.

use serde::{Deserialize, Serialize};

pub const DEFAULT_AGE: u32 = 30;
pub const DEFAULT_JOB: &str = "admin.";
pub const DEFAULT_MARITAL: &str = "single";
pub const DEFAULT_DURATION: u32 = 500;
pub const DEFAULT_CAMPAIGN: u32 = 1;
pub const DEFAULT_CONTACT: &str = "cellular";
pub const DEFAULT_MONTH: &str = "may";
pub const DEFAULT_EDUCATION: &str = "university.degree";
pub const DEFAULT_FLAG: &str = "no";
pub const DEFAULT_PDAYS: u32 = 999;
pub const DEFAULT_PREVIOUS: u32 = 0;
pub const DEFAULT_POUTCOME: &str = "nonexistent";
pub const DEFAULT_EMP_VAR_RATE: f64 = 1.1;
pub const DEFAULT_CONS_PRICE_IDX: f64 = 93.8;
pub const DEFAULT_CONS_CONF_IDX: f64 = -40.0;
pub const DEFAULT_EURIBOR3M: f64 = 4.857;
pub const DEFAULT_NR_EMPLOYED: f64 = 5191.0;
pub const DEFAULT_BUDGET: u64 = 10_000;

/// Canonical attribute order of a [`FeatureRecord`].
pub const ATTRIBUTES: [&str; 20] = [
    "age",
    "job",
    "marital",
    "duration",
    "campaign",
    "contact",
    "month",
    "education",
    "default",
    "housing",
    "loan",
    "pdays",
    "previous",
    "poutcome",
    "emp.var.rate",
    "cons.price.idx",
    "cons.conf.idx",
    "euribor3m",
    "nr.employed",
    "budget",
];

/// Partial input: any subset of the recognized attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignInput {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub job: Option<String>,
    #[serde(default)]
    pub marital: Option<String>,
    /// Last contact duration in seconds.
    #[serde(default)]
    pub duration: Option<u32>,
    /// Number of contacts performed during this campaign.
    #[serde(default)]
    pub campaign: Option<u32>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default, rename = "default")]
    pub credit_default: Option<String>,
    #[serde(default)]
    pub housing: Option<String>,
    #[serde(default)]
    pub loan: Option<String>,
    /// Days since the client was last contacted (999 = never).
    #[serde(default)]
    pub pdays: Option<u32>,
    #[serde(default)]
    pub previous: Option<u32>,
    #[serde(default)]
    pub poutcome: Option<String>,
    #[serde(default, rename = "emp.var.rate", alias = "emp_var_rate")]
    pub emp_var_rate: Option<f64>,
    #[serde(default, rename = "cons.price.idx", alias = "cons_price_idx")]
    pub cons_price_idx: Option<f64>,
    #[serde(default, rename = "cons.conf.idx", alias = "cons_conf_idx")]
    pub cons_conf_idx: Option<f64>,
    #[serde(default)]
    pub euribor3m: Option<f64>,
    #[serde(default, rename = "nr.employed", alias = "nr_employed")]
    pub nr_employed: Option<f64>,
    #[serde(default)]
    pub budget: Option<u64>,
}

/// A single attribute value after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

/// Complete feature record. Built once per request, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub age: u32,
    pub job: String,
    pub marital: String,
    pub duration: u32,
    pub campaign: u32,
    pub contact: String,
    pub month: String,
    pub education: String,
    #[serde(rename = "default")]
    pub credit_default: String,
    pub housing: String,
    pub loan: String,
    pub pdays: u32,
    pub previous: u32,
    pub poutcome: String,
    #[serde(rename = "emp.var.rate")]
    pub emp_var_rate: f64,
    #[serde(rename = "cons.price.idx")]
    pub cons_price_idx: f64,
    #[serde(rename = "cons.conf.idx")]
    pub cons_conf_idx: f64,
    pub euribor3m: f64,
    #[serde(rename = "nr.employed")]
    pub nr_employed: f64,
    /// Used for allocation only; the classifier never sees it.
    pub budget: u64,
}

/// Fills defaults for absent attributes.
pub struct FeatureNormalizer;

impl FeatureNormalizer {
    pub fn normalize(input: &CampaignInput) -> FeatureRecord {
        let text = |v: &Option<String>, d: &str| v.clone().unwrap_or_else(|| d.to_string());

        FeatureRecord {
            age: input.age.unwrap_or(DEFAULT_AGE),
            job: text(&input.job, DEFAULT_JOB),
            marital: text(&input.marital, DEFAULT_MARITAL),
            duration: input.duration.unwrap_or(DEFAULT_DURATION),
            campaign: input.campaign.unwrap_or(DEFAULT_CAMPAIGN),
            contact: text(&input.contact, DEFAULT_CONTACT),
            month: text(&input.month, DEFAULT_MONTH),
            education: text(&input.education, DEFAULT_EDUCATION),
            credit_default: text(&input.credit_default, DEFAULT_FLAG),
            housing: text(&input.housing, DEFAULT_FLAG),
            loan: text(&input.loan, DEFAULT_FLAG),
            pdays: input.pdays.unwrap_or(DEFAULT_PDAYS),
            previous: input.previous.unwrap_or(DEFAULT_PREVIOUS),
            poutcome: text(&input.poutcome, DEFAULT_POUTCOME),
            emp_var_rate: input.emp_var_rate.unwrap_or(DEFAULT_EMP_VAR_RATE),
            cons_price_idx: input.cons_price_idx.unwrap_or(DEFAULT_CONS_PRICE_IDX),
            cons_conf_idx: input.cons_conf_idx.unwrap_or(DEFAULT_CONS_CONF_IDX),
            euribor3m: input.euribor3m.unwrap_or(DEFAULT_EURIBOR3M),
            nr_employed: input.nr_employed.unwrap_or(DEFAULT_NR_EMPLOYED),
            budget: input.budget.unwrap_or(DEFAULT_BUDGET),
        }
    }
}

impl FeatureRecord {
    /// `(attribute, value)` pairs in [`ATTRIBUTES`] order.
    pub fn entries(&self) -> Vec<(&'static str, FeatureValue)> {
        use FeatureValue::{Categorical as C, Numeric as N};
        vec![
            ("age", N(self.age as f64)),
            ("job", C(self.job.clone())),
            ("marital", C(self.marital.clone())),
            ("duration", N(self.duration as f64)),
            ("campaign", N(self.campaign as f64)),
            ("contact", C(self.contact.clone())),
            ("month", C(self.month.clone())),
            ("education", C(self.education.clone())),
            ("default", C(self.credit_default.clone())),
            ("housing", C(self.housing.clone())),
            ("loan", C(self.loan.clone())),
            ("pdays", N(self.pdays as f64)),
            ("previous", N(self.previous as f64)),
            ("poutcome", C(self.poutcome.clone())),
            ("emp.var.rate", N(self.emp_var_rate)),
            ("cons.price.idx", N(self.cons_price_idx)),
            ("cons.conf.idx", N(self.cons_conf_idx)),
            ("euribor3m", N(self.euribor3m)),
            ("nr.employed", N(self.nr_employed)),
            ("budget", N(self.budget as f64)),
        ]
    }

    pub fn get(&self, attribute: &str) -> Option<FeatureValue> {
        self.entries()
            .into_iter()
            .find(|(name, _)| *name == attribute)
            .map(|(_, v)| v)
    }
}

impl From<&FeatureRecord> for CampaignInput {
    fn from(r: &FeatureRecord) -> Self {
        Self {
            age: Some(r.age),
            job: Some(r.job.clone()),
            marital: Some(r.marital.clone()),
            duration: Some(r.duration),
            campaign: Some(r.campaign),
            contact: Some(r.contact.clone()),
            month: Some(r.month.clone()),
            education: Some(r.education.clone()),
            credit_default: Some(r.credit_default.clone()),
            housing: Some(r.housing.clone()),
            loan: Some(r.loan.clone()),
            pdays: Some(r.pdays),
            previous: Some(r.previous),
            poutcome: Some(r.poutcome.clone()),
            emp_var_rate: Some(r.emp_var_rate),
            cons_price_idx: Some(r.cons_price_idx),
            cons_conf_idx: Some(r.cons_conf_idx),
            euribor3m: Some(r.euribor3m),
            nr_employed: Some(r.nr_employed),
            budget: Some(r.budget),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_follow_canonical_order() {
        let r = FeatureNormalizer::normalize(&CampaignInput::default());
        let names: Vec<&str> = r.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ATTRIBUTES.to_vec());
    }

    #[test]
    fn normalizing_a_full_record_is_identity() {
        let r = FeatureNormalizer::normalize(&CampaignInput {
            age: Some(41),
            job: Some("technician".into()),
            budget: Some(2500),
            ..Default::default()
        });
        let again = FeatureNormalizer::normalize(&CampaignInput::from(&r));
        assert_eq!(r, again);
    }
}
