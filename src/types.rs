use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One item category the buyer needs, e.g. "Office Chair" x10.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredItem {
    pub name: String,
    pub quantity: u32,
    /// Informational hint from upstream detection; the solver ignores it.
    pub target_material: Option<String>,
}

impl RequiredItem {
    pub fn new(name: &str, quantity: u32) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            target_material: None,
        }
    }

    pub fn with_material(mut self, material: &str) -> Self {
        self.target_material = Some(material.to_string());
        self
    }
}

/// One purchasable option within a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub name: String,
    pub price: f64,
    pub delivery_days: u32,
    pub quality_score: f64,
    pub url: String,
    /// Presentation marker set by `search`; never read by the solver.
    #[serde(default)]
    pub selected: bool,
}

impl Offer {
    pub fn new(name: &str, price: f64, delivery_days: u32, quality_score: f64, url: &str) -> Self {
        Self {
            name: name.to_string(),
            price,
            delivery_days,
            quality_score,
            url: url.to_string(),
            selected: false,
        }
    }
}

/// Candidate offers grouped by category name. The `Vec` order within a
/// category is meaningful: it decides ties. Category processing order comes
/// from the `RequiredItem` slice, not from this map.
pub type OfferSet = BTreeMap<String, Vec<Offer>>;

/// A complete assignment of one offer per (non-empty) category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub selections: BTreeMap<String, Offer>,
    pub total_cost: f64,
    pub max_delivery_days: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationOutcome {
    Agreed,
    Declined,
    NoPriceInReply,
    PartnerUnavailable,
}

/// One audit entry for a single negotiation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationStep {
    pub category: String,
    pub offer: String,
    pub old_price: f64,
    pub new_price: f64,
    pub outcome: NegotiationOutcome,
    pub note: String,
}

/// Append-only audit log of the negotiation phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NegotiationRecord {
    pub steps: Vec<NegotiationStep>,
}

impl NegotiationRecord {
    pub fn push(&mut self, step: NegotiationStep) {
        self.steps.push(step);
    }

    pub fn agreed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome == NegotiationOutcome::Agreed)
            .count()
    }
}

/// Before/after comparison produced by the full negotiation process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    pub original: Solution,
    pub negotiated: Solution,
    pub savings_amount: f64,
    pub savings_percentage: f64,
    pub record: NegotiationRecord,
    pub generated_at: DateTime<Utc>,
}
