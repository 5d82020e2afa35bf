//! End-to-end procurement flow: baseline solve, price negotiation on the
//! budget-heavy picks, re-solve, and a before/after report with an audit
//! trail. Partner calls are sequential and paced; every partner failure
//! degrades to "keep the original price", never to a failed request.

pub mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::scoring::PreferenceWeights;
use crate::solver::{solve, Pins};
use crate::types::{
    FinalReport, NegotiationOutcome, NegotiationRecord, NegotiationStep, Offer, OfferSet,
    RequiredItem, Solution,
};
use self::session::NegotiationSession;

/// Tunable negotiation policy; the threshold and pacing are configuration,
/// not invariants.
#[derive(Debug, Clone)]
pub struct NegotiationPolicy {
    /// A selection is worth negotiating once its share of total cost exceeds
    /// this fraction.
    pub target_share_threshold: f64,
    /// Minimum gap between consecutive partner calls (partner rate ceiling).
    /// Applied between every two calls the orchestrator issues; the
    /// vendor-lookup-or-create round trip inside `start_conversation` is
    /// partner-side framing the session paces on its own if required.
    pub min_call_interval: Duration,
    /// Per-call deadline; a timeout counts as a failed negotiation.
    pub call_timeout: Duration,
}

impl Default for NegotiationPolicy {
    fn default() -> Self {
        Self {
            target_share_threshold: 0.10,
            min_call_interval: Duration::from_millis(1500),
            call_timeout: Duration::from_secs(20),
        }
    }
}

pub struct Orchestrator {
    session: Arc<dyn NegotiationSession>,
    policy: NegotiationPolicy,
}

impl Orchestrator {
    pub fn new(session: Arc<dyn NegotiationSession>, policy: NegotiationPolicy) -> Self {
        Self { session, policy }
    }

    /// Baseline solve returning every candidate with the chosen ones flagged
    /// for display.
    pub fn search(
        items: &[RequiredItem],
        offers: &OfferSet,
        weights: &PreferenceWeights,
        budget: f64,
    ) -> Result<Option<(Solution, OfferSet)>> {
        let Some(solution) = solve(items, offers, weights, budget, None)? else {
            return Ok(None);
        };
        let mut annotated = offers.clone();
        for (category, chosen) in &solution.selections {
            if let Some(candidates) = annotated.get_mut(category) {
                for offer in candidates {
                    offer.selected = offer.name == chosen.name;
                }
            }
        }
        Ok(Some((solution, annotated)))
    }

    /// Solve with caller pins, letting an operator lock in accepted prices
    /// and re-balance only the remaining categories.
    pub fn recalculate(
        items: &[RequiredItem],
        offers: &OfferSet,
        weights: &PreferenceWeights,
        budget: f64,
        pins: &Pins,
    ) -> Result<Option<Solution>> {
        solve(items, offers, weights, budget, Some(pins))
    }

    pub async fn run_full_process(
        &self,
        items: &[RequiredItem],
        offers: &OfferSet,
        weights: &PreferenceWeights,
        budget: f64,
    ) -> Result<Option<FinalReport>> {
        let Some(original) = solve(items, offers, weights, budget, None)? else {
            info!("no baseline plan fits the budget, nothing to negotiate");
            return Ok(None);
        };
        info!(cost = original.total_cost, "baseline plan found");

        // Required-item order keeps the target list deterministic.
        let mut targets: Vec<(&RequiredItem, Offer)> = Vec::new();
        for item in items {
            let Some(chosen) = original.selections.get(&item.name) else {
                continue;
            };
            let share = if original.total_cost > 0.0 {
                chosen.price * f64::from(item.quantity) / original.total_cost
            } else {
                0.0
            };
            if share > self.policy.target_share_threshold {
                targets.push((item, chosen.clone()));
            }
        }
        if targets.is_empty() {
            info!("no selection crosses the negotiation threshold");
        }

        // Prices are negotiated against a private copy so the caller's offer
        // set is never mutated.
        let mut negotiated_offers = offers.clone();
        let mut record = NegotiationRecord::default();
        for (idx, (item, offer)) in targets.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.policy.min_call_interval).await;
            }
            let step = self.negotiate_one(&item.name, offer).await;
            if step.outcome == NegotiationOutcome::Agreed {
                apply_price(&mut negotiated_offers, &item.name, &offer.name, step.new_price);
            }
            record.push(step);
        }

        // Re-solving without pins may pick a different offer if negotiation
        // shifted the field.
        let negotiated = match solve(items, &negotiated_offers, weights, budget, None)? {
            Some(solution) => solution,
            None => {
                warn!("re-optimization found no plan, keeping the baseline");
                original.clone()
            }
        };

        let savings_amount = original.total_cost - negotiated.total_cost;
        let savings_percentage = if original.total_cost > 0.0 {
            savings_amount / original.total_cost * 100.0
        } else {
            0.0
        };
        info!(
            savings = savings_amount,
            agreed = record.agreed_count(),
            "negotiation phase complete"
        );

        Ok(Some(FinalReport {
            original,
            negotiated,
            savings_amount,
            savings_percentage,
            record,
            generated_at: Utc::now(),
        }))
    }

    async fn negotiate_one(&self, category: &str, offer: &Offer) -> NegotiationStep {
        let step = |outcome, new_price, note: String| NegotiationStep {
            category: category.to_string(),
            offer: offer.name.clone(),
            old_price: offer.price,
            new_price,
            outcome,
            note,
        };

        let opening = format!(
            "We are ordering '{}' at ${:.2} per unit. Can you offer a better price?",
            offer.name, offer.price
        );

        let conversation = tokio::time::timeout(
            self.policy.call_timeout,
            self.session.start_conversation(&offer.name),
        )
        .await;
        let conversation_id = match conversation {
            Ok(Ok(id)) => id,
            Ok(Err(err)) => {
                warn!(category, offer = %offer.name, %err, "partner unavailable");
                return step(
                    NegotiationOutcome::PartnerUnavailable,
                    offer.price,
                    format!("could not reach partner: {err}"),
                );
            }
            Err(_) => {
                warn!(category, offer = %offer.name, "partner call timed out");
                return step(
                    NegotiationOutcome::PartnerUnavailable,
                    offer.price,
                    "partner call timed out".to_string(),
                );
            }
        };

        tokio::time::sleep(self.policy.min_call_interval).await;
        let reply = tokio::time::timeout(
            self.policy.call_timeout,
            self.session.send_message(&conversation_id, &opening),
        )
        .await;
        match reply {
            Ok(Ok(reply)) => match reply.quoted_price {
                Some(quote) if quote < offer.price => {
                    info!(category, offer = %offer.name, quote, "discount agreed");
                    step(
                        NegotiationOutcome::Agreed,
                        quote,
                        format!("vendor agreed to ${quote:.2}: {}", reply.text),
                    )
                }
                Some(quote) => step(
                    NegotiationOutcome::Declined,
                    offer.price,
                    format!("vendor quoted ${quote:.2}, not below current price"),
                ),
                None => step(
                    NegotiationOutcome::NoPriceInReply,
                    offer.price,
                    format!("no price in reply: {}", reply.text),
                ),
            },
            Ok(Err(err)) => step(
                NegotiationOutcome::PartnerUnavailable,
                offer.price,
                format!("partner error: {err}"),
            ),
            Err(_) => step(
                NegotiationOutcome::PartnerUnavailable,
                offer.price,
                "partner reply timed out".to_string(),
            ),
        }
    }
}

fn apply_price(offers: &mut OfferSet, category: &str, offer_name: &str, price: f64) {
    if let Some(candidates) = offers.get_mut(category) {
        for offer in candidates {
            if offer.name == offer_name {
                offer.price = price;
            }
        }
    }
}
