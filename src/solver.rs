//! Constrained assignment search: exactly one offer per category, maximizing
//! summed attractiveness under a hard budget, with optional pinned picks.
//!
//! The search space is the cross product of per-category candidate lists.
//! Categories are visited in required-item order and candidates in list
//! order; ties on score keep the first combination found, so results are
//! fully deterministic. Branches whose running cost already exceeds the
//! remaining budget are abandoned early, which cannot change the winner
//! because prices are non-negative.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, warn};

use crate::scoring::{score_category, PreferenceWeights};
use crate::types::{Offer, OfferSet, RequiredItem, Solution};

/// Caller-forced category -> offer-name assignments.
pub type Pins = BTreeMap<String, String>;

pub fn solve(
    items: &[RequiredItem],
    offers: &OfferSet,
    weights: &PreferenceWeights,
    budget: f64,
    pins: Option<&Pins>,
) -> Result<Option<Solution>> {
    weights.validate()?;

    // Categories with no candidates are excluded from the request entirely:
    // nothing to choose, nothing to pay.
    let sourceable: Vec<&RequiredItem> = items
        .iter()
        .filter(|item| offers.get(&item.name).map_or(false, |c| !c.is_empty()))
        .collect();

    let mut pinned: Vec<(&RequiredItem, Offer)> = Vec::new();
    let mut free: Vec<(&RequiredItem, &[Offer])> = Vec::new();
    for &item in &sourceable {
        let candidates = offers[&item.name].as_slice();
        match pins.and_then(|p| p.get(&item.name)) {
            Some(offer_name) => {
                let Some(offer) = candidates.iter().find(|o| &o.name == offer_name) else {
                    warn!(
                        category = %item.name,
                        offer = %offer_name,
                        "pinned offer not found in candidate list"
                    );
                    return Ok(None);
                };
                pinned.push((item, offer.clone()));
            }
            None => free.push((item, candidates)),
        }
    }

    let pinned_cost: f64 = pinned
        .iter()
        .map(|(item, offer)| offer.price * f64::from(item.quantity))
        .sum();
    let remaining_budget = budget - pinned_cost;
    if remaining_budget < 0.0 {
        debug!(pinned_cost, budget, "pins alone exceed the budget");
        return Ok(None);
    }

    if free.is_empty() {
        return Ok(Some(build_solution(pinned, Vec::new())));
    }

    // Scores are computed once per invocation and reused across the search.
    let score_tables: Vec<BTreeMap<String, f64>> = free
        .iter()
        .map(|(_, candidates)| score_category(candidates, weights))
        .collect();

    let mut search = Search {
        free: &free,
        score_tables: &score_tables,
        remaining_budget,
        best_score: f64::NEG_INFINITY,
        best_choice: None,
    };
    let mut stack = Vec::with_capacity(free.len());
    search.descend(0, 0.0, 0.0, &mut stack);

    let Some(choice) = search.best_choice else {
        return Ok(None);
    };

    let chosen_free: Vec<(&RequiredItem, Offer)> = choice
        .iter()
        .zip(free.iter())
        .map(|(&idx, (item, candidates))| (*item, candidates[idx].clone()))
        .collect();
    Ok(Some(build_solution(pinned, chosen_free)))
}

struct Search<'a> {
    free: &'a [(&'a RequiredItem, &'a [Offer])],
    score_tables: &'a [BTreeMap<String, f64>],
    remaining_budget: f64,
    best_score: f64,
    best_choice: Option<Vec<usize>>,
}

impl Search<'_> {
    fn descend(&mut self, depth: usize, cost: f64, score: f64, stack: &mut Vec<usize>) {
        if cost > self.remaining_budget {
            return;
        }
        if depth == self.free.len() {
            // Strict comparison keeps the first combination found on ties.
            if score > self.best_score {
                self.best_score = score;
                self.best_choice = Some(stack.clone());
            }
            return;
        }
        let (item, candidates) = self.free[depth];
        for (idx, offer) in candidates.iter().enumerate() {
            let offer_cost = offer.price * f64::from(item.quantity);
            let offer_score = self.score_tables[depth][&offer.name];
            stack.push(idx);
            self.descend(depth + 1, cost + offer_cost, score + offer_score, stack);
            stack.pop();
        }
    }
}

fn build_solution(
    pinned: Vec<(&RequiredItem, Offer)>,
    free: Vec<(&RequiredItem, Offer)>,
) -> Solution {
    let mut selections = BTreeMap::new();
    let mut total_cost = 0.0;
    let mut max_delivery_days = 0;
    for (item, offer) in pinned.into_iter().chain(free) {
        total_cost += offer.price * f64::from(item.quantity);
        max_delivery_days = max_delivery_days.max(offer.delivery_days);
        selections.insert(item.name.clone(), offer);
    }
    Solution {
        selections,
        total_cost,
        max_delivery_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Catalog;

    fn demo() -> (Vec<RequiredItem>, OfferSet, PreferenceWeights) {
        let catalog = Catalog::sample();
        let weights = PreferenceWeights::new(0.4, 0.3, 0.3).unwrap();
        (catalog.items, catalog.offers, weights)
    }

    #[test]
    fn demo_budget_is_feasible() {
        let (items, offers, weights) = demo();
        let solution = solve(&items, &offers, &weights, 6000.0, None)
            .unwrap()
            .expect("budget of 6000 fits");
        assert!(solution.total_cost <= 6000.0);
        assert_eq!(solution.selections.len(), 2);
        assert!(solution.selections.contains_key("Office Chair"));
        assert!(solution.selections.contains_key("Desk"));
    }

    #[test]
    fn tight_budget_is_infeasible() {
        let (items, offers, weights) = demo();
        // Cheapest one-of-each combination costs 120*10 + 200*10 = 3200.
        let solution = solve(&items, &offers, &weights, 1000.0, None).unwrap();
        assert!(solution.is_none());
    }

    #[test]
    fn solution_never_exceeds_budget() {
        let (items, offers, weights) = demo();
        for budget in [3200.0, 3500.0, 4500.0, 6000.0, 10_000.0] {
            if let Some(solution) = solve(&items, &offers, &weights, budget, None).unwrap() {
                assert!(
                    solution.total_cost <= budget,
                    "cost {} over budget {budget}",
                    solution.total_cost
                );
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_solutions() {
        let (items, offers, weights) = demo();
        let a = solve(&items, &offers, &weights, 6000.0, None).unwrap().unwrap();
        let b = solve(&items, &offers, &weights, 6000.0, None).unwrap().unwrap();
        assert_eq!(a.total_cost, b.total_cost);
        assert_eq!(
            a.selections.get("Office Chair").unwrap().name,
            b.selections.get("Office Chair").unwrap().name
        );
        assert_eq!(
            a.selections.get("Desk").unwrap().name,
            b.selections.get("Desk").unwrap().name
        );
    }

    #[test]
    fn full_pins_return_exact_pinned_cost() {
        let (items, offers, weights) = demo();
        let mut pins = Pins::new();
        pins.insert("Office Chair".to_string(), "QualiChair Pro".to_string());
        pins.insert("Desk".to_string(), "Budget Desk".to_string());
        for weights in [weights, PreferenceWeights::new(1.0, 0.0, 0.0).unwrap()] {
            let solution = solve(&items, &offers, &weights, 10_000.0, Some(&pins))
                .unwrap()
                .expect("pins fit the budget");
            // 400*10 + 200*10, regardless of weights.
            assert!((solution.total_cost - 6000.0).abs() < 1e-9);
            assert_eq!(solution.selections["Office Chair"].name, "QualiChair Pro");
            assert_eq!(solution.max_delivery_days, 14);
        }
    }

    #[test]
    fn unknown_pinned_offer_is_no_solution() {
        let (items, offers, weights) = demo();
        let mut pins = Pins::new();
        pins.insert("Desk".to_string(), "Imaginary Desk".to_string());
        let solution = solve(&items, &offers, &weights, 10_000.0, Some(&pins)).unwrap();
        assert!(solution.is_none());
    }

    #[test]
    fn pins_over_budget_are_no_solution() {
        let (items, offers, weights) = demo();
        let mut pins = Pins::new();
        pins.insert("Office Chair".to_string(), "QualiChair Pro".to_string());
        pins.insert("Desk".to_string(), "Rapid Desk".to_string());
        // 400*10 + 350*10 = 7500 > 7000.
        let solution = solve(&items, &offers, &weights, 7000.0, Some(&pins)).unwrap();
        assert!(solution.is_none());
    }

    #[test]
    fn partial_pin_rebalances_the_rest() {
        let (items, offers, weights) = demo();
        let mut pins = Pins::new();
        pins.insert("Desk".to_string(), "Rapid Desk".to_string());
        let solution = solve(&items, &offers, &weights, 6000.0, Some(&pins))
            .unwrap()
            .expect("one pin leaves room for a chair");
        assert_eq!(solution.selections["Desk"].name, "Rapid Desk");
        // Chair spend is capped at 6000 - 3500 = 2500, i.e. 250 per unit.
        assert!(solution.selections["Office Chair"].price <= 250.0);
    }

    #[test]
    fn empty_category_is_skipped() {
        let (mut items, offers, weights) = demo();
        items.push(RequiredItem::new("Whiteboard", 3));
        let solution = solve(&items, &offers, &weights, 6000.0, None)
            .unwrap()
            .expect("unknown category should not block the plan");
        assert!(!solution.selections.contains_key("Whiteboard"));
        assert_eq!(solution.selections.len(), 2);
    }

    #[test]
    fn invalid_weights_are_rejected_before_search() {
        let (items, offers, _) = demo();
        let bad = PreferenceWeights {
            price_weight: 0.9,
            delivery_weight: 0.9,
            quality_weight: 0.9,
        };
        assert!(solve(&items, &offers, &bad, 6000.0, None).is_err());
    }

    #[test]
    fn pruning_matches_exhaustive_enumeration() {
        let (items, offers, weights) = demo();
        let budget = 5800.0;
        let pruned = solve(&items, &offers, &weights, budget, None).unwrap().unwrap();

        // Re-derive the winner by walking every combination in search order.
        let chair_scores = score_category(&offers["Office Chair"], &weights);
        let desk_scores = score_category(&offers["Desk"], &weights);
        let mut best: Option<(f64, &Offer, &Offer)> = None;
        for chair in &offers["Office Chair"] {
            for desk in &offers["Desk"] {
                let cost = chair.price * 10.0 + desk.price * 10.0;
                if cost > budget {
                    continue;
                }
                let score = chair_scores[&chair.name] + desk_scores[&desk.name];
                if best.as_ref().map_or(true, |(s, _, _)| score > *s) {
                    best = Some((score, chair, desk));
                }
            }
        }
        let (_, chair, desk) = best.expect("budget is feasible");
        assert_eq!(pruned.selections["Office Chair"].name, chair.name);
        assert_eq!(pruned.selections["Desk"].name, desk.name);
    }
}
