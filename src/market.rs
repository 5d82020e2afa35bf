//! Offer discovery boundary. Real scraping lives outside the core; this
//! module loads an already-materialized catalog from JSON and ships the
//! built-in demo data so the CLI works without one.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{Offer, OfferSet, RequiredItem};

/// Required items plus the market candidates for each of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub items: Vec<RequiredItem>,
    pub offers: OfferSet,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed reading catalog: {}", path.display()))?;
        let catalog: Self = serde_json::from_str(&data)
            .with_context(|| format!("failed parsing catalog JSON: {}", path.display()))?;
        Ok(catalog)
    }

    /// Office-furniture demo catalog: ten chairs and ten desks.
    pub fn sample() -> Self {
        let items = vec![
            RequiredItem::new("Office Chair", 10).with_material("Mesh"),
            RequiredItem::new("Desk", 10),
        ];
        let mut offers = OfferSet::new();
        offers.insert(
            "Office Chair".to_string(),
            vec![
                Offer::new(
                    "CheapChair 3000",
                    120.0,
                    10,
                    0.6,
                    "http://example.com/cheap-chair",
                ),
                Offer::new(
                    "SpeedyChair Express",
                    250.0,
                    2,
                    0.8,
                    "http://example.com/fast-chair",
                ),
                Offer::new(
                    "QualiChair Pro",
                    400.0,
                    7,
                    0.95,
                    "http://example.com/quality-chair",
                ),
            ],
        );
        offers.insert(
            "Desk".to_string(),
            vec![
                Offer::new("Budget Desk", 200.0, 14, 0.5, "http://example.com/cheap-desk"),
                Offer::new("Rapid Desk", 350.0, 3, 0.7, "http://example.com/fast-desk"),
            ],
        );
        Self { items, offers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_catalog_is_well_formed() {
        let catalog = Catalog::sample();
        assert_eq!(catalog.items.len(), 2);
        assert_eq!(catalog.offers["Office Chair"].len(), 3);
        assert_eq!(catalog.offers["Desk"].len(), 2);
        for item in &catalog.items {
            assert!(item.quantity >= 1);
        }
        for offer in catalog.offers.values().flatten() {
            assert!(offer.price >= 0.0);
            assert!((0.0..=1.0).contains(&offer.quality_score));
        }
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let catalog = Catalog::sample();
        let json = serde_json::to_string(&catalog).unwrap();
        let parsed: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.items.len(), catalog.items.len());
        assert_eq!(
            parsed.offers["Desk"][0].name,
            catalog.offers["Desk"][0].name
        );
    }
}
