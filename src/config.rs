use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::negotiation::NegotiationPolicy;
use crate::scoring::PreferenceWeights;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default)]
    pub negotiation: NegotiationConfig,
    #[serde(default)]
    pub partner: PartnerConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_price_weight")]
    pub price: f64,
    #[serde(default = "default_delivery_weight")]
    pub delivery: f64,
    #[serde(default = "default_quality_weight")]
    pub quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    #[serde(default = "default_target_share_threshold")]
    pub target_share_threshold: f64,
    #[serde(default = "default_min_call_interval_ms")]
    pub min_call_interval_ms: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PartnerConfig {
    /// Base URL of the negotiation partner API; empty means the simulated
    /// partner is used instead.
    #[serde(default)]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
    #[serde(default = "default_min_discount")]
    pub min_discount: f64,
    #[serde(default = "default_max_discount")]
    pub max_discount: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub price_weight: Option<f64>,
    pub delivery_weight: Option<f64>,
    pub quality_weight: Option<f64>,
    pub partner_url: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/sourcewise/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(price) = overrides.price_weight {
            self.weights.price = price;
        }
        if let Some(delivery) = overrides.delivery_weight {
            self.weights.delivery = delivery;
        }
        if let Some(quality) = overrides.quality_weight {
            self.weights.quality = quality;
        }
        if let Some(url) = overrides.partner_url {
            self.partner.base_url = url;
        }
    }

    /// Validated preference weights; rejects configs whose weights do not sum
    /// to one before any optimization runs.
    pub fn preference_weights(&self) -> Result<PreferenceWeights> {
        Ok(PreferenceWeights::new(
            self.weights.price,
            self.weights.delivery,
            self.weights.quality,
        )?)
    }

    pub fn negotiation_policy(&self) -> NegotiationPolicy {
        NegotiationPolicy {
            target_share_threshold: self.negotiation.target_share_threshold,
            min_call_interval: Duration::from_millis(self.negotiation.min_call_interval_ms),
            call_timeout: Duration::from_secs(self.negotiation.call_timeout_secs.max(1)),
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn default_template() -> String {
        let template = r#"[weights]
price = 0.4
delivery = 0.3
quality = 0.3

[negotiation]
target_share_threshold = 0.10
min_call_interval_ms = 1500
call_timeout_secs = 20

[partner]
base_url = ""

[simulator]
success_rate = 0.8
min_discount = 0.05
max_discount = 0.15
"#;
        template.to_string()
    }
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            price: default_price_weight(),
            delivery: default_delivery_weight(),
            quality: default_quality_weight(),
        }
    }
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            target_share_threshold: default_target_share_threshold(),
            min_call_interval_ms: default_min_call_interval_ms(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            success_rate: default_success_rate(),
            min_discount: default_min_discount(),
            max_discount: default_max_discount(),
        }
    }
}

fn default_price_weight() -> f64 {
    0.4
}

fn default_delivery_weight() -> f64 {
    0.3
}

fn default_quality_weight() -> f64 {
    0.3
}

fn default_target_share_threshold() -> f64 {
    0.10
}

fn default_min_call_interval_ms() -> u64 {
    1500
}

fn default_call_timeout_secs() -> u64 {
    20
}

fn default_success_rate() -> f64 {
    0.8
}

fn default_min_discount() -> f64 {
    0.05
}

fn default_max_discount() -> f64 {
    0.15
}
