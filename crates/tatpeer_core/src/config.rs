use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub blocks_per_piece: u32,
    /// Cap on requests sent to a single peer in one round.
    pub max_requests_per_peer: usize,
    /// Upload budget per round, in bandwidth units.
    pub upload_bandwidth: u64,
    pub policy: PolicyConfig,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            blocks_per_piece: 32,
            max_requests_per_peer: 4,
            upload_bandwidth: 40,
            policy: PolicyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Reciprocal(ReciprocalConfig),
    PropShare(PropShareConfig),
    RateAuction(RateAuctionConfig),
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Reciprocal(Default::default())
    }
}

impl PolicyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyConfig::Reciprocal(_) => "reciprocal",
            PolicyConfig::PropShare(_) => "prop_share",
            PolicyConfig::RateAuction(_) => "rate_auction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReciprocalConfig {
    /// Slots handed out by reciprocity ranking, on top of the optimistic one.
    pub unchoke_slots: usize,
    /// The optimistic peer is reselected when `round % optimistic_interval == optimistic_phase`.
    pub optimistic_interval: u32,
    pub optimistic_phase: u32,
    /// If false, the optimistic peer gets a slot even when it didn't request anything.
    pub optimistic_requires_request: bool,
    /// How many past rounds of downloads count towards reciprocity.
    pub history_window: u32,
}

impl Default for ReciprocalConfig {
    fn default() -> Self {
        Self {
            unchoke_slots: 3,
            optimistic_interval: 3,
            optimistic_phase: 0,
            optimistic_requires_request: true,
            history_window: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropShareConfig {
    /// Share of the budget reserved for one optimistic unchoke, in percent.
    pub optimistic_share_percent: u8,
}

impl Default for PropShareConfig {
    fn default() -> Self {
        Self {
            optimistic_share_percent: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    Snapshot,
    #[default]
    Adaptive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateAuctionConfig {
    pub estimator: EstimatorKind,
    /// Upload estimate growth for peers that didn't reciprocate.
    pub alpha: f64,
    /// Upload estimate shrink for peers that kept reciprocating.
    pub gamma: f64,
    /// Consecutive reciprocating rounds required before shrinking.
    pub reciprocation_rounds: u32,
    pub initial_download_rate: f64,
    pub initial_upload_rate: f64,
}

impl Default for RateAuctionConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorKind::Adaptive,
            alpha: 0.10,
            gamma: 0.07,
            reciprocation_rounds: 4,
            initial_download_rate: 15.,
            initial_upload_rate: 25.,
        }
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidConfig(msg.into())
}

impl PeerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.blocks_per_piece == 0 {
            return Err(invalid("blocks_per_piece must be > 0"));
        }
        match &self.policy {
            PolicyConfig::Reciprocal(c) => {
                if c.optimistic_interval == 0 {
                    return Err(invalid("optimistic_interval must be > 0"));
                }
                if c.optimistic_phase >= c.optimistic_interval {
                    return Err(invalid(format!(
                        "optimistic_phase {} should be < optimistic_interval {}",
                        c.optimistic_phase, c.optimistic_interval
                    )));
                }
            }
            PolicyConfig::PropShare(c) => {
                if c.optimistic_share_percent > 100 {
                    return Err(invalid("optimistic_share_percent must be <= 100"));
                }
            }
            PolicyConfig::RateAuction(c) => {
                if !(c.alpha.is_finite() && c.alpha >= 0.) {
                    return Err(invalid(format!("alpha {} must be >= 0", c.alpha)));
                }
                if !(c.gamma.is_finite() && (0. ..1.).contains(&c.gamma)) {
                    return Err(invalid(format!("gamma {} must be in [0, 1)", c.gamma)));
                }
                if c.reciprocation_rounds == 0 {
                    return Err(invalid("reciprocation_rounds must be > 0"));
                }
                if !(c.initial_download_rate.is_finite() && c.initial_download_rate >= 0.) {
                    return Err(invalid("initial_download_rate must be >= 0"));
                }
                if !(c.initial_upload_rate.is_finite() && c.initial_upload_rate > 0.) {
                    return Err(invalid("initial_upload_rate must be > 0"));
                }
            }
        }
        Ok(())
    }

    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let config: PeerConfig = serde_json::from_str(s).context("error parsing peer config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("error reading config file {:?}", path))?;
        Self::from_json_str(&s).with_context(|| format!("error loading {:?}", path))
    }
}
