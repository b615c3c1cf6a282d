//! hostfleet.toml configuration parser.
//!
//! Optional operator overrides for cache freshness windows and scoring
//! tunables. Every field is optional; omitted values fall back to the
//! engine defaults.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use hostfleet_capacity::CacheConfig;
use hostfleet_placement::ScoringConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    pub cache: Option<CacheSection>,
    pub scoring: Option<ScoringSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSection {
    pub node_ttl_secs: Option<u64>,
    pub summary_ttl_secs: Option<u64>,
    pub full_refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSection {
    pub target_utilization_pct: Option<f64>,
    /// Assumed per-workload memory footprint for the density heuristic, MB.
    pub workload_footprint_mb: Option<u64>,
    pub load_memory_weight: Option<f64>,
    pub load_disk_weight: Option<f64>,
    pub load_density_weight: Option<f64>,
    pub load_availability_weight: Option<f64>,
    pub fit_efficiency_weight: Option<f64>,
    pub fit_utilization_weight: Option<f64>,
}

impl CliConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CliConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Cache windows with file overrides applied over the defaults.
    pub fn cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::default();
        if let Some(cache) = &self.cache {
            if let Some(secs) = cache.node_ttl_secs {
                config.node_ttl = Duration::from_secs(secs);
            }
            if let Some(secs) = cache.summary_ttl_secs {
                config.summary_ttl = Duration::from_secs(secs);
            }
            if let Some(secs) = cache.full_refresh_interval_secs {
                config.full_refresh_interval = Duration::from_secs(secs);
            }
        }
        config
    }

    /// Scoring tunables with file overrides applied over the defaults.
    pub fn scoring_config(&self) -> ScoringConfig {
        let mut config = ScoringConfig::default();
        if let Some(scoring) = &self.scoring {
            if let Some(v) = scoring.target_utilization_pct {
                config.target_utilization_pct = v;
            }
            if let Some(v) = scoring.workload_footprint_mb {
                config.workload_footprint_mb = v;
            }
            if let Some(v) = scoring.load_memory_weight {
                config.load_memory_weight = v;
            }
            if let Some(v) = scoring.load_disk_weight {
                config.load_disk_weight = v;
            }
            if let Some(v) = scoring.load_density_weight {
                config.load_density_weight = v;
            }
            if let Some(v) = scoring.load_availability_weight {
                config.load_availability_weight = v;
            }
            if let Some(v) = scoring.fit_efficiency_weight {
                config.fit_efficiency_weight = v;
            }
            if let Some(v) = scoring.fit_utilization_weight {
                config.fit_utilization_weight = v;
            }
        }
        config
    }
}
