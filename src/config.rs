use crate::error::{Error, Result};
use serde::Deserialize;
use std::str::FromStr;

pub const NPA_MAX_POOLS_MIN: u32 = 128;
pub const NPA_MAX_POOLS_MAX: u32 = 1 << 20;

/// Start-up tunables. Read once before any device exists.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(alias = "max-pools")]
    pub max_pools: u32,
    pub ipsec_in_min_spi: u32,
    pub ipsec_in_max_spi: u32,
    pub ipsec_out_max_sa: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_pools: NPA_MAX_POOLS_MIN,
            ipsec_in_min_spi: 0,
            ipsec_in_max_spi: 8192,
            ipsec_out_max_sa: 8192,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.max_pools < NPA_MAX_POOLS_MIN || self.max_pools > NPA_MAX_POOLS_MAX {
            return Err(Error::Config(format!(
                "Invalid max-pools value ({}), should be in range of ({} - {})",
                self.max_pools, NPA_MAX_POOLS_MIN, NPA_MAX_POOLS_MAX
            )));
        }
        if self.ipsec_in_min_spi > self.ipsec_in_max_spi {
            return Err(Error::Config(format!(
                "Invalid inbound SPI range ({} - {})",
                self.ipsec_in_min_spi, self.ipsec_in_max_spi
            )));
        }
        Ok(())
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Early-config line: `max-pools N ipsec_in_min_spi N ipsec_in_max_spi N
/// ipsec_out_max_sa N`, any order, any subset.
impl FromStr for Config {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let mut cfg = Config::default();
        let mut tokens = s.split_whitespace();
        while let Some(key) = tokens.next() {
            let slot = match key {
                "max-pools" => &mut cfg.max_pools,
                "ipsec_in_min_spi" => &mut cfg.ipsec_in_min_spi,
                "ipsec_in_max_spi" => &mut cfg.ipsec_in_max_spi,
                "ipsec_out_max_sa" => &mut cfg.ipsec_out_max_sa,
                _ => return Err(Error::Config(format!("unknown input '{}'", key))),
            };
            *slot = tokens
                .next()
                .and_then(|v| v.parse::<u32>().ok())
                .ok_or_else(|| Error::Config(format!("unknown input '{}'", key)))?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
