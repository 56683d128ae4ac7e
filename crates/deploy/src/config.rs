//! Deployment configuration.
//!
//! Values are layered: built-in defaults, then an optional `Kojiki.toml`, then
//! `KOJIKI_`-prefixed environment variables (nested keys separated by `__`, e.g.
//! `KOJIKI_NETWORK__RPC_URL`).
//!
//! Constructor parameters are kept as opaque strings. They are handed to the ABI
//! encoder as-is and never interpreted here.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize, de};
use url::Url;

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Kojiki.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "KOJIKI_";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub kojiki: KojikiConfig,
}

impl Config {
    /// Default layers plus the given TOML file, without environment overrides.
    pub fn figment(path: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        }
    }

    /// Load the configuration, applying file then environment overrides.
    ///
    /// `path` may point at a file or at a directory containing [`CONFIG_FILENAME`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.exists() => {
                anyhow::bail!("Configuration file not found: {}", path.display())
            }
            Some(path) if path.is_dir() => Some(path.join(CONFIG_FILENAME)),
            Some(path) => Some(path.to_path_buf()),
            None => None,
        };

        let config: Self = Self::figment(path.as_deref())
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to load configuration")?;

        if let Some(path) = &path {
            tracing::info!(path = %path.display(), "Configuration loaded");
        }

        Ok(config)
    }

    /// Save the resolved configuration as TOML.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

/// How to reach the chain and where the compiled contracts live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the node.
    pub rpc_url: Url,
    /// Account sending the deployments. Defaults to the node's first account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
    /// Directory holding `<Contract>.json` build artifacts.
    pub artifacts_dir: PathBuf,
    /// Delay between receipt polls.
    pub poll_interval_ms: u64,
    /// Give up waiting for a receipt after this long.
    pub confirmation_timeout_secs: u64,
}

impl NetworkConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse("http://127.0.0.1:8545").expect("static URL is valid"),
            deployer: None,
            artifacts_dir: PathBuf::from("artifacts"),
            poll_interval_ms: 2_000,
            confirmation_timeout_secs: 300,
        }
    }
}

/// Constructor inputs for the Kojiki modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KojikiConfig {
    /// Owner of the factory, token and pool factories.
    pub owner: String,
    /// Wrapped native token of the target chain.
    pub weth: String,
    pub lock: LockConfig,
    pub sake: SakeConfig,
    pub master: MasterConfig,
    pub dividends: DividendsConfig,
    pub fair_auction: FairAuctionConfig,
}

impl Default for KojikiConfig {
    fn default() -> Self {
        Self {
            owner: "0x99EDeCAc3106Ae3C322b84C30aEae03086586B63".to_string(),
            weth: "0x4200000000000000000000000000000000000006".to_string(),
            lock: LockConfig::default(),
            sake: SakeConfig::default(),
            master: MasterConfig::default(),
            dividends: DividendsConfig::default(),
            fair_auction: FairAuctionConfig::default(),
        }
    }
}

/// The warm-up `Lock` deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Unlock time relative to the start of the run, in seconds.
    pub unlock_delay_secs: u64,
    /// Absolute unlock timestamp. Takes precedence over `unlock_delay_secs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_time: Option<u64>,
    /// Wei locked in the contract.
    #[serde(deserialize_with = "numeric_string")]
    pub value: String,
}

impl LockConfig {
    /// Unlock timestamp for a run starting at `now` (unix seconds).
    pub fn unlock_time(&self, now: u64) -> u64 {
        self.unlock_time
            .unwrap_or_else(|| now.saturating_add(self.unlock_delay_secs))
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            unlock_delay_secs: 60,
            unlock_time: None,
            // 0.001 ether
            value: "1000000000000000".to_string(),
        }
    }
}

/// SAKE token economics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SakeConfig {
    #[serde(deserialize_with = "numeric_string")]
    pub max_supply: String,
    #[serde(deserialize_with = "numeric_string")]
    pub initial_supply: String,
    #[serde(deserialize_with = "numeric_string")]
    pub emission_rate: String,
}

impl Default for SakeConfig {
    fn default() -> Self {
        Self {
            max_supply: "1400000000000000000000000".to_string(),
            initial_supply: "1000000000000000000000000".to_string(),
            emission_rate: "188583676300000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Emission start, unix seconds.
    #[serde(deserialize_with = "numeric_string")]
    pub start_time: String,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            start_time: "1692513641".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendsConfig {
    /// First distribution cycle start, unix seconds.
    #[serde(deserialize_with = "numeric_string")]
    pub start_time: String,
}

impl Default for DividendsConfig {
    fn default() -> Self {
        Self {
            start_time: "1692513641".to_string(),
        }
    }
}

/// Fair auction sale parameters, in constructor order after the two token references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairAuctionConfig {
    pub sale_token: String,
    pub lp_token: String,
    #[serde(deserialize_with = "numeric_string")]
    pub start_time: String,
    #[serde(deserialize_with = "numeric_string")]
    pub end_time: String,
    pub treasury: String,
    #[serde(deserialize_with = "numeric_string")]
    pub max_to_distribute: String,
    #[serde(deserialize_with = "numeric_string")]
    pub min_to_raise: String,
    #[serde(deserialize_with = "numeric_string")]
    pub max_to_raise: String,
    #[serde(deserialize_with = "numeric_string")]
    pub cap_per_wallet: String,
    #[serde(deserialize_with = "numeric_string")]
    pub max_raise_per_wallet_whitelist: String,
}

impl Default for FairAuctionConfig {
    fn default() -> Self {
        Self {
            sale_token: "0x4200000000000000000000000000000000000006".to_string(),
            lp_token: "0x0000000000000000000000000000000000000000".to_string(),
            start_time: "1692945641".to_string(),
            end_time: "1693032041".to_string(),
            treasury: "0xd76cAaaEC0C95fe3973B7E2B9A0107e6D3C5DB4D".to_string(),
            max_to_distribute: "6000000000000000000".to_string(),
            min_to_raise: "4000000000000000000".to_string(),
            max_to_raise: "100000000000000000".to_string(),
            cap_per_wallet: "300000000000000000".to_string(),
            max_raise_per_wallet_whitelist: "0".to_string(),
        }
    }
}

/// Accept a constructor constant written either as a string or as a bare integer.
///
/// Environment and TOML values such as `1700000000` arrive as integers.
fn numeric_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct NumericString;

    impl de::Visitor<'_> for NumericString {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or an integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(NumericString)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_launch_parameters() {
        let config = Config::figment(None).extract::<Config>().unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.kojiki.sake.emission_rate, "188583676300000");
        assert_eq!(config.network.rpc_url.as_str(), "http://127.0.0.1:8545/");
        assert_eq!(config.network.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_toml_overrides_only_given_keys() {
        let config: Config = Config::figment(None)
            .merge(Toml::string(
                r#"
                [network]
                rpc_url = "https://rpc.example.org"
                deployer = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"

                [kojiki]
                owner = "0x0000000000000000000000000000000000000001"

                [kojiki.fair_auction]
                end_time = "1700000000"
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(config.network.rpc_url.as_str(), "https://rpc.example.org/");
        assert!(config.network.deployer.is_some());
        assert_eq!(config.kojiki.owner, "0x0000000000000000000000000000000000000001");
        assert_eq!(config.kojiki.fair_auction.end_time, "1700000000");
        assert_eq!(config.kojiki.fair_auction.start_time, "1692945641");
        assert_eq!(config.kojiki.weth, KojikiConfig::default().weth);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
                [network]
                poll_interval_ms = 500

                [kojiki]
                weth = "0x0000000000000000000000000000000000000002"
                "#,
            )?;
            jail.set_env("KOJIKI_NETWORK__POLL_INTERVAL_MS", "100");

            let config = Config::load(Some(Path::new(CONFIG_FILENAME))).map_err(|e| e.to_string())?;

            assert_eq!(config.network.poll_interval_ms, 100);
            assert_eq!(config.kojiki.weth, "0x0000000000000000000000000000000000000002");
            Ok(())
        });
    }

    #[test]
    fn test_lock_unlock_time() {
        let mut lock = LockConfig::default();
        assert_eq!(lock.unlock_time(1_700_000_000), 1_700_000_060);

        lock.unlock_time = Some(42);
        assert_eq!(lock.unlock_time(1_700_000_000), 42);
    }

    #[test]
    fn test_save_then_load_from_directory() {
        figment::Jail::expect_with(|jail| {
            let mut config = Config::default();
            config.kojiki.master.start_time = "1".to_string();

            config
                .save_to_file(&jail.directory().join(CONFIG_FILENAME))
                .map_err(|e| e.to_string())?;
            let loaded = Config::load(Some(jail.directory())).map_err(|e| e.to_string())?;

            assert_eq!(loaded, config);
            Ok(())
        });
    }

    #[test]
    fn test_integer_constants_from_env_and_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
                [kojiki.fair_auction]
                end_time = 1700086400
                cap_per_wallet = 0
                "#,
            )?;
            jail.set_env("KOJIKI_KOJIKI__MASTER__START_TIME", "1700000000");
            jail.set_env("KOJIKI_KOJIKI__SAKE__MAX_SUPPLY", "2000000000000000000000000");
            jail.set_env("KOJIKI_KOJIKI__LOCK__VALUE", "5");

            let config = Config::load(Some(Path::new(CONFIG_FILENAME))).map_err(|e| e.to_string())?;

            assert_eq!(config.kojiki.master.start_time, "1700000000");
            assert_eq!(config.kojiki.sake.max_supply, "2000000000000000000000000");
            assert_eq!(config.kojiki.lock.value, "5");
            assert_eq!(config.kojiki.fair_auction.end_time, "1700086400");
            assert_eq!(config.kojiki.fair_auction.cap_per_wallet, "0");
            assert_eq!(config.kojiki.dividends.start_time, "1692513641");
            Ok(())
        });
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load(Some(Path::new("/nonexistent/Kojiki.toml"))).is_err());
    }
}
