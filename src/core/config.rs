use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

/// A single fund position as recorded by the user.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Holding {
    pub fund_code: String,
    #[serde(default)]
    pub fund_name: Option<String>,
    pub shares: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub cost_nav: Option<Decimal>,
}

impl Holding {
    /// Explicit cost NAV when recorded, otherwise `amount / shares`. Zero
    /// when the quotient is undefined or out of range.
    pub fn effective_cost_nav(&self) -> Decimal {
        match self.cost_nav {
            Some(nav) => nav,
            None => self
                .amount
                .checked_div(self.shares)
                .unwrap_or(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Portfolio {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub holdings: Vec<Holding>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FundgzProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub fundgz: Option<FundgzProviderConfig>,
    pub search: Option<SearchProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            fundgz: Some(FundgzProviderConfig {
                base_url: "http://fundgz.1234567.com.cn".to_string(),
            }),
            search: Some(SearchProviderConfig {
                base_url: "https://fundsuggest.eastmoney.com".to_string(),
            }),
        }
    }
}

/// Upper bound for every TTL and cooldown: ten years.
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn bounded_seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

/// Tuning knobs of the resolution engine. Every field has a default, so an
/// empty `engine:` section (or none at all) yields the stock behaviour.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub request_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
    pub request_pacing_ms: u64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_secs: u64,
    pub trading_ttl_secs: u64,
    pub non_trading_ttl_secs: u64,
    pub search_ttl_secs: u64,
    pub match_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            max_concurrent_fetches: 5,
            request_pacing_ms: 200,
            batch_size: 10,
            batch_delay_ms: 500,
            breaker_failure_threshold: 3,
            breaker_cooldown_secs: 600,
            trading_ttl_secs: 300,
            non_trading_ttl_secs: 3600,
            search_ttl_secs: 24 * 60 * 60,
            match_threshold: 20.0,
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn request_pacing(&self) -> Duration {
        Duration::from_millis(self.request_pacing_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn breaker_cooldown(&self) -> chrono::Duration {
        bounded_seconds(self.breaker_cooldown_secs)
    }

    pub fn search_ttl(&self) -> chrono::Duration {
        bounded_seconds(self.search_ttl_secs)
    }

    pub fn trading_ttl(&self) -> chrono::Duration {
        bounded_seconds(self.trading_ttl_secs)
    }

    pub fn non_trading_ttl(&self) -> chrono::Duration {
        bounded_seconds(self.non_trading_ttl_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            bail!("engine.request_timeout_secs must be greater than zero");
        }
        if self.max_concurrent_fetches == 0 {
            bail!("engine.max_concurrent_fetches must be greater than zero");
        }
        if self.batch_size == 0 {
            bail!("engine.batch_size must be greater than zero");
        }
        if self.breaker_failure_threshold == 0 {
            bail!("engine.breaker_failure_threshold must be greater than zero");
        }
        if self.trading_ttl_secs == 0 || self.non_trading_ttl_secs == 0 {
            bail!("engine cache TTLs must be greater than zero");
        }
        for (field, secs) in [
            ("breaker_cooldown_secs", self.breaker_cooldown_secs),
            ("trading_ttl_secs", self.trading_ttl_secs),
            ("non_trading_ttl_secs", self.non_trading_ttl_secs),
            ("search_ttl_secs", self.search_ttl_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                bail!("engine.{field} must not exceed {MAX_DURATION_SECS} seconds");
            }
        }
        if !self.match_threshold.is_finite() {
            bail!("engine.match_threshold must be a finite number");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub portfolios: Vec<Portfolio>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fundval", "fundval")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "fundval", "fundval")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn fundgz_base_url(&self) -> &str {
        self.providers
            .fundgz
            .as_ref()
            .map_or("http://fundgz.1234567.com.cn", |p| &p.base_url)
    }

    pub fn search_base_url(&self) -> &str {
        self.providers
            .search
            .as_ref()
            .map_or("https://fundsuggest.eastmoney.com", |p| &p.base_url)
    }

    pub fn portfolio(&self, id: u32) -> Option<&Portfolio> {
        self.portfolios.iter().find(|p| p.id == id)
    }

    /// Rejects values the engine cannot run with. This is the only fatal
    /// error class; everything past startup degrades instead of failing.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        let mut seen = HashSet::new();
        for portfolio in &self.portfolios {
            if !seen.insert(portfolio.id) {
                bail!("Duplicate portfolio id: {}", portfolio.id);
            }
            for holding in &portfolio.holdings {
                if holding.fund_code.trim().is_empty() {
                    bail!("Portfolio '{}' has a holding without fund code", portfolio.name);
                }
                if holding.shares <= Decimal::ZERO || holding.amount <= Decimal::ZERO {
                    bail!(
                        "Holding {} in portfolio '{}' must have positive shares and amount",
                        holding.fund_code,
                        portfolio.name
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
portfolios:
  - id: 1
    name: "Core"
    holdings:
      - fund_code: "110011"
        shares: 100
        amount: 1000
      - fund_code: "161725"
        fund_name: "招商中证白酒指数"
        shares: "250.5"
        amount: 300
        cost_nav: 1.2
  - id: 2
    name: "Empty"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.portfolios.len(), 2);
        assert_eq!(config.portfolios[0].name, "Core");
        assert_eq!(config.portfolios[0].holdings.len(), 2);

        let first = &config.portfolios[0].holdings[0];
        assert_eq!(first.fund_code, "110011");
        assert_eq!(first.shares, dec!(100));
        assert!(first.cost_nav.is_none());
        assert!(first.fund_name.is_none());

        let second = &config.portfolios[0].holdings[1];
        assert_eq!(second.shares, dec!(250.5));
        assert_eq!(second.cost_nav, Some(dec!(1.2)));
        assert!(config.portfolios[1].holdings.is_empty());

        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.fundgz_base_url(), "http://fundgz.1234567.com.cn");
        assert_eq!(config.search_base_url(), "https://fundsuggest.eastmoney.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_overrides_keep_other_defaults() {
        let yaml_str = r#"
providers:
  fundgz:
    base_url: "http://example.com/fundgz"
engine:
  batch_size: 4
  request_pacing_ms: 0
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.engine.batch_size, 4);
        assert_eq!(config.engine.request_pacing(), Duration::ZERO);
        assert_eq!(config.engine.max_concurrent_fetches, 5);
        assert_eq!(config.engine.breaker_failure_threshold, 3);
        assert_eq!(config.fundgz_base_url(), "http://example.com/fundgz");
        // Missing provider entries fall back to the public endpoint
        assert!(config.providers.search.is_none());
        assert_eq!(config.search_base_url(), "https://fundsuggest.eastmoney.com");
    }

    #[test]
    fn test_effective_cost_nav() {
        let mut holding = Holding {
            fund_code: "110011".to_string(),
            fund_name: None,
            shares: dec!(100),
            amount: dec!(1000),
            cost_nav: None,
        };
        assert_eq!(holding.effective_cost_nav(), dec!(10));

        holding.cost_nav = Some(dec!(9.5));
        assert_eq!(holding.effective_cost_nav(), dec!(9.5));
    }

    #[test]
    fn test_effective_cost_nav_out_of_range_is_zero() {
        let holding = Holding {
            fund_code: "110011".to_string(),
            fund_name: None,
            shares: Decimal::new(1, 20),
            amount: Decimal::from_i128_with_scale(10_i128.pow(20), 0),
            cost_nav: None,
        };
        assert_eq!(holding.effective_cost_nav(), Decimal::ZERO);
    }

    #[test]
    fn test_validate_bounds_durations() {
        let mut config: AppConfig =
            serde_yaml::from_str("engine:\n  trading_ttl_secs: 60\n").unwrap();
        assert!(config.validate().is_ok());

        config.engine.breaker_cooldown_secs = u64::MAX;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("breaker_cooldown_secs"), "{err}");

        config.engine.breaker_cooldown_secs = 600;
        config.engine.non_trading_ttl_secs = MAX_DURATION_SECS + 1;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("non_trading_ttl_secs"), "{err}");

        // Accessors clamp rather than panic on unvalidated values
        config.engine.search_ttl_secs = u64::MAX;
        assert_eq!(
            config.engine.search_ttl(),
            chrono::Duration::seconds(MAX_DURATION_SECS as i64)
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config: AppConfig = serde_yaml::from_str(
            r#"
portfolios:
  - id: 1
    name: "A"
    holdings:
      - fund_code: "110011"
        shares: 0
        amount: 10
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("positive shares and amount"), "{err}");

        config.portfolios[0].holdings.clear();
        config.portfolios.push(config.portfolios[0].clone());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate portfolio id"), "{err}");

        config.portfolios.pop();
        config.engine.max_concurrent_fetches = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_path_reports_invalid_config() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "engine:\n  batch_size: 0\n").unwrap();
        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("batch_size"));
    }
}
