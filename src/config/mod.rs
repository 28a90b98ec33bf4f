// Runtime configuration
//
// Loaded from an optional `copybot.toml` next to the binary, overridden
// by `COPYBOT_*` environment variables (e.g. COPYBOT_BRIDGE__BASE_URL).

use std::collections::HashMap;

use serde::Deserialize;

use crate::decision::Tolerance;
use crate::models::SourceFormat;
use crate::symbols::BrokerSymbols;

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSettings {
    /// Base URL of the execution-platform REST bridge. Empty means dry
    /// run against the in-memory paper platform.
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_broker_name")]
    pub broker_name: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self { base_url: String::new(), broker_name: default_broker_name() }
    }
}

/// How long orders live, overall and per message format.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpiryPolicy {
    #[serde(default = "default_expiry_secs")]
    pub default_secs: i64,
    /// Overrides keyed by format name: "icm", "fortune", "default"
    #[serde(default)]
    pub per_format: HashMap<String, i64>,
}

impl ExpiryPolicy {
    /// Policy with one expiry for every format.
    pub fn fixed(secs: i64) -> Self {
        Self { default_secs: secs, per_format: HashMap::new() }
    }

    pub fn seconds_for(&self, format: SourceFormat) -> i64 {
        let key = match format {
            SourceFormat::Icm => "icm",
            SourceFormat::Fortune => "fortune",
            SourceFormat::Default => "default",
        };
        self.per_format.get(key).copied().unwrap_or(self.default_secs)
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::fixed(default_expiry_secs())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingSettings {
    #[serde(default)]
    pub tolerance: Tolerance,
    /// Pending orders expire this long after placement
    #[serde(default)]
    pub expiry: ExpiryPolicy,
    /// Plausibility band for entries in the implied-symbol layout
    #[serde(default = "default_icm_min_entry")]
    pub icm_min_entry: f64,
    #[serde(default = "default_icm_max_entry")]
    pub icm_max_entry: f64,
    #[serde(default = "default_traded_symbols")]
    pub traded_symbols: Vec<String>,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            expiry: ExpiryPolicy::default(),
            icm_min_entry: default_icm_min_entry(),
            icm_max_entry: default_icm_max_entry(),
            traded_symbols: default_traded_symbols(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_clock_resync_cycles")]
    pub clock_resync_cycles: u32,
    #[serde(default = "default_break_even_target_index")]
    pub break_even_target_index: u8,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            clock_resync_cycles: default_clock_resync_cycles(),
            break_even_target_index: default_break_even_target_index(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub trading: TradingSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    /// Per-broker symbol translation tables
    #[serde(default)]
    pub symbols: HashMap<String, BrokerSymbols>,
}

impl Settings {
    pub fn load() -> crate::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name("copybot").required(false))
            .add_source(::config::Environment::with_prefix("COPYBOT").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

fn default_broker_name() -> String {
    "default".to_string()
}

fn default_expiry_secs() -> i64 {
    720
}

fn default_icm_min_entry() -> f64 {
    3500.0
}

fn default_icm_max_entry() -> f64 {
    3900.0
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_clock_resync_cycles() -> u32 {
    60
}

fn default_break_even_target_index() -> u8 {
    1
}

fn default_traded_symbols() -> Vec<String> {
    [
        // majors
        "EURUSD", "GBPUSD", "USDJPY", "USDCHF", "USDCAD", "AUDUSD", "NZDUSD",
        // minors
        "EURGBP", "EURJPY", "EURCHF", "EURAUD", "EURNZD", "EURCAD",
        "GBPJPY", "GBPCHF", "GBPAUD", "GBPNZD", "GBPCAD",
        "AUDJPY", "NZDJPY", "CADJPY", "CHFJPY",
        "AUDNZD", "AUDCHF", "AUDCAD", "NZDCHF", "NZDCAD", "CADCHF",
        // commodities (with message aliases)
        "XAUUSD", "GOLD", "XAGUSD", "SILVER", "USOIL",
        // indices
        "US30", "US100", "US500",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
