// Symbol normalization and broker-specific symbol mapping
use std::collections::HashMap;

use serde::Deserialize;

/// Per-broker symbol translation: explicit overrides first, then an
/// optional suffix rule (e.g. "XAUUSD" -> "XAUUSD+" on some feeds).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerSymbols {
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub symbols: HashMap<String, String>,
}

/// Maps canonical symbols to broker-specific names.
#[derive(Debug, Clone, Default)]
pub struct SymbolMapper {
    brokers: HashMap<String, BrokerSymbols>,
}

impl SymbolMapper {
    pub fn new(brokers: HashMap<String, BrokerSymbols>) -> Self {
        Self { brokers }
    }

    /// Normalize a symbol alias found in message text to its canonical
    /// name ("GOLD" -> "XAUUSD", "SILVER" -> "XAGUSD").
    pub fn normalize_alias(symbol: &str) -> String {
        match symbol.to_uppercase().as_str() {
            "GOLD" => "XAUUSD".to_string(),
            "SILVER" => "XAGUSD".to_string(),
            other => other.to_string(),
        }
    }

    /// Convert a canonical symbol to the broker-specific one.
    ///
    /// Unknown brokers fall back to the canonical symbol unchanged.
    pub fn broker_symbol(&self, canonical: &str, broker_name: &str) -> String {
        let Some(broker) = self.brokers.get(broker_name) else {
            tracing::warn!(
                "Broker '{}' not found in symbol mapping, using canonical symbol",
                broker_name
            );
            return canonical.to_string();
        };

        let lookup = canonical.to_lowercase();
        if let Some(mapped) = broker
            .symbols
            .iter()
            .find(|(key, _)| key.to_lowercase() == lookup)
            .map(|(_, value)| value.clone())
        {
            tracing::debug!("Symbol mapping: {} -> {} for {}", canonical, mapped, broker_name);
            return mapped;
        }

        format!("{}{}", canonical, broker.suffix)
    }
}
