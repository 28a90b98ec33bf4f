// Signal parsing: format detection and variant-specific extraction
pub mod default;
pub mod fortune;
pub mod icm;

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use crate::error::ParseError;
use crate::models::{Direction, Signal, SourceFormat};
use crate::symbols::SymbolMapper;

fn number_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d)\s+(\d)").expect("valid regex"))
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid regex"))
}

fn stop_loss_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SL\s*[-–:]?\s*(\d+(?:[.,]\d+)?)").expect("valid regex"))
}

/// Extract all numeric tokens from text, in order of appearance.
///
/// Accepts `3600`, `3600.5`, `3600,5` (comma decimal) and `3 600.50`
/// (spaced thousands).
pub fn extract_numbers(text: &str) -> Vec<f64> {
    let normalized = number_run_regex().replace_all(text, "$1$2");
    number_regex()
        .find_iter(&normalized)
        .filter_map(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
        .collect()
}

/// Infer trade direction from the message text. "buy" wins when both
/// words appear.
pub fn detect_direction(text: &str) -> Option<Direction> {
    let lower = text.to_lowercase();
    if lower.contains("buy") {
        Some(Direction::Buy)
    } else if lower.contains("sell") {
        Some(Direction::Sell)
    } else {
        None
    }
}

/// Stop-loss value from the line carrying the literal `SL` marker.
pub fn extract_stop_loss(text: &str) -> Option<f64> {
    let upper = text.to_uppercase();
    if let Some(cap) = stop_loss_regex().captures(&upper) {
        return cap[1].replace(',', ".").parse().ok();
    }
    // Fallback: first number anywhere after the SL marker
    let sl_pos = upper.find("SL")?;
    extract_numbers(&upper[sl_pos + 2..]).first().copied()
}

/// Parses raw channel messages into signals.
///
/// Format detection is structural: a known traded symbol plus explicit
/// TP levels means Fortune; an explicit SL value means ICM; anything
/// else that passes the keyword gate is the default layout.
pub struct SignalParser {
    traded_symbols: Vec<(String, Regex)>,
    icm_entry_band: (f64, f64),
}

impl SignalParser {
    pub fn new(traded_symbols: &[String], icm_entry_band: (f64, f64)) -> Self {
        let traded_symbols = traded_symbols
            .iter()
            .map(|sym| {
                let upper = sym.to_uppercase();
                let pattern = format!(r"\b{}\b", regex::escape(&upper));
                let re = Regex::new(&pattern).expect("valid symbol pattern");
                (upper, re)
            })
            .collect();
        Self { traded_symbols, icm_entry_band }
    }

    /// Find which traded symbol is mentioned in the text, normalized to
    /// its canonical name.
    pub fn find_symbol(&self, text: &str) -> Option<String> {
        let upper = text.to_uppercase();
        self.traded_symbols
            .iter()
            .find(|(_, re)| re.is_match(&upper))
            .map(|(sym, _)| SymbolMapper::normalize_alias(sym))
    }

    fn detect_format(&self, text: &str) -> SourceFormat {
        if self.find_symbol(text).is_some() && fortune::has_explicit_targets(text) {
            return SourceFormat::Fortune;
        }
        if extract_stop_loss(text).is_some() {
            return SourceFormat::Icm;
        }
        SourceFormat::Default
    }

    /// Parse a raw message into a signal, or explain why it isn't one.
    pub fn parse(&self, text: &str) -> Result<Signal, ParseError> {
        let upper = text.to_uppercase();
        if !upper.contains("TP") || !upper.contains("SL") {
            return Err(ParseError::NotASignal);
        }
        if !upper.contains("BUY") && !upper.contains("SELL") {
            return Err(ParseError::NotASignal);
        }

        let format = self.detect_format(text);
        let fields = match format {
            SourceFormat::Fortune => fortune::parse(text, self)?,
            SourceFormat::Icm => icm::parse(text, self.icm_entry_band)?,
            SourceFormat::Default => default::parse(text)?,
        };

        let signal = Signal {
            id: Uuid::new_v4(),
            source_format: format,
            symbol: fields.symbol,
            direction: fields.direction,
            entry_price: fields.entry_price,
            stop_loss: fields.stop_loss,
            targets: fields.targets,
            received_at: Utc::now(),
        };

        tracing::info!(
            "Parsed {:?} signal {}: {:?} {} @ {} SL {}",
            signal.source_format,
            signal.short_id(),
            signal.direction,
            signal.symbol,
            signal.entry_price,
            signal.stop_loss
        );
        Ok(signal)
    }
}

/// Variant-independent output of the extraction functions
#[derive(Debug)]
pub(crate) struct ParsedFields {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub targets: Vec<crate::models::Target>,
}
