//! Fortune layout: explicit symbol, per-message SL/TP lists, optional
//! range entries ("FROM 1.8745 - 1.8755").

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ParseError;
use crate::models::{Target, TargetPrice};

use super::{ParsedFields, SignalParser};

/// At most this many targets per signal; an `Open` runner is appended
/// when fewer explicit levels are given.
const MAX_TARGETS: usize = 4;

fn tp_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // TP - 1.7733 / TP2- 1.7720 / TP1: 1.7733
    RE.get_or_init(|| Regex::new(r"TP\d*\s*[-–:]\s*(\d+(?:[.,]\d+)?)").expect("valid regex"))
}

fn tp_spaced_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // TP 1.7733 / TP2 1.7720
    RE.get_or_init(|| Regex::new(r"TP\d*\s+(\d+(?:[.,]\d+)?)").expect("valid regex"))
}

fn range_entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"FROM\s+(\d+(?:[.,]\d+)?)\s*[-–]\s*(\d+(?:[.,]\d+)?)").expect("valid regex")
    })
}

/// Whether the message carries explicitly numbered TP levels (the
/// structural cue distinguishing Fortune from the fixed-offset layouts).
pub(crate) fn has_explicit_targets(text: &str) -> bool {
    let upper = text.to_uppercase();
    tp_separator_regex().is_match(&upper) || tp_spaced_regex().is_match(&upper)
}

fn explicit_targets(text: &str) -> Vec<f64> {
    let upper = text.to_uppercase();
    let mut tps: Vec<f64> = Vec::new();
    for re in [tp_separator_regex(), tp_spaced_regex()] {
        for cap in re.captures_iter(&upper) {
            if let Ok(value) = cap[1].replace(',', ".").parse::<f64>() {
                if !tps.contains(&value) {
                    tps.push(value);
                }
            }
        }
    }
    tps.sort_by(f64::total_cmp);
    tps
}

/// Entry prices from the first line: either a "FROM x - y" range or the
/// first numeric token.
fn entries(text: &str) -> Vec<f64> {
    let first_line = text.lines().next().unwrap_or(text);
    let upper = first_line.to_uppercase();

    if let Some(cap) = range_entry_regex().captures(&upper) {
        let low = cap[1].replace(',', ".").parse::<f64>();
        let high = cap[2].replace(',', ".").parse::<f64>();
        if let (Ok(low), Ok(high)) = (low, high) {
            return vec![low, high];
        }
    }

    super::extract_numbers(first_line)
        .first()
        .map(|n| vec![*n])
        .unwrap_or_default()
}

pub(crate) fn parse(text: &str, parser: &SignalParser) -> Result<ParsedFields, ParseError> {
    let direction = super::detect_direction(text).ok_or(ParseError::UnknownDirection)?;
    let symbol = parser.find_symbol(text).ok_or(ParseError::UnknownSymbol)?;

    let entries = entries(text);
    let entry = *entries.first().ok_or(ParseError::MissingEntry)?;

    let stop_loss = super::extract_stop_loss(text).ok_or(ParseError::MissingStopLoss)?;

    let mut tps = explicit_targets(text);
    if tps.is_empty() {
        // Fallback: every number that is neither an entry nor the SL
        tps = super::extract_numbers(text)
            .into_iter()
            .filter(|n| {
                (n - stop_loss).abs() >= 0.01 && entries.iter().all(|e| (n - e).abs() >= 0.01)
            })
            .collect();
    }
    if tps.is_empty() {
        return Err(ParseError::MissingTargets);
    }

    let mut targets: Vec<Target> = tps
        .into_iter()
        .take(MAX_TARGETS)
        .enumerate()
        .map(|(i, level)| Target {
            index: (i + 1) as u8,
            value: TargetPrice::Level(level),
        })
        .collect();
    if targets.len() < MAX_TARGETS {
        targets.push(Target {
            index: (targets.len() + 1) as u8,
            value: TargetPrice::Open,
        });
    }

    Ok(ParsedFields {
        symbol,
        direction,
        entry_price: entry,
        stop_loss,
        targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;

    fn test_parser() -> SignalParser {
        let symbols = vec![
            "EURUSD".to_string(),
            "GBPCAD".to_string(),
            "GOLD".to_string(),
        ];
        SignalParser::new(&symbols, (3500.0, 3900.0))
    }

    #[test]
    fn test_explicit_tp_list() {
        let text = "SELL EURUSD 1.1750\nTP1 - 1.1740\nTP2 - 1.1730\nSL - 1.1765";
        let fields = parse(text, &test_parser()).unwrap();

        assert_eq!(fields.symbol, "EURUSD");
        assert_eq!(fields.direction, Direction::Sell);
        assert_eq!(fields.entry_price, 1.1750);
        assert_eq!(fields.stop_loss, 1.1765);

        let levels: Vec<f64> = fields.targets.iter().filter_map(|t| t.value.level()).collect();
        assert_eq!(levels, vec![1.1730, 1.1740]);
        // fewer than four explicit levels: open runner appended
        assert_eq!(fields.targets.last().unwrap().value, TargetPrice::Open);
        assert_eq!(fields.targets.len(), 3);
    }

    #[test]
    fn test_range_entry_uses_first_bound() {
        let text = "BUY GBPCAD FROM 1.8745 - 1.8755\nTP 1.8770\nSL 1.8720";
        let fields = parse(text, &test_parser()).unwrap();

        assert_eq!(fields.entry_price, 1.8745);
        assert_eq!(fields.stop_loss, 1.8720);
    }

    #[test]
    fn test_gold_alias_normalized() {
        let text = "Sell Gold 3654.50\nTP - 3650\nTP2 - 3645\nSL 3660";
        let fields = parse(text, &test_parser()).unwrap();

        assert_eq!(fields.symbol, "XAUUSD");
        assert_eq!(fields.entry_price, 3654.50);
    }

    #[test]
    fn test_four_explicit_targets_leave_no_room_for_open() {
        let text = "BUY EURUSD 1.1000\nTP 1.1010\nTP2 1.1020\nTP3 1.1030\nTP4 1.1040\nSL 1.0980";
        let fields = parse(text, &test_parser()).unwrap();

        assert_eq!(fields.targets.len(), 4);
        assert!(fields.targets.iter().all(|t| t.value.level().is_some()));
    }

    #[test]
    fn test_targets_sorted_and_deduplicated() {
        let text = "BUY EURUSD 1.1000\nTP 1.1030\nTP2 1.1010\nTP3 1.1030\nSL 1.0980";
        let fields = parse(text, &test_parser()).unwrap();

        let levels: Vec<f64> = fields.targets.iter().filter_map(|t| t.value.level()).collect();
        assert_eq!(levels, vec![1.1010, 1.1030]);
    }

    #[test]
    fn test_unknown_symbol_rejected() {
        let text = "BUY USDTRY 32.50\nTP 32.60\nSL 32.40";
        assert_eq!(parse(text, &test_parser()).unwrap_err(), ParseError::UnknownSymbol);
    }

    #[test]
    fn test_missing_stop_loss_rejected() {
        let text = "BUY EURUSD 1.1000\nTP 1.1010";
        assert_eq!(parse(text, &test_parser()).unwrap_err(), ParseError::MissingStopLoss);
    }
}
