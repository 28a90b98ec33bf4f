//! ICM layout: single implied symbol, explicit SL line, fixed TP offsets.

use crate::error::ParseError;
use crate::models::{Target, TargetPrice};

use super::ParsedFields;

/// Fixed take-profit offsets from entry, sign applied per direction.
const TP_OFFSETS: [f64; 3] = [2.5, 5.0, 8.0];

const IMPLIED_SYMBOL: &str = "XAUUSD";

pub(crate) fn parse(text: &str, entry_band: (f64, f64)) -> Result<ParsedFields, ParseError> {
    let direction = super::detect_direction(text).ok_or(ParseError::UnknownDirection)?;

    let numbers = super::extract_numbers(text);
    let entry = *numbers.first().ok_or(ParseError::MissingEntry)?;

    // Plausibility band: an entry outside it is some other instrument
    // this layout cannot describe.
    let (min, max) = entry_band;
    if !(min..=max).contains(&entry) {
        return Err(ParseError::EntryOutOfRange { entry, min, max });
    }

    let stop_loss = super::extract_stop_loss(text).ok_or(ParseError::MissingStopLoss)?;

    let sign = direction.sign();
    let targets = TP_OFFSETS
        .iter()
        .enumerate()
        .map(|(i, offset)| Target {
            index: (i + 1) as u8,
            value: TargetPrice::Level(entry + sign * offset),
        })
        .collect();

    Ok(ParsedFields {
        symbol: IMPLIED_SYMBOL.to_string(),
        direction,
        entry_price: entry,
        stop_loss,
        targets,
    })
}
