//! Default layout: entry only, stop-loss and targets derived at fixed
//! distances.

use crate::error::ParseError;
use crate::models::{Target, TargetPrice};

use super::ParsedFields;

const SL_DISTANCE: f64 = 8.0;
const TP_OFFSETS: [f64; 3] = [2.0, 4.0, 6.0];

const IMPLIED_SYMBOL: &str = "XAUUSD";

pub(crate) fn parse(text: &str) -> Result<ParsedFields, ParseError> {
    let direction = super::detect_direction(text).ok_or(ParseError::UnknownDirection)?;

    let numbers = super::extract_numbers(text);
    let entry = *numbers.first().ok_or(ParseError::MissingEntry)?;

    let sign = direction.sign();
    let stop_loss = entry - sign * SL_DISTANCE;

    let mut targets: Vec<Target> = TP_OFFSETS
        .iter()
        .enumerate()
        .map(|(i, offset)| Target {
            index: (i + 1) as u8,
            value: TargetPrice::Level(entry + sign * offset),
        })
        .collect();
    // Final runner with no cap
    targets.push(Target {
        index: (TP_OFFSETS.len() + 1) as u8,
        value: TargetPrice::Open,
    });

    Ok(ParsedFields {
        symbol: IMPLIED_SYMBOL.to_string(),
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

    #[test]
    fn test_buy_derived_levels() {
        let fields = parse("buy 3600 now, tp and sl as usual").unwrap();

        assert_eq!(fields.direction, Direction::Buy);
        assert_eq!(fields.entry_price, 3600.0);
        assert_eq!(fields.stop_loss, 3592.0);

        let levels: Vec<f64> = fields.targets.iter().filter_map(|t| t.value.level()).collect();
        assert_eq!(levels, vec![3602.0, 3604.0, 3606.0]);
        assert_eq!(fields.targets.len(), 4);
        assert_eq!(fields.targets[3].value, TargetPrice::Open);
        assert_eq!(fields.targets[3].index, 4);
    }

    #[test]
    fn test_sell_derived_levels() {
        let fields = parse("sell 3650,5 tp sl").unwrap();

        assert_eq!(fields.entry_price, 3650.5);
        assert_eq!(fields.stop_loss, 3658.5);

        let levels: Vec<f64> = fields.targets.iter().filter_map(|t| t.value.level()).collect();
        assert_eq!(levels, vec![3648.5, 3646.5, 3644.5]);
    }

    #[test]
    fn test_no_entry_found() {
        assert_eq!(parse("buy tp sl").unwrap_err(), ParseError::MissingEntry);
    }
}
