use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::order::TradeType;

/// The decoded components of an OCC option symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccComponents {
    pub root: String,
    pub expiration: NaiveDate,
    pub trade_type: TradeType,
    /// Strike price in whole dollars and cents, reconstructed from the 8-digit field.
    pub strike: Decimal,
}

/// Builds the 21(+)-char OCC symbol `ROOT + YYMMDD + C|P + 8-digit strike (strike * 1000)`.
pub fn format_occ(root: &str, expiration: NaiveDate, trade_type: TradeType, strike: Decimal) -> String {
    let type_char = match trade_type {
        TradeType::Call => 'C',
        TradeType::Put => 'P',
    };
    let strike_thousandths = (strike * Decimal::from(1000))
        .round()
        .to_string()
        .parse::<i64>()
        .unwrap_or(0);
    format!(
        "{root}{}{type_char}{strike_thousandths:08}",
        expiration.format("%y%m%d"),
    )
}

/// Parses an OCC symbol into its components. Accepts only well-formed strings:
/// an uppercase-alnum root, 6 date digits, one C/P, and 8 strike digits.
pub fn parse_occ(symbol: &str) -> Result<OccComponents, String> {
    if symbol.len() < 15 {
        return Err(format!("symbol '{symbol}' is too short to be a valid OCC symbol"));
    }
    let (root_and_date, rest) = symbol.split_at(symbol.len() - 9);
    if root_and_date.len() < 6 {
        return Err(format!("symbol '{symbol}' has no room for a root"));
    }
    let (root, date_str) = root_and_date.split_at(root_and_date.len() - 6);
    if root.is_empty() {
        return Err(format!("symbol '{symbol}' has an empty root"));
    }
    let type_char = rest.chars().next().ok_or_else(|| format!("symbol '{symbol}' missing type char"))?;
    let strike_str = &rest[1..];

    let trade_type = match type_char {
        'C' => TradeType::Call,
        'P' => TradeType::Put,
        other => return Err(format!("symbol '{symbol}' has unknown type char '{other}'")),
    };

    let expiration = NaiveDate::parse_from_str(date_str, "%y%m%d")
        .map_err(|e| format!("symbol '{symbol}' has an unparseable date '{date_str}': {e}"))?;

    let strike_thousandths: i64 = strike_str
        .parse()
        .map_err(|_| format!("symbol '{symbol}' has a non-numeric strike field '{strike_str}'"))?;
    let strike = Decimal::from(strike_thousandths) / Decimal::from(1000);

    Ok(OccComponents {
        root: root.to_string(),
        expiration,
        trade_type,
        strike,
    })
}
