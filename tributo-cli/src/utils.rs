use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;
use tributo_core::ExpenseCategory;

/// Error returned when money text cannot be parsed as a [`Decimal`].
#[derive(Debug, Error)]
pub enum ParseBrlError {
    #[error("invalid amount '{0}': expected something like 'R$ 1.234,56' or '1234.56'")]
    Format(String),

    #[error("invalid amount '{input}': {source}")]
    Decimal {
        input: String,
        #[source]
        source: rust_decimal::Error,
    },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Parses money text in Brazilian or international notation.
///
/// An optional `R$` prefix and sign are accepted. Whichever separator
/// appears last is the decimal point (`"1.234,56"` and `"1,234.56"` are both
/// 1234.56); a lone comma is a decimal comma. Empty input is treated as 0.
pub fn parse_brl(s: &str) -> Result<Decimal, ParseBrlError> {
    let shape = Regex::new(r"^(?P<sign>-)?\s*(?:R\$)?\s*(?P<num>\d[\d.,]*)$")?;

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let caps = shape
        .captures(trimmed)
        .ok_or_else(|| ParseBrlError::Format(s.to_string()))?;
    let num = &caps["num"];

    let normalized = match (num.rfind(','), num.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => num.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => num.replace(',', ""),
        (Some(_), None) => num.replace(',', "."),
        (None, _) => num.to_string(),
    };

    let value = Decimal::from_str(&normalized).map_err(|e| {
        tracing::error!(input = %s, "invalid amount: {}", e);
        ParseBrlError::Decimal {
            input: s.to_string(),
            source: e,
        }
    })?;

    Ok(if caps.name("sign").is_some() {
        -value
    } else {
        value
    })
}

/// Parses a `categoria=valor` pair for the credit commands.
pub fn parse_expense(s: &str) -> Result<(ExpenseCategory, Decimal), String> {
    let (category, amount) = s
        .split_once('=')
        .ok_or_else(|| format!("expected categoria=valor, got '{s}'"))?;
    let category = ExpenseCategory::parse(category)
        .ok_or_else(|| format!("unknown expense category '{}'", category.trim()))?;
    let amount = parse_brl(amount).map_err(|e| e.to_string())?;

    Ok((category, amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_brl_accepts_brazilian_notation() {
        assert_eq!(parse_brl("R$ 1.234,56").unwrap(), dec!(1234.56));
        assert_eq!(parse_brl("1.234.567,89").unwrap(), dec!(1234567.89));
        assert_eq!(parse_brl("1234,5").unwrap(), dec!(1234.5));
    }

    #[test]
    fn parse_brl_accepts_international_notation() {
        assert_eq!(parse_brl("1,234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_brl("1234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_brl("60000").unwrap(), dec!(60000));
    }

    #[test]
    fn parse_brl_handles_sign_and_whitespace() {
        assert_eq!(parse_brl("  -R$ 50,00 ").unwrap(), dec!(-50));
        assert_eq!(parse_brl("R$1000").unwrap(), dec!(1000));
    }

    #[test]
    fn parse_brl_empty_treated_as_zero() {
        assert_eq!(parse_brl("").unwrap(), Decimal::ZERO);
        assert_eq!(parse_brl("   ").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn parse_brl_rejects_text() {
        assert!(matches!(parse_brl("abc"), Err(ParseBrlError::Format(_))));
        assert!(matches!(parse_brl("US$ 10"), Err(ParseBrlError::Format(_))));
    }

    #[test]
    fn parse_brl_rejects_repeated_decimal_point() {
        assert!(matches!(
            parse_brl("1.2.3"),
            Err(ParseBrlError::Decimal { .. })
        ));
    }

    #[test]
    fn parse_expense_reads_pair() {
        assert_eq!(
            parse_expense("energia=R$ 1.500,00").unwrap(),
            (ExpenseCategory::Energia, dec!(1500))
        );
    }

    #[test]
    fn parse_expense_rejects_unknown_category() {
        let err = parse_expense("salarios=100").unwrap_err();

        assert!(err.contains("salarios"));
    }
}
