//! Shared arithmetic for the calculators.
//!
//! Rounding, percentage helpers and the input guards every calculator runs
//! before touching a value. Keeping the floors and guards here means no
//! caller has to re-implement them.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::CalculationError;

/// Largest amount any calculator accepts: one quadrillion reais.
///
/// Amounts up to this bound can be multiplied by a rate or a month count
/// without leaving the range of [`Decimal`].
pub const MAX_AMOUNT: Decimal = dec!(1000000000000000);

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// Monetary results (reais and centavos) go through this function; rates are
/// left unrounded.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use tributo_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the maximum of two decimal values.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use tributo_core::calculations::common::max;
///
/// assert_eq!(max(dec!(100.00), dec!(200.00)), dec!(200.00));
/// assert_eq!(max(dec!(-100.00), dec!(-200.00)), dec!(-100.00));
/// ```
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

/// `base * pct / 100`, unrounded.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tributo_core::calculations::common::percent_of;
///
/// assert_eq!(percent_of(dec!(1000000), dec!(1.65)), dec!(16500));
/// ```
pub fn percent_of(
    base: Decimal,
    pct: Decimal,
) -> Decimal {
    base * pct / Decimal::ONE_HUNDRED
}

/// `part / whole * 100`, or zero when `whole` is zero.
///
/// Callers validate `whole` first where a zero denominator is an input
/// error; the zero fallback only covers derived ratios.
pub fn ratio_pct(
    part: Decimal,
    whole: Decimal,
) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part / whole * Decimal::ONE_HUNDRED
    }
}

/// `a * b`, failing with [`CalculationError::InvalidInput`] on `field`
/// when the product leaves the range of [`Decimal`].
pub fn checked_product(
    field: &'static str,
    a: Decimal,
    b: Decimal,
) -> Result<Decimal, CalculationError> {
    a.checked_mul(b)
        .ok_or_else(|| CalculationError::invalid(field, format!("{a} × {b} is out of range")))
}

/// Fails with [`CalculationError::InvalidInput`] if `|value|` exceeds
/// [`MAX_AMOUNT`].
pub fn ensure_amount(
    field: &'static str,
    value: Decimal,
) -> Result<Decimal, CalculationError> {
    if value.abs() > MAX_AMOUNT {
        return Err(CalculationError::invalid(
            field,
            format!("must not exceed {MAX_AMOUNT}, got {value}"),
        ));
    }
    Ok(value)
}

/// Fails with [`CalculationError::InvalidInput`] unless
/// `0 < value <= MAX_AMOUNT`.
pub fn ensure_positive(
    field: &'static str,
    value: Decimal,
) -> Result<Decimal, CalculationError> {
    if value <= Decimal::ZERO {
        return Err(CalculationError::invalid(
            field,
            format!("must be positive, got {value}"),
        ));
    }
    ensure_amount(field, value)
}

/// Fails with [`CalculationError::InvalidInput`] unless
/// `0 <= value <= MAX_AMOUNT`.
pub fn ensure_non_negative(
    field: &'static str,
    value: Decimal,
) -> Result<Decimal, CalculationError> {
    if value < Decimal::ZERO {
        return Err(CalculationError::invalid(
            field,
            format!("must not be negative, got {value}"),
        ));
    }
    ensure_amount(field, value)
}

/// Fails with [`CalculationError::InvalidInput`] unless `0 <= value <= 100`.
pub fn ensure_percentage(
    field: &'static str,
    value: Decimal,
) -> Result<Decimal, CalculationError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(CalculationError::invalid(
            field,
            format!("must be within 0-100, got {value}"),
        ));
    }
    Ok(value)
}
