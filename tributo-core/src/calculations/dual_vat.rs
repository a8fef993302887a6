//! IBS/CBS split of the reform's dual VAT.
//!
//! The nominal IVA rate is divided between the subnational IBS (61%) and the
//! federal CBS (39%). The Imposto Seletivo, when the product is subject to
//! it, is added on top and is not creditable.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::CalculationError;
use crate::calculations::common::{ensure_non_negative, max, percent_of, round_half_up};
use crate::policy::{ReformPolicy, SelectiveCategory};

/// IBS share of the IVA rate.
pub const IBS_SHARE: Decimal = dec!(0.61);
/// CBS share of the IVA rate.
pub const CBS_SHARE: Decimal = dec!(0.39);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualVatSplit {
    pub base: Decimal,
    pub iva_rate_pct: Decimal,
    pub ibs_rate_pct: Decimal,
    pub cbs_rate_pct: Decimal,
    pub selective_rate_pct: Decimal,
    pub ibs: Decimal,
    pub cbs: Decimal,
    pub selective: Decimal,
    pub total: Decimal,
}

/// Dual VAT on sales after credits on purchases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualVatSettlement {
    pub debit: DualVatSplit,
    pub ibs_credit: Decimal,
    pub cbs_credit: Decimal,
    pub ibs_due: Decimal,
    pub cbs_due: Decimal,
    pub selective_due: Decimal,
    pub total_due: Decimal,
    pub accumulated_credit: Decimal,
}

/// Splits an IVA rate into its IBS and CBS parts.
///
/// CBS is taken as the remainder so that `ibs + cbs == rate` holds exactly.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tributo_core::calculations::split_rate;
///
/// assert_eq!(split_rate(dec!(26.5)), (dec!(16.165), dec!(10.335)));
/// ```
pub fn split_rate(rate_pct: Decimal) -> (Decimal, Decimal) {
    let ibs = rate_pct * IBS_SHARE;
    (ibs, rate_pct - ibs)
}

#[derive(Debug, Clone)]
pub struct DualVatSplitter<'a> {
    policy: &'a ReformPolicy,
}

impl<'a> DualVatSplitter<'a> {
    pub fn new(policy: &'a ReformPolicy) -> Self {
        Self { policy }
    }

    /// IBS, CBS and Imposto Seletivo on `base`.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] if `base` or
    /// `iva_rate_pct` is negative.
    pub fn split(
        &self,
        base: Decimal,
        iva_rate_pct: Decimal,
        selective: Option<SelectiveCategory>,
    ) -> Result<DualVatSplit, CalculationError> {
        let base = ensure_non_negative("base", base)?;
        let iva_rate_pct = ensure_non_negative("iva_rate_pct", iva_rate_pct)?;

        let (ibs_rate_pct, cbs_rate_pct) = split_rate(iva_rate_pct);
        let selective_rate_pct = selective
            .map(|category| self.policy.selective_rate(category))
            .unwrap_or(Decimal::ZERO);

        let ibs = round_half_up(percent_of(base, ibs_rate_pct));
        let cbs = round_half_up(percent_of(base, cbs_rate_pct));
        let selective = round_half_up(percent_of(base, selective_rate_pct));

        debug!(
            base = %base,
            iva_rate_pct = %iva_rate_pct,
            selective_rate_pct = %selective_rate_pct,
            "split dual VAT"
        );

        Ok(DualVatSplit {
            base,
            iva_rate_pct,
            ibs_rate_pct,
            cbs_rate_pct,
            selective_rate_pct,
            ibs,
            cbs,
            selective,
            total: ibs + cbs + selective,
        })
    }

    /// Split at the policy's reference IVA rate.
    ///
    /// # Errors
    ///
    /// Same as [`DualVatSplitter::split`].
    pub fn split_reference(
        &self,
        base: Decimal,
        selective: Option<SelectiveCategory>,
    ) -> Result<DualVatSplit, CalculationError> {
        self.split(base, self.policy.reference_iva_rate_pct, selective)
    }

    /// IBS/CBS debit on `sales` minus the credit on `purchases`.
    ///
    /// Each tax floors at zero on its own; the excess credit is reported.
    ///
    /// # Errors
    ///
    /// Same as [`DualVatSplitter::split`], for either amount.
    pub fn split_with_credits(
        &self,
        sales: Decimal,
        purchases: Decimal,
        iva_rate_pct: Decimal,
        selective: Option<SelectiveCategory>,
    ) -> Result<DualVatSettlement, CalculationError> {
        let debit = self.split(sales, iva_rate_pct, selective)?;
        let credit = self.split(purchases, iva_rate_pct, None)?;

        let ibs_balance = debit.ibs - credit.ibs;
        let cbs_balance = debit.cbs - credit.cbs;
        let accumulated_credit =
            max(-ibs_balance, Decimal::ZERO) + max(-cbs_balance, Decimal::ZERO);

        if accumulated_credit > Decimal::ZERO {
            warn!(
                sales = %sales,
                purchases = %purchases,
                accumulated_credit = %accumulated_credit,
                "IBS/CBS credits exceed the debit; amount due floored at zero"
            );
        }

        let ibs_due = max(ibs_balance, Decimal::ZERO);
        let cbs_due = max(cbs_balance, Decimal::ZERO);
        let selective_due = debit.selective;

        Ok(DualVatSettlement {
            ibs_credit: credit.ibs,
            cbs_credit: credit.cbs,
            ibs_due,
            cbs_due,
            selective_due,
            total_due: ibs_due + cbs_due + selective_due,
            accumulated_credit,
            debit,
        })
    }
}
