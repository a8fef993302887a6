//! Fator R: which Anexo a service company uses.
//!
//! `fator_r = monthly payroll × 12 / annual revenue`. Service activities with
//! a ratio of at least 28% are taxed on Anexo III, the rest on Anexo V.
//! Other activities have a fixed Anexo and never compute the ratio.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CalculationError;
use crate::calculations::common::{ensure_non_negative, ensure_positive};
use crate::models::{Activity, Anexo};

/// Anexo chosen for an activity, with the ratio when it was computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnexoSelection {
    pub anexo: Anexo,
    pub fator_r: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct FatorRClassifier {
    threshold: Decimal,
}

impl FatorRClassifier {
    /// `threshold` is a ratio (`0.28`), not a percentage.
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Payroll-to-revenue ratio.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] if `annual_revenue <= 0`
    /// or `monthly_payroll < 0`.
    pub fn fator_r(
        &self,
        monthly_payroll: Decimal,
        annual_revenue: Decimal,
    ) -> Result<Decimal, CalculationError> {
        ensure_positive("annual_revenue", annual_revenue)?;
        ensure_non_negative("monthly_payroll", monthly_payroll)?;

        Ok(monthly_payroll * Decimal::from(12) / annual_revenue)
    }

    /// Anexo III or V for a service company.
    pub fn classify(
        &self,
        monthly_payroll: Decimal,
        annual_revenue: Decimal,
    ) -> Result<AnexoSelection, CalculationError> {
        let fator_r = self.fator_r(monthly_payroll, annual_revenue)?;
        let anexo = if fator_r >= self.threshold {
            Anexo::III
        } else {
            Anexo::V
        };

        debug!(fator_r = %fator_r, anexo = %anexo, "classified service activity by Fator R");

        Ok(AnexoSelection {
            anexo,
            fator_r: Some(fator_r),
        })
    }

    /// Anexo for any activity; only services go through [`Self::classify`].
    pub fn anexo_for(
        &self,
        activity: Activity,
        monthly_payroll: Decimal,
        annual_revenue: Decimal,
    ) -> Result<AnexoSelection, CalculationError> {
        let fixed = match activity {
            Activity::Servicos => return self.classify(monthly_payroll, annual_revenue),
            Activity::Comercio => Anexo::I,
            Activity::Industria => Anexo::II,
            Activity::TransportePassageiros | Activity::TransporteCargas => Anexo::III,
        };

        Ok(AnexoSelection {
            anexo: fixed,
            fator_r: None,
        })
    }

    /// Monthly payroll needed to reach the threshold for `annual_revenue`.
    pub fn payroll_for_threshold(
        &self,
        annual_revenue: Decimal,
    ) -> Decimal {
        self.threshold * annual_revenue / Decimal::from(12)
    }
}
