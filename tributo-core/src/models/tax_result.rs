use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Named tax lines that can appear in a [`TaxResult`] breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxComponent {
    /// Simples Nacional unified payment.
    Das,
    /// MEI fixed monthly fee, annualized.
    MeiFee,
    Irpj,
    IrpjAdicional,
    Csll,
    Pis,
    Cofins,
    Ibs,
    Cbs,
    ImpostoSeletivo,
}

impl TaxComponent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Das => "DAS",
            Self::MeiFee => "DAS-MEI",
            Self::Irpj => "IRPJ",
            Self::IrpjAdicional => "Adicional de IRPJ",
            Self::Csll => "CSLL",
            Self::Pis => "PIS",
            Self::Cofins => "COFINS",
            Self::Ibs => "IBS",
            Self::Cbs => "CBS",
            Self::ImpostoSeletivo => "Imposto Seletivo",
        }
    }
}

/// Uniform outcome of a tax calculation.
///
/// `amount_due` is always the sum of `breakdown`. Zero lines are kept out of
/// the breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxResult {
    pub nominal_rate_pct: Decimal,
    pub effective_rate_pct: Decimal,
    pub amount_due: Decimal,
    pub breakdown: BTreeMap<TaxComponent, Decimal>,
}

impl TaxResult {
    pub fn new(
        nominal_rate_pct: Decimal,
        effective_rate_pct: Decimal,
        lines: impl IntoIterator<Item = (TaxComponent, Decimal)>,
    ) -> Self {
        let breakdown: BTreeMap<TaxComponent, Decimal> = lines
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .collect();
        let amount_due = breakdown.values().copied().sum();

        Self {
            nominal_rate_pct,
            effective_rate_pct,
            amount_due,
            breakdown,
        }
    }

    pub fn component(
        &self,
        component: TaxComponent,
    ) -> Decimal {
        self.breakdown
            .get(&component)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}
