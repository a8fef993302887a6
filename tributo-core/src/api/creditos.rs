use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use super::{ApiError, decimal_from};
use crate::calculations::common::{ensure_amount, ensure_non_negative, round_half_up};
use crate::calculations::{CreditLedger, CreditStatement};
use crate::models::ExpenseCategory;
use crate::policy::TaxPolicy;

const REVENUE_KEY: &str = "receitaBruta";

#[derive(Debug, Clone, Serialize)]
pub struct CreditosResponse {
    pub sucesso: bool,
    pub creditos: CreditosTotais,
    pub detalhamento: Vec<DetalheCredito>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub economia: Option<EconomiaCreditos>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditosTotais {
    #[serde(with = "rust_decimal::serde::float")]
    pub base_calculo: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub pis: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub cofins: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetalheCredito {
    pub categoria: ExpenseCategory,
    pub descricao: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub credito_pis: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub credito_cofins: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub credito_total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomiaCreditos {
    #[serde(with = "rust_decimal::serde::float")]
    pub receita_bruta: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub debito_pis: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub debito_cofins: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub debito_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor_a_pagar: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub economia: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub economia_percentual: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub credito_acumulado: Decimal,
}

pub(super) fn calcular(
    policy: &TaxPolicy,
    body: &Value,
) -> Result<CreditosResponse, ApiError> {
    let (expenses, _) = read_body(body)?;
    let statement = CreditLedger::new(&policy.credits).calculate(&expenses)?;
    Ok(response(&statement, None))
}

pub(super) fn simular(
    policy: &TaxPolicy,
    body: &Value,
) -> Result<CreditosResponse, ApiError> {
    let (expenses, revenue) = read_body(body)?;
    let revenue =
        revenue.ok_or_else(|| ApiError::field(REVENUE_KEY, "required to simulate the savings"))?;

    let ledger = CreditLedger::new(&policy.credits);
    let statement = ledger.calculate(&expenses)?;
    let simulation = ledger.simulate(&expenses, revenue)?;

    let economia = EconomiaCreditos {
        receita_bruta: simulation.revenue,
        debito_pis: simulation.pis_debit,
        debito_cofins: simulation.cofins_debit,
        debito_total: simulation.gross_due,
        valor_a_pagar: simulation.net_due,
        economia: simulation.savings,
        economia_percentual: round_half_up(simulation.savings_pct_of_revenue),
        credito_acumulado: simulation.accumulated_credit,
    };

    Ok(response(&statement, Some(economia)))
}

/// Splits the flat body into expense categories and the optional revenue.
fn read_body(body: &Value) -> Result<(BTreeMap<ExpenseCategory, Decimal>, Option<Decimal>), ApiError> {
    let Value::Object(fields) = body else {
        return Err(ApiError::field("body", "expected an object of category amounts"));
    };

    let mut expenses = BTreeMap::new();
    let mut revenue = None;

    for (key, value) in fields {
        if value.is_null() {
            continue;
        }
        if key == REVENUE_KEY {
            revenue = Some(ensure_amount(REVENUE_KEY, decimal_from(key, value)?)?);
            continue;
        }

        let category = ExpenseCategory::parse(key)
            .ok_or_else(|| ApiError::field(key.as_str(), "unknown expense category"))?;
        let amount = ensure_non_negative(category.as_str(), decimal_from(key, value)?)?;
        if expenses.insert(category, amount).is_some() {
            return Err(ApiError::field(
                key.as_str(),
                format!("category {category} sent more than once"),
            ));
        }
    }

    Ok((expenses, revenue))
}

fn response(
    statement: &CreditStatement,
    economia: Option<EconomiaCreditos>,
) -> CreditosResponse {
    let detalhamento = statement
        .lines
        .iter()
        .map(|line| DetalheCredito {
            categoria: line.category,
            descricao: line.category.label().to_string(),
            valor: line.amount,
            credito_pis: round_half_up(line.pis_credit),
            credito_cofins: round_half_up(line.cofins_credit),
            credito_total: round_half_up(line.total_credit),
        })
        .collect();

    CreditosResponse {
        sucesso: true,
        creditos: CreditosTotais {
            base_calculo: statement.totals.base,
            pis: round_half_up(statement.totals.pis),
            cofins: round_half_up(statement.totals.cofins),
            total: round_half_up(statement.totals.total),
        },
        detalhamento,
        economia,
    }
}
