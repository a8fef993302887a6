use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, code_from};
use crate::calculations::common::{checked_product, ensure_amount};
use crate::calculations::{
    PricingCalculator, PricingInput, PricingRegime, PricingResult, PricingScenario,
};
use crate::models::{Activity, Anexo, Regime};
use crate::policy::TaxPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MargemRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub custo_unitario: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub despesas_fixas_mensais: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub despesas_variaveis_percentual: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantidade_mensal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub margem_desejada: Decimal,
    #[serde(default)]
    pub regime: Option<String>,
    #[serde(default)]
    pub anexo_simples: Option<Value>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub rbt12: Option<Decimal>,
    #[serde(default)]
    pub atividade_presumido: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MargemResponse {
    pub success: bool,
    pub data: MargemDados,
}

#[derive(Debug, Clone, Serialize)]
pub struct MargemDados {
    pub precos: Precos,
    pub custos: Custos,
    pub tributos: Tributos,
    pub resultado: Resultado,
    pub cenarios: Vec<Cenario>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Precos {
    #[serde(with = "rust_decimal::serde::float")]
    pub preco_venda: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub preco_minimo: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub markup: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Custos {
    #[serde(with = "rust_decimal::serde::float")]
    pub custo_unitario: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub custo_fixo_unitario: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub custo_total_unitario: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub despesas_variaveis_unitarias: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tributos {
    pub regime: Regime,
    #[serde(with = "rust_decimal::serde::float")]
    pub aliquota: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor_unitario: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor_mensal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub imposto_renda_mensal: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resultado {
    #[serde(with = "rust_decimal::serde::float")]
    pub receita_mensal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub lucro_mensal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub margem_liquida: Decimal,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ponto_equilibrio: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cenario {
    pub nome: String,
    pub regime: Regime,
    #[serde(with = "rust_decimal::serde::float")]
    pub margem: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub aliquota: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub preco: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub lucro_mensal: Decimal,
}

pub(super) fn calcular(
    policy: &TaxPolicy,
    request: MargemRequest,
) -> Result<MargemResponse, ApiError> {
    let input = pricing_input(&request)?;
    let result = PricingCalculator::new(policy).calculate(&input)?;
    Ok(response(result))
}

pub(super) fn comparar(
    policy: &TaxPolicy,
    request: MargemRequest,
) -> Result<MargemResponse, ApiError> {
    let input = pricing_input(&request)?;
    let regimes = [
        simples_regime(&request)?,
        PricingRegime::Presumido {
            activity: presumido_activity(&request)?,
        },
        PricingRegime::Real,
    ];
    let result = PricingCalculator::new(policy).compare(&input, &regimes)?;
    Ok(response(result))
}

fn pricing_input(request: &MargemRequest) -> Result<PricingInput, ApiError> {
    let regime = match request.regime.as_deref().map(Regime::parse) {
        None | Some(Some(Regime::Simples)) => simples_regime(request)?,
        Some(Some(Regime::Presumido)) => PricingRegime::Presumido {
            activity: presumido_activity(request)?,
        },
        Some(Some(Regime::Real)) => PricingRegime::Real,
        Some(Some(Regime::Mei)) | Some(None) => {
            return Err(ApiError::field(
                "regime",
                format!(
                    "expected simples, presumido or real, got {}",
                    request.regime.as_deref().unwrap_or_default()
                ),
            ));
        }
    };

    Ok(PricingInput {
        unit_cost: request.custo_unitario,
        monthly_fixed_expenses: request.despesas_fixas_mensais,
        variable_expenses_pct: request.despesas_variaveis_percentual,
        monthly_quantity: request.quantidade_mensal,
        desired_margin_pct: request.margem_desejada,
        regime,
    })
}

/// Simples regime from the request. Without `rbt12` the annual revenue is
/// estimated from twelve months of total cost.
fn simples_regime(request: &MargemRequest) -> Result<PricingRegime, ApiError> {
    let anexo = match &request.anexo_simples {
        None | Some(Value::Null) => Anexo::I,
        Some(value) => code_from(value)
            .as_deref()
            .and_then(Anexo::parse)
            .ok_or_else(|| ApiError::field("anexoSimples", format!("unknown Anexo {value}")))?,
    };
    let rbt12 = match request.rbt12 {
        Some(rbt12) => rbt12,
        None => {
            let fixed = ensure_amount("despesasFixasMensais", request.despesas_fixas_mensais)?;
            let variable = checked_product(
                "quantidadeMensal",
                request.custo_unitario,
                request.quantidade_mensal,
            )?;
            (ensure_amount("quantidadeMensal", variable)? + fixed) * Decimal::from(12)
        }
    };

    Ok(PricingRegime::Simples { anexo, rbt12 })
}

fn presumido_activity(request: &MargemRequest) -> Result<Activity, ApiError> {
    match request.atividade_presumido.as_deref() {
        None => Ok(Activity::Comercio),
        Some(code) => Activity::parse(code).ok_or_else(|| {
            ApiError::field("atividadePresumido", format!("unknown activity {code}"))
        }),
    }
}

fn response(result: PricingResult) -> MargemResponse {
    MargemResponse {
        success: true,
        data: MargemDados {
            precos: Precos {
                preco_venda: result.prices.sale_price,
                preco_minimo: result.prices.minimum_price,
                markup: result.prices.markup,
            },
            custos: Custos {
                custo_unitario: result.costs.unit_cost,
                custo_fixo_unitario: result.costs.fixed_per_unit,
                custo_total_unitario: result.costs.total_unit_cost,
                despesas_variaveis_unitarias: result.costs.variable_per_unit,
            },
            tributos: Tributos {
                regime: result.taxes.regime,
                aliquota: result.taxes.rate_pct,
                valor_unitario: result.taxes.per_unit,
                valor_mensal: result.taxes.monthly,
                imposto_renda_mensal: result.taxes.monthly_income_tax,
            },
            resultado: Resultado {
                receita_mensal: result.outcome.monthly_revenue,
                lucro_mensal: result.outcome.monthly_profit,
                margem_liquida: result.outcome.net_margin_pct,
                ponto_equilibrio: result.outcome.break_even_units,
            },
            cenarios: result.scenarios.into_iter().map(cenario).collect(),
        },
    }
}

fn cenario(scenario: PricingScenario) -> Cenario {
    Cenario {
        nome: scenario.label,
        regime: scenario.regime,
        margem: scenario.margin_pct,
        aliquota: scenario.tax_rate_pct,
        preco: scenario.price,
        lucro_mensal: scenario.monthly_profit,
    }
}
