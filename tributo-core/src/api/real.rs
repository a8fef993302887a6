use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, code_from};
use crate::calculations::common::round_half_up;
use crate::calculations::{
    ActualProfitCalculator, ActualProfitInput, ActualProfitResult, NonCumulativeLine,
};
use crate::models::{ApurationPeriod, TaxComponent};
use crate::policy::TaxPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub receita: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub despesas: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub folha: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub creditos_pis: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub creditos_cofins: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub prejuizo_acumulado: Decimal,
    #[serde(default)]
    pub periodo: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealResponse {
    pub sucesso: bool,
    pub apuracao: Apuracao,
    pub tributos: RealTributos,
    pub resumo: Resumo,
    pub detalhamento: Vec<LinhaDetalhe>,
    pub vantagens: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Apuracao {
    pub periodo: ApurationPeriod,
    pub meses: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub receita: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub lucro_contabil: Decimal,
    pub prejuizo: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub prejuizo_fiscal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub compensacao_prejuizo: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub saldo_prejuizo: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub lucro_tributavel: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealTributos {
    pub irpj: IrpjDetalhe,
    pub csll: TributoSobreLucro,
    pub pis: ContribuicaoNaoCumulativa,
    pub cofins: ContribuicaoNaoCumulativa,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IrpjDetalhe {
    #[serde(with = "rust_decimal::serde::float")]
    pub base: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub aliquota: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub adicional: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TributoSobreLucro {
    #[serde(with = "rust_decimal::serde::float")]
    pub base: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub aliquota: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContribuicaoNaoCumulativa {
    #[serde(with = "rust_decimal::serde::float")]
    pub aliquota: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub debito: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub credito: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub a_pagar: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub credito_acumulado: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resumo {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_tributos: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub carga_tributaria: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub credito_acumulado: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub lucro_liquido: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinhaDetalhe {
    pub tributo: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor: Decimal,
}

pub(super) fn calcular(
    policy: &TaxPolicy,
    request: RealRequest,
) -> Result<RealResponse, ApiError> {
    let period = period_from(request.periodo.as_ref())?;
    let input = ActualProfitInput {
        revenue: request.receita,
        operating_expenses: request.despesas,
        payroll: request.folha,
        pis_credits: request.creditos_pis,
        cofins_credits: request.creditos_cofins,
        period,
        compensable_loss: request.prejuizo_acumulado,
    };

    let result = ActualProfitCalculator::new(&policy.real, &policy.credits).calculate(&input)?;

    let detalhamento = result
        .tax_result()
        .breakdown
        .into_iter()
        .map(|(component, valor)| LinhaDetalhe {
            tributo: component.label().to_string(),
            valor,
        })
        .collect();
    let vantagens = advantages(&result);

    Ok(RealResponse {
        sucesso: true,
        apuracao: Apuracao {
            periodo: period,
            meses: period.months(),
            receita: request.receita,
            lucro_contabil: result.accounting_profit,
            prejuizo: result.is_loss,
            prejuizo_fiscal: result.tax_loss,
            compensacao_prejuizo: result.loss_offset_used,
            saldo_prejuizo: result.remaining_loss,
            lucro_tributavel: result.taxable_profit,
        },
        tributos: RealTributos {
            irpj: IrpjDetalhe {
                base: result.taxable_profit,
                aliquota: policy.real.irpj_rate_pct,
                valor: result.irpj,
                adicional: result.irpj_surtax,
                total: result.irpj + result.irpj_surtax,
            },
            csll: TributoSobreLucro {
                base: result.taxable_profit,
                aliquota: policy.real.csll_rate_pct,
                valor: result.csll,
            },
            pis: contribution(policy.credits.pis_pct, &result.pis),
            cofins: contribution(policy.credits.cofins_pct, &result.cofins),
        },
        resumo: Resumo {
            total_tributos: result.total,
            carga_tributaria: round_half_up(result.effective_rate_pct),
            credito_acumulado: result.accumulated_credit,
            lucro_liquido: result.accounting_profit - result.income_taxes(),
        },
        detalhamento,
        vantagens,
    })
}

/// `periodo` as `"trimestral"`/`"anual"` or as a month count.
fn period_from(value: Option<&Value>) -> Result<ApurationPeriod, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(ApurationPeriod::default()),
        Some(value) => code_from(value)
            .as_deref()
            .and_then(ApurationPeriod::parse)
            .ok_or_else(|| {
                ApiError::field("periodo", format!("expected trimestral or anual, got {value}"))
            }),
    }
}

fn contribution(
    rate_pct: Decimal,
    line: &NonCumulativeLine,
) -> ContribuicaoNaoCumulativa {
    ContribuicaoNaoCumulativa {
        aliquota: rate_pct,
        debito: line.debit,
        credito: line.credit,
        a_pagar: line.due,
        credito_acumulado: line.accumulated_credit,
    }
}

fn advantages(result: &ActualProfitResult) -> Vec<String> {
    let mut vantagens = Vec::new();

    let credits = result.pis.credit + result.cofins.credit;
    if credits > Decimal::ZERO {
        vantagens.push(format!(
            "Créditos de PIS/COFINS reduziram as contribuições em R$ {}.",
            credits - result.accumulated_credit
        ));
    }
    if result.is_loss {
        vantagens.push(
            "Sem lucro no período não há IRPJ nem CSLL; o prejuízo fiscal fica para compensação futura."
                .to_string(),
        );
    } else {
        vantagens.push(format!(
            "IRPJ e CSLL incidem sobre o lucro efetivo de R$ {}, e não sobre uma margem presumida.",
            result.taxable_profit
        ));
    }
    if result.loss_offset_used > Decimal::ZERO {
        vantagens.push(format!(
            "Prejuízos anteriores compensaram R$ {} do lucro (limite de 30%).",
            result.loss_offset_used
        ));
    }
    if result.accumulated_credit > Decimal::ZERO {
        vantagens.push(format!(
            "R$ {} de crédito acumulado ficam para os próximos períodos.",
            result.accumulated_credit
        ));
    }
    if result.tax_result().component(TaxComponent::IrpjAdicional).is_zero() && !result.is_loss {
        vantagens.push("Lucro abaixo do limite do adicional de IRPJ.".to_string());
    }

    vantagens
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::api::dispatch;
    use crate::policy::TaxPolicy;

    #[test]
    fn calcular_quarterly_profit() {
        let policy = TaxPolicy::default();
        let body = json!({
            "receita": 1000000,
            "despesas": 700000,
            "folha": 0,
            "creditosPis": 0,
            "creditosCofins": 0,
            "periodo": "trimestral"
        });

        let response = dispatch(&policy, "/real/calcular", &body).unwrap();

        assert_eq!(response["sucesso"], json!(true));
        assert_eq!(response["tributos"]["irpj"]["valor"], json!(45000.0));
        assert_eq!(response["tributos"]["irpj"]["adicional"], json!(24000.0));
        assert_eq!(response["tributos"]["irpj"]["total"], json!(69000.0));
        assert_eq!(response["tributos"]["csll"]["valor"], json!(27000.0));
        assert_eq!(response["apuracao"]["meses"], json!(3));
    }

    #[test]
    fn calcular_accepts_month_count_period() {
        let policy = TaxPolicy::default();
        let body = json!({ "receita": 1000000, "despesas": 700000, "periodo": 12 });

        let response = dispatch(&policy, "/real/calcular", &body).unwrap();

        assert_eq!(response["apuracao"]["periodo"], json!("anual"));
        assert_eq!(response["tributos"]["irpj"]["adicional"], json!(6000.0));
    }

    #[test]
    fn calcular_reports_loss() {
        let policy = TaxPolicy::default();
        let body = json!({ "receita": 100000, "despesas": 150000 });

        let response = dispatch(&policy, "/real/calcular", &body).unwrap();

        assert_eq!(response["apuracao"]["prejuizo"], json!(true));
        assert_eq!(response["apuracao"]["prejuizoFiscal"], json!(50000.0));
        assert_eq!(response["tributos"]["irpj"]["total"], json!(0.0));
    }

    #[test]
    fn calcular_rejects_bad_period() {
        let policy = TaxPolicy::default();
        let body = json!({ "receita": 1000, "periodo": "mensal" });

        assert!(dispatch(&policy, "/real/calcular", &body).is_err());
    }

    #[test]
    fn calcular_rejects_zero_revenue() {
        let policy = TaxPolicy::default();
        let body = json!({ "receita": 0 });

        let result = dispatch(&policy, "/real/calcular", &body);

        assert!(matches!(result, Err(crate::api::ApiError::Calculation(_))));
    }
}
