use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::calculations::common::{ensure_amount, round_half_up};
use crate::calculations::{ComparisonInput, RegimeComparator, RegimeComparison};
use crate::models::{Activity, Anexo, Regime, RegimeQuote};
use crate::policy::TaxPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticoRequest {
    /// RBT12; falls back to twelve times `receitaMes` when zero.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub receita_bruta12: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub receita_mes: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub despesas_mes: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub folha_mes: Decimal,
    pub atividade: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticoResponse {
    pub sucesso: bool,
    pub dados: DiagnosticoDados,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticoDados {
    pub recomendacao: Option<RecomendacaoRegime>,
    pub ranking: Vec<PosicaoRanking>,
    pub inaplicaveis: Vec<RegimeInaplicavel>,
    pub calculos: Calculos,
    pub recomendacoes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomendacaoRegime {
    pub regime: Regime,
    pub nome: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub economia_anual: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub carga_tributaria: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosicaoRanking {
    pub posicao: usize,
    pub regime: Regime,
    pub nome: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub imposto_anual: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub carga_tributaria: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegimeInaplicavel {
    pub regime: Regime,
    pub motivo: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Calculos {
    pub simples: CalculoRegime,
    pub presumido: CalculoRegime,
    pub real: CalculoRegime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculoRegime {
    pub aplicavel: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub imposto_anual: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub carga_tributaria: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anexo: Option<Anexo>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub fator_r: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faixa: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivo: Option<String>,
}

pub(super) fn analisar(
    policy: &TaxPolicy,
    request: DiagnosticoRequest,
) -> Result<DiagnosticoResponse, ApiError> {
    let activity = Activity::parse(&request.atividade).ok_or_else(|| {
        ApiError::field("atividade", format!("unknown activity {}", request.atividade))
    })?;
    let twelve = Decimal::from(12);
    let annualize = |field: &'static str, monthly: Decimal| -> Result<Decimal, ApiError> {
        Ok(ensure_amount(field, monthly)? * twelve)
    };
    let annual_revenue = if request.receita_bruta12 > Decimal::ZERO {
        request.receita_bruta12
    } else {
        annualize("receitaMes", request.receita_mes)?
    };

    let comparison = RegimeComparator::new(policy).compare(&ComparisonInput {
        annual_revenue,
        annual_payroll: annualize("folhaMes", request.folha_mes)?,
        annual_operating_expenses: annualize("despesasMes", request.despesas_mes)?,
        activity,
        creditable_expenses: None,
    })?;

    Ok(DiagnosticoResponse {
        sucesso: true,
        dados: dados(comparison),
    })
}

fn dados(comparison: RegimeComparison) -> DiagnosticoDados {
    let recomendacao = comparison.ranking.first().map(|best| RecomendacaoRegime {
        regime: best.regime,
        nome: best.regime.label().to_string(),
        economia_anual: comparison.annual_savings,
        carga_tributaria: round_half_up(best.effective_rate_pct),
    });

    let ranking = comparison
        .ranking
        .iter()
        .enumerate()
        .map(|(idx, quote)| PosicaoRanking {
            posicao: idx + 1,
            regime: quote.regime,
            nome: quote.regime.label().to_string(),
            imposto_anual: quote.annual_tax,
            carga_tributaria: round_half_up(quote.effective_rate_pct),
        })
        .collect();

    let inaplicaveis = comparison
        .quotes
        .iter()
        .filter(|quote| !quote.applicable)
        .map(|quote| RegimeInaplicavel {
            regime: quote.regime,
            motivo: quote.reason.clone().unwrap_or_default(),
        })
        .collect();

    let quote_for = |regime: Regime| comparison.quotes.iter().find(|q| q.regime == regime);

    let mut simples = calculo(quote_for(Regime::Simples));
    if let Some(detail) = &comparison.simples {
        simples.anexo = Some(detail.selection.anexo);
        simples.fator_r = detail.selection.fator_r.map(round_half_up_ratio);
        simples.faixa = Some(detail.resolution.faixa);
    }

    let calculos = Calculos {
        simples,
        presumido: calculo(quote_for(Regime::Presumido)),
        real: calculo(quote_for(Regime::Real)),
    };

    DiagnosticoDados {
        recomendacao,
        ranking,
        inaplicaveis,
        calculos,
        recomendacoes: comparison.recommendations,
    }
}

fn calculo(quote: Option<&RegimeQuote>) -> CalculoRegime {
    match quote {
        Some(quote) => CalculoRegime {
            aplicavel: quote.applicable,
            imposto_anual: quote.annual_tax,
            carga_tributaria: round_half_up(quote.effective_rate_pct),
            anexo: None,
            fator_r: None,
            faixa: None,
            motivo: quote.reason.clone(),
        },
        None => CalculoRegime {
            aplicavel: false,
            imposto_anual: Decimal::ZERO,
            carga_tributaria: Decimal::ZERO,
            anexo: None,
            fator_r: None,
            faixa: None,
            motivo: None,
        },
    }
}

/// Fator R with four decimal places.
fn round_half_up_ratio(ratio: Decimal) -> Decimal {
    ratio.round_dp_with_strategy(4, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::api::dispatch;
    use crate::policy::TaxPolicy;

    #[test]
    fn analisar_ranks_regimes() {
        let policy = TaxPolicy::default();
        let body = json!({
            "receitaBruta12": 1200000,
            "receitaMes": 100000,
            "despesasMes": 75000,
            "folhaMes": 10000,
            "atividade": "comercio"
        });

        let response = dispatch(&policy, "/diagnostico/analisar", &body).unwrap();
        let dados = &response["dados"];

        assert_eq!(dados["recomendacao"]["regime"], json!("presumido"));
        assert_eq!(dados["recomendacao"]["economiaAnual"], json!(34740.0));
        assert_eq!(dados["ranking"].as_array().unwrap().len(), 3);
        assert_eq!(dados["ranking"][0]["posicao"], json!(1));
        assert_eq!(dados["calculos"]["simples"]["anexo"], json!("I"));
        assert_eq!(dados["calculos"]["simples"]["faixa"], json!(4));
    }

    #[test]
    fn analisar_falls_back_to_monthly_revenue() {
        let policy = TaxPolicy::default();
        let body = json!({
            "receitaMes": 5000,
            "despesasMes": 1000,
            "folhaMes": 0,
            "atividade": "serviços"
        });

        let response = dispatch(&policy, "/diagnostico/analisar", &body).unwrap();

        assert_eq!(response["dados"]["recomendacao"]["regime"], json!("mei"));
        assert_eq!(response["dados"]["calculos"]["simples"]["anexo"], json!("V"));
    }

    #[test]
    fn analisar_lists_inapplicable_regimes() {
        let policy = TaxPolicy::default();
        let body = json!({
            "receitaBruta12": 6000000,
            "despesasMes": 300000,
            "folhaMes": 50000,
            "atividade": "industria"
        });

        let response = dispatch(&policy, "/diagnostico/analisar", &body).unwrap();
        let dados = &response["dados"];

        assert_eq!(dados["calculos"]["simples"]["aplicavel"], json!(false));
        assert_eq!(dados["inaplicaveis"][0]["regime"], json!("simples"));
    }

    #[test]
    fn analisar_rejects_unknown_activity() {
        let policy = TaxPolicy::default();
        let body = json!({ "receitaBruta12": 100000, "atividade": "mineracao" });

        assert!(dispatch(&policy, "/diagnostico/analisar", &body).is_err());
    }
}
