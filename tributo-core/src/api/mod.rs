//! JSON contract of the simulator endpoints.
//!
//! Request and response bodies keep the field names the web pages already
//! send and expect (camelCase Portuguese, decimals as JSON numbers).
//! [`dispatch`] routes a path and a parsed body to the matching calculator;
//! [`respond`] also turns failures into the error body of that route.
//!
//! | Route | Request | Calculator |
//! |-------|---------|------------|
//! | `/margem/calcular` | [`MargemRequest`] | `PricingCalculator::calculate` |
//! | `/margem/comparar` | [`MargemRequest`] | `PricingCalculator::compare` |
//! | `/real/calcular` | [`RealRequest`] | `ActualProfitCalculator` |
//! | `/diagnostico/analisar` | [`DiagnosticoRequest`] | `RegimeComparator` |
//! | `/creditos/calcular` | category map | `CreditLedger::calculate` |
//! | `/creditos/simular` | category map + `receitaBruta` | `CreditLedger::simulate` |

mod creditos;
mod diagnostico;
mod margem;
mod real;

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

pub use creditos::{CreditosResponse, CreditosTotais, DetalheCredito, EconomiaCreditos};
pub use diagnostico::{
    CalculoRegime, Calculos, DiagnosticoDados, DiagnosticoRequest, DiagnosticoResponse,
    PosicaoRanking, RecomendacaoRegime, RegimeInaplicavel,
};
pub use margem::{
    Cenario, Custos, MargemDados, MargemRequest, MargemResponse, Precos, Resultado, Tributos,
};
pub use real::{
    Apuracao, ContribuicaoNaoCumulativa, IrpjDetalhe, LinhaDetalhe, RealRequest, RealResponse,
    RealTributos, Resumo, TributoSobreLucro,
};

use crate::CalculationError;
use crate::policy::TaxPolicy;

/// Routes accepted by [`dispatch`].
pub const ROUTES: [&str; 6] = [
    "/margem/calcular",
    "/margem/comparar",
    "/real/calcular",
    "/diagnostico/analisar",
    "/creditos/calcular",
    "/creditos/simular",
];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown route: {0}")]
    UnknownRoute(String),

    #[error("malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error(transparent)]
    Calculation(#[from] CalculationError),
}

impl ApiError {
    pub(crate) fn field(
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status an HTTP front end would answer with.
    pub fn status(&self) -> u16 {
        match self {
            Self::UnknownRoute(_) => 404,
            Self::MalformedBody(_) | Self::InvalidField { .. } | Self::Calculation(_) => 400,
        }
    }
}

/// Runs the calculator behind `route` on `body`.
///
/// # Errors
///
/// Returns [`ApiError::UnknownRoute`] for paths outside [`ROUTES`], and the
/// body or calculation error otherwise.
pub fn dispatch(
    policy: &TaxPolicy,
    route: &str,
    body: &Value,
) -> Result<Value, ApiError> {
    debug!(route, "dispatching request");

    match route.trim_end_matches('/') {
        "/margem/calcular" => to_value(margem::calcular(policy, parse(body)?)?),
        "/margem/comparar" => to_value(margem::comparar(policy, parse(body)?)?),
        "/real/calcular" => to_value(real::calcular(policy, parse(body)?)?),
        "/diagnostico/analisar" => to_value(diagnostico::analisar(policy, parse(body)?)?),
        "/creditos/calcular" => to_value(creditos::calcular(policy, body)?),
        "/creditos/simular" => to_value(creditos::simular(policy, body)?),
        other => Err(ApiError::UnknownRoute(other.to_string())),
    }
}

/// Parses `body` and dispatches it, returning the status and the JSON body
/// to send back, including the route's error shape on failure.
pub fn respond(
    policy: &TaxPolicy,
    route: &str,
    body: &str,
) -> (u16, Value) {
    let result = serde_json::from_str::<Value>(body)
        .map_err(ApiError::from)
        .and_then(|parsed| dispatch(policy, route, &parsed));

    match result {
        Ok(value) => (200, value),
        Err(err) => {
            warn!(route, error = %err, "request failed");
            (err.status(), error_body(route, &err))
        }
    }
}

/// Error body for `route`: the pricing pages read `success`/`error`, the
/// others `sucesso`/`erro`.
pub fn error_body(
    route: &str,
    err: &ApiError,
) -> Value {
    if route.starts_with("/margem") {
        json!({ "success": false, "error": err.to_string() })
    } else {
        json!({ "sucesso": false, "erro": err.to_string() })
    }
}

fn parse<T: serde::de::DeserializeOwned>(body: &Value) -> Result<T, ApiError> {
    Ok(T::deserialize(body)?)
}

fn to_value<T: Serialize>(response: T) -> Result<Value, ApiError> {
    Ok(serde_json::to_value(response)?)
}

/// Reads a JSON number or numeric string as a decimal.
pub(crate) fn decimal_from(
    field: &str,
    value: &Value,
) -> Result<Decimal, ApiError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(ApiError::field(field, format!("expected a number, got {other}"))),
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ApiError::field(field, format!("'{text}' is not a number")))
}

/// Reads a code sent either as a string or as a number (`3`, `"III"`).
pub(crate) fn code_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    // =========================================================================
    // dispatch tests
    // =========================================================================

    #[test]
    fn dispatch_unknown_route() {
        let policy = TaxPolicy::default();

        let result = dispatch(&policy, "/folha/calcular", &json!({}));

        assert!(matches!(result, Err(ApiError::UnknownRoute(route)) if route == "/folha/calcular"));
    }

    #[test]
    fn dispatch_accepts_trailing_slash() {
        let policy = TaxPolicy::default();

        let result = dispatch(
            &policy,
            "/creditos/calcular/",
            &json!({ "insumos": 1000 }),
        );

        assert!(result.is_ok());
    }

    // =========================================================================
    // respond tests
    // =========================================================================

    #[test]
    fn respond_uses_portuguese_error_keys() {
        let policy = TaxPolicy::default();

        let (status, body) = respond(&policy, "/creditos/calcular", "{}");

        assert_eq!(status, 400);
        assert_eq!(body["sucesso"], json!(false));
        assert!(body["erro"].as_str().is_some());
    }

    #[test]
    fn respond_uses_english_error_keys_for_margem() {
        let policy = TaxPolicy::default();

        let (status, body) = respond(&policy, "/margem/calcular", "not json");

        assert_eq!(status, 400);
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().starts_with("malformed request body"));
    }

    #[test]
    fn respond_unknown_route_is_404() {
        let policy = TaxPolicy::default();

        let (status, _) = respond(&policy, "/nada", "{}");

        assert_eq!(status, 404);
    }

    // =========================================================================
    // decimal_from tests
    // =========================================================================

    #[test]
    fn decimal_from_number_and_string() {
        assert_eq!(decimal_from("x", &json!(1234.56)).unwrap(), dec!(1234.56));
        assert_eq!(decimal_from("x", &json!("0.65")).unwrap(), dec!(0.65));
        assert_eq!(decimal_from("x", &json!(400000)).unwrap(), dec!(400000));
    }

    #[test]
    fn amounts_beyond_decimal_range_fail_with_400() {
        let policy = TaxPolicy::default();
        let requests = [
            ("/creditos/calcular", r#"{"insumos": 70000000000000000000000000000}"#),
            ("/creditos/simular", r#"{"insumos": 1000, "receitaBruta": 7e28}"#),
            ("/real/calcular", r#"{"receita": 7e28, "despesas": 0, "periodo": "anual"}"#),
            ("/diagnostico/analisar", r#"{"receitaMes": 7e27, "atividade": "comercio"}"#),
            (
                "/margem/calcular",
                r#"{"custoUnitario": 7e27, "quantidadeMensal": 7e27, "margemDesejada": 20}"#,
            ),
        ];

        for (route, body) in requests {
            let (status, _) = respond(&policy, route, body);

            assert_eq!(status, 400, "{route}");
        }
    }

    #[test]
    fn decimal_from_rejects_other_types() {
        let result = decimal_from("insumos", &json!(true));

        assert!(matches!(result, Err(ApiError::InvalidField { field, .. }) if field == "insumos"));
    }
}
