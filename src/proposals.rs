//! Proposal lifecycle: validate a submitted quote, number it, persist it, and
//! read or delete it on behalf of its owner.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    auth::AuthUser,
    calculator::{self, Adjustment, SubmittedTotals},
    db,
    errors::AppError,
    models::{NewProposal, Proposal},
    AppState,
};

pub const NUMBER_PREFIX: &str = "PER-";

/// A payment option as the browser sends it: free text or a structured entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaymentOption {
    Text(String),
    Detailed {
        #[serde(default)]
        descricao: Option<String>,
        #[serde(default)]
        parcelas: Option<u32>,
        #[serde(default)]
        valor: Option<f64>,
    },
}

/// Body of `POST /api/salvar-orcamento`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposalRequest {
    #[serde(rename = "nome_cliente", default)]
    pub client_name: Option<String>,
    #[serde(rename = "telefone_cliente", default)]
    pub client_phone: Option<String>,
    #[serde(rename = "tipo_servico", default)]
    pub service_type: Option<String>,
    #[serde(rename = "valor_base", default, deserialize_with = "coerce::number")]
    pub base_value: f64,
    #[serde(rename = "horas_analise", default, deserialize_with = "coerce::number")]
    pub analysis_hours: f64,
    #[serde(rename = "grau_urgencia", default, deserialize_with = "coerce::integer")]
    pub urgency_grade: i64,
    #[serde(rename = "grau_especificidade", default, deserialize_with = "coerce::integer")]
    pub specificity_grade: i64,
    #[serde(rename = "grau_complexidade", default, deserialize_with = "coerce::integer")]
    pub complexity_grade: i64,
    #[serde(rename = "ajustes", default, deserialize_with = "coerce::list")]
    pub adjustments: Vec<Adjustment>,
    #[serde(rename = "valor_ajustado", default, deserialize_with = "coerce::number")]
    pub adjusted_value: f64,
    #[serde(rename = "taxa_horaria", default, deserialize_with = "coerce::number")]
    pub hourly_rate: f64,
    #[serde(rename = "custo_horas_analise", default, deserialize_with = "coerce::number")]
    pub analysis_hours_cost: f64,
    #[serde(rename = "subtotal_fixo", default, deserialize_with = "coerce::number")]
    pub fixed_subtotal: f64,
    #[serde(rename = "valor_total", default, deserialize_with = "coerce::number")]
    pub total_value: f64,
    #[serde(rename = "opcoes_pagamento", default, deserialize_with = "coerce::list")]
    pub payment_options: Vec<PaymentOption>,
    #[serde(rename = "observacoes", default)]
    pub notes: Option<String>,
}

impl ProposalRequest {
    pub fn submitted_totals(&self) -> SubmittedTotals<'_> {
        SubmittedTotals {
            base_value: self.base_value,
            hourly_rate: self.hourly_rate,
            analysis_hours: self.analysis_hours,
            adjustments: &self.adjustments,
            adjusted_value: self.adjusted_value,
            analysis_hours_cost: self.analysis_hours_cost,
            fixed_subtotal: self.fixed_subtotal,
            total_value: self.total_value,
        }
    }
}

/// Lenient numeric decoding at the request boundary.
mod coerce {
    use serde::{de, Deserialize, Deserializer};
    use serde_json::Value;

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let value = match Value::deserialize(d)? {
            Value::Null => return Ok(0.0),
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_decimal(&s),
            _ => None,
        };
        value
            .filter(|v| v.is_finite())
            .ok_or_else(|| de::Error::custom("valor numérico inválido"))
    }

    pub fn integer<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let value = match Value::deserialize(d)? {
            Value::Null => return Ok(0),
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                    .map(|f| f.trunc() as i64)
            }),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        value.ok_or_else(|| de::Error::custom("valor inteiro inválido"))
    }

    /// `null` reads as an empty list.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
    }

    /// Accepts `1234.5`, and `1234,5` when no dot is present.
    fn parse_decimal(raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        if trimmed.contains(',') && !trimmed.contains('.') {
            trimmed.replace(',', ".").parse().ok()
        } else {
            trimmed.parse().ok()
        }
    }
}

pub fn reference_number<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}{}", NUMBER_PREFIX, at.format("%Y%m%d%H%M%S"))
}

pub fn is_reference_number(candidate: &str) -> bool {
    candidate
        .strip_prefix(NUMBER_PREFIX)
        .is_some_and(|digits| digits.len() == 14 && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Parses and validates a raw request body into the row to insert.
///
/// List fields are kept as the caller wrote them; the typed decode only checks their shape.
pub fn build_new_proposal(
    body: &[u8],
    number: String,
    strict_totals: bool,
) -> Result<NewProposal, AppError> {
    let raw_payload = std::str::from_utf8(body)
        .map_err(|_| AppError::ValidationError("Dados inválidos: corpo não é UTF-8".into()))?
        .to_owned();
    let value: Value = serde_json::from_str(&raw_payload)
        .map_err(|e| AppError::ValidationError(format!("Dados inválidos: {e}")))?;
    if !value.is_object() {
        return Err(AppError::ValidationError(
            "Dados inválidos: esperado um objeto JSON".into(),
        ));
    }
    let request: ProposalRequest = serde_json::from_value(value.clone())
        .map_err(|e| AppError::ValidationError(format!("Dados inválidos: {e}")))?;

    let mismatches = calculator::check_totals(&request.submitted_totals());
    if !mismatches.is_empty() {
        let fields: Vec<&str> = mismatches.iter().map(|m| m.field).collect();
        if strict_totals {
            return Err(AppError::ValidationError(format!(
                "Valores inconsistentes: {}",
                fields.join(", ")
            )));
        }
        log::warn!(
            "Proposal {} submitted with inconsistent totals: {:?}",
            number,
            mismatches
        );
    }

    Ok(NewProposal {
        number,
        client_name: request.client_name,
        client_phone: request.client_phone,
        service_type: request.service_type,
        base_value: request.base_value,
        analysis_hours: request.analysis_hours,
        urgency_grade: request.urgency_grade,
        specificity_grade: request.specificity_grade,
        complexity_grade: request.complexity_grade,
        adjustments: verbatim_list(&value, "ajustes"),
        adjusted_value: request.adjusted_value,
        hourly_rate: request.hourly_rate,
        analysis_hours_cost: request.analysis_hours_cost,
        fixed_subtotal: request.fixed_subtotal,
        total_value: request.total_value,
        payment_options: verbatim_list(&value, "opcoes_pagamento"),
        notes: request.notes,
        raw_payload,
    })
}

fn verbatim_list(payload: &Value, key: &str) -> String {
    match payload.get(key) {
        Some(list @ Value::Array(_)) => list.to_string(),
        _ => "[]".to_owned(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Created {
    pub id: i64,
    pub numero: String,
}

pub async fn create(state: &AppState, owner: &AuthUser, body: &[u8]) -> Result<Created, AppError> {
    let numero = reference_number(&Local::now());
    let proposal = build_new_proposal(body, numero.clone(), state.strict_totals)?;
    let id = db::insert_proposal(state, owner.id, &proposal)
        .await
        .map_err(|e| {
            log::error!("Failed to insert proposal {}: {}", numero, e);
            AppError::DatabaseError(e)
        })?;
    Ok(Created { id, numero })
}

/// Absent and foreign ids are both reported as [`AppError::NotFound`].
pub async fn get(state: &AppState, owner: &AuthUser, id: i64) -> Result<Proposal, AppError> {
    db::get_proposal(state, owner.id, id)
        .await
        .map_err(|e| {
            log::error!("Failed to fetch proposal {}: {}", id, e);
            AppError::DatabaseError(e)
        })?
        .ok_or(AppError::NotFound)
}

pub async fn list(state: &AppState, owner: &AuthUser) -> Result<Vec<Proposal>, AppError> {
    db::list_proposals(state, owner.id).await.map_err(|e| {
        log::error!("Failed to list proposals for user {}: {}", owner.id, e);
        AppError::DatabaseError(e)
    })
}

/// Succeeds whether or not a matching row existed.
pub async fn delete(state: &AppState, owner: &AuthUser, id: i64) -> Result<(), AppError> {
    db::delete_proposal(state, owner.id, id).await.map_err(|e| {
        log::error!("Failed to delete proposal {}: {}", id, e);
        AppError::DatabaseError(e)
    })?;
    Ok(())
}

/// JSON shape returned by `GET /api/orcamento/{id}`, using the same keys the browser submits.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalView {
    pub id: i64,
    pub numero: String,
    pub nome_cliente: Option<String>,
    pub telefone_cliente: Option<String>,
    pub tipo_servico: Option<String>,
    pub valor_base: f64,
    pub horas_analise: f64,
    pub grau_urgencia: i64,
    pub grau_especificidade: i64,
    pub grau_complexidade: i64,
    pub ajustes: Value,
    pub valor_ajustado: f64,
    pub taxa_horaria: f64,
    pub custo_horas_analise: f64,
    pub subtotal_fixo: f64,
    pub valor_total: f64,
    pub opcoes_pagamento: Value,
    pub observacoes: Option<String>,
    pub dados_completos: String,
    pub created_at: String,
}

impl From<Proposal> for ProposalView {
    fn from(p: Proposal) -> Self {
        Self {
            ajustes: parse_stored_list(&p.adjustments),
            opcoes_pagamento: parse_stored_list(&p.payment_options),
            id: p.id,
            numero: p.number,
            nome_cliente: p.client_name,
            telefone_cliente: p.client_phone,
            tipo_servico: p.service_type,
            valor_base: p.base_value,
            horas_analise: p.analysis_hours,
            grau_urgencia: p.urgency_grade,
            grau_especificidade: p.specificity_grade,
            grau_complexidade: p.complexity_grade,
            valor_ajustado: p.adjusted_value,
            taxa_horaria: p.hourly_rate,
            custo_horas_analise: p.analysis_hours_cost,
            subtotal_fixo: p.fixed_subtotal,
            valor_total: p.total_value,
            observacoes: p.notes,
            dados_completos: p.raw_payload,
            created_at: p.created_at,
        }
    }
}

fn parse_stored_list(stored: &str) -> Value {
    serde_json::from_str(stored).unwrap_or_else(|_| Value::String(stored.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_state, seed_user};
    use chrono::NaiveDate;
    use serde_json::json;

    fn owner_of(user: &crate::models::User) -> AuthUser {
        AuthUser {
            id: user.id,
            name: user.full_name.clone(),
        }
    }

    #[test]
    fn reference_number_has_fixed_shape() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 1)
            .unwrap()
            .and_utc();
        assert_eq!(reference_number(&at), "PER-20250307090501");
        assert!(is_reference_number(&reference_number(&Local::now())));
        assert!(!is_reference_number("PER-2025"));
        assert!(!is_reference_number("ORC-20250307090501"));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let body = json!({
            "valor_base": "500",
            "horas_analise": "2,5",
            "grau_urgencia": "10",
            "grau_complexidade": 20.0,
            "valor_total": null
        })
        .to_string();
        let p = build_new_proposal(body.as_bytes(), "PER-20250101000000".into(), false).unwrap();
        assert_eq!(p.base_value, 500.0);
        assert_eq!(p.analysis_hours, 2.5);
        assert_eq!(p.urgency_grade, 10);
        assert_eq!(p.complexity_grade, 20);
        assert_eq!(p.total_value, 0.0);
        assert_eq!(p.adjustments, "[]");
        assert_eq!(p.raw_payload, body);
    }

    #[test]
    fn non_numeric_values_are_validation_errors() {
        for body in [
            json!({ "valor_base": "quinhentos" }),
            json!({ "grau_urgencia": "alta" }),
            json!({ "taxa_horaria": [1, 2] }),
            json!({ "ajustes": "nenhum" }),
        ] {
            let result =
                build_new_proposal(body.to_string().as_bytes(), "PER-20250101000000".into(), false);
            assert!(
                matches!(result, Err(AppError::ValidationError(_))),
                "accepted {body}"
            );
        }
        assert!(matches!(
            build_new_proposal(b"[1,2]", "PER-20250101000000".into(), false),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn strict_mode_rejects_inconsistent_totals() {
        let body = json!({
            "valor_base": 500, "taxa_horaria": 100, "horas_analise": 2,
            "custo_horas_analise": 200, "valor_ajustado": 500,
            "subtotal_fixo": 100, "valor_total": 900
        })
        .to_string();
        assert!(build_new_proposal(body.as_bytes(), "PER-20250101000000".into(), false).is_ok());
        assert!(matches!(
            build_new_proposal(body.as_bytes(), "PER-20250101000000".into(), true),
            Err(AppError::ValidationError(msg)) if msg.contains("valor_total")
        ));
    }

    #[test]
    fn integer_amounts_are_typed_as_floats_but_kept_verbatim() {
        let body = r#"{"valor_base":500,"valor_total":500}"#;
        let p = build_new_proposal(body.as_bytes(), "PER-20250101000000".into(), false).unwrap();
        assert_eq!(p.base_value, 500.0);
        assert_eq!(p.raw_payload, body);
    }

    #[test]
    fn strict_mode_accepts_base_without_adjusted_value() {
        let body = json!({
            "valor_base": 500, "taxa_horaria": 100, "horas_analise": 2,
            "custo_horas_analise": 200, "subtotal_fixo": 100, "valor_total": 600
        })
        .to_string();
        let p = build_new_proposal(body.as_bytes(), "PER-20250101000000".into(), true).unwrap();
        assert_eq!(p.adjusted_value, 0.0);
        assert_eq!(p.total_value, 600.0);
    }

    #[actix_web::test]
    async fn create_then_get_returns_submitted_fields() {
        let state = memory_state().await;
        let ana = owner_of(&seed_user(&state, "ana@example.com").await);
        let payload = json!({
            "nome_cliente": "Carlos",
            "telefone_cliente": "",
            "tipo_servico": "Avaliação Psicológica",
            "valor_base": 500.0,
            "horas_analise": 2.0,
            "grau_urgencia": 10,
            "grau_especificidade": 0,
            "grau_complexidade": 0,
            "ajustes": [{ "tipo": "Urgência", "percentual": 10, "valor": 50.0 }],
            "valor_ajustado": 550.0,
            "taxa_horaria": 100.0,
            "custo_horas_analise": 200.0,
            "subtotal_fixo": 0.0,
            "valor_total": 550.0,
            "opcoes_pagamento": ["À vista", { "descricao": "Parcelado", "parcelas": 3 }],
            "observacoes": "Linha 1\nLinha 2"
        });
        let created = create(&state, &ana, payload.to_string().as_bytes())
            .await
            .unwrap();
        assert!(is_reference_number(&created.numero));

        let view = serde_json::to_value(ProposalView::from(get(&state, &ana, created.id).await.unwrap()))
            .unwrap();
        for (key, submitted) in payload.as_object().unwrap() {
            assert_eq!(&view[key], submitted, "field {key}");
        }
        assert_eq!(view["numero"], created.numero);
        assert_eq!(view["dados_completos"], payload.to_string());
    }

    #[actix_web::test]
    async fn foreign_and_missing_ids_look_the_same() {
        let state = memory_state().await;
        let ana = owner_of(&seed_user(&state, "ana@example.com").await);
        let bia = owner_of(&seed_user(&state, "bia@example.com").await);
        let created = create(&state, &ana, br#"{"nome_cliente":"X"}"#).await.unwrap();

        assert!(matches!(get(&state, &bia, created.id).await, Err(AppError::NotFound)));
        assert!(matches!(get(&state, &ana, 4242).await, Err(AppError::NotFound)));
    }

    #[actix_web::test]
    async fn delete_is_idempotent_and_owner_scoped() {
        let state = memory_state().await;
        let ana = owner_of(&seed_user(&state, "ana@example.com").await);
        let bia = owner_of(&seed_user(&state, "bia@example.com").await);
        let created = create(&state, &ana, b"{}").await.unwrap();

        delete(&state, &bia, created.id).await.unwrap();
        assert_eq!(list(&state, &ana).await.unwrap().len(), 1);

        delete(&state, &ana, created.id).await.unwrap();
        delete(&state, &ana, created.id).await.unwrap();
        assert!(list(&state, &ana).await.unwrap().is_empty());
    }
}
