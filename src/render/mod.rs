//! Proposal PDF: section builders produce [`sections::Block`]s, [`pdf`] paginates
//! them onto A4 pages and serialises the result.

pub mod pdf;
pub mod sections;
pub mod theme;

use chrono::{DateTime, Local, NaiveDateTime};

use crate::{
    errors::AppError,
    models::{Proposal, User},
};

/// Everything one rendering needs, borrowed from the stored rows.
#[derive(Debug, Clone, Copy)]
pub struct ProposalDocument<'a> {
    pub proposal: &'a Proposal,
    pub issuer: &'a User,
    pub generated_at: NaiveDateTime,
}

pub fn render(document: &ProposalDocument<'_>) -> Result<Vec<u8>, AppError> {
    let blocks: Vec<sections::Block> = sections::SECTIONS
        .iter()
        .flat_map(|build| build(document))
        .collect();
    let footer = pdf::Footer {
        lines: vec![
            format!(
                "{} · Proposta gerada em {}",
                theme::BRAND,
                document.generated_at.format("%d/%m/%Y às %H:%M")
            ),
            format!("Número da proposta: {}", document.proposal.number),
        ],
    };
    pdf::write(&blocks, &footer, &document.proposal.number)
}

pub fn money(value: f64) -> String {
    format!("{} {:.2}", theme::CURRENCY, value)
}

/// `dd/mm/YYYY` in local time, or the stored text when it is not RFC 3339.
pub fn date_br(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|at| at.with_timezone(&Local).format("%d/%m/%Y").to_string())
        .unwrap_or_else(|_| timestamp.to_owned())
}

pub fn or_not_informed(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_owned(),
        _ => theme::NOT_INFORMED.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_proposal;
    use chrono::NaiveDate;

    pub(crate) fn issuer() -> User {
        User {
            id: 1,
            full_name: "Ana Lima".into(),
            email: "ana@example.com".into(),
            pwd_hash: String::new(),
            crp_number: None,
            phone: Some("(11) 99999-0000".into()),
            active: true,
            created_at: "2025-03-07T12:00:00.000000Z".into(),
            updated_at: "2025-03-07T12:00:00.000000Z".into(),
        }
    }

    pub(crate) fn stored(notes: Option<&str>) -> Proposal {
        let new = sample_proposal("PER-20250307120000");
        Proposal {
            id: 7,
            user_id: 1,
            number: new.number,
            client_name: new.client_name,
            client_phone: new.client_phone,
            service_type: new.service_type,
            base_value: new.base_value,
            analysis_hours: new.analysis_hours,
            urgency_grade: new.urgency_grade,
            specificity_grade: new.specificity_grade,
            complexity_grade: new.complexity_grade,
            adjustments: new.adjustments,
            adjusted_value: new.adjusted_value,
            hourly_rate: new.hourly_rate,
            analysis_hours_cost: new.analysis_hours_cost,
            fixed_subtotal: new.fixed_subtotal,
            total_value: new.total_value,
            payment_options: new.payment_options,
            notes: notes.map(str::to_owned),
            raw_payload: new.raw_payload,
            created_at: "2025-03-07T12:00:00.000000Z".into(),
        }
    }

    pub(crate) fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    #[test]
    fn formats_money_and_dates() {
        assert_eq!(money(200.0), "R$ 200.00");
        assert_eq!(money(1234.567), "R$ 1234.57");
        assert_eq!(money(-50.0), "R$ -50.00");
        assert_eq!(date_br("2025-03-07T12:00:00.000000Z"), "07/03/2025");
        assert_eq!(date_br("ontem"), "ontem");
    }

    #[test]
    fn blank_optional_fields_render_placeholder() {
        assert_eq!(or_not_informed(None), "Não informado");
        assert_eq!(or_not_informed(Some("  ")), "Não informado");
        assert_eq!(or_not_informed(Some("06/12345")), "06/12345");
    }

    #[test]
    fn renders_a_loadable_pdf() {
        let proposal = stored(Some("Pagamento em duas parcelas.\nPrazo: 30 dias."));
        let issuer = issuer();
        let bytes = render(&ProposalDocument {
            proposal: &proposal,
            issuer: &issuer,
            generated_at: generated_at(),
        })
        .unwrap();

        assert!(bytes.starts_with(b"%PDF-"));
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn long_notes_spill_onto_more_pages() {
        let notes = "Observação detalhada sobre o processo.\n".repeat(150);
        let proposal = stored(Some(&notes));
        let issuer = issuer();
        let bytes = render(&ProposalDocument {
            proposal: &proposal,
            issuer: &issuer,
            generated_at: generated_at(),
        })
        .unwrap();

        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }
}
