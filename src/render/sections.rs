use super::{date_br, money, or_not_informed, theme, ProposalDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub font: Font,
    pub size: f32,
    pub color: theme::Rgb,
    pub align: Align,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Full-width dark band naming the table.
    Heading,
    Item,
    /// Highlighted closing row.
    Total,
}

/// One label/value row of a two-column table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub label: String,
    pub value: String,
    pub kind: RowKind,
    pub columns: (f32, f32),
    pub value_align: Align,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Free text, wrapped to the content width at layout time.
    Text(Line),
    Row(Row),
    Spacer(f32),
}

pub type SectionBuilder = fn(&ProposalDocument<'_>) -> Vec<Block>;

/// Document sections in page order.
pub const SECTIONS: &[SectionBuilder] = &[header, professional, client, fees, notes];

fn text(text: impl Into<String>, font: Font, size: f32, color: theme::Rgb, align: Align) -> Block {
    Block::Text(Line {
        text: text.into(),
        font,
        size,
        color,
        align,
    })
}

fn identity_row(label: &str, value: impl Into<String>, kind: RowKind) -> Block {
    Block::Row(Row {
        label: label.to_owned(),
        value: value.into(),
        kind,
        columns: theme::IDENTITY_COLUMNS,
        value_align: Align::Left,
    })
}

fn fee_row(label: &str, value: impl Into<String>, kind: RowKind) -> Block {
    Block::Row(Row {
        label: label.to_owned(),
        value: value.into(),
        kind,
        columns: theme::FEE_COLUMNS,
        value_align: Align::Right,
    })
}

pub fn header(doc: &ProposalDocument<'_>) -> Vec<Block> {
    vec![
        text(theme::TITLE, Font::Bold, theme::TITLE_SIZE, theme::NAVY, Align::Center),
        text(theme::BRAND, Font::Regular, theme::SUBTITLE_SIZE, theme::MUTED, Align::Center),
        Block::Spacer(4.0),
        text(
            format!(
                "Proposta nº {} · {}",
                doc.proposal.number,
                date_br(&doc.proposal.created_at)
            ),
            Font::Regular,
            theme::BODY_SIZE,
            theme::MUTED,
            Align::Center,
        ),
        Block::Spacer(10.0 * theme::MM),
    ]
}

pub fn professional(doc: &ProposalDocument<'_>) -> Vec<Block> {
    let issuer = doc.issuer;
    vec![
        identity_row("PSICÓLOGO(A) PERITO(A)", "", RowKind::Heading),
        identity_row("Nome:", issuer.full_name.as_str(), RowKind::Item),
        identity_row("CRP:", or_not_informed(issuer.crp_number.as_deref()), RowKind::Item),
        identity_row("Telefone:", or_not_informed(issuer.phone.as_deref()), RowKind::Item),
        identity_row("Email:", issuer.email.as_str(), RowKind::Item),
        Block::Spacer(theme::SECTION_GAP),
    ]
}

pub fn client(doc: &ProposalDocument<'_>) -> Vec<Block> {
    let p = doc.proposal;
    vec![
        identity_row("DADOS DO CLIENTE", "", RowKind::Heading),
        identity_row("Nome:", or_not_informed(p.client_name.as_deref()), RowKind::Item),
        identity_row("Telefone:", or_not_informed(p.client_phone.as_deref()), RowKind::Item),
        identity_row("Tipo de Serviço:", or_not_informed(p.service_type.as_deref()), RowKind::Item),
        identity_row("Data:", date_br(&p.created_at), RowKind::Item),
        Block::Spacer(theme::SECTION_GAP),
    ]
}

pub fn fees(doc: &ProposalDocument<'_>) -> Vec<Block> {
    let p = doc.proposal;
    let mut blocks = vec![
        fee_row("DETALHAMENTO DOS HONORÁRIOS", "", RowKind::Heading),
        fee_row("Valor Base:", money(p.base_value), RowKind::Item),
        fee_row("Taxa Horária:", money(p.hourly_rate), RowKind::Item),
        fee_row("Horas de Análise:", format!("{:.1}h", p.analysis_hours), RowKind::Item),
        fee_row("Custo Horas de Análise:", money(p.analysis_hours_cost), RowKind::Item),
    ];
    // Zero means no adjusted value was submitted; the base value stands.
    if p.adjusted_value != 0.0 && p.adjusted_value != p.base_value {
        blocks.push(fee_row(
            "Ajustes:",
            money(p.adjusted_value - p.base_value),
            RowKind::Item,
        ));
    }
    blocks.push(Block::Spacer(4.0));
    blocks.push(fee_row("VALOR TOTAL:", money(p.total_value), RowKind::Total));
    blocks
}

/// Each literal newline in the notes starts a new line.
pub fn notes(doc: &ProposalDocument<'_>) -> Vec<Block> {
    let Some(notes) = doc.proposal.notes.as_deref().filter(|n| !n.trim().is_empty()) else {
        return Vec::new();
    };
    let mut blocks = vec![
        Block::Spacer(theme::SECTION_GAP),
        text("Observações:", Font::Bold, theme::NOTES_SIZE, theme::MUTED, Align::Left),
    ];
    blocks.extend(notes.lines().map(|line| {
        text(line, Font::Regular, theme::NOTES_SIZE, theme::MUTED, Align::Left)
    }));
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::{generated_at, issuer, stored};

    fn labelled(blocks: &[Block], label: &str) -> Option<Row> {
        blocks.iter().find_map(|b| match b {
            Block::Row(row) if row.label == label => Some(row.clone()),
            _ => None,
        })
    }

    #[test]
    fn adjustment_row_absent_when_value_unchanged() {
        let proposal = stored(None);
        let issuer = issuer();
        let doc = ProposalDocument {
            proposal: &proposal,
            issuer: &issuer,
            generated_at: generated_at(),
        };
        let blocks = fees(&doc);
        assert!(labelled(&blocks, "Ajustes:").is_none());
        assert_eq!(labelled(&blocks, "Valor Base:").unwrap().value, "R$ 500.00");
        assert_eq!(
            labelled(&blocks, "Custo Horas de Análise:").unwrap().value,
            "R$ 200.00"
        );
        let total = labelled(&blocks, "VALOR TOTAL:").unwrap();
        assert_eq!(total.kind, RowKind::Total);
    }

    #[test]
    fn adjustment_row_absent_when_adjusted_value_omitted() {
        let mut proposal = stored(None);
        proposal.adjusted_value = 0.0;
        let issuer = issuer();
        let doc = ProposalDocument {
            proposal: &proposal,
            issuer: &issuer,
            generated_at: generated_at(),
        };
        assert!(labelled(&fees(&doc), "Ajustes:").is_none());
    }

    #[test]
    fn adjustment_row_shows_the_delta() {
        let mut proposal = stored(None);
        proposal.adjusted_value = 575.5;
        let issuer = issuer();
        let doc = ProposalDocument {
            proposal: &proposal,
            issuer: &issuer,
            generated_at: generated_at(),
        };
        assert_eq!(labelled(&fees(&doc), "Ajustes:").unwrap().value, "R$ 75.50");
    }

    #[test]
    fn missing_identity_fields_use_placeholder() {
        let proposal = stored(None);
        let issuer = issuer();
        let doc = ProposalDocument {
            proposal: &proposal,
            issuer: &issuer,
            generated_at: generated_at(),
        };
        assert_eq!(labelled(&professional(&doc), "CRP:").unwrap().value, "Não informado");
        assert_eq!(
            labelled(&client(&doc), "Telefone:").unwrap().value,
            "Não informado"
        );
        assert_eq!(labelled(&client(&doc), "Data:").unwrap().value, "07/03/2025");
    }

    #[test]
    fn notes_keep_their_line_breaks() {
        let proposal = stored(Some("Primeira linha\nSegunda linha"));
        let issuer = issuer();
        let doc = ProposalDocument {
            proposal: &proposal,
            issuer: &issuer,
            generated_at: generated_at(),
        };
        let lines: Vec<String> = notes(&doc)
            .into_iter()
            .filter_map(|b| match b {
                Block::Text(line) => Some(line.text),
                _ => None,
            })
            .collect();
        assert_eq!(lines, ["Observações:", "Primeira linha", "Segunda linha"]);

        let empty = stored(Some("   "));
        let doc = ProposalDocument {
            proposal: &empty,
            ..doc
        };
        assert!(notes(&doc).is_empty());
    }
}
