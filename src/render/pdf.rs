//! Paginates blocks onto A4 pages and writes them with the standard Helvetica fonts.

use std::collections::VecDeque;

use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, Stream, StringFormat,
};

use super::{
    sections::{Align, Block, Font, Line, Row, RowKind},
    theme::{self, Rgb},
};
use crate::errors::AppError;

/// Lines repeated at the bottom of every page, followed by the page counter.
#[derive(Debug, Clone, Default)]
pub struct Footer {
    pub lines: Vec<String>,
}

fn font_name(font: Font) -> &'static str {
    match font {
        Font::Regular => "F1",
        Font::Bold => "F2",
    }
}

/// Advance width in thousandths of an em, from the Helvetica metrics.
fn char_width(ch: char, font: Font) -> u16 {
    let bold = font == Font::Bold;
    let base = fold_accent(ch);
    match base {
        ' ' | '.' | ',' | '/' | '!' => 278,
        ':' | ';' => if bold { 333 } else { 278 },
        '-' | '(' | ')' | '[' | ']' => 333,
        '0'..='9' | '$' | '#' | '?' | '_' => 556,
        '%' => 889,
        '@' => if bold { 975 } else { 1015 },
        '\'' | '|' => 238,
        'i' | 'j' | 'l' => if bold { 278 } else { 222 },
        'f' | 't' => if bold { 333 } else { 278 },
        'r' => if bold { 389 } else { 333 },
        'm' => if bold { 889 } else { 833 },
        'w' => if bold { 778 } else { 722 },
        'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' => if bold { 556 } else { 500 },
        'a'..='z' => if bold { 611 } else { 556 },
        'I' => 278,
        'J' => if bold { 556 } else { 500 },
        'M' => 833,
        'W' => 944,
        'C' | 'D' | 'H' | 'N' | 'R' | 'U' => 722,
        'G' | 'O' | 'Q' => 778,
        'F' | 'T' | 'Z' => 611,
        'L' => if bold { 611 } else { 556 },
        'A'..='Z' => if bold { 722 } else { 667 },
        _ => 556,
    }
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ç' => 'C',
        other => other,
    }
}

pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars()
        .map(|ch| f32::from(char_width(ch, font)))
        .sum::<f32>()
        * size
        / 1000.0
}

/// Greedy word wrap. Words wider than `max_width` are split by characters.
pub fn wrap(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_owned()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, font, size) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for ch in word.chars() {
            current.push(ch);
            if text_width(&current, font, size) > max_width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::replace(&mut current, ch.to_string()));
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// WinAnsi bytes for the standard fonts. Unmappable characters become `?`.
fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\t' => b' ',
            c if (c as u32) < 0x20 => b' ',
            c if (c as u32) < 0x7f => c as u8,
            c if (0xa0..=0xff).contains(&(c as u32)) => c as u8,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

#[derive(Default)]
struct Canvas {
    ops: Vec<Operation>,
}

impl Canvas {
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        let [r, g, b] = color.components();
        self.ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        self.ops
            .push(Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb, width: f32) {
        let [r, g, b] = color.components();
        self.ops.push(Operation::new("w", vec![width.into()]));
        self.ops.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
        self.ops
            .push(Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]));
        self.ops.push(Operation::new("S", vec![]));
    }

    fn hline(&mut self, x1: f32, x2: f32, y: f32, color: Rgb, width: f32) {
        let [r, g, b] = color.components();
        self.ops.push(Operation::new("w", vec![width.into()]));
        self.ops.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
        self.ops.push(Operation::new("m", vec![x1.into(), y.into()]));
        self.ops.push(Operation::new("l", vec![x2.into(), y.into()]));
        self.ops.push(Operation::new("S", vec![]));
    }

    /// `y` is the baseline.
    fn text(&mut self, x: f32, y: f32, text: &str, font: Font, size: f32, color: Rgb) {
        if text.is_empty() {
            return;
        }
        let [r, g, b] = color.components();
        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![font_name(font).into(), size.into()]));
        self.ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        self.ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(encode(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn aligned_text(&mut self, left: f32, width: f32, y: f32, line: &Line) {
        let x = match line.align {
            Align::Left => left,
            Align::Center => left + (width - text_width(&line.text, line.font, line.size)) / 2.0,
            Align::Right => left + width - text_width(&line.text, line.font, line.size),
        };
        self.text(x, y, &line.text, line.font, line.size, line.color);
    }
}

/// A block resolved to its final lines and height.
enum Placed {
    Line(Line),
    Row {
        row: Row,
        label: Vec<String>,
        value: Vec<String>,
        size: f32,
    },
    Gap(f32),
}

impl Placed {
    fn height(&self) -> f32 {
        match self {
            Placed::Line(line) => line.size * theme::LEADING,
            Placed::Row {
                label, value, size, ..
            } => {
                let lines = label.len().max(value.len()) as f32;
                lines * size * theme::LEADING + 2.0 * theme::CELL_PADDING_Y
            }
            Placed::Gap(h) => *h,
        }
    }

    /// Smallest piece that can stand on its own: one line of a row with its padding.
    fn min_height(&self) -> f32 {
        match self {
            Placed::Row { size, .. } => size * theme::LEADING + 2.0 * theme::CELL_PADDING_Y,
            other => other.height(),
        }
    }

    /// Keeps the row lines that fit in `available` and returns the remainder, if any.
    fn split_off(&mut self, available: f32) -> Option<Placed> {
        let Placed::Row {
            row,
            label,
            value,
            size,
        } = self
        else {
            return None;
        };
        let leading = *size * theme::LEADING;
        let fit = ((available - 2.0 * theme::CELL_PADDING_Y) / leading)
            .floor()
            .max(1.0) as usize;
        if fit >= label.len().max(value.len()) {
            return None;
        }
        Some(Placed::Row {
            row: row.clone(),
            label: label.split_off(fit.min(label.len())),
            value: value.split_off(fit.min(value.len())),
            size: *size,
        })
    }
}

fn row_style(kind: RowKind) -> (f32, Font, Font) {
    match kind {
        RowKind::Heading => (theme::HEADING_SIZE, Font::Bold, Font::Bold),
        RowKind::Item => (theme::BODY_SIZE, Font::Bold, Font::Regular),
        RowKind::Total => (theme::TOTAL_SIZE, Font::Bold, Font::Bold),
    }
}

fn place(block: &Block) -> Vec<Placed> {
    match block {
        Block::Spacer(h) => vec![Placed::Gap(*h)],
        Block::Text(line) => wrap(&line.text, line.font, line.size, theme::CONTENT_WIDTH)
            .into_iter()
            .map(|text| Placed::Line(Line { text, ..line.clone() }))
            .collect(),
        Block::Row(row) => {
            let (size, label_font, value_font) = row_style(row.kind);
            let inner = |w: f32| w - 2.0 * theme::CELL_PADDING_X;
            let (label_w, value_w) = if row.kind == RowKind::Heading && row.value.is_empty() {
                (row.columns.0 + row.columns.1, row.columns.1)
            } else {
                row.columns
            };
            vec![Placed::Row {
                label: wrap(&row.label, label_font, size, inner(label_w)),
                value: wrap(&row.value, value_font, size, inner(value_w)),
                row: row.clone(),
                size,
            }]
        }
    }
}

fn draw_row(canvas: &mut Canvas, top: f32, height: f32, row: &Row, label: &[String], value: &[String], size: f32) {
    let (label_w, value_w) = row.columns;
    let left = theme::MARGIN_LEFT;
    let bottom = top - height;
    let full = label_w + value_w;
    let (_, label_font, value_font) = row_style(row.kind);

    let (label_color, value_color) = match row.kind {
        RowKind::Heading => {
            canvas.fill_rect(left, bottom, full, height, theme::NAVY);
            (theme::WHITE, theme::WHITE)
        }
        RowKind::Item => {
            canvas.fill_rect(left, bottom, label_w, height, theme::LABEL_FILL);
            (theme::BLACK, theme::BLACK)
        }
        RowKind::Total => {
            canvas.fill_rect(left, bottom, full, height, theme::TOTAL_FILL);
            (theme::BLACK, theme::TOTAL_ACCENT)
        }
    };

    match row.kind {
        RowKind::Total => {
            canvas.stroke_rect(left, bottom, full, height, theme::TOTAL_ACCENT, theme::TOTAL_BOX_LINE)
        }
        RowKind::Heading if row.value.is_empty() => {
            canvas.stroke_rect(left, bottom, full, height, theme::GRID, theme::GRID_LINE)
        }
        _ => {
            canvas.stroke_rect(left, bottom, label_w, height, theme::GRID, theme::GRID_LINE);
            canvas.stroke_rect(left + label_w, bottom, value_w, height, theme::GRID, theme::GRID_LINE);
        }
    }

    let leading = size * theme::LEADING;
    let first_baseline = top - theme::CELL_PADDING_Y - size;
    for (i, text) in label.iter().enumerate() {
        canvas.text(
            left + theme::CELL_PADDING_X,
            first_baseline - i as f32 * leading,
            text,
            label_font,
            size,
            label_color,
        );
    }
    for (i, text) in value.iter().enumerate() {
        let line = Line {
            text: text.clone(),
            font: value_font,
            size,
            color: value_color,
            align: row.value_align,
        };
        canvas.aligned_text(
            left + label_w + theme::CELL_PADDING_X,
            value_w - 2.0 * theme::CELL_PADDING_X,
            first_baseline - i as f32 * leading,
            &line,
        );
    }
}

/// Lays out `blocks` top to bottom, opening a new page whenever the next piece
/// would run into the footer area. Rows taller than a page continue on the next one.
fn paginate(blocks: &[Block]) -> Vec<Canvas> {
    let top = theme::PAGE_HEIGHT - theme::MARGIN_TOP;
    let floor = theme::MARGIN_BOTTOM + theme::FOOTER_HEIGHT;

    let mut pages = Vec::new();
    let mut canvas = Canvas::default();
    let mut y = top;
    let mut queue: VecDeque<Placed> = blocks.iter().flat_map(place).collect();

    while let Some(mut placed) = queue.pop_front() {
        if y - placed.height() < floor {
            let fits_fresh_page = top - placed.height() >= floor;
            if y < top && (fits_fresh_page || y - placed.min_height() < floor) {
                pages.push(std::mem::take(&mut canvas));
                y = top;
                if matches!(placed, Placed::Gap(_)) {
                    continue;
                }
            }
            if let Some(rest) = placed.split_off(y - floor) {
                queue.push_front(rest);
            }
        }
        let height = placed.height();
        match &placed {
            Placed::Gap(_) => {}
            Placed::Line(line) => {
                let baseline = y - line.size * theme::LEADING;
                canvas.aligned_text(theme::MARGIN_LEFT, theme::CONTENT_WIDTH, baseline, line);
            }
            Placed::Row {
                row,
                label,
                value,
                size,
            } => draw_row(&mut canvas, y, height, row, label, value, *size),
        }
        y -= height;
    }
    pages.push(canvas);
    pages
}

fn draw_footer(canvas: &mut Canvas, footer: &Footer, page: usize, total: usize) {
    let rule_y = theme::MARGIN_BOTTOM + theme::FOOTER_HEIGHT - 4.0;
    canvas.hline(
        theme::MARGIN_LEFT,
        theme::MARGIN_LEFT + theme::CONTENT_WIDTH,
        rule_y,
        theme::FAINT,
        theme::GRID_LINE,
    );
    let mut baseline = rule_y - theme::FOOTER_SIZE * theme::LEADING;
    let page_line = format!("Página {page} de {total}");
    for text in footer.lines.iter().chain(std::iter::once(&page_line)) {
        let line = Line {
            text: text.clone(),
            font: Font::Regular,
            size: theme::FOOTER_SIZE,
            color: theme::FAINT,
            align: Align::Center,
        };
        canvas.aligned_text(theme::MARGIN_LEFT, theme::CONTENT_WIDTH, baseline, &line);
        baseline -= theme::FOOTER_SIZE * theme::LEADING;
    }
}

fn pdf_error(e: lopdf::Error) -> AppError {
    AppError::RenderError(e.to_string())
}

/// Serialises the laid-out pages. Nothing is returned unless the whole document was written.
pub fn write(blocks: &[Block], footer: &Footer, title: &str) -> Result<Vec<u8>, AppError> {
    let mut pages = paginate(blocks);
    let total = pages.len();
    for (index, canvas) in pages.iter_mut().enumerate() {
        draw_footer(canvas, footer, index + 1, total);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(total);
    for canvas in pages {
        let content = Content {
            operations: canvas.ops,
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().map_err(pdf_error)?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let media_box: Vec<Object> = vec![
        Object::Integer(0),
        Object::Integer(0),
        theme::PAGE_WIDTH.into(),
        theme::PAGE_HEIGHT.into(),
    ];
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => total as i64,
        "Resources" => resources_id,
        "MediaBox" => media_box,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(encode(title), StringFormat::Literal),
        "Producer" => Object::string_literal(env!("CARGO_PKG_NAME")),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| AppError::RenderError(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width_and_splits_long_words() {
        let lines = wrap("um dois três quatro cinco seis", Font::Regular, 10.0, 60.0);
        assert!(lines.len() > 1);
        assert!(lines
            .iter()
            .all(|l| text_width(l, Font::Regular, 10.0) <= 60.0));

        let long = "x".repeat(200);
        let lines = wrap(&long, Font::Regular, 10.0, 100.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), long);
    }

    #[test]
    fn empty_text_wraps_to_one_empty_line() {
        assert_eq!(wrap("", Font::Regular, 10.0, 100.0), vec![String::new()]);
    }

    #[test]
    fn encodes_portuguese_text_as_winansi() {
        assert_eq!(encode("Ação"), vec![b'A', 0xe7, 0xe3, b'o']);
        assert_eq!(encode("nº · R$"), vec![b'n', 0xba, b' ', 0xb7, b' ', b'R', b'$']);
        assert_eq!(encode("✓"), vec![b'?']);
    }

    #[test]
    fn bold_is_never_narrower() {
        for ch in "Valor Total: R$ 1234.56 ação".chars() {
            assert!(char_width(ch, Font::Bold) >= char_width(ch, Font::Regular), "{ch}");
        }
    }

    #[test]
    fn oversized_rows_continue_on_the_next_page() {
        let value = "Nome ".repeat(1500);
        let value_lines = wrap(
            &value,
            Font::Regular,
            theme::BODY_SIZE,
            theme::IDENTITY_COLUMNS.1 - 2.0 * theme::CELL_PADDING_X,
        )
        .len();
        let blocks = vec![Block::Row(Row {
            label: "Nome:".into(),
            value,
            kind: RowKind::Item,
            columns: theme::IDENTITY_COLUMNS,
            value_align: Align::Left,
        })];

        let pages = paginate(&blocks);
        assert!(pages.len() > 1);

        let floor = theme::MARGIN_BOTTOM + theme::FOOTER_HEIGHT;
        let mut drawn = 0;
        for page in &pages {
            for op in page.ops.iter().filter(|op| op.operator == "Td") {
                let baseline = op.operands[1].as_float().unwrap();
                assert!(baseline >= floor, "baseline {baseline} below {floor}");
                drawn += 1;
            }
        }
        assert_eq!(drawn, value_lines + 1);
    }

    #[test]
    fn every_page_gets_a_footer() {
        let blocks: Vec<Block> = (0..120)
            .map(|i| {
                Block::Text(Line {
                    text: format!("linha {i}"),
                    font: Font::Regular,
                    size: theme::BODY_SIZE,
                    color: theme::BLACK,
                    align: Align::Left,
                })
            })
            .collect();
        let bytes = write(&blocks, &Footer::default(), "PER-20250101000000").unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert!(pages.len() >= 2);
        for (_, page_id) in pages {
            let content = doc.get_page_content(page_id).unwrap();
            let needle = format!("de {}", doc.get_pages().len());
            assert!(
                content.windows(needle.len()).any(|w| w == needle.as_bytes()),
                "page without counter"
            );
        }
    }
}
