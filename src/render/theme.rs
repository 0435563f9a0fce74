//! Layout constants for the proposal PDF. Units are PDF points unless noted.

/// One millimetre in points.
pub const MM: f32 = 72.0 / 25.4;

// A4
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

pub const MARGIN_TOP: f32 = 20.0 * MM;
pub const MARGIN_BOTTOM: f32 = 20.0 * MM;
pub const CONTENT_WIDTH: f32 = 165.0 * MM;
pub const MARGIN_LEFT: f32 = (PAGE_WIDTH - CONTENT_WIDTH) / 2.0;

/// Space reserved above the bottom margin for the footer lines.
pub const FOOTER_HEIGHT: f32 = 24.0;

/// Label/value column widths of the identity tables.
pub const IDENTITY_COLUMNS: (f32, f32) = (45.0 * MM, 120.0 * MM);
/// Label/value column widths of the fee table.
pub const FEE_COLUMNS: (f32, f32) = (120.0 * MM, 45.0 * MM);

pub const CELL_PADDING_X: f32 = 8.0;
pub const CELL_PADDING_Y: f32 = 6.0;
pub const GRID_LINE: f32 = 0.5;
pub const TOTAL_BOX_LINE: f32 = 1.5;
/// Line height as a multiple of the font size.
pub const LEADING: f32 = 1.2;

pub const TITLE_SIZE: f32 = 18.0;
pub const SUBTITLE_SIZE: f32 = 11.0;
pub const BODY_SIZE: f32 = 10.0;
pub const HEADING_SIZE: f32 = 11.0;
pub const TOTAL_SIZE: f32 = 14.0;
pub const NOTES_SIZE: f32 = 9.0;
pub const FOOTER_SIZE: f32 = 8.0;

pub const SECTION_GAP: f32 = 8.0 * MM;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn components(self) -> [f32; 3] {
        [self.0, self.1, self.2].map(|c| f32::from(c) / 255.0)
    }
}

pub const NAVY: Rgb = Rgb(0x1a, 0x1a, 0x2e);
pub const WHITE: Rgb = Rgb(0xff, 0xff, 0xff);
pub const BLACK: Rgb = Rgb(0x00, 0x00, 0x00);
pub const LABEL_FILL: Rgb = Rgb(0xf0, 0xf0, 0xf0);
pub const GRID: Rgb = Rgb(0x80, 0x80, 0x80);
pub const TOTAL_FILL: Rgb = Rgb(0xe8, 0xf5, 0xe9);
pub const TOTAL_ACCENT: Rgb = Rgb(0x2e, 0x7d, 0x32);
pub const MUTED: Rgb = Rgb(0x66, 0x66, 0x66);
pub const FAINT: Rgb = Rgb(0x99, 0x99, 0x99);

pub const BRAND: &str = "Perícia Psicológica";
pub const TITLE: &str = "PROPOSTA DE HONORÁRIOS";
pub const CURRENCY: &str = "R$";
pub const NOT_INFORMED: &str = "Não informado";
