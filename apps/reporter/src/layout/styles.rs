//! Style Registry — visual parameters for every story element kind.
//!
//! Built once at startup and handed to the builder and paginator as an
//! immutable value (shared through `Arc` in application state).

use serde::{Deserialize, Serialize};

/// 1 mm in PDF points.
pub const MM: f32 = 72.0 / 25.4;

/// A4 portrait, in points.
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

// ────────────────────────────────────────────────────────────────────────────
// Colors
// ────────────────────────────────────────────────────────────────────────────

/// RGB color with components in 0.0..=1.0 (PDF device RGB).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    /// `#808080`
    pub const GREY: Rgb = Rgb {
        r: 0.502,
        g: 0.502,
        b: 0.502,
    };

    /// `0xRRGGBB` → components.
    pub fn from_hex(hex: u32) -> Self {
        Rgb {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Style types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphStyle {
    pub font_size: f32,
    /// Baseline-to-baseline distance.
    pub leading: f32,
    pub color: Rgb,
    /// Dropped when the element lands at the top of a page.
    pub space_before: f32,
    pub space_after: f32,
    pub alignment: Alignment,
    pub left_indent: f32,
    /// Base face; inline `<b>`/`<i>` markup toggles from here.
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableStyle {
    pub font_size: f32,
    pub leading: f32,
    pub text_color: Rgb,
    pub grid_color: Rgb,
    pub grid_width: f32,
    pub header_background: Rgb,
    pub padding_left: f32,
    pub padding_right: f32,
    pub padding_top: f32,
    pub padding_bottom: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FooterStyle {
    pub font_size: f32,
    pub color: Rgb,
}

/// The registry: one style per story element kind.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRegistry {
    pub title: ParagraphStyle,
    pub h1: ParagraphStyle,
    pub h2: ParagraphStyle,
    pub body: ParagraphStyle,
    pub list_item: ParagraphStyle,
    pub table: TableStyle,
    pub footer: FooterStyle,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self {
            title: ParagraphStyle {
                font_size: 20.0,
                leading: 24.0,
                color: Rgb::from_hex(0x1a1a1a),
                space_before: 0.0,
                space_after: 12.0,
                alignment: Alignment::Center,
                left_indent: 0.0,
                bold: true,
            },
            h1: ParagraphStyle {
                font_size: 18.0,
                leading: 22.0,
                color: Rgb::from_hex(0x2c3e50),
                space_before: 0.0,
                space_after: 8.0,
                alignment: Alignment::Left,
                left_indent: 0.0,
                bold: true,
            },
            h2: ParagraphStyle {
                font_size: 14.0,
                leading: 18.0,
                color: Rgb::from_hex(0x34495e),
                space_before: 12.0,
                space_after: 6.0,
                alignment: Alignment::Left,
                left_indent: 0.0,
                bold: true,
            },
            body: ParagraphStyle {
                font_size: 10.5,
                leading: 14.0,
                color: Rgb::BLACK,
                space_before: 6.0,
                space_after: 6.0,
                alignment: Alignment::Left,
                left_indent: 0.0,
                bold: false,
            },
            list_item: ParagraphStyle {
                font_size: 10.0,
                leading: 13.0,
                color: Rgb::BLACK,
                space_before: 6.0,
                space_after: 2.0,
                alignment: Alignment::Left,
                left_indent: 12.0,
                bold: false,
            },
            table: TableStyle {
                font_size: 10.0,
                leading: 12.0,
                text_color: Rgb::BLACK,
                grid_color: Rgb::GREY,
                grid_width: 0.5,
                header_background: Rgb::from_hex(0xe8f4f8),
                padding_left: 6.0,
                padding_right: 6.0,
                padding_top: 4.0,
                padding_bottom: 4.0,
            },
            footer: FooterStyle {
                font_size: 8.0,
                color: Rgb::GREY,
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Page configuration
// ────────────────────────────────────────────────────────────────────────────

/// Physical page geometry, shared by every page of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    /// Distance from the bottom edge to the footer baseline.
    pub footer_offset: f32,
    pub footer_label: String,
}

impl PageConfig {
    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn content_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }

    /// Y coordinate (PDF space, origin bottom-left) of the top of the content frame.
    pub fn frame_top(&self) -> f32 {
        self.height - self.margin_top
    }

    /// Y coordinate of the bottom of the content frame.
    pub fn frame_bottom(&self) -> f32 {
        self.margin_bottom
    }

    /// True if every dimension is finite and the content frame has positive area.
    pub fn is_valid(&self) -> bool {
        let dims = [
            self.width,
            self.height,
            self.margin_top,
            self.margin_bottom,
            self.margin_left,
            self.margin_right,
            self.footer_offset,
        ];
        dims.iter().all(|d| d.is_finite() && *d >= 0.0)
            && self.content_width() > 0.0
            && self.content_height() > 0.0
    }
}

/// A4 portrait, 20 mm margins on all sides, footer 10 mm above the bottom edge.
pub fn default_page_config() -> PageConfig {
    PageConfig {
        width: A4_WIDTH_PT,
        height: A4_HEIGHT_PT,
        margin_top: 20.0 * MM,
        margin_bottom: 20.0 * MM,
        margin_left: 20.0 * MM,
        margin_right: 20.0 * MM,
        footer_offset: 10.0 * MM,
        footer_label: "AI Generated Report".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_components() {
        let c = Rgb::from_hex(0xff8000);
        assert!((c.r - 1.0).abs() < 1e-6);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);
    }

    #[test]
    fn test_default_page_config_sanity() {
        let page = default_page_config();
        assert!(page.is_valid());
        // 210mm - 40mm of margins
        assert!((page.content_width() - 170.0 * MM).abs() < 0.1);
        // Footer sits inside the bottom margin band.
        assert!(page.footer_offset < page.margin_bottom);
    }

    #[test]
    fn test_page_config_rejects_degenerate_frames() {
        let mut page = default_page_config();
        page.margin_left = page.width;
        assert!(!page.is_valid());

        let mut page = default_page_config();
        page.margin_top = f32::NAN;
        assert!(!page.is_valid());

        let mut page = default_page_config();
        page.margin_bottom = -1.0;
        assert!(!page.is_valid());
    }

    #[test]
    fn test_heading_styles_ordered_by_size() {
        let styles = StyleRegistry::default();
        assert!(styles.title.font_size > styles.h1.font_size);
        assert!(styles.h1.font_size > styles.h2.font_size);
        assert!(styles.h2.font_size > styles.body.font_size);
        assert_eq!(styles.title.alignment, Alignment::Center);
    }
}
