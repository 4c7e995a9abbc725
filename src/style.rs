use crate::types::{Color, Margins, Pt, Size};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BadgeColors {
    pub fill: Color,
    pub border: Color,
    pub text: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub pass: BadgeColors,
    pub fail: BadgeColors,
    pub score_high: Color,
    pub score_mid: Color,
    pub score_low: Color,
    pub track: Color,
    pub container_border: Color,
    pub header_fill: Color,
    pub heading: Color,
    pub body: Color,
    pub muted: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            pass: BadgeColors {
                fill: Color::rgb8(220, 252, 231),
                border: Color::rgb8(34, 197, 94),
                text: Color::rgb8(21, 128, 61),
            },
            fail: BadgeColors {
                fill: Color::rgb8(254, 226, 226),
                border: Color::rgb8(239, 68, 68),
                text: Color::rgb8(185, 28, 28),
            },
            score_high: Color::rgb8(34, 197, 94),
            score_mid: Color::rgb8(245, 158, 11),
            score_low: Color::rgb8(239, 68, 68),
            track: Color::rgb8(229, 231, 235),
            container_border: Color::rgb8(209, 213, 219),
            header_fill: Color::rgb8(249, 250, 251),
            heading: Color::rgb8(17, 24, 39),
            body: Color::rgb8(55, 65, 81),
            muted: Color::rgb8(107, 114, 128),
        }
    }
}

impl Palette {
    /// `>= 3` green, `== 2` amber, `< 2` red.
    pub fn score_color(&self, score: i64) -> Color {
        match score {
            s if s >= 3 => self.score_high,
            2 => self.score_mid,
            _ => self.score_low,
        }
    }
}

/// Geometry and colour of a report. One value is built at startup and shared
/// read-only by every assembly; tests swap in their own.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub page_size: Size,
    pub margins: Margins,
    pub watermark_clearance: Pt,
    pub line_height: Pt,
    pub title_line_height: Pt,
    pub corner_radius: Pt,
    pub border_width: Pt,
    pub block_gap: Pt,
    pub container_padding: Pt,

    pub header_height: Pt,
    pub header_padding: Pt,
    pub header_line_gap: Pt,
    pub name_size: Pt,
    pub role_size: Pt,
    pub date_size: Pt,
    pub badge_height: Pt,
    pub badge_padding: Pt,
    pub badge_text_size: Pt,

    pub title_size: Pt,
    pub body_size: Pt,
    pub score_size: Pt,
    pub score_column: Pt,
    pub bar_height: Pt,
    pub bar_gap: Pt,

    pub palette: Palette,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            page_size: Size::letter(),
            margins: Margins::all(50.0),
            watermark_clearance: Pt::from_i32(30),
            line_height: Pt::from_i32(14),
            title_line_height: Pt::from_i32(18),
            corner_radius: Pt::from_i32(8),
            border_width: Pt::from_i32(1),
            block_gap: Pt::from_i32(15),
            container_padding: Pt::from_i32(15),

            header_height: Pt::from_i32(120),
            header_padding: Pt::from_i32(20),
            header_line_gap: Pt::from_i32(8),
            name_size: Pt::from_i32(20),
            role_size: Pt::from_i32(12),
            date_size: Pt::from_i32(10),
            badge_height: Pt::from_i32(28),
            badge_padding: Pt::from_i32(40),
            badge_text_size: Pt::from_i32(12),

            title_size: Pt::from_i32(12),
            body_size: Pt::from_i32(10),
            score_size: Pt::from_i32(12),
            score_column: Pt::from_i32(50),
            bar_height: Pt::from_i32(8),
            bar_gap: Pt::from_i32(8),

            palette: Palette::default(),
        }
    }
}

impl Style {
    pub fn with_page_size(mut self, page_size: Size) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn content_left(&self) -> Pt {
        self.margins.left
    }

    pub fn content_width(&self) -> Pt {
        (self.page_size.width - self.margins.left - self.margins.right).max(Pt::ZERO)
    }

    pub fn content_right(&self) -> Pt {
        self.content_left() + self.content_width()
    }

    /// First writable offset on a fresh page.
    pub fn content_top(&self) -> Pt {
        self.page_size.height - self.margins.top - self.watermark_clearance
    }

    pub fn content_bottom(&self) -> Pt {
        self.margins.bottom
    }

    /// Vertical room between the content-start line and the bottom margin.
    pub fn page_capacity(&self) -> Pt {
        (self.content_top() - self.content_bottom()).max(Pt::ZERO)
    }

    /// Inner width of a bordered container.
    pub fn container_inner_width(&self) -> Pt {
        (self.content_width() - self.container_padding * 2).max(Pt::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bands() {
        let palette = Palette::default();
        assert_eq!(palette.score_color(5), palette.score_high);
        assert_eq!(palette.score_color(3), palette.score_high);
        assert_eq!(palette.score_color(2), palette.score_mid);
        assert_eq!(palette.score_color(1), palette.score_low);
        assert_eq!(palette.score_color(0), palette.score_low);
        assert_eq!(palette.score_color(-4), palette.score_low);
    }

    #[test]
    fn letter_content_box() {
        let style = Style::default();
        assert_eq!(style.content_width(), Pt::from_i32(512));
        assert_eq!(style.content_top(), Pt::from_i32(712));
        assert_eq!(style.content_bottom(), Pt::from_i32(50));
        assert_eq!(style.page_capacity(), Pt::from_i32(662));
        assert_eq!(style.container_inner_width(), Pt::from_i32(482));
    }
}
