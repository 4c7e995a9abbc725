//! The three kinds of report content. Each block wraps its text once at
//! construction, so `height` is known before the cursor is asked for space,
//! and `draw` only reads what was computed.

use crate::cursor::PageCursor;
use crate::font::{FontSet, FontWeight};
use crate::record::{AssessmentRecord, CriterionResult, MAX_SCORE, MIN_SCORE, Status};
use crate::shapes::{RectStyle, draw_pill, draw_rect, draw_text};
use crate::style::Style;
use crate::text::wrap_text;
use crate::types::{Color, Pt};

const SUMMARY_TITLE: &str = "Summary";
// Header lines shrink to this share of their nominal size before truncating.
const MIN_HEADER_SCALE: f32 = 0.7;
const ELLIPSIS: char = '\u{2026}';

/// Read-only inputs shared by every block of one assembly.
#[derive(Clone, Copy)]
pub struct BlockContext<'a> {
    pub style: &'a Style,
    pub fonts: &'a FontSet,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutBlock {
    Header(HeaderBlock),
    Summary(SummaryBlock),
    Criterion(CriterionBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBlock {
    pub candidate_name: String,
    pub role: String,
    pub date_line: String,
    pub status: Status,
    badge_width: Pt,
    /// Name, role and date line as drawn, fitted left of the badge.
    lines: [FittedLine; 3],
    height: Pt,
}

#[derive(Debug, Clone, PartialEq)]
struct FittedLine {
    text: String,
    size: Pt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryBlock {
    pub body_lines: Vec<String>,
    height: Pt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CriterionBlock {
    pub title_lines: Vec<String>,
    pub body_lines: Vec<String>,
    /// Printed after the title as `score/5`.
    pub display_score: i64,
    /// `display_score` bounded to the bar's range.
    pub bar_score: i64,
    height: Pt,
}

impl LayoutBlock {
    pub fn header(record: &AssessmentRecord, generated_on: &str, ctx: BlockContext<'_>) -> Self {
        let style = ctx.style;
        let badge_label = badge_label(record.status);
        let badge_width =
            ctx.fonts.measure(FontWeight::Bold, style.badge_text_size, &badge_label) + style.badge_padding;
        let date_line = format!(
            "Interviewed {}  |  Report generated {}",
            record.interview_date, generated_on
        );
        let text_width = (style.content_width() - style.header_padding * 3 - badge_width).max(Pt::ZERO);
        let fit = |weight, size, text: &str| fit_line(ctx.fonts, weight, size, text_width, text);
        let lines = [
            fit(FontWeight::Bold, style.name_size, &record.candidate_name),
            fit(FontWeight::Regular, style.role_size, &record.role),
            fit(FontWeight::Regular, style.date_size, &date_line),
        ];
        LayoutBlock::Header(HeaderBlock {
            candidate_name: record.candidate_name.clone(),
            role: record.role.clone(),
            date_line,
            status: record.status,
            badge_width,
            lines,
            height: style.header_height,
        })
    }

    pub fn summary(summary: &str, ctx: BlockContext<'_>) -> Self {
        let style = ctx.style;
        let body_lines = wrap_text(
            ctx.fonts,
            FontWeight::Regular,
            style.body_size,
            style.container_inner_width(),
            summary,
        );
        let height = style.container_padding * 2
            + style.title_line_height
            + style.line_height * body_lines.len() as i32;
        LayoutBlock::Summary(SummaryBlock { body_lines, height })
    }

    pub fn criterion(criterion: &CriterionResult, display_score: i64, ctx: BlockContext<'_>) -> Self {
        let style = ctx.style;
        let title_width = (style.container_inner_width() - style.score_column).max(Pt::ZERO);
        let title_lines = wrap_text(
            ctx.fonts,
            FontWeight::Bold,
            style.title_size,
            title_width,
            &criterion.name,
        );
        let body_lines = wrap_text(
            ctx.fonts,
            FontWeight::Regular,
            style.body_size,
            style.container_inner_width(),
            &criterion.assessment,
        );
        let height = style.container_padding * 2
            + style.line_height * title_lines.len() as i32
            + style.bar_gap
            + style.bar_height
            + style.bar_gap
            + style.line_height * body_lines.len() as i32;
        LayoutBlock::Criterion(CriterionBlock {
            title_lines,
            body_lines,
            display_score,
            bar_score: display_score.clamp(MIN_SCORE, MAX_SCORE),
            height,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LayoutBlock::Header(_) => "header",
            LayoutBlock::Summary(_) => "summary",
            LayoutBlock::Criterion(_) => "criterion",
        }
    }

    pub fn height(&self) -> Pt {
        match self {
            LayoutBlock::Header(block) => block.height,
            LayoutBlock::Summary(block) => block.height,
            LayoutBlock::Criterion(block) => block.height,
        }
    }

    /// Smallest leading slice that must land on one page: everything up to
    /// and including the first body line, plus the closing padding.
    pub fn head_height(&self, style: &Style) -> Pt {
        match self {
            LayoutBlock::Header(block) => block.height,
            LayoutBlock::Summary(_) => {
                style.container_padding * 2 + style.title_line_height + style.line_height
            }
            LayoutBlock::Criterion(block) => {
                style.container_padding * 2
                    + style.line_height * block.title_lines.len() as i32
                    + style.bar_gap * 2
                    + style.bar_height
                    + style.line_height
            }
        }
    }

    /// Space to request before drawing. Blocks that fit on a page are
    /// reserved whole; taller blocks only need their head to fit and let the
    /// body lines flow onto following pages.
    pub fn reservation(&self, style: &Style) -> Pt {
        let height = self.height();
        if height <= style.page_capacity() {
            height
        } else {
            self.head_height(style)
        }
    }

    pub fn draw(&self, cursor: &mut PageCursor, ctx: BlockContext<'_>) {
        match self {
            LayoutBlock::Header(block) => block.draw(cursor, ctx),
            LayoutBlock::Summary(block) => block.draw(cursor, ctx),
            LayoutBlock::Criterion(block) => block.draw(cursor, ctx),
        }
    }
}

/// Shrinks `text` until it fits `max_width`, down to `MIN_HEADER_SCALE` of
/// `nominal`; past that the text is cut and ends in an ellipsis.
fn fit_line(fonts: &FontSet, weight: FontWeight, nominal: Pt, max_width: Pt, text: &str) -> FittedLine {
    let width = fonts.measure(weight, nominal, text);
    if width <= max_width {
        return FittedLine {
            text: text.to_string(),
            size: nominal,
        };
    }
    let floor = nominal * MIN_HEADER_SCALE;
    // Rounded down to a hundredth of a point so the shrunk line cannot overshoot.
    let ratio = max_width.to_f32() / width.to_f32();
    let scaled = Pt::from_f32((nominal.to_f32() * ratio * 100.0).floor() / 100.0);
    if scaled >= floor && fonts.measure(weight, scaled, text) <= max_width {
        return FittedLine {
            text: text.to_string(),
            size: scaled,
        };
    }

    let mut kept: String = text.to_string();
    loop {
        let candidate = format!("{}{ELLIPSIS}", kept.trim_end());
        if kept.is_empty() || fonts.measure(weight, floor, &candidate) <= max_width {
            return FittedLine {
                text: candidate,
                size: floor,
            };
        }
        kept.pop();
    }
}

fn badge_label(status: Status) -> String {
    status.label().to_uppercase()
}

impl HeaderBlock {
    fn draw(&self, cursor: &mut PageCursor, ctx: BlockContext<'_>) {
        let style = ctx.style;
        let palette = &style.palette;
        let top = cursor.offset_y();
        let bottom = top - self.height;
        let left = style.content_left();
        let canvas = cursor.canvas_mut();

        let band = RectStyle::filled(palette.header_fill)
            .with_border(palette.container_border, style.border_width)
            .rounded(style.corner_radius);
        draw_rect(canvas, left, bottom, style.content_width(), self.height, &band);

        let text_left = left + style.header_padding;
        let [name, role, date] = &self.lines;
        let mut baseline = top - style.header_padding - style.name_size;
        draw_text(
            canvas,
            &name.text,
            text_left,
            baseline,
            FontWeight::Bold,
            name.size,
            palette.heading,
        );
        baseline -= style.header_line_gap + style.role_size;
        draw_text(
            canvas,
            &role.text,
            text_left,
            baseline,
            FontWeight::Regular,
            role.size,
            palette.body,
        );
        baseline -= style.header_line_gap + style.date_size;
        draw_text(
            canvas,
            &date.text,
            text_left,
            baseline,
            FontWeight::Regular,
            date.size,
            palette.muted,
        );

        let colors = match self.status {
            Status::Pass => palette.pass,
            Status::Fail => palette.fail,
        };
        let badge_x = style.content_right() - style.header_padding - self.badge_width;
        let badge_y = bottom + (self.height - style.badge_height) / 2;
        let badge = RectStyle::filled(colors.fill)
            .with_border(colors.border, style.border_width)
            .rounded(style.badge_height / 2);
        draw_rect(canvas, badge_x, badge_y, self.badge_width, style.badge_height, &badge);
        // Optical centre: the baseline sits a fifth of the size above the midline offset.
        let label_baseline = badge_y
            + (style.badge_height - style.badge_text_size) / 2
            + style.badge_text_size * 0.2;
        draw_text(
            canvas,
            &badge_label(self.status),
            badge_x + style.badge_padding / 2,
            label_baseline,
            FontWeight::Bold,
            style.badge_text_size,
            colors.text,
        );

        cursor.advance(self.height);
    }
}

impl SummaryBlock {
    fn draw(&self, cursor: &mut PageCursor, ctx: BlockContext<'_>) {
        let style = ctx.style;
        let mut segment = Segment::open(cursor, style);
        let left = style.content_left() + style.container_padding;

        let line_top = cursor.offset_y();
        draw_text(
            cursor.canvas_mut(),
            SUMMARY_TITLE,
            left,
            line_top - style.title_size,
            FontWeight::Bold,
            style.title_size,
            style.palette.heading,
        );
        cursor.advance(style.title_line_height);

        draw_body_lines(cursor, style, &mut segment, &self.body_lines, "summary line");
        segment.close(cursor, style);
    }
}

impl CriterionBlock {
    fn draw(&self, cursor: &mut PageCursor, ctx: BlockContext<'_>) {
        let style = ctx.style;
        let palette = &style.palette;
        let band = palette.score_color(self.bar_score);
        let mut segment = Segment::open(cursor, style);
        let left = style.content_left() + style.container_padding;
        let inner_width = style.container_inner_width();
        let right = left + inner_width;

        let score_label = format!("{}/{}", self.display_score, MAX_SCORE);
        let score_width = ctx.fonts.measure(FontWeight::Bold, style.score_size, &score_label);
        for (idx, line) in self.title_lines.iter().enumerate() {
            let baseline = cursor.offset_y() - style.title_size;
            draw_text(
                cursor.canvas_mut(),
                line,
                left,
                baseline,
                FontWeight::Bold,
                style.title_size,
                palette.heading,
            );
            if idx == 0 {
                draw_text(
                    cursor.canvas_mut(),
                    &score_label,
                    right - score_width,
                    baseline,
                    FontWeight::Bold,
                    style.score_size,
                    band,
                );
            }
            cursor.advance(style.line_height);
        }

        cursor.advance(style.bar_gap);
        let bar_bottom = cursor.offset_y() - style.bar_height;
        let filled = inner_width.mul_ratio(self.bar_score as i32, MAX_SCORE as i32);
        draw_pill(
            cursor.canvas_mut(),
            left,
            bar_bottom,
            inner_width,
            style.bar_height,
            palette.track,
        );
        draw_pill(
            cursor.canvas_mut(),
            left,
            bar_bottom,
            filled,
            style.bar_height,
            band,
        );
        cursor.advance(style.bar_height + style.bar_gap);

        draw_body_lines(cursor, style, &mut segment, &self.body_lines, "criterion line");
        segment.close(cursor, style);
    }
}

/// Bordered container slice on one page. A block that spans pages draws one
/// segment per page; each keeps the full border.
struct Segment {
    top: Pt,
}

impl Segment {
    fn open(cursor: &mut PageCursor, style: &Style) -> Self {
        let top = cursor.offset_y();
        cursor.advance(style.container_padding);
        Self { top }
    }

    fn close(&self, cursor: &mut PageCursor, style: &Style) {
        cursor.advance(style.container_padding);
        let bottom = cursor.offset_y();
        let border = RectStyle::outlined(style.palette.container_border, style.border_width)
            .rounded(style.corner_radius);
        draw_rect(
            cursor.canvas_mut(),
            style.content_left(),
            bottom,
            style.content_width(),
            self.top - bottom,
            &border,
        );
    }
}

fn draw_body_lines(
    cursor: &mut PageCursor,
    style: &Style,
    segment: &mut Segment,
    lines: &[String],
    reason: &str,
) {
    let left = style.content_left() + style.container_padding;
    for line in lines {
        if cursor.would_break(style.line_height + style.container_padding) {
            segment.close(cursor, style);
            cursor.reserve(style.line_height + style.container_padding * 2, reason);
            *segment = Segment::open(cursor, style);
        }
        let baseline = cursor.offset_y() - style.body_size;
        draw_text(
            cursor.canvas_mut(),
            line,
            left,
            baseline,
            FontWeight::Regular,
            style.body_size,
            style.palette.body,
        );
        cursor.advance(style.line_height);
    }
}

/// Colour of a score band, exposed for callers that render legends.
pub fn band_color(style: &Style, score: i64) -> Color {
    style.palette.score_color(score.clamp(MIN_SCORE, MAX_SCORE))
}
