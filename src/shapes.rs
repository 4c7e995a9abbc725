//! Stateless drawing helpers. Each one only writes to the canvas it is
//! handed; none of them know about pagination.

use crate::canvas::Canvas;
use crate::font::FontWeight;
use crate::types::{Color, Pt};

// Control-point distance for approximating a quarter circle with one cubic Bézier.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectStyle {
    pub fill: Option<Color>,
    pub border: Option<Color>,
    pub border_width: Pt,
    pub corner_radius: Pt,
}

impl RectStyle {
    pub fn filled(color: Color) -> Self {
        Self {
            fill: Some(color),
            border: None,
            border_width: Pt::ZERO,
            corner_radius: Pt::ZERO,
        }
    }

    pub fn outlined(color: Color, width: Pt) -> Self {
        Self {
            fill: None,
            border: Some(color),
            border_width: width,
            corner_radius: Pt::ZERO,
        }
    }

    pub fn rounded(mut self, radius: Pt) -> Self {
        self.corner_radius = radius;
        self
    }

    pub fn with_border(mut self, color: Color, width: Pt) -> Self {
        self.border = Some(color);
        self.border_width = width;
        self
    }
}

/// Axis-aligned rectangle with its lower-left corner at `(x, y)`.
pub fn draw_rect(canvas: &mut Canvas, x: Pt, y: Pt, width: Pt, height: Pt, style: &RectStyle) {
    if width <= Pt::ZERO || height <= Pt::ZERO {
        return;
    }
    let stroke = style.border.filter(|_| style.border_width > Pt::ZERO);
    if style.fill.is_none() && stroke.is_none() {
        return;
    }
    let radius = style.corner_radius.clamp(Pt::ZERO, width.min(height) / 2);

    if radius == Pt::ZERO && stroke.is_none() {
        if let Some(fill) = style.fill {
            canvas.set_fill_color(fill);
            canvas.draw_rect(x, y, width, height);
        }
        return;
    }

    if let Some(fill) = style.fill {
        canvas.set_fill_color(fill);
    }
    if let Some(border) = stroke {
        canvas.set_stroke_color(border);
        canvas.set_line_width(style.border_width);
    }
    if radius == Pt::ZERO {
        square_path(canvas, x, y, width, height);
    } else {
        rounded_path(canvas, x, y, width, height, radius);
    }
    match (style.fill.is_some(), stroke.is_some()) {
        (true, true) => canvas.fill_stroke(),
        (true, false) => canvas.fill(),
        (false, true) => canvas.stroke(),
        (false, false) => {}
    }
}

/// Filled circle centred on `(cx, cy)`.
pub fn draw_circle(canvas: &mut Canvas, cx: Pt, cy: Pt, radius: Pt, color: Color) {
    if radius <= Pt::ZERO {
        return;
    }
    canvas.set_fill_color(color);
    let k = radius * KAPPA;
    canvas.move_to(cx + radius, cy);
    canvas.curve_to(cx + radius, cy + k, cx + k, cy + radius, cx, cy + radius);
    canvas.curve_to(cx - k, cy + radius, cx - radius, cy + k, cx - radius, cy);
    canvas.curve_to(cx - radius, cy - k, cx - k, cy - radius, cx, cy - radius);
    canvas.curve_to(cx + k, cy - radius, cx + radius, cy - k, cx + radius, cy);
    canvas.close_path();
    canvas.fill();
}

/// Rounded bar built from two end caps and a connecting rectangle.
///
/// Bars narrower than they are tall collapse to a single circle of diameter
/// `width`, so a small progress fill still reads as a dot inside its track.
pub fn draw_pill(canvas: &mut Canvas, x: Pt, y: Pt, width: Pt, height: Pt, color: Color) {
    if width <= Pt::ZERO || height <= Pt::ZERO {
        return;
    }
    if width < height {
        let r = width / 2;
        draw_circle(canvas, x + r, y + height / 2, r, color);
        return;
    }
    let r = height / 2;
    draw_circle(canvas, x + r, y + r, r, color);
    draw_circle(canvas, x + width - r, y + r, r, color);
    let middle = width - height;
    if middle > Pt::ZERO {
        canvas.set_fill_color(color);
        canvas.draw_rect(x + r, y, middle, height);
    }
}

/// One unwrapped text run with its baseline at `y`.
pub fn draw_text(
    canvas: &mut Canvas,
    text: &str,
    x: Pt,
    y: Pt,
    weight: FontWeight,
    size: Pt,
    color: Color,
) {
    if text.is_empty() {
        return;
    }
    canvas.set_fill_color(color);
    canvas.set_font(weight, size);
    canvas.draw_string(x, y, text);
}

fn square_path(canvas: &mut Canvas, x: Pt, y: Pt, width: Pt, height: Pt) {
    canvas.move_to(x, y);
    canvas.line_to(x + width, y);
    canvas.line_to(x + width, y + height);
    canvas.line_to(x, y + height);
    canvas.close_path();
}

fn rounded_path(canvas: &mut Canvas, x: Pt, y: Pt, width: Pt, height: Pt, r: Pt) {
    let k = r * KAPPA;
    let right = x + width;
    let top = y + height;
    canvas.move_to(x + r, y);
    canvas.line_to(right - r, y);
    canvas.curve_to(right - r + k, y, right, y + r - k, right, y + r);
    canvas.line_to(right, top - r);
    canvas.curve_to(right, top - r + k, right - r + k, top, right - r, top);
    canvas.line_to(x + r, top);
    canvas.curve_to(x + r - k, top, x, top - r + k, x, top - r);
    canvas.line_to(x, y + r);
    canvas.curve_to(x, y + r - k, x + r - k, y, x + r, y);
    canvas.close_path();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::types::Size;

    fn commands(draw: impl FnOnce(&mut Canvas)) -> Vec<Command> {
        let mut canvas = Canvas::new(Size::letter());
        draw(&mut canvas);
        canvas.finish().pages.remove(0).commands
    }

    fn count(cmds: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
        cmds.iter().filter(|c| pred(c)).count()
    }

    #[test]
    fn plain_fill_uses_rectangle_operator() {
        let cmds = commands(|c| {
            draw_rect(
                c,
                Pt::ZERO,
                Pt::ZERO,
                Pt::from_i32(10),
                Pt::from_i32(5),
                &RectStyle::filled(Color::BLACK),
            )
        });
        assert_eq!(count(&cmds, |c| matches!(c, Command::DrawRect { .. })), 1);
        assert_eq!(count(&cmds, |c| matches!(c, Command::CurveTo { .. })), 0);
    }

    #[test]
    fn rounded_bordered_rect_fills_and_strokes_one_path() {
        let style = RectStyle::filled(Color::WHITE)
            .with_border(Color::BLACK, Pt::from_i32(1))
            .rounded(Pt::from_i32(8));
        let cmds = commands(|c| {
            draw_rect(c, Pt::ZERO, Pt::ZERO, Pt::from_i32(100), Pt::from_i32(40), &style)
        });
        assert_eq!(count(&cmds, |c| matches!(c, Command::CurveTo { .. })), 4);
        assert_eq!(count(&cmds, |c| matches!(c, Command::FillStroke)), 1);
    }

    #[test]
    fn corner_radius_is_capped_at_half_the_short_side() {
        let style = RectStyle::outlined(Color::BLACK, Pt::from_i32(1)).rounded(Pt::from_i32(50));
        let cmds = commands(|c| {
            draw_rect(c, Pt::ZERO, Pt::ZERO, Pt::from_i32(100), Pt::from_i32(20), &style)
        });
        let Some(Command::MoveTo { x, .. }) = cmds.iter().find(|c| matches!(c, Command::MoveTo { .. }))
        else {
            panic!("path must start with a move");
        };
        assert_eq!(*x, Pt::from_i32(10));
    }

    #[test]
    fn wide_pill_is_two_caps_and_a_bar() {
        let cmds = commands(|c| {
            draw_pill(c, Pt::ZERO, Pt::ZERO, Pt::from_i32(100), Pt::from_i32(8), Color::BLACK)
        });
        assert_eq!(count(&cmds, |c| matches!(c, Command::Fill)), 2);
        let bars: Vec<&Command> = cmds
            .iter()
            .filter(|c| matches!(c, Command::DrawRect { .. }))
            .collect();
        assert_eq!(
            bars,
            vec![&Command::DrawRect {
                x: Pt::from_i32(4),
                y: Pt::ZERO,
                width: Pt::from_i32(92),
                height: Pt::from_i32(8),
            }]
        );
    }

    #[test]
    fn narrow_pill_is_a_single_circle() {
        let cmds = commands(|c| {
            draw_pill(c, Pt::ZERO, Pt::ZERO, Pt::from_i32(4), Pt::from_i32(8), Color::BLACK)
        });
        assert_eq!(count(&cmds, |c| matches!(c, Command::Fill)), 1);
        assert_eq!(count(&cmds, |c| matches!(c, Command::DrawRect { .. })), 0);
        // Rightmost point of the circle is the pill's width.
        assert!(cmds.contains(&Command::MoveTo {
            x: Pt::from_i32(4),
            y: Pt::from_i32(4),
        }));
    }

    #[test]
    fn zero_width_pill_draws_nothing() {
        let cmds = commands(|c| {
            draw_pill(c, Pt::ZERO, Pt::ZERO, Pt::ZERO, Pt::from_i32(8), Color::BLACK)
        });
        assert!(cmds.is_empty());
    }

    #[test]
    fn text_sets_font_then_draws() {
        let cmds = commands(|c| {
            draw_text(
                c,
                "4/5",
                Pt::from_i32(10),
                Pt::from_i32(20),
                FontWeight::Bold,
                Pt::from_i32(12),
                Color::BLACK,
            )
        });
        assert_eq!(
            cmds,
            vec![
                Command::SetFont {
                    weight: FontWeight::Bold,
                    size: Pt::from_i32(12),
                },
                Command::DrawString {
                    x: Pt::from_i32(10),
                    y: Pt::from_i32(20),
                    text: "4/5".to_string(),
                },
            ]
        );
    }
}
