use crate::font::{FontSet, FontWeight};
use crate::types::Pt;

/// Greedy word wrap against real font metrics.
///
/// Paragraphs are separated by `\n`; each one yields at least one line, so
/// blank lines in the input survive as empty lines. Words are never split: a
/// word wider than `max_width` sits alone on its own line.
pub fn wrap_text(
    fonts: &FontSet,
    weight: FontWeight,
    font_size: Pt,
    max_width: Pt,
    text: &str,
) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.strip_suffix('\r').unwrap_or(paragraph);
        wrap_paragraph(fonts, weight, font_size, max_width, paragraph, &mut lines);
    }
    lines
}

fn wrap_paragraph(
    fonts: &FontSet,
    weight: FontWeight,
    font_size: Pt,
    max_width: Pt,
    paragraph: &str,
    out: &mut Vec<String>,
) {
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let start = current.len();
        current.push(' ');
        current.push_str(word);
        if fonts.measure(weight, font_size, &current) > max_width {
            current.truncate(start);
            out.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    out.push(current);
}

/// Joins wrapped lines back into paragraph text.
pub fn unwrap_lines(lines: &[String]) -> String {
    lines.join("\n")
}
