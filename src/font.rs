use crate::error::ReportError;
use crate::types::Pt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Regular,
    Bold,
}

impl FontWeight {
    pub(crate) fn resource_name(self) -> &'static str {
        match self {
            FontWeight::Regular => "F1",
            FontWeight::Bold => "F2",
        }
    }
}

/// The two faces a report is set in. Measurement is a pure function of the
/// face tables, so a `FontSet` can be shared freely across threads.
#[derive(Debug)]
pub struct FontSet {
    regular: FontFace,
    bold: FontFace,
}

#[derive(Debug)]
pub(crate) struct FontFace {
    pub(crate) program: FontProgram,
    pub(crate) metrics: FontMetrics,
}

#[derive(Debug)]
pub(crate) enum FontProgram {
    Standard { base_font: &'static str },
    Embedded {
        name: String,
        data: Vec<u8>,
        kind: FontProgramKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) first_char: u8,
    pub(crate) last_char: u8,
    pub(crate) widths: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) stem_v: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
}

impl FontSet {
    /// Helvetica and Helvetica-Bold. These are PDF standard fonts, so nothing
    /// is embedded and font setup cannot fail.
    pub fn standard() -> Self {
        Self {
            regular: FontFace {
                program: FontProgram::Standard {
                    base_font: "Helvetica",
                },
                metrics: FontMetrics::standard(&HELVETICA_WIDTHS, 718, -207, (-166, -225, 1000, 931)),
            },
            bold: FontFace {
                program: FontProgram::Standard {
                    base_font: "Helvetica-Bold",
                },
                metrics: FontMetrics::standard(
                    &HELVETICA_BOLD_WIDTHS,
                    718,
                    -207,
                    (-170, -228, 1003, 962),
                ),
            },
        }
    }

    pub fn from_truetype(regular: Vec<u8>, bold: Vec<u8>) -> Result<Self, ReportError> {
        Ok(Self {
            regular: FontFace::embedded(regular, "regular")?,
            bold: FontFace::embedded(bold, "bold")?,
        })
    }

    pub fn from_files(
        regular: impl AsRef<Path>,
        bold: impl AsRef<Path>,
    ) -> Result<Self, ReportError> {
        let read = |path: &Path| {
            fs::read(path).map_err(|err| {
                ReportError::FontEmbedding(format!("cannot read {}: {err}", path.display()))
            })
        };
        Self::from_truetype(read(regular.as_ref())?, read(bold.as_ref())?)
    }

    pub(crate) fn face(&self, weight: FontWeight) -> &FontFace {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }

    pub fn measure(&self, weight: FontWeight, font_size: Pt, text: &str) -> Pt {
        self.face(weight).metrics.measure_text_width(font_size, text)
    }

    pub fn ascent(&self, weight: FontWeight, font_size: Pt) -> Pt {
        let ascent = self.face(weight).metrics.ascent as i32;
        font_size.mul_ratio(ascent.max(0), 1000)
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.regular.program, FontProgram::Embedded { .. })
    }
}

impl FontFace {
    fn embedded(data: Vec<u8>, role: &str) -> Result<Self, ReportError> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|err| {
            ReportError::FontEmbedding(format!("invalid {role} font data: {err}"))
        })?;
        if face.tables().cmap.is_none() {
            return Err(ReportError::FontEmbedding(format!(
                "{role} font has no cmap table"
            )));
        }
        let name = postscript_name(&face).unwrap_or_else(|| format!("Scorecard-{role}"));
        let (metrics, kind) = FontMetrics::from_face(&face);
        Ok(Self {
            program: FontProgram::Embedded { name, data, kind },
            metrics,
        })
    }
}

impl FontMetrics {
    fn standard(ascii: &[u16; 95], ascent: i16, descent: i16, bbox: (i16, i16, i16, i16)) -> Self {
        // Only printable ASCII has AFM widths here; the rest of WinAnsi measures as the average glyph.
        let mut widths = ascii.to_vec();
        widths.resize((255 - 32 + 1) as usize, 556);
        Self {
            first_char: 32,
            last_char: 255,
            widths,
            ascent,
            descent,
            cap_height: ascent,
            italic_angle: 0,
            stem_v: 80,
            bbox,
            missing_width: 556,
            is_fixed_pitch: false,
        }
    }

    fn from_face(face: &ttf_parser::Face<'_>) -> (Self, FontProgramKind) {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let first_char = 32u8;
        let last_char = 255u8;
        let widths = build_widths(face, scale, first_char, last_char);
        let missing_width = widths
            .get((b' ' - first_char) as usize)
            .copied()
            .unwrap_or(0);

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);
        let kind = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };

        (
            Self {
                first_char,
                last_char,
                widths,
                ascent,
                descent,
                cap_height,
                italic_angle,
                stem_v: 80,
                bbox,
                missing_width,
                is_fixed_pitch: face.is_monospaced(),
            },
            kind,
        )
    }

    fn advance_for_char(&self, ch: char) -> u16 {
        let Some(code) = winansi_byte(ch) else {
            return self.missing_width;
        };
        if code < self.first_char || code > self.last_char {
            return self.missing_width;
        }
        let idx = (code - self.first_char) as usize;
        self.widths.get(idx).copied().unwrap_or(self.missing_width)
    }

    fn measure_text_width(&self, font_size: Pt, text: &str) -> Pt {
        let total_units: i32 = text
            .chars()
            .map(|ch| match ascii_fallback(ch) {
                Some(stand_in) => stand_in
                    .chars()
                    .map(|c| self.advance_for_char(c) as i32)
                    .sum::<i32>(),
                None => self.advance_for_char(ch) as i32,
            })
            .fold(0i32, |acc, adv| acc.saturating_add(adv));
        if total_units <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(total_units, 1000)
    }
}

fn build_widths(face: &ttf_parser::Face<'_>, scale: f32, first: u8, last: u8) -> Vec<u16> {
    let mut widths = Vec::with_capacity((last - first) as usize + 1);
    for code in first..=last {
        let width = winansi_char(code)
            .and_then(|ch| face.glyph_index(ch))
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(0);
        let scaled = (width as f32 * scale).round() as i32;
        widths.push(scaled.clamp(0, u16::MAX as i32) as u16);
    }
    widths
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;

    let mut full = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::POST_SCRIPT_NAME => return Some(sanitize_font_name(&name)),
            name_id::FULL_NAME if full.is_none() => full = Some(name),
            _ => {}
        }
    }
    full.map(|name| sanitize_font_name(&name))
}

pub(crate) fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}

/// ASCII stand-in written for a symbol WinAnsi has no byte for.
pub(crate) fn ascii_fallback(ch: char) -> Option<&'static str> {
    match ch {
        '\u{2265}' => Some(">="),
        '\u{2264}' => Some("<="),
        _ => None,
    }
}

/// Code point to WinAnsi (cp1252) byte, the encoding every face is written with.
pub(crate) fn winansi_byte(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{0000}'..='\u{007F}' => ch as u8,
        '\u{00A0}'..='\u{00FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

fn winansi_char(code: u8) -> Option<char> {
    if !(0x80..=0x9F).contains(&code) {
        return char::from_u32(code as u32);
    }
    let ch = match code {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => return None,
    };
    Some(ch)
}

// Advance widths for 0x20..=0x7E from the Adobe core font AFM files.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A minimal TrueType program with 1000 units per em: glyph 1 is the
    /// space (250 units) and glyph 2 covers the rest of printable ASCII.
    pub(crate) fn tiny_truetype(letter_advance: u16) -> Vec<u8> {
        fn be16(out: &mut Vec<u8>, value: u16) {
            out.extend_from_slice(&value.to_be_bytes());
        }
        fn be32(out: &mut Vec<u8>, value: u32) {
            out.extend_from_slice(&value.to_be_bytes());
        }

        let mut head = Vec::new();
        be32(&mut head, 0x0001_0000);
        be32(&mut head, 0x0001_0000);
        be32(&mut head, 0);
        be32(&mut head, 0x5F0F_3CF5);
        be16(&mut head, 0);
        be16(&mut head, 1000);
        head.extend_from_slice(&[0; 16]);
        for value in [0i16, -200, 1000, 800] {
            head.extend_from_slice(&value.to_be_bytes());
        }
        for value in [0u16, 8, 2, 0, 0] {
            be16(&mut head, value);
        }
        assert_eq!(head.len(), 54);

        let mut hhea = Vec::new();
        be32(&mut hhea, 0x0001_0000);
        for value in [800i16, -200, 0] {
            hhea.extend_from_slice(&value.to_be_bytes());
        }
        be16(&mut hhea, letter_advance.max(500));
        hhea.extend_from_slice(&[0; 6]);
        be16(&mut hhea, 1);
        hhea.extend_from_slice(&[0; 14]);
        be16(&mut hhea, 3);
        assert_eq!(hhea.len(), 36);

        let mut maxp = Vec::new();
        be32(&mut maxp, 0x0000_5000);
        be16(&mut maxp, 3);

        let mut hmtx = Vec::new();
        for advance in [500, 250, letter_advance] {
            be16(&mut hmtx, advance);
            be16(&mut hmtx, 0);
        }

        // Windows Unicode BMP, format 6 over 32..=126.
        let mut cmap = Vec::new();
        for value in [0u16, 1, 3, 1] {
            be16(&mut cmap, value);
        }
        be32(&mut cmap, 12);
        for value in [6u16, 10 + 2 * 95, 0, 32, 95] {
            be16(&mut cmap, value);
        }
        for code in 32u16..=126 {
            be16(&mut cmap, if code == 32 { 1 } else { 2 });
        }

        let tables: [(&[u8; 4], Vec<u8>); 5] = [
            (b"cmap", cmap),
            (b"head", head),
            (b"hhea", hhea),
            (b"hmtx", hmtx),
            (b"maxp", maxp),
        ];
        let directory_len = 12 + 16 * tables.len();
        let mut out = Vec::new();
        be32(&mut out, 0x0001_0000);
        for value in [tables.len() as u16, 64, 2, 16] {
            be16(&mut out, value);
        }
        let mut body = Vec::new();
        for (tag, data) in &tables {
            out.extend_from_slice(*tag);
            be32(&mut out, 0);
            be32(&mut out, (directory_len + body.len()) as u32);
            be32(&mut out, data.len() as u32);
            body.extend_from_slice(data);
            while body.len() % 4 != 0 {
                body.push(0);
            }
        }
        out.extend_from_slice(&body);
        out
    }

    pub(crate) fn tiny_font_set() -> FontSet {
        FontSet::from_truetype(tiny_truetype(600), tiny_truetype(700)).unwrap()
    }

    #[test]
    fn embedded_faces_measure_with_their_own_metrics() {
        let fonts = tiny_font_set();
        assert!(fonts.is_embedded());
        let size = Pt::from_i32(10);
        // 600 + 250 + 600 units.
        assert_eq!(fonts.measure(FontWeight::Regular, size, "a b"), Pt::from_f32(14.5));
        assert_eq!(fonts.measure(FontWeight::Bold, size, "ab"), Pt::from_i32(14));
        assert_eq!(fonts.ascent(FontWeight::Regular, size), Pt::from_i32(8));
    }

    #[test]
    fn embedded_metrics_cover_the_winansi_range() {
        let fonts = tiny_font_set();
        let face = fonts.face(FontWeight::Regular);
        let metrics = &face.metrics;
        assert_eq!((metrics.first_char, metrics.last_char), (32, 255));
        assert_eq!(metrics.widths.len(), 224);
        assert_eq!(metrics.widths[0], 250);
        assert_eq!(metrics.widths[(b'A' - 32) as usize], 600);
        assert_eq!(metrics.missing_width, 250);
        assert_eq!((metrics.ascent, metrics.descent), (800, -200));
        assert_eq!(metrics.bbox, (0, -200, 1000, 800));
        match &face.program {
            FontProgram::Embedded { name, data, kind } => {
                // No name table, so the role names the face.
                assert_eq!(name, "Scorecard-regular");
                assert_eq!(data, &tiny_truetype(600));
                assert_eq!(*kind, FontProgramKind::TrueType);
            }
            FontProgram::Standard { .. } => panic!("expected an embedded program"),
        }
    }

    #[test]
    fn font_files_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let regular = dir.path().join("regular.ttf");
        let bold = dir.path().join("bold.ttf");
        std::fs::write(&regular, tiny_truetype(600)).unwrap();
        std::fs::write(&bold, tiny_truetype(700)).unwrap();
        let fonts = FontSet::from_files(&regular, &bold).unwrap();
        assert_eq!(
            fonts.measure(FontWeight::Bold, Pt::from_i32(10), "A"),
            Pt::from_i32(7)
        );

        let err = FontSet::from_files(dir.path().join("missing.ttf"), &bold).unwrap_err();
        assert!(matches!(err, ReportError::FontEmbedding(_)));
    }

    #[test]
    fn standard_widths_match_afm() {
        let fonts = FontSet::standard();
        let size = Pt::from_i32(10);
        // "Hi": H=722, i=222 -> 9.44pt at 10pt.
        let width = fonts.measure(FontWeight::Regular, size, "Hi");
        assert!((width.to_f32() - 9.44).abs() < 0.001);
        // Bold i is wider than regular i.
        let bold = fonts.measure(FontWeight::Bold, size, "Hi");
        assert!(bold > width);
    }

    #[test]
    fn ascent_scales_with_size() {
        let fonts = FontSet::standard();
        // Helvetica ascender is 718 units.
        assert_eq!(
            fonts.ascent(FontWeight::Regular, Pt::from_i32(10)),
            Pt::from_f32(7.18)
        );
        assert!(!fonts.is_embedded());
    }

    #[test]
    fn empty_text_measures_zero() {
        let fonts = FontSet::standard();
        assert_eq!(
            fonts.measure(FontWeight::Regular, Pt::from_i32(12), ""),
            Pt::ZERO
        );
    }

    #[test]
    fn unmapped_characters_use_missing_width() {
        let fonts = FontSet::standard();
        let size = Pt::from_i32(10);
        let cjk = fonts.measure(FontWeight::Regular, size, "\u{4E2D}");
        assert!((cjk.to_f32() - 5.56).abs() < 0.001);
    }

    #[test]
    fn comparison_symbols_measure_as_their_stand_ins() {
        let fonts = FontSet::standard();
        let size = Pt::from_i32(10);
        assert_eq!(
            fonts.measure(FontWeight::Regular, size, "score \u{2265} 4"),
            fonts.measure(FontWeight::Regular, size, "score >= 4")
        );
        assert_eq!(
            fonts.measure(FontWeight::Bold, size, "\u{2264}"),
            fonts.measure(FontWeight::Bold, size, "<=")
        );
    }

    #[test]
    fn invalid_truetype_is_a_font_embedding_failure() {
        let err = FontSet::from_truetype(vec![0, 1, 2, 3], vec![0, 1, 2, 3])
            .expect_err("garbage font bytes must be rejected");
        assert!(matches!(err, ReportError::FontEmbedding(_)));
    }

    #[test]
    fn winansi_round_trips_cp1252_specials() {
        for code in 0x20u8..=0xFF {
            if let Some(ch) = winansi_char(code) {
                assert_eq!(winansi_byte(ch), Some(code), "code {code:#x}");
            }
        }
        assert_eq!(winansi_byte('\u{2014}'), Some(0x97));
        assert_eq!(winansi_byte('\u{4E2D}'), None);
    }

    #[test]
    fn sanitize_strips_pdf_name_delimiters() {
        assert_eq!(sanitize_font_name("Open Sans (Bold)"), "OpenSansBold");
        assert_eq!(sanitize_font_name("///"), "EmbeddedFont");
    }
}
