use crate::canvas::{Command, Document, Page};
use crate::error::ReportError;
use crate::font::{
    FontFace, FontProgram, FontProgramKind, FontSet, FontWeight, ascii_fallback, sanitize_font_name,
    winansi_byte,
};
use crate::types::{Color, Pt};
use fixed::types::I32F32;
use image::GenericImageView;
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream, dictionary};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    Dct,
    Flate,
}

impl ImageFilter {
    fn name(self) -> &'static str {
        match self {
            ImageFilter::Dct => "DCTDecode",
            ImageFilter::Flate => "FlateDecode",
        }
    }
}

/// Image samples ready to be written as an XObject. JPEG input passes through
/// untouched; everything else is stored as Flate-compressed RGB with an
/// optional Flate-compressed alpha mask.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub color_space: &'static str,
    pub bits_per_component: u8,
    pub filter: ImageFilter,
    pub data: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

pub(crate) fn decode_image_bytes(data: &[u8], mime: Option<&str>) -> Result<ImageData, ReportError> {
    let format = match mime {
        Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
        Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
            Some(image::ImageFormat::Jpeg)
        }
        _ => image::guess_format(data).ok(),
    };

    let decoded = image::load_from_memory(data)
        .map_err(|err| ReportError::WatermarkDecode(err.to_string()))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(ReportError::WatermarkDecode("image has no pixels".to_string()));
    }

    if matches!(format, Some(image::ImageFormat::Jpeg)) {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "DeviceGray",
            _ => "DeviceRGB",
        };
        return Ok(ImageData {
            width,
            height,
            color_space,
            bits_per_component: 8,
            filter: ImageFilter::Dct,
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    let mut alpha = Vec::with_capacity(width as usize * height as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    Ok(ImageData {
        width,
        height,
        color_space: "DeviceRGB",
        bits_per_component: 8,
        filter: ImageFilter::Flate,
        data: flate_compress(&rgb)?,
        alpha: if has_alpha {
            Some(flate_compress(&alpha)?)
        } else {
            None
        },
    })
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>, ReportError> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub(crate) fn lopdf_err(err: lopdf::Error) -> ReportError {
    ReportError::Serialize(err.to_string())
}

/// Adds the image (and its soft mask) to `doc`, returning the XObject id.
pub(crate) fn add_image_objects(doc: &mut LoDocument, image: &ImageData) -> LoObjectId {
    let smask_id = image.alpha.as_ref().map(|alpha| {
        doc.add_object(
            LoStream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => image.bits_per_component as i64,
                    "Filter" => ImageFilter::Flate.name(),
                },
                alpha.clone(),
            )
            .with_compression(false),
        )
    });
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => image.color_space,
        "BitsPerComponent" => image.bits_per_component as i64,
        "Filter" => image.filter.name(),
    };
    if let Some(id) = smask_id {
        dict.set("SMask", id);
    }
    doc.add_object(LoStream::new(dict, image.data.clone()).with_compression(false))
}

pub(crate) fn add_opacity_state(doc: &mut LoDocument, fill: f32, stroke: f32) -> LoObjectId {
    doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => fill,
        "CA" => stroke,
    })
}

fn add_font_objects(doc: &mut LoDocument, face: &FontFace) -> LoObjectId {
    let metrics = &face.metrics;
    match &face.program {
        FontProgram::Standard { base_font } => doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => *base_font,
            "Encoding" => "WinAnsiEncoding",
        }),
        FontProgram::Embedded { name, data, kind } => {
            let base = sanitize_font_name(name);
            let mut file_dict = dictionary! { "Length1" => data.len() as i64 };
            if matches!(kind, FontProgramKind::OpenTypeCff) {
                file_dict.set("Subtype", "OpenType");
            }
            let file_id = doc.add_object(LoStream::new(file_dict, data.clone()));
            let file_key = match kind {
                FontProgramKind::OpenTypeCff => "FontFile3",
                FontProgramKind::TrueType => "FontFile2",
            };
            let mut flags = 32;
            if metrics.is_fixed_pitch {
                flags |= 1;
            }
            let bbox: Vec<LoObject> = vec![
                (metrics.bbox.0 as i64).into(),
                (metrics.bbox.1 as i64).into(),
                (metrics.bbox.2 as i64).into(),
                (metrics.bbox.3 as i64).into(),
            ];
            let mut descriptor = dictionary! {
                "Type" => "FontDescriptor",
                "FontName" => base.as_str(),
                "Flags" => flags as i64,
                "FontBBox" => bbox,
                "ItalicAngle" => metrics.italic_angle as i64,
                "Ascent" => metrics.ascent as i64,
                "Descent" => metrics.descent as i64,
                "CapHeight" => metrics.cap_height as i64,
                "StemV" => metrics.stem_v as i64,
                "MissingWidth" => metrics.missing_width as i64,
            };
            descriptor.set(file_key, file_id);
            let descriptor_id = doc.add_object(descriptor);
            let subtype = match kind {
                FontProgramKind::OpenTypeCff => "Type1",
                FontProgramKind::TrueType => "TrueType",
            };
            let widths: Vec<LoObject> = metrics.widths.iter().map(|w| (*w as i64).into()).collect();
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => subtype,
                "BaseFont" => base.as_str(),
                "FirstChar" => metrics.first_char as i64,
                "LastChar" => metrics.last_char as i64,
                "Widths" => widths,
                "FontDescriptor" => descriptor_id,
                "Encoding" => "WinAnsiEncoding",
            })
        }
    }
}

/// Serializes a recorded document. Output depends only on the input, so the
/// same document always produces the same bytes.
pub fn document_to_pdf(document: &Document, fonts: &FontSet) -> Result<Vec<u8>, ReportError> {
    let mut pdf = LoDocument::with_version("1.7");
    let pages_id = pdf.new_object_id();

    let regular_id = add_font_objects(&mut pdf, fonts.face(FontWeight::Regular));
    let bold_id = add_font_objects(&mut pdf, fonts.face(FontWeight::Bold));
    let mut resources = dictionary! {
        "Font" => dictionary! {
            FontWeight::Regular.resource_name() => regular_id,
            FontWeight::Bold.resource_name() => bold_id,
        },
    };

    let mut image_names: HashMap<&str, String> = HashMap::new();
    let mut xobjects = lopdf::Dictionary::new();
    for (idx, (resource_id, image)) in document.images.iter().enumerate() {
        let name = format!("Im{}", idx + 1);
        let id = add_image_objects(&mut pdf, image);
        xobjects.set(name.as_bytes().to_vec(), id);
        image_names.insert(resource_id.as_str(), name);
    }
    if !xobjects.is_empty() {
        resources.set("XObject", xobjects);
    }

    let mut gs_names: HashMap<(u16, u16), String> = HashMap::new();
    let mut states = lopdf::Dictionary::new();
    for (idx, (fill, stroke)) in collect_opacity_pairs(document).into_iter().enumerate() {
        let name = format!("GS{}", idx + 1);
        let id = add_opacity_state(&mut pdf, fill as f32 / 1000.0, stroke as f32 / 1000.0);
        states.set(name.as_bytes().to_vec(), id);
        gs_names.insert((fill, stroke), name);
    }
    if !states.is_empty() {
        resources.set("ExtGState", states);
    }
    let resources_id = pdf.add_object(resources);

    let media_box: Vec<LoObject> = vec![
        0.into(),
        0.into(),
        document.page_size.width.to_f32().into(),
        document.page_size.height.to_f32().into(),
    ];
    let mut kids: Vec<LoObject> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = render_page(page, &image_names, &gs_names);
        let content_id = pdf.add_object(LoStream::new(dictionary! {}, content.into_bytes()));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.clone(),
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.compress();

    let mut out = Vec::new();
    pdf.save_to(&mut out)?;
    Ok(out)
}

fn opacity_key(fill: f32, stroke: f32) -> (u16, u16) {
    let f = ((fill * 1000.0).round() as i32).clamp(0, 1000) as u16;
    let s = ((stroke * 1000.0).round() as i32).clamp(0, 1000) as u16;
    (f, s)
}

fn collect_opacity_pairs(document: &Document) -> BTreeSet<(u16, u16)> {
    let mut pairs = BTreeSet::new();
    for page in &document.pages {
        for cmd in &page.commands {
            if let Command::SetOpacity { fill, stroke } = cmd {
                pairs.insert(opacity_key(*fill, *stroke));
            }
        }
    }
    pairs
}

fn render_page(
    page: &Page,
    image_names: &HashMap<&str, String>,
    gs_names: &HashMap<(u16, u16), String>,
) -> String {
    let mut out = String::new();
    let mut font = (FontWeight::Regular, Pt::from_i32(12));

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => out.push_str(&color_to_pdf_fill(*color)),
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetOpacity { fill, stroke } => {
                if let Some(name) = gs_names.get(&opacity_key(*fill, *stroke)) {
                    out.push_str(&format!("/{} gs\n", name));
                }
            }
            Command::SetFont { weight, size } => font = (*weight, *size),
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(*y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(*y)));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} {} {} c\n",
                    fmt_pt(*x1),
                    fmt_pt(*y1),
                    fmt_pt(*x2),
                    fmt_pt(*y2),
                    fmt_pt(*x),
                    fmt_pt(*y),
                ));
            }
            Command::ClosePath => out.push_str("h\n"),
            Command::Fill => out.push_str("f\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawString { x, y, text } => {
                out.push_str("BT\n");
                out.push_str(&format!(
                    "/{} {} Tf\n",
                    font.0.resource_name(),
                    fmt_pt(font.1)
                ));
                out.push_str(&format!("{} {} Td\n", fmt_pt(*x), fmt_pt(*y)));
                out.push_str(&format!("({}) Tj\n", encode_winansi_pdf_string(text)));
                out.push_str("ET\n");
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nf\n",
                    fmt_pt(*x),
                    fmt_pt(*y),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                if let Some(name) = image_names.get(resource_id.as_str()) {
                    out.push_str(&image_draw_ops(name, *x, *y, *width, *height));
                }
            }
        }
    }

    out
}

/// `q w 0 0 h x y cm /Name Do Q`, shared with the stamping path.
pub(crate) fn image_draw_ops(name: &str, x: Pt, y: Pt, width: Pt, height: Pt) -> String {
    format!(
        "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
        fmt_pt(width),
        fmt_pt(height),
        fmt_pt(x),
        fmt_pt(y),
        name
    )
}

fn encode_winansi_pdf_string(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        if let Some(stand_in) = ascii_fallback(ch) {
            out.push_str(stand_in);
            continue;
        }
        match winansi_byte(ch).unwrap_or(b'?') {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    out
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

pub(crate) fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

pub(crate) fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn color_to_pdf_fill(color: Color) -> String {
    format!("{} {} {} rg\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!("{} {} {} RG\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

/// Page object ids in page order.
pub(crate) fn page_ids_in_order(doc: &LoDocument) -> Vec<LoObjectId> {
    doc.get_pages().values().copied().collect()
}
