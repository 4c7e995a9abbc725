use crate::error::ReportError;
use crate::types::{Pt, Size};
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId};

// Page attributes a page may inherit from its ancestors in the page tree.
pub(crate) const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

// Guards against cyclic /Parent chains in hostile input.
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    pub page_sizes: Vec<Size>,
}

/// Parses `bytes` as the `index`-th input of a multi-document operation.
pub(crate) fn load_source(bytes: &[u8], index: usize) -> Result<LoDocument, ReportError> {
    let doc = LoDocument::load_mem(bytes).map_err(|err| ReportError::MalformedSourceDocument {
        index,
        message: err.to_string(),
    })?;
    if doc.is_encrypted() {
        return Err(ReportError::MalformedSourceDocument {
            index,
            message: "encrypted documents are not supported".to_string(),
        });
    }
    Ok(doc)
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, ReportError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| ReportError::MalformedSourceDocument {
        index: 0,
        message: err.to_string(),
    })?;
    let page_sizes = pdf
        .get_pages()
        .values()
        .map(|id| page_size(&pdf, *id))
        .collect::<Vec<_>>();

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: page_sizes.len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
        page_sizes,
    })
}

/// Looks `key` up on the page and then on each ancestor `/Pages` node.
pub(crate) fn inherited_attribute(
    doc: &LoDocument,
    page_id: LoObjectId,
    key: &[u8],
) -> Option<LoObject> {
    let mut node_id = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_object(node_id).and_then(LoObject::as_dict).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        node_id = node.get(b"Parent").and_then(LoObject::as_reference).ok()?;
    }
    None
}

/// Visible region of a page in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageBox {
    pub(crate) x: Pt,
    pub(crate) y: Pt,
    pub(crate) size: Size,
}

/// Effective media box size of a page; US letter when the tree has none.
pub(crate) fn page_size(doc: &LoDocument, page_id: LoObjectId) -> Size {
    page_rect(doc, page_id, b"MediaBox")
        .map(|rect| rect.size)
        .unwrap_or_else(Size::letter)
}

/// CropBox clipped to the MediaBox, falling back to the MediaBox alone and
/// then to a US letter page at the origin.
pub(crate) fn page_box(doc: &LoDocument, page_id: LoObjectId) -> PageBox {
    let media = page_rect(doc, page_id, b"MediaBox");
    let crop = page_rect(doc, page_id, b"CropBox");
    match (crop, media) {
        (Some(crop), Some(media)) => intersect(crop, media).unwrap_or(media),
        (Some(rect), None) | (None, Some(rect)) => rect,
        (None, None) => PageBox {
            x: Pt::ZERO,
            y: Pt::ZERO,
            size: Size::letter(),
        },
    }
}

fn page_rect(doc: &LoDocument, page_id: LoObjectId, key: &[u8]) -> Option<PageBox> {
    let rect = match inherited_attribute(doc, page_id, key)? {
        LoObject::Reference(id) => doc.get_object(id).ok()?.clone(),
        other => other,
    };
    let numbers: Vec<f32> = rect
        .as_array()
        .ok()?
        .iter()
        .filter_map(|v| number(doc, v))
        .collect();
    let &[x0, y0, x1, y1] = numbers.as_slice() else {
        return None;
    };
    Some(PageBox {
        x: Pt::from_f32(x0.min(x1)),
        y: Pt::from_f32(y0.min(y1)),
        size: Size {
            width: Pt::from_f32((x1 - x0).abs()),
            height: Pt::from_f32((y1 - y0).abs()),
        },
    })
}

fn intersect(a: PageBox, b: PageBox) -> Option<PageBox> {
    let x = a.x.max(b.x);
    let y = a.y.max(b.y);
    let right = (a.x + a.size.width).min(b.x + b.size.width);
    let top = (a.y + a.size.height).min(b.y + b.size.height);
    if right <= x || top <= y {
        return None;
    }
    Some(PageBox {
        x,
        y,
        size: Size {
            width: right - x,
            height: top - y,
        },
    })
}

fn number(doc: &LoDocument, value: &LoObject) -> Option<f32> {
    match value {
        LoObject::Integer(v) => Some(*v as f32),
        LoObject::Real(v) => Some(*v),
        LoObject::Reference(id) => doc.get_object(*id).ok().and_then(|v| match v {
            LoObject::Integer(v) => Some(*v as f32),
            LoObject::Real(v) => Some(*v),
            _ => None,
        }),
        _ => None,
    }
}
