use crate::canvas::Canvas;
use crate::error::ReportError;
use crate::pdf::{
    ImageData, add_image_objects, add_opacity_state, decode_image_bytes, image_draw_ops,
    page_ids_in_order,
};
use crate::pdfinspect::{inherited_attribute, load_source, page_box};
use crate::types::{Pt, Size};
use base64::Engine;
use lopdf::{Dictionary as LoDictionary, Document as LoDocument, Object as LoObject, Stream as LoStream, dictionary};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Fraction of the image's native size drawn on the page.
pub const WATERMARK_SCALE: f32 = 0.08;
/// Distance from the top and right page edges.
pub const WATERMARK_INSET: i32 = 40;
pub const WATERMARK_OPACITY: f32 = 0.5;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) const WATERMARK_RESOURCE_ID: &str = "watermark";

const STAMP_IMAGE_NAME: &str = "ScWm";
const STAMP_STATE_NAME: &str = "ScWmGs";

/// A decoded watermark. Built once by the prepare phase and then shared
/// read-only by every layout and stamping call.
#[derive(Debug, Clone)]
pub struct WatermarkImage {
    data: Arc<ImageData>,
}

impl WatermarkImage {
    pub fn from_bytes(bytes: &[u8], mime: Option<&str>) -> Result<Self, ReportError> {
        Ok(Self {
            data: Arc::new(decode_image_bytes(bytes, mime)?),
        })
    }

    pub fn width_px(&self) -> u32 {
        self.data.width
    }

    pub fn height_px(&self) -> u32 {
        self.data.height
    }

    /// Scaled size on the page, one point per native pixel before scaling.
    pub fn footprint(&self) -> Size {
        Size {
            width: Pt::from_f32(self.data.width as f32 * WATERMARK_SCALE),
            height: Pt::from_f32(self.data.height as f32 * WATERMARK_SCALE),
        }
    }

    pub(crate) fn data(&self) -> &Arc<ImageData> {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatermarkSource {
    Url(String),
    Path(PathBuf),
    DataUri(String),
    Bytes(Vec<u8>),
}

impl WatermarkSource {
    /// `data:` URIs, then `http(s)://` URLs; anything else is a file path.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("data:") {
            WatermarkSource::DataUri(trimmed.to_string())
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            WatermarkSource::Url(trimmed.to_string())
        } else {
            WatermarkSource::Path(PathBuf::from(trimmed))
        }
    }

    fn describe(&self) -> String {
        match self {
            WatermarkSource::Url(url) => url.clone(),
            WatermarkSource::Path(path) => path.display().to_string(),
            WatermarkSource::DataUri(_) => "data uri".to_string(),
            WatermarkSource::Bytes(bytes) => format!("{} in-memory bytes", bytes.len()),
        }
    }
}

/// Fetches and decodes the watermark. Expiry of `timeout` is a fetch failure.
pub async fn prepare_watermark(
    source: &WatermarkSource,
    timeout: Duration,
) -> Result<WatermarkImage, ReportError> {
    let (bytes, mime) = match tokio::time::timeout(timeout, fetch_bytes(source, timeout)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ReportError::WatermarkFetch(format!(
                "{} timed out after {} ms",
                source.describe(),
                timeout.as_millis()
            )));
        }
    };
    let image = WatermarkImage::from_bytes(&bytes, mime.as_deref())?;
    debug!(
        source = %source.describe(),
        width = image.width_px(),
        height = image.height_px(),
        "watermark prepared"
    );
    Ok(image)
}

/// Like [`prepare_watermark`], but any failure degrades to `None`.
pub async fn prepare_watermark_or_skip(
    source: &WatermarkSource,
    timeout: Duration,
) -> Option<WatermarkImage> {
    match prepare_watermark(source, timeout).await {
        Ok(image) => Some(image),
        Err(err) => {
            warn!(source = %source.describe(), error = %err, "continuing without watermark");
            None
        }
    }
}

async fn fetch_bytes(
    source: &WatermarkSource,
    timeout: Duration,
) -> Result<(Vec<u8>, Option<String>), ReportError> {
    match source {
        WatermarkSource::Url(url) => {
            let fetch_err = |err: reqwest::Error| ReportError::WatermarkFetch(err.to_string());
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(fetch_err)?;
            let response = client
                .get(url)
                .send()
                .await
                .map_err(fetch_err)?
                .error_for_status()
                .map_err(fetch_err)?;
            let mime = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let bytes = response.bytes().await.map_err(fetch_err)?;
            Ok((bytes.to_vec(), mime))
        }
        WatermarkSource::Path(path) => tokio::fs::read(path)
            .await
            .map(|bytes| (bytes, None))
            .map_err(|err| ReportError::WatermarkFetch(format!("{}: {}", path.display(), err))),
        WatermarkSource::DataUri(uri) => parse_data_uri(uri)
            .map(|(mime, bytes)| (bytes, Some(mime)))
            .ok_or_else(|| ReportError::WatermarkDecode("malformed data uri".to_string())),
        WatermarkSource::Bytes(bytes) => Ok((bytes.clone(), None)),
    }
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, data_part) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part.trim())
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

/// Per-source memo of prepared watermarks. Failures are not cached, so a
/// later call retries the fetch.
#[derive(Debug, Default)]
pub struct WatermarkCache {
    entries: tokio::sync::Mutex<HashMap<WatermarkSource, Arc<WatermarkImage>>>,
}

impl WatermarkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_prepare(
        &self,
        source: &WatermarkSource,
        timeout: Duration,
    ) -> Option<Arc<WatermarkImage>> {
        let mut entries = self.entries.lock().await;
        if let Some(image) = entries.get(source) {
            return Some(image.clone());
        }
        let image = Arc::new(prepare_watermark_or_skip(source, timeout).await?);
        entries.insert(source.clone(), image.clone());
        Some(image)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

/// Where the watermark lands on one page: top-right corner, inset on both edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkPlacement {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
    pub opacity: f32,
}

impl WatermarkPlacement {
    pub fn for_page(image: &WatermarkImage, page_size: Size) -> Self {
        let footprint = image.footprint();
        let inset = Pt::from_i32(WATERMARK_INSET);
        Self {
            x: page_size.width - footprint.width - inset,
            y: page_size.height - footprint.height - inset,
            width: footprint.width,
            height: footprint.height,
            opacity: WATERMARK_OPACITY,
        }
    }

    /// Moves the placement onto a page box that does not start at the origin.
    pub fn offset(self, dx: Pt, dy: Pt) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Draws on the canvas's current page. The image must already be registered
    /// under `resource_id`.
    pub(crate) fn draw(&self, canvas: &mut Canvas, resource_id: &str) {
        canvas.save_state();
        canvas.set_opacity(self.opacity, self.opacity);
        canvas.draw_image(self.x, self.y, self.width, self.height, resource_id);
        canvas.restore_state();
    }
}

/// Stamps every page of an existing PDF. The image and its graphics state are
/// written once; each page's original content is isolated in `q … Q` so a
/// leftover transform cannot move the stamp.
pub fn stamp_watermark(pdf_bytes: &[u8], image: &WatermarkImage) -> Result<Vec<u8>, ReportError> {
    let mut doc = load_source(pdf_bytes, 0)?;
    let page_ids = page_ids_in_order(&doc);

    let image_id = add_image_objects(&mut doc, image.data());
    let state_id = add_opacity_state(&mut doc, WATERMARK_OPACITY, WATERMARK_OPACITY);
    let save_id = doc.add_object(LoStream::new(dictionary! {}, b"q\n".to_vec()));

    for page_id in &page_ids {
        let visible = page_box(&doc, *page_id);
        let placement = WatermarkPlacement::for_page(image, visible.size).offset(visible.x, visible.y);

        let mut resources = resolve_dict(&doc, inherited_attribute(&doc, *page_id, b"Resources"));
        let mut xobjects = resolve_dict(&doc, resources.get(b"XObject").ok().cloned());
        let mut states = resolve_dict(&doc, resources.get(b"ExtGState").ok().cloned());
        let image_name = unique_name(&xobjects, STAMP_IMAGE_NAME);
        let state_name = unique_name(&states, STAMP_STATE_NAME);
        xobjects.set(image_name.as_bytes().to_vec(), image_id);
        states.set(state_name.as_bytes().to_vec(), state_id);
        resources.set("XObject", xobjects);
        resources.set("ExtGState", states);

        let stamp = format!(
            "\nQ\nq\n/{} gs\n{}Q\n",
            state_name,
            image_draw_ops(
                &image_name,
                placement.x,
                placement.y,
                placement.width,
                placement.height
            )
        );
        let stamp_id = doc.add_object(LoStream::new(dictionary! {}, stamp.into_bytes()));

        let mut contents: Vec<LoObject> = vec![save_id.into()];
        contents.extend(doc.get_page_contents(*page_id).into_iter().map(LoObject::from));
        contents.push(stamp_id.into());

        let page = doc
            .get_object_mut(*page_id)
            .and_then(LoObject::as_dict_mut)
            .map_err(|err| ReportError::MalformedSourceDocument {
                index: 0,
                message: err.to_string(),
            })?;
        page.set("Resources", resources);
        page.set("Contents", contents);
    }
    debug!(pages = page_ids.len(), "watermark stamped");

    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn resolve_dict(doc: &LoDocument, value: Option<LoObject>) -> LoDictionary {
    match value {
        Some(LoObject::Dictionary(dict)) => dict,
        Some(LoObject::Reference(id)) => doc
            .get_object(id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => LoDictionary::new(),
    }
}

fn unique_name(dict: &LoDictionary, base: &str) -> String {
    if !dict.has(base.as_bytes()) {
        return base.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{base}{n}");
        if !dict.has(candidate.as_bytes()) {
            return candidate;
        }
        n += 1;
    }
}
