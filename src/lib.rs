mod assembler;
mod blocks;
mod canvas;
mod config;
mod cursor;
mod debug;
mod error;
mod font;
mod merge;
mod metrics;
mod pdf;
mod pdfinspect;
mod record;
mod shapes;
mod style;
mod text;
mod types;
mod watermark;

pub use assembler::ReportAssembler;
pub use blocks::{BlockContext, LayoutBlock, band_color};
pub use canvas::{Canvas, Command, Document, Page};
pub use config::{EngineConfig, parse_page_size};
pub use cursor::{PageCursor, Reservation};
pub use debug::DebugLogger;
pub use error::ReportError;
pub use font::{FontSet, FontWeight};
pub use merge::{merge_documents, merge_lopdf};
pub use metrics::{PageMetrics, ReportMetrics};
pub use pdf::{ImageData, ImageFilter, document_to_pdf};
pub use pdfinspect::{PdfInspectReport, inspect_pdf_bytes};
pub use record::{
    AssessmentRecord, CriterionResult, MAX_SCORE, MIN_SCORE, ScorePolicy, Status, is_job_fit,
};
pub use shapes::{RectStyle, draw_circle, draw_pill, draw_rect, draw_text};
pub use style::{BadgeColors, Palette, Style};
pub use text::{unwrap_lines, wrap_text};
pub use types::{Color, Margins, Pt, Size};
pub use watermark::{
    DEFAULT_FETCH_TIMEOUT, WATERMARK_INSET, WATERMARK_OPACITY, WATERMARK_SCALE, WatermarkCache,
    WatermarkImage, WatermarkPlacement, WatermarkSource, prepare_watermark,
    prepare_watermark_or_skip, stamp_watermark,
};

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// How the report and the candidate's resume are handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// One PDF: the report pages followed by the resume pages.
    #[default]
    Merged,
    /// Two PDFs, returned side by side.
    Separate,
}

impl FromStr for DeliveryMode {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "merged" => Ok(DeliveryMode::Merged),
            "separate" => Ok(DeliveryMode::Separate),
            other => Err(ReportError::InvalidConfiguration(format!(
                "unknown delivery mode '{}' (expected merged or separate)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Merged(Vec<u8>),
    Separate {
        report: Vec<u8>,
        resume: Option<Vec<u8>>,
    },
}

/// Entry point tying layout, serialization, watermarking and merging
/// together. Cheap to clone; clones share the watermark cache.
#[derive(Clone)]
pub struct ReportEngine {
    style: Arc<Style>,
    fonts: Arc<FontSet>,
    score_policy: ScorePolicy,
    watermark: Option<WatermarkSource>,
    watermark_timeout: Duration,
    watermark_cache: Arc<WatermarkCache>,
    generated_on: Option<String>,
    debug: Option<DebugLogger>,
}

pub struct ReportEngineBuilder {
    page_size: Option<Size>,
    style: Style,
    fonts: Option<FontSet>,
    font_files: Option<(PathBuf, PathBuf)>,
    score_policy: ScorePolicy,
    watermark: Option<WatermarkSource>,
    watermark_timeout: Duration,
    generated_on: Option<String>,
    debug_path: Option<PathBuf>,
}

impl ReportEngine {
    pub fn builder() -> ReportEngineBuilder {
        ReportEngineBuilder::new()
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ReportError> {
        ReportEngineBuilder::from_config(config).build()
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    pub fn score_policy(&self) -> ScorePolicy {
        self.score_policy
    }

    pub fn watermark_source(&self) -> Option<&WatermarkSource> {
        self.watermark.as_ref()
    }

    pub fn assembler(&self) -> ReportAssembler {
        let mut assembler = ReportAssembler::new(self.style.clone(), self.fonts.clone())
            .with_score_policy(self.score_policy);
        if let Some(date) = &self.generated_on {
            assembler = assembler.with_generated_on(date.clone());
        }
        if let Some(debug) = &self.debug {
            assembler = assembler.with_debug(debug.clone());
        }
        assembler
    }

    /// Fetches and decodes the configured watermark once per source. Any
    /// failure is logged and yields `None`; rendering proceeds without it.
    pub async fn prepare_watermark(&self) -> Option<Arc<WatermarkImage>> {
        let source = self.watermark.as_ref()?;
        self.watermark_cache
            .get_or_prepare(source, self.watermark_timeout)
            .await
    }

    pub fn layout(
        &self,
        record: &AssessmentRecord,
        watermark: Option<&WatermarkImage>,
    ) -> Result<(Document, ReportMetrics), ReportError> {
        self.assembler().layout(record, watermark)
    }

    pub fn render_report(
        &self,
        record: &AssessmentRecord,
        watermark: Option<&WatermarkImage>,
    ) -> Result<Vec<u8>, ReportError> {
        let bytes = self.assembler().assemble(record, watermark)?;
        self.emit_debug_summary("render_report");
        Ok(bytes)
    }

    /// Same as [`render_report`](Self::render_report), stopping with
    /// `Cancelled` once `cancel` is set.
    pub fn render_report_cancellable(
        &self,
        record: &AssessmentRecord,
        watermark: Option<&WatermarkImage>,
        cancel: Arc<AtomicBool>,
    ) -> Result<Vec<u8>, ReportError> {
        self.assembler()
            .with_cancel_flag(cancel)
            .assemble(record, watermark)
    }

    /// Renders independent reports in parallel. Results are in input order
    /// and one failure does not affect the others.
    pub fn render_batch(
        &self,
        records: &[AssessmentRecord],
        watermark: Option<&WatermarkImage>,
    ) -> Vec<Result<Vec<u8>, ReportError>> {
        use rayon::prelude::*;

        let assembler = self.assembler();
        let results: Vec<Result<Vec<u8>, ReportError>> = records
            .par_iter()
            .map(|record| assembler.assemble(record, watermark))
            .collect();
        self.emit_debug_summary("render_batch");
        results
    }

    pub fn stamp(&self, pdf: &[u8], watermark: &WatermarkImage) -> Result<Vec<u8>, ReportError> {
        stamp_watermark(pdf, watermark)
    }

    pub fn merge(&self, documents: &[&[u8]]) -> Result<Vec<u8>, ReportError> {
        merge_documents(documents)
    }

    /// Full flow for one candidate: prepare the watermark, render the
    /// report, stamp the resume and hand both back per `mode`.
    pub async fn deliver(
        &self,
        record: &AssessmentRecord,
        resume: Option<&[u8]>,
        mode: DeliveryMode,
    ) -> Result<Delivery, ReportError> {
        let watermark = self.prepare_watermark().await;
        let report = self.assembler().assemble(record, watermark.as_deref())?;

        let resume = match (resume, watermark.as_deref()) {
            (Some(bytes), Some(image)) => Some(
                stamp_watermark(bytes, image).map_err(|err| resume_error(err, RESUME_INDEX))?,
            ),
            (Some(bytes), None) => Some(bytes.to_vec()),
            (None, _) => None,
        };

        let delivery = match (mode, resume) {
            (DeliveryMode::Merged, Some(resume)) => {
                Delivery::Merged(merge_documents(&[&report, &resume])?)
            }
            (DeliveryMode::Merged, None) => Delivery::Merged(report),
            (DeliveryMode::Separate, resume) => Delivery::Separate { report, resume },
        };
        tracing::info!(
            candidate = %record.candidate_name,
            watermarked = watermark.is_some(),
            mode = ?mode,
            "report delivered"
        );
        self.emit_debug_summary("deliver");
        Ok(delivery)
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = &self.debug {
            logger.emit_summary(context);
            logger.flush();
        }
    }
}

// Position of the resume among the delivered documents.
const RESUME_INDEX: usize = 1;

fn resume_error(err: ReportError, index: usize) -> ReportError {
    match err {
        ReportError::MalformedSourceDocument { message, .. } => {
            ReportError::MalformedSourceDocument { index, message }
        }
        other => other,
    }
}

impl Default for ReportEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEngineBuilder {
    pub fn new() -> Self {
        Self {
            page_size: None,
            style: Style::default(),
            fonts: None,
            font_files: None,
            score_policy: ScorePolicy::default(),
            watermark: None,
            watermark_timeout: DEFAULT_FETCH_TIMEOUT,
            generated_on: None,
            debug_path: None,
        }
    }

    /// Builder preloaded with environment settings; further calls override them.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut builder = Self::new()
            .page_size(config.page_size)
            .score_policy(config.score_policy)
            .watermark_timeout(config.watermark_timeout);
        if let Some(source) = &config.watermark {
            builder = builder.watermark(source.clone());
        }
        if let (Some(regular), Some(bold)) = (&config.font_regular, &config.font_bold) {
            builder = builder.font_files(regular, bold);
        }
        if let Some(path) = &config.debug_log {
            builder = builder.debug_log(path);
        }
        builder
    }

    /// Overrides the page size of whatever style is configured.
    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn fonts(mut self, fonts: FontSet) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// TrueType files to embed instead of the standard Helvetica pair.
    pub fn font_files(mut self, regular: impl Into<PathBuf>, bold: impl Into<PathBuf>) -> Self {
        self.font_files = Some((regular.into(), bold.into()));
        self
    }

    pub fn score_policy(mut self, policy: ScorePolicy) -> Self {
        self.score_policy = policy;
        self
    }

    pub fn watermark(mut self, source: WatermarkSource) -> Self {
        self.watermark = Some(source);
        self
    }

    pub fn watermark_timeout(mut self, timeout: Duration) -> Self {
        self.watermark_timeout = timeout;
        self
    }

    /// Fixes the "report generated" date instead of using today's.
    pub fn generated_on(mut self, date: impl Into<String>) -> Self {
        self.generated_on = Some(date.into());
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ReportEngine, ReportError> {
        if self.watermark_timeout.is_zero() {
            return Err(ReportError::InvalidConfiguration(
                "watermark timeout must be greater than zero".to_string(),
            ));
        }
        let mut style = self.style;
        if let Some(size) = self.page_size {
            style = style.with_page_size(size);
        }
        if style.page_capacity() <= Pt::ZERO || style.content_width() <= Pt::ZERO {
            return Err(ReportError::InvalidConfiguration(
                "margins leave no room for content".to_string(),
            ));
        }
        let fonts = match (self.fonts, self.font_files) {
            (Some(fonts), _) => fonts,
            (None, Some((regular, bold))) => FontSet::from_files(regular, bold)?,
            (None, None) => FontSet::standard(),
        };
        let debug = self.debug_path.map(DebugLogger::new).transpose()?;

        Ok(ReportEngine {
            style: Arc::new(style),
            fonts: Arc::new(fonts),
            score_policy: self.score_policy,
            watermark: self.watermark,
            watermark_timeout: self.watermark_timeout,
            watermark_cache: Arc::new(WatermarkCache::new()),
            generated_on: self.generated_on,
            debug,
        })
    }
}
