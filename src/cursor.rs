use crate::canvas::{Canvas, Document};
use crate::debug::DebugLogger;
use crate::metrics::{PageMetrics, ReportMetrics};
use crate::style::Style;
use crate::types::Pt;
use crate::watermark::{WATERMARK_RESOURCE_ID, WatermarkImage, WatermarkPlacement};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Fits,
    PageBreak,
}

/// Vertical write position for one assembly. Owns the canvas; the first page
/// exists from construction, and every later page is allocated by `reserve`.
pub struct PageCursor {
    style: Arc<Style>,
    canvas: Canvas,
    offset_y: Pt,
    // Nothing has been advanced on the current page yet.
    fresh_page: bool,
    watermark: Option<WatermarkPlacement>,
    debug: Option<DebugLogger>,
    block: Option<&'static str>,
    pages: Vec<PageMetrics>,
    page_breaks: usize,
    mid_block_breaks: usize,
}

impl PageCursor {
    pub fn new(style: Arc<Style>, watermark: Option<&WatermarkImage>) -> Self {
        let mut canvas = Canvas::new(style.page_size);
        let placement = watermark.map(|image| {
            canvas.register_image(WATERMARK_RESOURCE_ID, image.data().clone());
            WatermarkPlacement::for_page(image, style.page_size)
        });
        let offset_y = style.content_top();
        let mut cursor = Self {
            style,
            canvas,
            offset_y,
            fresh_page: true,
            watermark: placement,
            debug: None,
            block: None,
            pages: Vec::new(),
            page_breaks: 0,
            mid_block_breaks: 0,
        };
        cursor.open_page();
        cursor
    }

    pub fn with_debug(mut self, debug: Option<DebugLogger>) -> Self {
        self.debug = debug;
        self
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn offset_y(&self) -> Pt {
        self.offset_y
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_fresh_page(&self) -> bool {
        self.fresh_page
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    /// True when `space` does not fit above the bottom margin. A fresh page
    /// always accepts, so content taller than a page cannot break forever.
    pub fn would_break(&self, space: Pt) -> bool {
        !self.fresh_page && self.offset_y - space < self.style.content_bottom()
    }

    pub fn reserve(&mut self, space: Pt, reason: &str) -> Reservation {
        if !self.would_break(space) {
            return Reservation::Fits;
        }
        self.canvas.show_page();
        self.page_breaks += 1;
        if self.block.is_some() {
            self.mid_block_breaks += 1;
        }
        self.offset_y = self.style.content_top();
        self.fresh_page = true;
        self.open_page();

        let page = self.page_count();
        let block = self.block.unwrap_or("none");
        tracing::debug!(page, reason, block, "page break");
        if let Some(debug) = &self.debug {
            debug.log_page_break(page, reason, block);
        }
        Reservation::PageBreak
    }

    pub fn advance(&mut self, amount: Pt) {
        self.offset_y -= amount;
        self.fresh_page = false;
        if let Some(page) = self.pages.last_mut() {
            page.min_offset = Some(match page.min_offset {
                Some(current) => current.min(self.offset_y),
                None => self.offset_y,
            });
        }
    }

    /// Marks the start of a block; breaks until `end_block` count as mid-block.
    pub fn begin_block(&mut self, kind: &'static str, height: Pt) {
        self.block = Some(kind);
        self.canvas.meta("block", kind);
        if let Some(page) = self.pages.last_mut() {
            page.block_count += 1;
        }
        if let Some(debug) = &self.debug {
            debug.log_block(kind, height, self.page_count());
        }
    }

    pub fn end_block(&mut self) {
        self.block = None;
    }

    pub fn finish(self) -> (Document, ReportMetrics) {
        let document = self.canvas.finish();
        let mut pages = self.pages;
        for (metrics, page) in pages.iter_mut().zip(&document.pages) {
            metrics.command_count = page.commands.len();
        }
        let metrics = ReportMetrics {
            pages,
            page_breaks: self.page_breaks,
            mid_block_breaks: self.mid_block_breaks,
            layout_ms: 0.0,
        };
        (document, metrics)
    }

    fn open_page(&mut self) {
        self.pages.push(PageMetrics {
            page_number: self.pages.len() + 1,
            ..PageMetrics::default()
        });
        if let Some(placement) = self.watermark {
            placement.draw(&mut self.canvas, WATERMARK_RESOURCE_ID);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;

    fn style() -> Arc<Style> {
        Arc::new(Style::default())
    }

    fn png_watermark() -> WatermarkImage {
        let img = image::RgbImage::from_pixel(100, 50, image::Rgb([0, 0, 0]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        WatermarkImage::from_bytes(&out.into_inner(), None).unwrap()
    }

    #[test]
    fn starts_at_content_top_on_one_page() {
        let cursor = PageCursor::new(style(), None);
        assert_eq!(cursor.offset_y(), Pt::from_i32(712));
        assert_eq!(cursor.page_count(), 1);
        assert!(cursor.is_fresh_page());
    }

    #[test]
    fn reserve_breaks_only_when_space_runs_out() {
        let mut cursor = PageCursor::new(style(), None);
        cursor.advance(Pt::from_i32(600));
        // 112 left above the 50pt margin: 62 fits exactly.
        assert_eq!(cursor.reserve(Pt::from_i32(62), "fits"), Reservation::Fits);
        assert!(cursor.would_break(Pt::from_i32(63)));
        assert_eq!(
            cursor.reserve(Pt::from_i32(63), "overflow"),
            Reservation::PageBreak
        );
        assert_eq!(cursor.page_count(), 2);
        assert_eq!(cursor.offset_y(), Pt::from_i32(712));
    }

    #[test]
    fn fresh_page_accepts_oversized_requests() {
        let mut cursor = PageCursor::new(style(), None);
        assert_eq!(
            cursor.reserve(Pt::from_i32(5000), "huge"),
            Reservation::Fits
        );
        cursor.advance(Pt::from_i32(10));
        assert_eq!(
            cursor.reserve(Pt::from_i32(5000), "huge"),
            Reservation::PageBreak
        );
        assert_eq!(
            cursor.reserve(Pt::from_i32(5000), "huge"),
            Reservation::Fits
        );
        assert_eq!(cursor.page_count(), 2);
    }

    #[test]
    fn watermark_is_drawn_on_every_allocated_page() {
        let image = png_watermark();
        let mut cursor = PageCursor::new(style(), Some(&image));
        for _ in 0..2 {
            cursor.advance(Pt::from_i32(700));
            cursor.reserve(Pt::from_i32(14), "line");
        }
        let (doc, metrics) = cursor.finish();
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(metrics.page_breaks, 2);
        assert_eq!(doc.images.len(), 1);
        for page in &doc.pages {
            let draws: Vec<&Command> = page
                .commands
                .iter()
                .filter(|c| matches!(c, Command::DrawImage { .. }))
                .collect();
            assert_eq!(
                draws,
                vec![&Command::DrawImage {
                    x: Pt::from_i32(564),
                    y: Pt::from_i32(748),
                    width: Pt::from_i32(8),
                    height: Pt::from_i32(4),
                    resource_id: WATERMARK_RESOURCE_ID.to_string(),
                }]
            );
        }
    }

    #[test]
    fn breaks_inside_a_block_are_counted_separately() {
        let mut cursor = PageCursor::new(style(), None);
        cursor.advance(Pt::from_i32(650));
        cursor.reserve(Pt::from_i32(100), "criterion");
        cursor.begin_block("criterion", Pt::from_i32(100));
        cursor.advance(Pt::from_i32(655));
        cursor.reserve(Pt::from_i32(14), "criterion line");
        cursor.end_block();
        let (_, metrics) = cursor.finish();
        assert_eq!(metrics.page_breaks, 2);
        assert_eq!(metrics.mid_block_breaks, 1);
        assert_eq!(metrics.pages[1].block_count, 1);
        let (doc, _) = {
            let mut cursor = PageCursor::new(style(), None);
            cursor.begin_block("header", Pt::from_i32(120));
            cursor.end_block();
            cursor.begin_block("summary", Pt::from_i32(60));
            cursor.end_block();
            cursor.finish()
        };
        let kinds: Vec<&str> = doc.pages[0].meta_values("block").collect();
        assert_eq!(kinds, vec!["header", "summary"]);
        assert_eq!(metrics.pages[1].min_offset, Some(Pt::from_i32(57)));
    }
}
