use crate::blocks::{BlockContext, LayoutBlock};
use crate::canvas::Document;
use crate::cursor::PageCursor;
use crate::debug::DebugLogger;
use crate::error::ReportError;
use crate::font::FontSet;
use crate::metrics::ReportMetrics;
use crate::pdf::document_to_pdf;
use crate::record::{AssessmentRecord, ScorePolicy};
use crate::style::Style;
use crate::watermark::WatermarkImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Lays an assessment record out as header, summary and one scorecard per
/// criterion, top to bottom, and serializes the result.
#[derive(Clone)]
pub struct ReportAssembler {
    style: Arc<Style>,
    fonts: Arc<FontSet>,
    score_policy: ScorePolicy,
    generated_on: Option<String>,
    debug: Option<DebugLogger>,
    cancel: Option<Arc<AtomicBool>>,
}

impl ReportAssembler {
    pub fn new(style: Arc<Style>, fonts: Arc<FontSet>) -> Self {
        Self {
            style,
            fonts,
            score_policy: ScorePolicy::default(),
            generated_on: None,
            debug: None,
            cancel: None,
        }
    }

    pub fn with_score_policy(mut self, policy: ScorePolicy) -> Self {
        self.score_policy = policy;
        self
    }

    /// Date printed as the generation date. Defaults to today's local date.
    pub fn with_generated_on(mut self, date: impl Into<String>) -> Self {
        self.generated_on = Some(date.into());
        self
    }

    pub fn with_debug(mut self, debug: DebugLogger) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Polled between blocks; once set, layout stops with `Cancelled`.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn style(&self) -> &Arc<Style> {
        &self.style
    }

    pub fn fonts(&self) -> &Arc<FontSet> {
        &self.fonts
    }

    pub fn layout(
        &self,
        record: &AssessmentRecord,
        watermark: Option<&WatermarkImage>,
    ) -> Result<(Document, ReportMetrics), ReportError> {
        let started = Instant::now();
        let blocks = self.build_blocks(record)?;

        let mut cursor =
            PageCursor::new(self.style.clone(), watermark).with_debug(self.debug.clone());
        let ctx = BlockContext {
            style: &self.style,
            fonts: &self.fonts,
        };
        for block in &blocks {
            self.check_cancelled()?;
            cursor.reserve(block.reservation(&self.style), block.kind());
            cursor.begin_block(block.kind(), block.height());
            block.draw(&mut cursor, ctx);
            cursor.end_block();
            cursor.advance(self.style.block_gap);
        }

        let (document, mut metrics) = cursor.finish();
        metrics.layout_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            candidate = %record.candidate_name,
            blocks = blocks.len(),
            pages = metrics.page_count(),
            page_breaks = metrics.page_breaks,
            layout_ms = metrics.layout_ms,
            "report laid out"
        );
        if let Some(debug) = &self.debug {
            debug.increment("reports", 1);
            debug.increment("blocks", blocks.len() as u64);
            debug.increment("pages", metrics.page_count() as u64);
            debug.increment("page_breaks", metrics.page_breaks as u64);
        }
        Ok((document, metrics))
    }

    pub fn assemble(
        &self,
        record: &AssessmentRecord,
        watermark: Option<&WatermarkImage>,
    ) -> Result<Vec<u8>, ReportError> {
        let (document, _) = self.layout(record, watermark)?;
        self.check_cancelled()?;
        document_to_pdf(&document, &self.fonts)
    }

    fn build_blocks(&self, record: &AssessmentRecord) -> Result<Vec<LayoutBlock>, ReportError> {
        let ctx = BlockContext {
            style: &self.style,
            fonts: &self.fonts,
        };
        let generated_on = self
            .generated_on
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());

        let mut blocks = vec![
            LayoutBlock::header(record, &generated_on, ctx),
            LayoutBlock::summary(&record.summary, ctx),
        ];
        for criterion in record.rendered_criteria() {
            let score = self.score_policy.apply(&criterion.name, criterion.score)?;
            blocks.push(LayoutBlock::criterion(criterion, score, ctx));
        }
        Ok(blocks)
    }

    fn check_cancelled(&self) -> Result<(), ReportError> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(ReportError::Cancelled),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::record::{CriterionResult, Status};
    use crate::types::Pt;

    fn assembler() -> ReportAssembler {
        ReportAssembler::new(Arc::new(Style::default()), Arc::new(FontSet::standard()))
            .with_generated_on("2024-05-02")
    }

    fn criterion(name: &str, score: i64) -> CriterionResult {
        CriterionResult {
            name: name.to_string(),
            assessment: format!("Assessment of {}.", name.to_lowercase()),
            score,
        }
    }

    fn record(criteria: Vec<CriterionResult>, summary: &str) -> AssessmentRecord {
        AssessmentRecord {
            candidate_name: "Grace Hopper".to_string(),
            role: "Senior Backend Engineer".to_string(),
            interview_date: "2024-05-01".to_string(),
            status: Status::Pass,
            criteria,
            summary: summary.to_string(),
        }
    }

    fn words(count: usize) -> String {
        (0..count)
            .map(|i| format!("word{}", i % 17))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn report_with_embedded_fonts_wraps_to_their_metrics() {
        let wide = crate::font::tests::tiny_truetype(900);
        let fonts = Arc::new(FontSet::from_truetype(wide.clone(), wide).unwrap());
        let assembler = ReportAssembler::new(Arc::new(Style::default()), fonts.clone())
            .with_generated_on("2024-05-02");
        let rec = record(vec![criterion("Communication", 4)], &words(120));
        let (document, _) = assembler.layout(&rec, None).unwrap();

        // Every glyph is wider than in Helvetica, so the summary needs more lines.
        let (standard, _) = self::assembler().layout(&rec, None).unwrap();
        let line_count = |doc: &crate::canvas::Document| {
            doc.pages
                .iter()
                .flat_map(|page| page.commands.iter())
                .filter(|cmd| matches!(cmd, Command::DrawString { .. }))
                .count()
        };
        assert!(line_count(&document) > line_count(&standard));

        let bytes = assembler.assemble(&rec, None).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), document.pages.len());
        assert!(count(&bytes, b"/FontFile2") >= 2);
    }

    fn count(bytes: &[u8], token: &[u8]) -> usize {
        bytes.windows(token.len()).filter(|w| *w == token).count()
    }

    #[test]
    fn long_report_spans_pages_and_skips_job_fit() {
        let rec = record(
            vec![
                criterion("System Design", 5),
                criterion("Job Fit", 4),
                criterion("Communication", 2),
                criterion("Testing Discipline", 0),
            ],
            &words(500),
        );
        let (doc, metrics) = assembler().layout(&rec, None).unwrap();
        assert!(doc.pages.len() >= 2);
        assert_eq!(metrics.page_count(), doc.pages.len());

        let text: String = doc.pages.iter().map(|p| p.text()).collect();
        assert!(text.contains("Grace Hopper"));
        assert!(text.contains("PASS"));
        assert!(text.contains("Summary"));
        assert!(text.contains("System Design"));
        assert!(text.contains("Testing Discipline"));
        assert!(!text.contains("Job Fit"));
        assert!(text.contains("Report generated 2024-05-02"));

        let order: Vec<usize> = ["Summary", "System Design", "Communication", "Testing Discipline"]
            .iter()
            .map(|needle| text.find(needle).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn job_fit_is_matched_case_insensitively() {
        let rec = record(vec![criterion("  JOB fit ", 3)], "");
        let (doc, _) = assembler().layout(&rec, None).unwrap();
        assert!(!doc.pages[0].text().to_lowercase().contains("job fit"));
    }

    #[test]
    fn content_stays_above_the_bottom_margin() {
        let style = Style::default();
        let criteria = (0..12)
            .map(|i| CriterionResult {
                name: format!("Criterion {i}"),
                assessment: words(60),
                score: i % 6,
            })
            .collect();
        let rec = record(criteria, &words(300));
        let (doc, metrics) = assembler().layout(&rec, None).unwrap();
        assert!(doc.pages.len() >= 3);
        for page in &metrics.pages {
            let lowest = page.min_offset.unwrap();
            // Only the trailing block gap may dip under the margin.
            assert!(lowest + style.block_gap >= style.content_bottom(), "page {}", page.page_number);
        }
        for page in &doc.pages {
            for cmd in &page.commands {
                if let Command::DrawString { y, .. } = cmd {
                    assert!(*y >= style.content_bottom());
                    assert!(*y <= style.content_top());
                }
            }
        }
    }

    #[test]
    fn short_blocks_are_never_split() {
        let criteria = (0..20).map(|i| criterion(&format!("Criterion {i}"), 3)).collect();
        let rec = record(criteria, "Brief.");
        let (_, metrics) = assembler().layout(&rec, None).unwrap();
        assert!(metrics.page_breaks > 0);
        assert_eq!(metrics.mid_block_breaks, 0);
    }

    #[test]
    fn oversized_summary_flows_across_pages() {
        let rec = record(vec![criterion("Depth", 4)], &vec!["line"; 120].join("\n"));
        let (doc, metrics) = assembler().layout(&rec, None).unwrap();
        assert!(metrics.mid_block_breaks >= 1);
        let lines: usize = doc
            .pages
            .iter()
            .map(|p| p.text().lines().filter(|l| *l == "line").count())
            .sum();
        assert_eq!(lines, 120);
    }

    #[test]
    fn out_of_range_scores_follow_the_policy() {
        let rec = record(vec![criterion("Depth", 7)], "");
        let err = assembler().layout(&rec, None).unwrap_err();
        assert!(matches!(err, ReportError::InvalidScore { score: 7, .. }));

        let (doc, _) = assembler()
            .with_score_policy(ScorePolicy::Clamp)
            .layout(&rec, None)
            .unwrap();
        assert!(doc.pages[0].text().contains("5/5"));

        let (doc, _) = assembler()
            .with_score_policy(ScorePolicy::PassThrough)
            .layout(&rec, None)
            .unwrap();
        assert!(doc.pages[0].text().contains("7/5"));
    }

    #[test]
    fn cancelled_flag_stops_layout() {
        let flag = Arc::new(AtomicBool::new(true));
        let rec = record(vec![criterion("Depth", 3)], "Fine.");
        let err = assembler()
            .with_cancel_flag(flag)
            .assemble(&rec, None)
            .unwrap_err();
        assert!(matches!(err, ReportError::Cancelled));
    }

    #[test]
    fn assembled_bytes_are_deterministic() {
        let rec = record(vec![criterion("Depth", 3), criterion("Breadth", 1)], &words(80));
        let first = assembler().assemble(&rec, None).unwrap();
        let second = assembler().assemble(&rec, None).unwrap();
        assert_eq!(first, second);
        let parsed = lopdf::Document::load_mem(&first).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn debug_trace_records_blocks_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.jsonl");
        let debug = DebugLogger::new(&path).unwrap();
        let rec = record(vec![criterion("Depth", 3)], "Fine.");
        assembler().with_debug(debug.clone()).layout(&rec, None).unwrap();
        debug.emit_summary("test");
        debug.flush();
        let log = std::fs::read_to_string(&path).unwrap();
        assert_eq!(log.matches("\"type\":\"layout.block\"").count(), 3);
        assert!(log.contains("\"blocks\":3"));
        assert!(log.contains("\"pages\":1"));
    }

    #[test]
    fn first_block_starts_at_the_content_top() {
        let style = Style::default();
        let rec = record(Vec::new(), "");
        let (doc, _) = assembler().layout(&rec, None).unwrap();
        let first_move = doc.pages[0].commands.iter().find_map(|c| match c {
            Command::MoveTo { y, .. } => Some(*y),
            _ => None,
        });
        // Header band spans content_top down by its height; its path starts on the bottom edge.
        assert_eq!(first_move, Some(style.content_top() - style.header_height));
        assert_eq!(style.content_top(), Pt::from_i32(712));
    }
}
