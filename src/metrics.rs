use crate::types::Pt;

#[derive(Debug, Clone, Default)]
pub struct PageMetrics {
    pub page_number: usize,
    pub command_count: usize,
    pub block_count: usize,
    /// Lowest offset reached by reserved content on this page.
    pub min_offset: Option<Pt>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportMetrics {
    pub pages: Vec<PageMetrics>,
    pub page_breaks: usize,
    pub mid_block_breaks: usize,
    pub layout_ms: f64,
}

impl ReportMetrics {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
