use crate::error::ReportError;
use crate::record::ScorePolicy;
use crate::types::Size;
use crate::watermark::{DEFAULT_FETCH_TIMEOUT, WatermarkSource};
use std::path::PathBuf;
use std::time::Duration;

/// Engine settings loaded from environment variables (and `.env`).
/// Every variable is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub watermark: Option<WatermarkSource>,
    pub watermark_timeout: Duration,
    pub score_policy: ScorePolicy,
    pub font_regular: Option<PathBuf>,
    pub font_bold: Option<PathBuf>,
    pub page_size: Size,
    pub debug_log: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            watermark: None,
            watermark_timeout: DEFAULT_FETCH_TIMEOUT,
            score_policy: ScorePolicy::default(),
            font_regular: None,
            font_bold: None,
            page_size: Size::letter(),
            debug_log: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ReportError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ReportError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = EngineConfig::default();

        // A URL wins over a path when both are set.
        config.watermark = match (get("SCORECARD_WATERMARK_URL"), get("SCORECARD_WATERMARK_PATH")) {
            (Some(url), _) => Some(WatermarkSource::parse(&url)),
            (None, Some(path)) => Some(WatermarkSource::Path(PathBuf::from(path))),
            (None, None) => None,
        };
        if let Some(raw) = get("SCORECARD_WATERMARK_TIMEOUT_MS") {
            let millis = raw.trim().parse::<u64>().map_err(|_| {
                ReportError::InvalidConfiguration(format!(
                    "SCORECARD_WATERMARK_TIMEOUT_MS must be a whole number of milliseconds, got '{}'",
                    raw
                ))
            })?;
            config.watermark_timeout = Duration::from_millis(millis);
        }
        if let Some(raw) = get("SCORECARD_SCORE_POLICY") {
            config.score_policy = raw.parse()?;
        }
        config.font_regular = get("SCORECARD_FONT_REGULAR").map(PathBuf::from);
        config.font_bold = get("SCORECARD_FONT_BOLD").map(PathBuf::from);
        if config.font_regular.is_some() != config.font_bold.is_some() {
            return Err(ReportError::InvalidConfiguration(
                "SCORECARD_FONT_REGULAR and SCORECARD_FONT_BOLD must be set together".to_string(),
            ));
        }
        if let Some(raw) = get("SCORECARD_PAGE_SIZE") {
            config.page_size = parse_page_size(&raw)?;
        }
        config.debug_log = get("SCORECARD_DEBUG_LOG").map(PathBuf::from);
        Ok(config)
    }
}

pub fn parse_page_size(raw: &str) -> Result<Size, ReportError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "letter" => Ok(Size::letter()),
        "a4" => Ok(Size::a4()),
        other => Err(ReportError::InvalidConfiguration(format!(
            "unknown page size '{}' (expected letter or a4)",
            other
        ))),
    }
}
