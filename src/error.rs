use std::fmt;

#[derive(Debug)]
pub enum ReportError {
    FontEmbedding(String),
    MalformedSourceDocument { index: usize, message: String },
    EmptyDocumentSet,
    WatermarkFetch(String),
    WatermarkDecode(String),
    InvalidScore { criterion: String, score: i64 },
    InvalidConfiguration(String),
    Serialize(String),
    Cancelled,
    Io(std::io::Error),
}

impl ReportError {
    /// Watermark problems degrade output instead of failing the call.
    pub fn is_cosmetic(&self) -> bool {
        matches!(
            self,
            ReportError::WatermarkFetch(_) | ReportError::WatermarkDecode(_)
        )
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::FontEmbedding(message) => {
                write!(f, "font embedding failed: {}", message)
            }
            ReportError::MalformedSourceDocument { index, message } => {
                write!(f, "source document {} is malformed: {}", index, message)
            }
            ReportError::EmptyDocumentSet => write!(f, "no documents provided to merge"),
            ReportError::WatermarkFetch(message) => {
                write!(f, "watermark fetch failed: {}", message)
            }
            ReportError::WatermarkDecode(message) => {
                write!(f, "watermark decode failed: {}", message)
            }
            ReportError::InvalidScore { criterion, score } => {
                write!(
                    f,
                    "score {} for criterion '{}' is outside 0..=5",
                    score, criterion
                )
            }
            ReportError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            ReportError::Serialize(message) => write!(f, "pdf serialization failed: {}", message),
            ReportError::Cancelled => write!(f, "report generation cancelled"),
            ReportError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReportError {
    fn from(value: std::io::Error) -> Self {
        ReportError::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_watermark_errors_are_cosmetic() {
        assert!(ReportError::WatermarkFetch("timeout".into()).is_cosmetic());
        assert!(ReportError::WatermarkDecode("bad png".into()).is_cosmetic());
        assert!(!ReportError::EmptyDocumentSet.is_cosmetic());
        assert!(!ReportError::FontEmbedding("x".into()).is_cosmetic());
    }

    #[test]
    fn display_names_the_failing_input() {
        let err = ReportError::MalformedSourceDocument {
            index: 1,
            message: "invalid file header".into(),
        };
        assert_eq!(
            err.to_string(),
            "source document 1 is malformed: invalid file header"
        );
        let err = ReportError::InvalidScore {
            criterion: "Communication".into(),
            score: 7,
        };
        assert!(err.to_string().contains("Communication"));
    }
}
