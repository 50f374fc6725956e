use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Forecast data error: {0}")]
    Data(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Action failed: {0}")]
    Action(String),

    #[error("State file error: {0}")]
    StateIo(String),

    #[error("State is locked: {0}")]
    Locked(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),
}

impl AlertError {
    /// Short label used in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            AlertError::Config(_) => "config",
            AlertError::Data(_) => "data",
            AlertError::Template(_) => "template",
            AlertError::Action(_) => "action",
            AlertError::StateIo(_) => "state",
            AlertError::Locked(_) => "lock",
            AlertError::Http(_) => "http",
            AlertError::Io(_) => "io",
            AlertError::Json(_) => "json",
            AlertError::DataSourceUnavailable(_) => "provider",
        }
    }
}

pub type Result<T> = std::result::Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_follow_taxonomy() {
        assert_eq!(AlertError::Config("x".into()).kind(), "config");
        assert_eq!(AlertError::Template("x".into()).kind(), "template");
        assert_eq!(AlertError::StateIo("x".into()).kind(), "state");
    }

    #[test]
    fn display_includes_message() {
        let err = AlertError::Data("no temperature_min in window".into());
        assert_eq!(
            err.to_string(),
            "Forecast data error: no temperature_min in window"
        );
    }
}
