//! Domain error types.

/// Top-level error type for quantlab.
#[derive(Debug, thiserror::Error)]
pub enum QuantlabError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid strategy field {field}: {reason}")]
    StrategyInvalid { field: String, reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("bad price series for {ticker}: {reason}")]
    BadSeries { ticker: String, reason: String },

    #[error("strategy store error: {reason}")]
    Store { reason: String },

    #[error("unknown strategy '{name}'")]
    UnknownStrategy { name: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&QuantlabError> for std::process::ExitCode {
    fn from(err: &QuantlabError) -> Self {
        let code: u8 = match err {
            QuantlabError::Io(_) => 1,
            QuantlabError::ConfigParse { .. }
            | QuantlabError::ConfigMissing { .. }
            | QuantlabError::ConfigInvalid { .. } => 2,
            QuantlabError::StrategyInvalid { .. } => 3,
            QuantlabError::Data { .. }
            | QuantlabError::NoData { .. }
            | QuantlabError::BadSeries { .. } => 4,
            QuantlabError::Store { .. } | QuantlabError::UnknownStrategy { .. } => 5,
            QuantlabError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = QuantlabError::NoData {
            ticker: "SOXL".into(),
        };
        assert_eq!(err.to_string(), "no data for SOXL");

        let err = QuantlabError::ConfigInvalid {
            section: "strategy".into(),
            key: "ma_buy".into(),
            reason: "must be at least 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [strategy] ma_buy: must be at least 1"
        );
    }

    #[test]
    fn exit_code_conversion_exists() {
        use std::process::ExitCode;

        let config_err = QuantlabError::ConfigMissing {
            section: "data".into(),
            key: "csv_dir".into(),
        };
        let data_err = QuantlabError::NoData {
            ticker: "TQQQ".into(),
        };
        let _: ExitCode = (&config_err).into();
        let _: ExitCode = (&data_err).into();
    }
}
