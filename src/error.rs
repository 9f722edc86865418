use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IsaError {
    #[error("unable to find the investigation file in {0}")]
    #[diagnostic(help("the archive must contain exactly one file matching the investigation pattern"))]
    InvestigationNotFound(Utf8PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid file pattern: {0}")]
    InvalidPattern(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("malformed investigation file {path}: {message}")]
    InvestigationParse { path: Utf8PathBuf, message: String },

    #[error("can't split {0} datasets")]
    SplitUnsupported(String),
}
