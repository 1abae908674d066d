// Error module for the resolution and caching engine

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the core engine.
///
/// Collaborators (repositories, platform providers, task actions) report
/// failures as `anyhow::Error`; those are wrapped here with the context
/// they failed in.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no candidates found for \"{plugin}\" in {repository}")]
    NoCandidates { plugin: String, repository: String },

    #[error(
        "{count} candidates found for \"{plugin}\" but none are compatible with platform \"{platform}\""
    )]
    Incompatible {
        count: usize,
        plugin: String,
        platform: String,
    },

    #[error(
        "{count} candidates found for \"{plugin}\" but none satisfy similarity threshold, closest match was {closest:.4}"
    )]
    BelowThreshold {
        count: usize,
        plugin: String,
        closest: f64,
    },

    #[error("{repository}: {source:#}")]
    Repository {
        repository: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cache: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("plugin cache is closed")]
    CacheClosed,

    #[error("installing {plugin}: {source:#}")]
    Install {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("task \"{task}\" failed: {source:#}")]
    Task {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Multiple(#[from] MultiError),
}

impl Error {
    pub fn persistence(err: impl fmt::Display) -> Self {
        Error::Persistence(err.to_string())
    }

    /// True for the rejection kinds that are expected during a normal
    /// resolution (nothing found, nothing compatible, nothing similar enough).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::NoCandidates { .. } | Error::Incompatible { .. } | Error::BelowThreshold { .. }
        )
    }

    /// False when the error only concerns the plugin being resolved
    /// (rejections and repository failures); true when the operation as a
    /// whole cannot go on.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Multiple(multi) => multi.errors().iter().any(Error::is_fatal),
            Error::Repository { .. } => false,
            other => !other.is_rejection(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::persistence(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::persistence(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::persistence(err)
    }
}

/// An ordered collection of errors reported as one.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<Error>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error; nested aggregates are flattened.
    pub fn push(&mut self, err: Error) {
        match err {
            Error::Multiple(inner) => self.errors.extend(inner.errors),
            other => self.errors.push(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// `Ok(())` when nothing was collected, the aggregate otherwise.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Multiple(self))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "1 error occurred:\n\t* {}", self.errors[0]),
            n => {
                write!(f, "{} errors occurred:", n)?;
                for err in &self.errors {
                    write!(f, "\n\t* {}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MultiError {}

impl FromIterator<Error> for MultiError {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        let mut multi = MultiError::new();
        for err in iter {
            multi.push(err);
        }
        multi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_error_flattens_nested() {
        let mut inner = MultiError::new();
        inner.push(Error::Cancelled);
        inner.push(Error::CacheClosed);

        let mut outer = MultiError::new();
        outer.push(Error::UnknownPlatform("forge".into()));
        outer.push(Error::Multiple(inner));

        assert_eq!(outer.len(), 3);
        assert!(matches!(outer.errors()[2], Error::CacheClosed));
    }

    #[test]
    fn test_multi_error_display_lists_every_error() {
        let multi: MultiError = vec![
            Error::UnknownRepository("hangar".into()),
            Error::Cancelled,
        ]
        .into_iter()
        .collect();

        let text = multi.to_string();
        assert!(text.starts_with("2 errors occurred:"));
        assert!(text.contains("unknown repository: hangar"));
        assert!(text.contains("operation cancelled"));
    }

    #[test]
    fn test_empty_multi_error_is_ok() {
        assert!(MultiError::new().into_result().is_ok());
    }

    #[test]
    fn test_below_threshold_mentions_closest_score() {
        let err = Error::BelowThreshold {
            count: 3,
            plugin: "Essentials".into(),
            closest: 0.42,
        };
        assert!(err.to_string().contains("0.4200"));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_fatal_errors() {
        let rejections: MultiError = vec![
            Error::NoCandidates {
                plugin: "Vault".into(),
                repository: "modrinth".into(),
            },
            Error::Repository {
                repository: "hangar".into(),
                source: anyhow::anyhow!("503"),
            },
        ]
        .into_iter()
        .collect();
        assert!(!Error::Multiple(rejections).is_fatal());

        assert!(Error::Persistence("disk full".into()).is_fatal());
        assert!(Error::Cancelled.is_fatal());
    }
}
