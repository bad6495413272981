//! Error taxonomy and operation results
//!
//! Internal steps return [`Result`] and propagate with `?`. Public
//! operations wrap their outcome in an [`OperationResult`] so a CLI or build
//! hook can report it without matching on error variants.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("Path is outside the notes root: {}", .0.display())]
    OutOfScope(PathBuf),

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Destination already exists: {}", .0.display())]
    Conflict(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Asset tree is not compliant ({} violation(s))", .0.len())]
    Compliance(Vec<String>),

    #[error("Invalid front matter: {0}")]
    Frontmatter(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error classes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Io,
    Compliance,
}

impl Error {
    /// Build an IO error carrying the action and path that failed
    pub fn io(action: &str, path: &Path, source: io::Error) -> Self {
        Error::Io {
            context: format!("Failed to {} '{}'", action, path.display()),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_)
            | Error::OutOfScope(_)
            | Error::Frontmatter(_)
            | Error::Config(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Io { .. } => ErrorKind::Io,
            Error::Compliance(_) => ErrorKind::Compliance,
        }
    }
}

/// Closure adapter for `map_err` on raw `io::Result`s
pub(crate) fn io_err<'a>(action: &'a str, path: &'a Path) -> impl FnOnce(io::Error) -> Error + 'a {
    move |source| Error::io(action, path, source)
}

impl From<ErrorKind> for io::ErrorKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::Conflict => io::ErrorKind::AlreadyExists,
            ErrorKind::Validation | ErrorKind::Compliance => io::ErrorKind::InvalidInput,
            ErrorKind::Io => io::ErrorKind::Other,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::new(err.kind().into(), err.to_string())
    }
}

/// Outcome of a public operation: success flag, message, optional payload
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> OperationResult<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            data: Some(data),
        }
    }

    pub fn failed(err: &Error) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            error: Some(err.kind()),
            data: None,
        }
    }

    /// Convert an internal result, rendering the success message from the payload
    pub fn from_result(result: Result<T>, describe: impl FnOnce(&T) -> String) -> Self {
        match result {
            Ok(data) => {
                let message = describe(&data);
                Self::ok(message, data)
            }
            Err(err) => Self::failed(&err),
        }
    }

    /// Append a secondary note (e.g. a rollback outcome) to the message
    pub fn with_note(mut self, note: impl AsRef<str>) -> Self {
        self.message.push_str(" (");
        self.message.push_str(note.as_ref());
        self.message.push(')');
        self
    }

    /// Turn a failed result into an `io::Error` for CLI exit handling
    pub fn into_io(self) -> io::Result<Option<T>> {
        if self.success {
            return Ok(self.data);
        }
        let kind = self.error.map_or(io::ErrorKind::Other, io::ErrorKind::from);
        Err(io::Error::new(kind, self.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::OutOfScope(PathBuf::from("/x")).kind(), ErrorKind::Validation);
        assert_eq!(Error::Frontmatter("bad".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::NotFound(PathBuf::from("a.md")).kind(), ErrorKind::NotFound);
        assert_eq!(Error::Conflict(PathBuf::from("a.md")).kind(), ErrorKind::Conflict);
        let io = Error::io("read", Path::new("a.md"), io::Error::other("boom"));
        assert_eq!(io.kind(), ErrorKind::Io);
        assert!(io.to_string().contains("Failed to read 'a.md'"));
    }

    #[test]
    fn test_operation_result_from_result() {
        let ok: OperationResult<u32> = OperationResult::from_result(Ok(3), |n| format!("{} done", n));
        assert!(ok.success);
        assert_eq!(ok.message, "3 done");
        assert_eq!(ok.data, Some(3));

        let failed: OperationResult<u32> =
            OperationResult::from_result(Err(Error::Conflict(PathBuf::from("b.md"))), |_| unreachable!());
        assert!(!failed.success);
        assert_eq!(failed.error, Some(ErrorKind::Conflict));
        assert!(failed.data.is_none());
    }

    #[test]
    fn test_into_io_kind() {
        let failed: OperationResult<()> = OperationResult::failed(&Error::NotFound(PathBuf::from("x")));
        let err = failed.into_io().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_io_conversions_agree() {
        let errors = [
            Error::Validation("bad".into()),
            Error::NotFound(PathBuf::from("x")),
            Error::Conflict(PathBuf::from("x")),
            Error::Compliance(vec!["missing".into()]),
            Error::io("read", Path::new("x"), io::Error::other("boom")),
        ];
        for err in errors {
            let via_result = OperationResult::<()>::failed(&err).into_io().unwrap_err().kind();
            let direct = io::Error::from(err).kind();
            assert_eq!(via_result, direct);
        }

        let no_kind: OperationResult<()> = OperationResult {
            success: false,
            message: "partial".into(),
            error: None,
            data: None,
        };
        assert_eq!(no_kind.into_io().unwrap_err().kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_with_note() {
        let failed: OperationResult<()> = OperationResult::failed(&Error::Validation("nope".into()));
        let noted = failed.with_note("rollback succeeded");
        assert_eq!(noted.message, "nope (rollback succeeded)");
    }
}
