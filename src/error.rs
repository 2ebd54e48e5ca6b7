use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("no tag header")]
    NoHeader,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Other(String),
}

impl From<id3::Error> for TagError {
    fn from(err: id3::Error) -> Self {
        match err.kind {
            id3::ErrorKind::NoTag => TagError::NoHeader,
            id3::ErrorKind::Io(io_err) => TagError::Io(io_err),
            kind => TagError::Other(format!("{kind:?}: {}", err.description)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("the name can not be just spaces or nothing")]
    Blank,
    #[error("another song is already named '{0}'")]
    Duplicate(String),
    #[error("editing is disabled while a commit is running")]
    Locked,
    #[error("row {0} does not exist")]
    UnknownRow(usize),
    #[error("row is not editable")]
    NotEditable,
}

/// Human-readable reason for a failed filesystem operation.
pub fn describe_io(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::PermissionDenied => {
            format!("permission denied, the file might be in use ({err})")
        }
        io::ErrorKind::AlreadyExists => format!("destination already exists ({err})"),
        io::ErrorKind::NotFound => format!("file not found ({err})"),
        _ => err.to_string(),
    }
}
