use std::{io, num::ParseIntError, path::PathBuf};

pub type DResult<T> = Result<T, DictError>;

#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("Could not parse the document")]
    DocumentNotParsed(#[from] roxmltree::Error),
    #[error("Document is not well-formed xml")]
    NotWellFormed(#[from] xml::reader::Error),
    #[error("Could not parse field {field} into u32: {:?}", .source)]
    FieldNotParsed {
        source: ParseIntError,
        field: String,
    },
    #[error("Attribute {} not found", .0)]
    AttributeNotFound(String),
    #[error("Unknown xml tag {}", .0)]
    UnknownXmlTag(String),
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },
    #[error("Could not read csv")]
    Csv(#[from] csv::Error),
    #[error("Could not parse keep list")]
    KeepList(#[from] serde_json::Error),
    #[error("Could not parse config")]
    Config(#[from] toml::de::Error),
    #[error("{owner} references {reference} which is not defined")]
    UnresolvedReference { owner: String, reference: String },
    #[error("File {} not found", .path.display())]
    MissingFile { path: PathBuf },
    #[error("I/O error on {}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("Could not write xml")]
    Write(#[from] xml::writer::Error),
}

impl DictError {
    pub fn malformed_row(line: u64, reason: impl Into<String>) -> Self {
        DictError::MalformedRow {
            line,
            reason: reason.into(),
        }
    }

    pub fn unresolved(owner: impl Into<String>, reference: impl Into<String>) -> Self {
        DictError::UnresolvedReference {
            owner: owner.into(),
            reference: reference.into(),
        }
    }

    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        // a missing input is reported by path alone
        if source.kind() == io::ErrorKind::NotFound {
            DictError::MissingFile { path }
        } else {
            DictError::Io { path, source }
        }
    }
}
