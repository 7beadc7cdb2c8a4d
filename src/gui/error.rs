use std::{error::Error, fmt::Display};

use crate::export::ExportError;

/// Errors from the terminal front-end.
#[derive(Debug)]
pub enum LoggerGuiError {
    /// The terminal could not be read or written
    IOError(std::io::Error),
    /// Writing the exports of a stimulus failed
    ExportError(ExportError),
}

impl Display for LoggerGuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl Error for LoggerGuiError {}

impl From<std::io::Error> for LoggerGuiError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<ExportError> for LoggerGuiError {
    fn from(value: ExportError) -> Self {
        Self::ExportError(value)
    }
}
