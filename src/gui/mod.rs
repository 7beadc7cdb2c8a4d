//! Terminal front-end: a stimulus picker and the logging screen.

mod error;
mod logging_screen;
mod stimulus_selector;

pub use error::LoggerGuiError;
pub use logging_screen::{cell_event, logging_screen, LoggingApp};
pub use stimulus_selector::stimulus_selector;
