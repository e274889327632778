//! Terminal output.

mod reporter;

pub use reporter::TerminalReporter;
