//! Reporter that renders core progress on stderr.
//!
//! stdout belongs to the package manager being run (and to command results
//! such as `prepare --json`), so nothing here ever writes to it.

use std::io::{IsTerminal, Write, stderr};

use corepack_core::{InstallRecord, Reporter};
use corepack_schema::{Descriptor, Locator};
use crossterm::style::{StyledContent, Stylize};

/// Styled progress lines on stderr, colored only when stderr is a terminal.
#[derive(Debug, Clone, Copy)]
pub struct TerminalReporter {
    quiet: bool,
    color: bool,
}

impl TerminalReporter {
    /// A reporter that drops progress lines when `quiet` is set.
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            color: stderr().is_terminal(),
        }
    }

    fn paint(&self, styled: StyledContent<&str>) -> String {
        if self.color {
            styled.to_string()
        } else {
            styled.content().to_string()
        }
    }

    fn line(&self, marker: StyledContent<&str>, msg: &str) {
        let mut err = stderr().lock();
        let _ = writeln!(err, "{} {msg}", self.paint(marker));
    }
}

impl Reporter for TerminalReporter {
    fn resolved(&self, descriptor: &Descriptor, locator: &Locator) {
        tracing::debug!("resolved {descriptor} to {locator}");
    }

    fn downloading(&self, locator: &Locator, url: &str) {
        if self.quiet {
            return;
        }
        self.line("!".yellow(), &format!("Corepack is about to download {url} ({locator})"));
    }

    fn installed(&self, record: &InstallRecord) {
        if self.quiet {
            return;
        }
        self.line(
            "✓".green(),
            &format!("{} in {}", record.locator, record.location.display()),
        );
    }

    fn info(&self, msg: &str) {
        if self.quiet {
            return;
        }
        self.line("•".blue(), msg);
    }

    fn warning(&self, msg: &str) {
        self.line("WARNING:".bold().red(), msg);
    }
}
