//! Colored terminal output for build progress.

use cyrup_termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use std::io::{self, IsTerminal, Write};

/// Writes user-facing progress, honoring verbose and quiet modes.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
    stdout_color: ColorChoice,
    stderr_color: ColorChoice,
}

impl OutputManager {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        let choose = |is_terminal: bool| {
            if is_terminal {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            }
        };

        Self {
            verbose,
            quiet,
            stdout_color: choose(std::io::stdout().is_terminal()),
            stderr_color: choose(std::io::stderr().is_terminal()),
        }
    }

    fn emit(
        &self,
        to_stderr: bool,
        color: Option<Color>,
        bold: bool,
        prefix: &str,
        message: &str,
    ) -> io::Result<()> {
        let mut stream = if to_stderr {
            StandardStream::stderr(self.stderr_color)
        } else {
            StandardStream::stdout(self.stdout_color)
        };

        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        stream.set_color(&spec)?;
        write!(stream, "{}", prefix)?;
        stream.reset()?;
        writeln!(stream, "{}", message)?;
        stream.flush()
    }

    /// Detail shown only with `--verbose`
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if !self.verbose || self.quiet {
            return Ok(());
        }
        self.emit(false, Some(Color::Cyan), false, "  ", message)
    }

    /// Step announcement
    pub fn progress(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.emit(false, Some(Color::Blue), true, "→ ", message)
    }

    pub fn success(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.emit(false, Some(Color::Green), true, "✓ ", message)
    }

    pub fn warn(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.emit(true, Some(Color::Yellow), true, "⚠ ", message)
    }

    /// Section header
    pub fn section(&self, title: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.emit(false, Some(Color::Magenta), true, "", &format!("\n{}", title))
    }

    /// Indented passthrough (engine output, artifact lists)
    pub fn indent(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.emit(false, None, false, "    ", message)
    }
}
