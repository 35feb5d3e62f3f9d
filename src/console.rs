// Console seam: the loop controller only talks to the user through this
// trait, so the whole menu can be driven from a script in tests.

use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::time::Duration;

pub trait Console {
    /// Prompt for one line of input. `Ok(None)` means input is exhausted.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Wait for the user to acknowledge `message`.
    fn pause(&mut self, message: &str) -> io::Result<()>;

    fn say(&mut self, line: &str);

    /// Diagnostics and failures.
    fn warn(&mut self, line: &str);

    /// Show a busy indicator until `done` is called.
    fn busy(&mut self, _message: &str) {}

    fn done(&mut self) {}
}

/// Interactive terminal console backed by `dialoguer` and `indicatif`.
///
/// `dialoguer` prompts only work when both stdin and stderr are a terminal.
/// Otherwise (piped input, stderr redirected to a log) lines are read
/// straight from stdin, so end of input is seen.
#[derive(Debug)]
pub struct TermConsole {
    spinner: Option<ProgressBar>,
    attended: bool,
}

impl Default for TermConsole {
    fn default() -> Self {
        TermConsole {
            spinner: None,
            attended: io::stdin().is_tty() && io::stderr().is_tty(),
        }
    }
}

impl TermConsole {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Read one line from `reader` without its line ending. `Ok(None)` once
/// the reader is exhausted.
pub fn read_plain_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}

impl Console for TermConsole {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        if !self.attended {
            let mut stdout = io::stdout();
            write!(stdout, "{prompt}: ")?;
            stdout.flush()?;
            return read_plain_line(&mut io::stdin().lock());
        }
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map(Some)
    }

    fn pause(&mut self, message: &str) -> io::Result<()> {
        self.read_line(message).map(|_| ())
    }

    fn say(&mut self, line: &str) {
        println!("{line}");
    }

    fn warn(&mut self, line: &str) {
        println!("{}", line.yellow());
    }

    fn busy(&mut self, message: &str) {
        // `ProgressSpinner` shows a simple spinner while a remote call runs.
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn done(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

/// Console fed from a fixed list of input lines, recording everything
/// printed. Used to drive the menu in tests.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    /// Every line printed, in order. Warnings are prefixed with `! `.
    pub output: Vec<String>,
}

impl ScriptedConsole {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedConsole {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: Vec::new(),
        }
    }

    /// All output joined with newlines.
    pub fn transcript(&self) -> String {
        self.output.join("\n")
    }

    /// Number of input lines not consumed yet.
    pub fn remaining(&self) -> usize {
        self.inputs.len()
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.output.push(format!("{prompt}: "));
        Ok(self.inputs.pop_front())
    }

    fn pause(&mut self, message: &str) -> io::Result<()> {
        self.output.push(message.to_string());
        Ok(())
    }

    fn say(&mut self, line: &str) {
        self.output.push(line.to_string());
    }

    fn warn(&mut self, line: &str) {
        self.output.push(format!("! {line}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn plain_lines_end_with_none() {
        let mut input = Cursor::new("7\r\n0\nlast");
        assert_eq!(read_plain_line(&mut input).unwrap().as_deref(), Some("7"));
        assert_eq!(read_plain_line(&mut input).unwrap().as_deref(), Some("0"));
        assert_eq!(read_plain_line(&mut input).unwrap().as_deref(), Some("last"));
        assert_eq!(read_plain_line(&mut input).unwrap(), None);
        assert_eq!(read_plain_line(&mut input).unwrap(), None);
    }

    #[test]
    fn empty_line_is_not_end_of_input() {
        let mut input = Cursor::new("\n");
        assert_eq!(read_plain_line(&mut input).unwrap().as_deref(), Some(""));
        assert_eq!(read_plain_line(&mut input).unwrap(), None);
    }
}
