//! Terminal front-end: renders chat and status lines on stdout and turns
//! typed lines into relay commands.

use std::borrow::Cow;
use std::io::{self, Stdout, Write};

use chrono::Local;
use tracing::warn;

use crate::relay::{Command, MessageDisplay, StatusReporter};

/// Writes `[HH:MM] <SENDER> text` and `[HH:MM] * status` lines.
///
/// Timestamps are taken when the line is rendered; nothing on the wire
/// carries one.
pub struct ConsoleView<W: Write = Stdout> {
    out: W,
}

impl ConsoleView<Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!(error = %e, "failed to write to terminal");
        }
    }
}

impl<W: Write> MessageDisplay for ConsoleView<W> {
    fn render(&mut self, text: &str, sender: &str) {
        let line = chat_line(&timestamp(), sender, text);
        self.write_line(&line);
    }
}

impl<W: Write> StatusReporter for ConsoleView<W> {
    fn status(&mut self, line: &str) {
        let line = status_line(&timestamp(), line);
        self.write_line(&line);
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M").to_string()
}

/// Peer text is untrusted: line breaks and escape sequences must not reach
/// the terminal.
pub fn chat_line(time: &str, sender: &str, text: &str) -> String {
    format!(
        "[{time}] <{}> {}",
        sanitize(sender).to_uppercase(),
        sanitize(text)
    )
}

pub fn status_line(time: &str, status: &str) -> String {
    format!("[{time}] * {}", sanitize(status))
}

/// Replaces control characters other than tab with U+FFFD.
pub fn sanitize(text: &str) -> Cow<'_, str> {
    let unsafe_char = |c: char| c.is_control() && c != '\t';
    if !text.contains(unsafe_char) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if unsafe_char(c) { char::REPLACEMENT_CHARACTER } else { c })
            .collect(),
    )
}

/// Parses one line of user input.
///
/// `/join <room>` switches rooms, `/quit` (or `/exit`) leaves, anything else
/// is chat text. Blank lines and `/join` without a room yield `None`.
pub fn parse_input(line: &str) -> Option<Command> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.split_once(char::is_whitespace) {
        Some(("/join", room)) if !room.trim().is_empty() => {
            Some(Command::Join(room.trim().to_string()))
        }
        None if trimmed == "/join" => None,
        None if trimmed == "/quit" || trimmed == "/exit" => Some(Command::Quit),
        _ => Some(Command::Say(line.to_string())),
    }
}

#[cfg(test)]
mod tests;
