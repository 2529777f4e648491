/// Renders chat lines. The relay calls it for every message it displays,
/// incoming or outgoing.
pub trait MessageDisplay {
    fn render(&mut self, text: &str, sender: &str);
}

/// Receives the human-readable status line emitted at each state change.
pub trait StatusReporter {
    fn status(&mut self, line: &str);
}
