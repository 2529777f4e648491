use super::{ConsoleView, chat_line, parse_input, sanitize, status_line};
use crate::relay::{Command, MessageDisplay, StatusReporter};

#[test]
fn test_chat_line_uppercases_sender() {
    assert_eq!(chat_line("09:15", "Anon_42", "hello"), "[09:15] <ANON_42> hello");
}

#[test]
fn test_status_line() {
    assert_eq!(
        status_line("23:59", "Uplink established."),
        "[23:59] * Uplink established."
    );
}

#[test]
fn test_view_writes_one_line_per_call() {
    let mut view = ConsoleView::new(Vec::new());
    view.render("hi", "Anon_7");
    view.status("Connection lost. Retrying in 5s...");

    let output = String::from_utf8(view.into_inner()).unwrap();
    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("] <ANON_7> hi"));
    assert!(lines[1].ends_with("] * Connection lost. Retrying in 5s..."));
    assert!(lines[0].starts_with('['));
}

#[test]
fn test_parse_input() {
    assert_eq!(parse_input("hello\n"), Some(Command::Say("hello".to_string())));
    assert_eq!(parse_input("  spaced  "), Some(Command::Say("  spaced  ".to_string())));
    assert_eq!(parse_input("/join ops"), Some(Command::Join("ops".to_string())));
    assert_eq!(parse_input("/join   main  "), Some(Command::Join("main".to_string())));
    assert_eq!(parse_input("/join"), None);
    assert_eq!(parse_input("/quit"), Some(Command::Quit));
    assert_eq!(parse_input("/exit\r\n"), Some(Command::Quit));
    assert_eq!(parse_input("   "), None);
    assert_eq!(
        parse_input("/quitter"),
        Some(Command::Say("/quitter".to_string()))
    );
}

#[test]
fn test_sanitize_replaces_control_characters() {
    assert_eq!(sanitize("plain\ttext"), "plain\ttext");
    assert_eq!(sanitize("a\nb\rc"), "a\u{fffd}b\u{fffd}c");
    assert_eq!(sanitize("\x1b[2J\u{9b}0m\0"), "\u{fffd}[2J\u{fffd}0m\u{fffd}");
}

#[test]
fn test_peer_cannot_forge_lines_or_send_escapes() {
    let mut view = ConsoleView::new(Vec::new());
    view.render("hi\n[12:00] * Uplink established.\x1b[2J", "Anon_7\x1b]0;x\x07");

    let output = String::from_utf8(view.into_inner()).unwrap();
    assert_eq!(output.lines().count(), 1);
    assert!(!output.contains('\x1b'));
    assert!(!output.contains('\x07'));
    assert!(output.ends_with(
        "] <ANON_7\u{fffd}]0;X\u{fffd}> hi\u{fffd}[12:00] * Uplink established.\u{fffd}[2J\n"
    ));
}
