// Output format auto-detection for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` flag forces JSON output regardless of terminal.

use serde::Serialize;
use std::io::{self, IsTerminal, Write};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object per response).
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to stdout in the selected format.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human_fn)
}

/// Write a value to a provided writer.
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Write an error to stderr in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    print_stderr(format, "error", ANSI_RED, code, message);
}

/// Write a warning to stderr in the selected format.
pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    print_stderr(format, "warning", ANSI_YELLOW, code, message);
}

fn print_stderr(format: OutputFormat, label: &str, color: &str, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line = render_human_stderr_line(label, message, io::stderr().is_terminal(), color);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                label: {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");
    let lower = message.to_ascii_lowercase();

    if lower.contains("no bot token") {
        return (
            "TOKEN_MISSING",
            "No bot token configured. Run: tidewatch token set".to_string(),
        );
    }

    if lower.contains("settings") && lower.contains("no such file") {
        return (
            "SETTINGS_NOT_FOUND",
            format!("{message}. Create it or pass --settings <path>"),
        );
    }

    if lower.contains("timed out") {
        return (
            "NETWORK_TIMEOUT",
            "Search request timed out. Raise search.request_timeout_secs or retry later"
                .to_string(),
        );
    }

    if lower.contains("missing string field") || lower.contains("not valid json") {
        return ("MALFORMED_RESPONSE", message);
    }

    ("ERROR", message)
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_tty_returns_human() {
        assert_eq!(OutputFormat::detect_from_terminal(true), OutputFormat::Human);
    }

    #[test]
    fn detect_pipe_returns_json() {
        assert_eq!(OutputFormat::detect_from_terminal(false), OutputFormat::Json);
    }

    #[test]
    fn detect_json_flag_overrides_tty() {
        assert_eq!(OutputFormat::detect(true), OutputFormat::Json);
    }

    #[test]
    fn write_output_human_format() {
        #[derive(Serialize)]
        struct Found {
            url: String,
        }
        let found = Found { url: "https://twitter.com/Twitter/status/1".into() };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Human, &found, |f| f.url.clone()).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "https://twitter.com/Twitter/status/1\n");
    }

    #[test]
    fn write_output_json_format() {
        #[derive(Serialize)]
        struct Listing {
            key: String,
            known_ids: usize,
        }
        let listing = Listing { key: "alice-".into(), known_ids: 42 };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Json, &listing, |_| {
            unreachable!("human_fn should not be called in JSON mode")
        })
        .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["key"], "alice-");
        assert_eq!(parsed["known_ids"], 42);
    }

    #[test]
    fn print_error_does_not_panic_in_either_format() {
        print_error(OutputFormat::Human, "TEST_ERR", "something broke");
        print_error(OutputFormat::Json, "TEST_ERR", "something broke");
        print_warning(OutputFormat::Json, "WARN", "heads up");
    }

    #[test]
    fn render_human_error_uses_color_for_tty() {
        let line = render_human_stderr_line("error", "boom", true, ANSI_RED);
        assert!(line.contains(ANSI_RED));
        assert!(line.contains(ANSI_RESET));
        assert!(line.contains("boom"));
    }

    #[test]
    fn render_human_warning_without_tty_is_plain() {
        let line = render_human_stderr_line("warning", "careful", false, ANSI_YELLOW);
        assert_eq!(line, "warning: careful");
    }

    #[test]
    fn actionable_error_missing_token() {
        let err = anyhow::anyhow!(
            "no bot token: set `discord_bot_token` in the notifier settings \
             or run `tidewatch token set`"
        );
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "TOKEN_MISSING");
        assert!(message.contains("tidewatch token set"));
    }

    #[test]
    fn actionable_error_missing_settings_file() {
        let err = anyhow::anyhow!("config I/O error: No such file or directory (os error 2)")
            .context("failed to load scanner settings from `/tmp/settings.json`");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "SETTINGS_NOT_FOUND");
        assert!(message.contains("--settings"));
    }

    #[test]
    fn actionable_error_timeout() {
        let err = anyhow::anyhow!("request to `https://twitter.com/i/search` timed out");
        let (code, _) = actionable_error(&err);
        assert_eq!(code, "NETWORK_TIMEOUT");
    }

    #[test]
    fn actionable_error_falls_back_to_message() {
        let err = anyhow::anyhow!("disk on fire");
        assert_eq!(actionable_error(&err), ("ERROR", "disk on fire".to_string()));
    }
}
