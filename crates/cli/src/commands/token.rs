// `tidewatch token`: bot token kept in the OS keychain.

use std::io::{self, BufRead, IsTerminal};

use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use serde::Serialize;
use tidewatch_daemon::security::{store_bot_token, stored_bot_token, KeychainTokenStore, TokenStore};

use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub action: TokenAction,
}

#[derive(Debug, Subcommand)]
pub enum TokenAction {
    /// Store a bot token. Reads one line from stdin when no value is given.
    Set {
        /// Token value.
        value: Option<String>,
    },
    /// Remove the stored bot token.
    Clear,
    /// Report whether a bot token is stored.
    Status,
}

#[derive(Debug, Clone, Serialize)]
struct TokenStatus {
    stored: bool,
}

pub fn run(args: TokenArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let stored = apply(&KeychainTokenStore, args.action, || read_token(io::stdin().lock()))?;
    print_status(format, stored)?;
    Ok(ExitCode::Success)
}

/// Carry out `action` against `store`. Returns whether a token is stored
/// afterwards.
fn apply(
    store: &impl TokenStore,
    action: TokenAction,
    prompt: impl FnOnce() -> anyhow::Result<String>,
) -> anyhow::Result<bool> {
    match action {
        TokenAction::Set { value } => {
            let value = match value {
                Some(value) => value,
                None => prompt()?,
            };
            store_bot_token(store, &value)?;
            Ok(true)
        }
        TokenAction::Clear => {
            store.clear()?;
            Ok(false)
        }
        TokenAction::Status => Ok(stored_bot_token(store)?.is_some()),
    }
}

fn read_token(mut input: impl BufRead) -> anyhow::Result<String> {
    if io::stdin().is_terminal() {
        eprint!("bot token: ");
    }
    let mut line = String::new();
    input.read_line(&mut line).context("failed to read token from stdin")?;
    let token = line.trim();
    if token.is_empty() {
        bail!("no token given on stdin");
    }
    Ok(token.to_string())
}

fn print_status(format: OutputFormat, stored: bool) -> anyhow::Result<()> {
    output::print_output(format, &TokenStatus { stored }, |status| {
        if status.stored {
            "bot token stored in keychain".to_string()
        } else {
            "no bot token in keychain".to_string()
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryTokenStore(Mutex<Option<String>>);

    impl TokenStore for MemoryTokenStore {
        fn load(&self) -> anyhow::Result<Option<String>> {
            Ok(self.0.lock().expect("token lock poisoned").clone())
        }

        fn save(&self, token: &str) -> anyhow::Result<()> {
            *self.0.lock().expect("token lock poisoned") = Some(token.to_string());
            Ok(())
        }

        fn clear(&self) -> anyhow::Result<()> {
            *self.0.lock().expect("token lock poisoned") = None;
            Ok(())
        }
    }

    fn no_prompt() -> anyhow::Result<String> {
        panic!("value was given on the command line")
    }

    #[test]
    fn set_status_clear_cycle() {
        let store = MemoryTokenStore::default();
        assert!(!apply(&store, TokenAction::Status, no_prompt).unwrap());

        let set = TokenAction::Set { value: Some(" abc.def ".into()) };
        assert!(apply(&store, set, no_prompt).unwrap());
        assert_eq!(store.load().unwrap().as_deref(), Some("abc.def"));
        assert!(apply(&store, TokenAction::Status, no_prompt).unwrap());

        assert!(!apply(&store, TokenAction::Clear, no_prompt).unwrap());
        assert!(!apply(&store, TokenAction::Status, no_prompt).unwrap());
    }

    #[test]
    fn set_without_value_reads_prompt() {
        let store = MemoryTokenStore::default();
        let stored = apply(&store, TokenAction::Set { value: None }, || {
            read_token(Cursor::new("from-stdin\n"))
        })
        .unwrap();
        assert!(stored);
        assert_eq!(store.load().unwrap().as_deref(), Some("from-stdin"));
    }

    #[test]
    fn token_is_read_from_first_line() {
        let token = read_token(Cursor::new("abc.def\nignored\n")).unwrap();
        assert_eq!(token, "abc.def");
    }

    #[test]
    fn blank_input_is_rejected() {
        let error = read_token(Cursor::new("   \n")).expect_err("blank token should fail");
        assert!(error.to_string().contains("no token"));
    }
}
