// tidewatch CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;
mod output;

use exit_code::ExitCode;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "tidewatch", about = "Watch search queries for new posts")]
struct Cli {
    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::detect(cli.json);
    match commands::run(cli.command, format) {
        Ok(code) => code.into(),
        Err(error) => {
            output::print_anyhow_error(format, &error);
            ExitCode::from_error(&error).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_accepts_location_overrides() {
        let cli = Cli::try_parse_from([
            "tidewatch",
            "scan",
            "--settings",
            "/tmp/settings.toml",
            "--db",
            "/tmp/known.db",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            commands::Command::Scan(args) => {
                assert_eq!(
                    args.locations.settings.as_deref(),
                    Some(std::path::Path::new("/tmp/settings.toml"))
                );
                assert!(!args.dry_run);
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn token_set_value_is_optional() {
        let cli = Cli::try_parse_from(["tidewatch", "token", "set"]).unwrap();
        match cli.command {
            commands::Command::Token(args) => {
                assert!(matches!(args.action, commands::token::TokenAction::Set { value: None }));
            }
            _ => panic!("expected token"),
        }
    }
}
