// Consistent exit codes for the tidewatch CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument/settings error
//  -1  = malformed search response (255 as a process status)

use std::process;

use tidewatch_daemon::config::ConfigError;
use tidewatch_daemon::scan::ScanError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    MalformedResponse = -1,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(scan_err) = cause.downcast_ref::<ScanError>() {
                if scan_err.is_extraction() {
                    return Self::MalformedResponse;
                }
            }
            if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
                return match config_err {
                    ConfigError::Parse(_) | ConfigError::Invalid(_) => Self::Usage,
                    ConfigError::Io(_) | ConfigError::Serialize(_) => Self::Error,
                };
            }
        }

        Self::Error
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_daemon::scan::ExtractionError;

    #[test]
    fn exit_code_values() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Error.code(), 1);
        assert_eq!(ExitCode::Usage.code(), 2);
        assert_eq!(ExitCode::MalformedResponse.code(), -1);
    }

    #[test]
    fn malformed_response_wraps_to_255() {
        assert_eq!(ExitCode::MalformedResponse.code() as u8, 255);
    }

    #[test]
    fn from_error_extraction_in_chain() {
        let err = anyhow::Error::new(ScanError::Extraction {
            key: "alice-".into(),
            source: ExtractionError::MissingField("items_html"),
        })
        .context("scan failed");
        assert_eq!(ExitCode::from_error(&err), ExitCode::MalformedResponse);
    }

    #[test]
    fn from_error_persistence_is_general_error() {
        let err = anyhow::Error::new(ScanError::Persistence { message: "disk full".into() });
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
    }

    #[test]
    fn from_error_invalid_settings_is_usage() {
        let err = anyhow::Error::new(ConfigError::Invalid("query #0 is empty".into()));
        assert_eq!(ExitCode::from_error(&err), ExitCode::Usage);
    }

    #[test]
    fn from_error_missing_settings_file_is_error() {
        let err = anyhow::Error::new(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        )));
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
    }

    #[test]
    fn from_error_generic_is_error() {
        let err = anyhow::anyhow!("something went wrong");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
    }
}
