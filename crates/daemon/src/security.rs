// Bot token storage and owner-only file modes.
//
// The token can live in the notifier settings file or in the OS keychain.
// The settings file wins when both are set.

use std::path::Path;

use anyhow::{bail, Context, Result};

const KEYRING_SERVICE: &str = "com.tidewatch.daemon";
const TOKEN_ACCOUNT: &str = "discord_bot_token";

/// Somewhere the bot token survives between runs.
pub trait TokenStore {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, token: &str) -> Result<()>;
    /// Removing a token that was never stored is not an error.
    fn clear(&self) -> Result<()>;
}

/// The OS keychain, under one fixed service/account pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeychainTokenStore;

impl KeychainTokenStore {
    fn entry() -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, TOKEN_ACCOUNT)
            .context("failed to open keychain entry for the bot token")
    }
}

impl TokenStore for KeychainTokenStore {
    fn load(&self) -> Result<Option<String>> {
        match Self::entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(error).context("failed to read bot token from keychain"),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        Self::entry()?
            .set_password(token)
            .context("failed to write bot token to keychain")
    }

    fn clear(&self) -> Result<()> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(error).context("failed to remove bot token from keychain"),
        }
    }
}

/// Store `token` with surrounding whitespace removed.
pub fn store_bot_token(store: &impl TokenStore, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("bot token must not be empty");
    }
    store.save(token)
}

/// The stored token, ignoring a blank entry.
pub fn stored_bot_token(store: &impl TokenStore) -> Result<Option<String>> {
    Ok(store
        .load()?
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty()))
}

/// Token from the settings file, falling back to `store`.
pub fn resolve_bot_token(store: &impl TokenStore, configured: &str) -> Result<String> {
    let configured = configured.trim();
    if !configured.is_empty() {
        return Ok(configured.to_string());
    }
    match stored_bot_token(store)? {
        Some(token) => Ok(token),
        None => bail!(
            "no bot token: set `discord_bot_token` in the notifier settings \
             or run `tidewatch token set`"
        ),
    }
}

/// Tighten `path` to owner-only access: 0700 for directories, 0600 for
/// files. A missing path is left alone. No-op off unix.
pub fn restrict_to_owner(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read metadata for `{}`", path.display()))
            }
        };
        let wanted = if metadata.is_dir() { 0o700 } else { 0o600 };
        if metadata.permissions().mode() & 0o777 != wanted {
            fs::set_permissions(path, fs::Permissions::from_mode(wanted))
                .with_context(|| format!("failed to restrict `{}` to owner", path.display()))?;
        }
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct MemoryTokenStore(Mutex<Option<String>>);

    impl TokenStore for MemoryTokenStore {
        fn load(&self) -> Result<Option<String>> {
            Ok(self.0.lock().expect("token lock poisoned").clone())
        }

        fn save(&self, token: &str) -> Result<()> {
            *self.0.lock().expect("token lock poisoned") = Some(token.to_string());
            Ok(())
        }

        fn clear(&self) -> Result<()> {
            *self.0.lock().expect("token lock poisoned") = None;
            Ok(())
        }
    }

    #[test]
    fn stored_token_is_trimmed() {
        let store = MemoryTokenStore::default();
        store_bot_token(&store, "  abc.def\n").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc.def"));
        assert_eq!(stored_bot_token(&store).unwrap().as_deref(), Some("abc.def"));
    }

    #[test]
    fn blank_token_is_rejected() {
        let store = MemoryTokenStore::default();
        assert!(store_bot_token(&store, "  ").is_err());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn blank_stored_entry_counts_as_missing() {
        let store = MemoryTokenStore::default();
        store.save("   ").unwrap();
        assert_eq!(stored_bot_token(&store).unwrap(), None);
    }

    #[test]
    fn configured_token_wins_over_store() {
        let store = MemoryTokenStore::default();
        store_bot_token(&store, "from-keychain").unwrap();
        assert_eq!(resolve_bot_token(&store, " from-file ").unwrap(), "from-file");
    }

    #[test]
    fn store_is_used_when_settings_are_blank() {
        let store = MemoryTokenStore::default();
        store_bot_token(&store, "from-keychain").unwrap();
        assert_eq!(resolve_bot_token(&store, "").unwrap(), "from-keychain");
    }

    #[test]
    fn missing_token_everywhere_is_an_error() {
        let store = MemoryTokenStore::default();
        let error = resolve_bot_token(&store, " ").expect_err("should fail");
        assert!(error.to_string().contains("no bot token"));
    }

    #[cfg(unix)]
    #[test]
    fn restrict_to_owner_picks_mode_by_kind() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().expect("tempdir should be created");
        let dir_path = tmp.path().join("state");
        let file_path = dir_path.join("known_ids.db");
        fs::create_dir_all(&dir_path).unwrap();
        fs::write(&file_path, b"ids").unwrap();
        fs::set_permissions(&dir_path, fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o644)).unwrap();

        restrict_to_owner(&dir_path).unwrap();
        restrict_to_owner(&file_path).unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dir_path), 0o700);
        assert_eq!(mode(&file_path), 0o600);
    }

    #[test]
    fn restrict_to_owner_ignores_missing_path() {
        let tmp = tempdir().expect("tempdir should be created");
        restrict_to_owner(&tmp.path().join("absent")).unwrap();
    }
}
