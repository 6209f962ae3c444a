// Notification formatting: status URLs, role mentions, size-bounded batches.
//
// Everything here is pure. Delivery lives in the daemon.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::Query;

/// Hard ceiling on a single chat message, in characters.
pub const MESSAGE_CHAR_LIMIT: usize = 2000;

/// Default number of items per message. Ten status URLs plus a mention
/// header stay well under [`MESSAGE_CHAR_LIMIT`].
pub const DEFAULT_CHUNK_SIZE: usize = 10;

const STATUS_URL_PREFIX: &str = "https://twitter.com/Twitter/status/";
const PROFILE_URL_PREFIX: &str = "https://twitter.com/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
}

/// One outbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationBatch {
    pub text: String,
    pub is_first: bool,
}

/// Canonical content URL for an identifier.
pub fn status_url(id: &str) -> String {
    format!("{STATUS_URL_PREFIX}{id}")
}

/// Role mention token. Roles need `@&`, not the plain user `@`.
pub fn role_mention(role_id: u64) -> String {
    format!("<@&{role_id}>")
}

pub fn fits_message_limit(text: &str) -> bool {
    text.chars().count() <= MESSAGE_CHAR_LIMIT
}

/// Split `items` into contiguous groups of at most `chunk_size`, join each
/// group with newlines and prefix `header` to the first group only.
///
/// Empty input yields no batches, so no header is ever sent on its own.
/// Sizing is by item count; callers pick a `chunk_size` whose rendered
/// output stays under [`MESSAGE_CHAR_LIMIT`].
pub fn format_batches<S: AsRef<str>>(
    items: &[S],
    chunk_size: usize,
    header: Option<&str>,
) -> Result<Vec<String>, FormatError> {
    if chunk_size == 0 {
        return Err(FormatError::ZeroChunkSize);
    }

    let formatted = items
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, group)| {
            let body = group.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n");
            match header {
                Some(header) if index == 0 => format!("{header}\n{body}"),
                _ => body,
            }
        })
        .collect();

    Ok(formatted)
}

/// [`format_batches`] with the first-batch flag attached.
pub fn batches<S: AsRef<str>>(
    items: &[S],
    chunk_size: usize,
    header: Option<&str>,
) -> Result<Vec<NotificationBatch>, FormatError> {
    Ok(format_batches(items, chunk_size, header)?
        .into_iter()
        .enumerate()
        .map(|(index, text)| NotificationBatch { text, is_first: index == 0 })
        .collect())
}

/// Human-readable report for one query, one status URL per new item.
pub fn scan_summary<S: AsRef<str>>(query: &Query, new_ids: &[S]) -> String {
    let prefix = format!("- {}: ", query.label());

    let mut lines = Vec::with_capacity(new_ids.len() + 1);
    if new_ids.is_empty() {
        lines.push(format!("{prefix}No new tweets found"));
    } else if query.author.is_empty() {
        lines.push(format!("{prefix}Found {} new tweets! - ({query})", new_ids.len()));
    } else {
        lines.push(format!(
            "{prefix}Found {} new tweets! - {PROFILE_URL_PREFIX}{}",
            new_ids.len(),
            query.author
        ));
    }
    lines.extend(new_ids.iter().map(|id| status_url(id.as_ref())));

    lines.join("\n")
}
