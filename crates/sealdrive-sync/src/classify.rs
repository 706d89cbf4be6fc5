//! Inferring encryption state, display name and MIME type from a bare remote entry

use sealdrive_core::RemoteEntry;
use sealdrive_crypto::{is_encrypted_name, strip_marker};

/// Stripped tokens longer than this many characters are not shown to users.
pub const PLACEHOLDER_THRESHOLD: usize = 50;

/// Display name used for encrypted entries whose token is too long to show.
pub const PLACEHOLDER_NAME: &str = "encrypted_file";

/// Content kind reported for directories
pub const DIRECTORY_KIND: &str = "directory";

/// Fallback content kind
pub const OCTET_STREAM: &str = "application/octet-stream";

/// What a listing can tell about an encrypted entry's name without the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptedDisplay {
    /// Token too long to be useful; show [`PLACEHOLDER_NAME`]
    Placeholder,
    /// Marker removed, remaining token shown as-is
    StrippedToken(String),
}

impl EncryptedDisplay {
    fn for_name(name: &str) -> Option<Self> {
        let token = strip_marker(name)?;
        if token.chars().count() > PLACEHOLDER_THRESHOLD {
            Some(EncryptedDisplay::Placeholder)
        } else {
            Some(EncryptedDisplay::StrippedToken(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EncryptedDisplay::Placeholder => PLACEHOLDER_NAME,
            EncryptedDisplay::StrippedToken(token) => token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Directory,
    EncryptedFile { display: EncryptedDisplay },
    PlainFile,
}

/// Classify a listing entry. Pure; never touches the cache or the cipher.
pub fn classify(entry: &RemoteEntry) -> Classification {
    if entry.kind.is_dir() {
        return Classification::Directory;
    }
    match EncryptedDisplay::for_name(&entry.name) {
        Some(display) => Classification::EncryptedFile { display },
        None => Classification::PlainFile,
    }
}

/// Whether the entry's name carries the encrypted-name marker.
pub fn is_encrypted(entry: &RemoteEntry) -> bool {
    is_encrypted_name(&entry.name)
}

/// Best-effort display name for an entry nobody has named yet.
///
/// Marked names lose the marker (or become [`PLACEHOLDER_NAME`]) whatever the
/// entry kind; unmarked names are shown verbatim.
pub fn display_name(entry: &RemoteEntry) -> String {
    match EncryptedDisplay::for_name(&entry.name) {
        Some(display) => display.as_str().to_string(),
        None => entry.name.clone(),
    }
}

/// Content kind: the remote's MIME hint, else `directory`, else the extension table.
pub fn content_kind(entry: &RemoteEntry) -> String {
    if let Some(hint) = entry.mime_hint.as_deref().filter(|h| !h.is_empty()) {
        return hint.to_string();
    }
    if entry.kind.is_dir() {
        return DIRECTORY_KIND.to_string();
    }
    mime_from_name(&entry.name).to_string()
}

/// MIME type guessed from a file name's suffix (case-insensitive).
pub fn mime_from_name(name: &str) -> &'static str {
    const TABLE: &[(&str, &str)] = &[
        (".jpg", "image/jpeg"),
        (".jpeg", "image/jpeg"),
        (".png", "image/png"),
        (".pdf", "application/pdf"),
        (".txt", "text/plain"),
    ];

    let lower = name.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix))
        .map(|(_, mime)| *mime)
        .unwrap_or(OCTET_STREAM)
}
