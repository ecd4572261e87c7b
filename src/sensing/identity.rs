use std::env;

pub const UNKNOWN_USER: &str = "UnknownUser";

/// Login name of the interactive user, or [`UNKNOWN_USER`].
pub fn resolve_session_identity() -> String {
    match identity_from(|key| env::var(key).ok()) {
        Some(user) => user,
        None => {
            log::error!("Failed to get username; uploading as {UNKNOWN_USER}");
            UNKNOWN_USER.to_string()
        }
    }
}

fn identity_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    let keys: &[&str] = if cfg!(windows) {
        &["USERNAME"]
    } else {
        &["USER", "LOGNAME"]
    };

    keys.iter()
        .filter_map(|key| lookup(*key))
        .map(|name| sanitize(&name))
        .find(|name| !name.is_empty())
}

/// The name becomes a remote directory, so separators are not allowed through.
fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}
