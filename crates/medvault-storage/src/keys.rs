//! Shared key generation for storage backends.
//!
//! Client file names are never used verbatim: they are reduced to `[A-Za-z0-9._-]` and
//! always prefixed with the file id, so two uploads can never collide or escape a directory.

use uuid::Uuid;

const MAX_NAME_LEN: usize = 120;

/// Reduce a client-supplied file name to a safe single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }
    let cleaned = cleaned.trim_matches('.');

    let mut cleaned: String = cleaned.chars().take(MAX_NAME_LEN).collect();
    if cleaned.is_empty() {
        cleaned.push_str("file");
    }
    cleaned
}

/// `{file_id}-{sanitized name}`
pub fn stored_file_name(file_id: Uuid, name: &str) -> String {
    format!("{}-{}", file_id, sanitize_file_name(name))
}

/// Object key for remote backends: `documents/{event_id|unassigned}/{file_id}-{name}`.
pub fn remote_object_key(event_id: Option<Uuid>, file_id: Uuid, name: &str) -> String {
    let folder = event_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unassigned".to_string());
    format!("documents/{}/{}", folder, stored_file_name(file_id, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories_and_traversal() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\scan.pdf"), "scan.pdf");
        assert_eq!(sanitize_file_name("a..b.pdf"), "a.b.pdf");
        assert_eq!(sanitize_file_name("résultat sanguin.pdf"), "r_sultat_sanguin.pdf");
    }

    #[test]
    fn test_sanitize_never_returns_empty() {
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name(".."), "file");
    }

    #[test]
    fn test_remote_key_layout() {
        let file_id = Uuid::nil();
        assert_eq!(
            remote_object_key(None, file_id, "x ray.png"),
            format!("documents/unassigned/{}-x_ray.png", file_id)
        );
    }
}
