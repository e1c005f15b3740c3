//! Shared key generation for storage backends.

use uuid::Uuid;

/// Generate a unique storage key for an owner's upload.
///
/// Every call yields a fresh key, so two uploads of the same file never
/// overwrite each other.
pub fn generate_storage_key(owner_id: Uuid, filename: &str) -> String {
    format!(
        "uploads/{}/{}-{}",
        owner_id,
        Uuid::new_v4().simple(),
        sanitize_filename(filename)
    )
}

/// Reject keys that could escape the storage root.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty() && !key.contains("..") && !key.starts_with('/') && !key.contains('\\')
}

fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let owner = Uuid::new_v4();
        let key = generate_storage_key(owner, "my photo.png");
        assert!(key.starts_with(&format!("uploads/{}/", owner)));
        assert!(key.ends_with("-my_photo.png"));
        assert!(is_safe_key(&key));
    }

    #[test]
    fn test_keys_are_unique() {
        let owner = Uuid::new_v4();
        assert_ne!(
            generate_storage_key(owner, "a.png"),
            generate_storage_key(owner, "a.png")
        );
    }

    #[test]
    fn test_sanitize_strips_paths_and_dots() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("C:\\tmp\\x.jpg"), "x.jpg");
    }

    #[test]
    fn test_unsafe_keys() {
        assert!(!is_safe_key("../etc/passwd"));
        assert!(!is_safe_key("/etc/passwd"));
        assert!(!is_safe_key(""));
    }
}
