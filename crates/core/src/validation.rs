//! Input validation utilities.
//!
//! Names that end up on disk are checked here before they reach a storage backend.

use crate::constants::FILE_TIMESTAMP_FORMAT;
use crate::FormsResult;
use chrono::NaiveDateTime;
use medforms_types::FileStem;

/// Longest stem, in bytes, a caller-derived file name may keep.
///
/// Leaves room for a `_<YYYYmmdd_HHMMSS>` suffix and the `.json` extension under the
/// usual 255-byte file-name limit.
pub const MAX_STEM_BYTES: usize = 200;

/// Cuts `name` to at most `max_bytes` bytes without splitting a character.
pub fn truncate_to_bytes(name: &str, max_bytes: usize) -> &str {
    if name.len() <= max_bytes {
        return name;
    }
    let mut end = max_bytes;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Keeps letters and digits of any script, `_`, `-` and spaces. Everything else is dropped,
/// the result is capped at [`MAX_STEM_BYTES`] and trimmed.
pub fn sanitize_document_filename(requested: &str) -> String {
    let kept: String = requested
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' '))
        .collect();
    truncate_to_bytes(&kept, MAX_STEM_BYTES).trim().to_string()
}

/// The stem a document is stored under.
///
/// A requested name that sanitises to nothing falls back to `document_<timestamp>`.
pub fn document_file_stem(requested: &str, now: NaiveDateTime) -> FormsResult<FileStem> {
    let sanitized = sanitize_document_filename(requested);
    let stem = if sanitized.is_empty() {
        format!("document_{}", now.format(FILE_TIMESTAMP_FORMAT))
    } else {
        sanitized
    };
    Ok(FileStem::new(stem)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(9, 5, 7))
            .expect("valid timestamp")
    }

    #[test]
    fn test_sanitize_keeps_unicode_letters() {
        assert_eq!(
            sanitize_document_filename(" ნინო_ბერიძე 2024-03-15 "),
            "ნინო_ბერიძე 2024-03-15"
        );
        assert_eq!(sanitize_document_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_document_filename("a.b;c"), "abc");
    }

    #[test]
    fn test_sanitize_bounds_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_document_filename(&long).len(), MAX_STEM_BYTES);
    }

    #[test]
    fn test_sanitize_caps_multibyte_names_in_bytes() {
        let georgian = "ნ".repeat(100);
        let kept = sanitize_document_filename(&georgian);
        assert!(kept.len() <= MAX_STEM_BYTES);
        assert_eq!(kept.chars().count(), MAX_STEM_BYTES / "ნ".len());
        assert!(kept.chars().all(|c| c == 'ნ'));
    }

    #[test]
    fn test_truncate_to_bytes_respects_char_boundaries() {
        assert_eq!(truncate_to_bytes("short", 10), "short");
        assert_eq!(truncate_to_bytes("აბგ", 7), "აბ");
        assert_eq!(truncate_to_bytes("აბგ", 2), "");
    }

    #[test]
    fn test_document_stem_falls_back_to_timestamp() {
        let stem = document_file_stem("///", now()).expect("fallback");
        assert_eq!(stem.as_str(), "document_20240315_090507");

        let stem = document_file_stem("Nino_2024-03-15", now()).expect("named");
        assert_eq!(stem.as_str(), "Nino_2024-03-15");
    }
}
