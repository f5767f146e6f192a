/// Normalize a page path to the canonical form used as a storage key:
/// leading slash, no trailing slash (except the root page itself), no
/// query or fragment.
pub fn normalize_page_path(raw: &str) -> String {
    let mut path = raw.trim();
    if let Some(idx) = path.find(['?', '#']) {
        path = &path[..idx];
    }
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    format!("/{trimmed}")
}

/// True when the path contains any of the excluded substrings.
pub fn matches_excluded(page_path: &str, excluded: &[String]) -> Option<String> {
    excluded
        .iter()
        .find(|s| !s.is_empty() && page_path.contains(s.as_str()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_slashes_and_suffixes() {
        assert_eq!(normalize_page_path("/eyecare"), "/eyecare");
        assert_eq!(normalize_page_path("eyecare/"), "/eyecare");
        assert_eq!(normalize_page_path("/eyecare?v=3"), "/eyecare");
        assert_eq!(normalize_page_path("/eyecare#team"), "/eyecare");
        assert_eq!(normalize_page_path("/"), "/");
        assert_eq!(normalize_page_path(""), "/");
    }

    #[test]
    fn excluded_substring_match() {
        let excluded = vec!["admin".to_string(), "appointment".to_string()];
        assert_eq!(
            matches_excluded("/admin/content", &excluded),
            Some("admin".to_string())
        );
        assert_eq!(
            matches_excluded("/book-appointment", &excluded),
            Some("appointment".to_string())
        );
        assert_eq!(matches_excluded("/eyecare", &excluded), None);
    }
}
