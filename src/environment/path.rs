//! Search-path list merging.

/// Append `entries` to a separator-delimited path list.
///
/// Existing entries keep their place, empty segments are dropped, and an
/// entry is added only if no existing or already-added entry matches it
/// case-insensitively. Returns the rebuilt value and the entries added.
///
/// # Example
///
/// ```
/// use devprov::environment::merge_path_entries;
///
/// let (value, added) = merge_path_entries("X;Y", &["A", "B"], ';');
/// assert_eq!(value, "X;Y;A;B");
/// assert_eq!(added, vec!["A", "B"]);
///
/// let (value, added) = merge_path_entries(&value, &["a"], ';');
/// assert_eq!(value, "X;Y;A;B");
/// assert!(added.is_empty());
/// ```
pub fn merge_path_entries<S: AsRef<str>>(
    current: &str,
    entries: &[S],
    separator: char,
) -> (String, Vec<String>) {
    let mut parts: Vec<String> = current
        .split(separator)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();

    let mut added = Vec::new();
    for entry in entries {
        let entry = entry.as_ref().trim();
        if entry.is_empty() {
            continue;
        }
        let lowered = entry.to_lowercase();
        if parts.iter().any(|p| p.to_lowercase() == lowered) {
            continue;
        }
        parts.push(entry.to_string());
        added.push(entry.to_string());
    }

    (parts.join(separator.to_string().as_str()), added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_in_given_order() {
        let (value, added) = merge_path_entries("X;Y", &["A", "B"], ';');
        assert_eq!(value, "X;Y;A;B");
        assert_eq!(added, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn second_append_is_a_no_op() {
        let (first, _) = merge_path_entries("X;Y", &["A", "B"], ';');
        let (second, added) = merge_path_entries(&first, &["A"], ';');
        assert_eq!(second, "X;Y;A;B");
        assert!(added.is_empty());
    }

    #[test]
    fn comparison_ignores_case() {
        let (value, added) = merge_path_entries(
            "C:\\Android\\Sdk\\Platform-Tools",
            &["c:\\android\\sdk\\platform-tools", "C:\\Android\\Sdk\\emulator"],
            ';',
        );
        assert_eq!(
            value,
            "C:\\Android\\Sdk\\Platform-Tools;C:\\Android\\Sdk\\emulator"
        );
        assert_eq!(added.len(), 1);
    }

    #[test]
    fn drops_empty_segments_and_trims() {
        let (value, _) = merge_path_entries(" X ;;Y;", &["A"], ';');
        assert_eq!(value, "X;Y;A");
    }

    #[test]
    fn duplicate_new_entries_are_added_once() {
        let (value, added) = merge_path_entries("", &["/a", "/A", "/b"], ':');
        assert_eq!(value, "/a:/b");
        assert_eq!(added, vec!["/a".to_string(), "/b".to_string()]);
    }
}
