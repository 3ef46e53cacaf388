//! Watch list membership.

/// Exact, case-sensitive match against the configured series names.
#[derive(Debug, Clone, Default)]
pub struct WatchFilter {
    subjects: Vec<String>,
}

impl WatchFilter {
    pub fn new(subjects: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            subjects: subjects.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the series is on the watch list.
    pub fn accepts(&self, subject_title: &str) -> bool {
        self.subjects.iter().any(|s| s == subject_title)
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let filter = WatchFilter::new(["One Piece", "Jujutsu Kaisen"]);
        assert!(filter.accepts("One Piece"));
        assert!(filter.accepts("Jujutsu Kaisen"));
    }

    #[test]
    fn test_no_substring_match() {
        let filter = WatchFilter::new(["One Piece"]);
        assert!(!filter.accepts("One Piece Dokoda?!"));
        assert!(!filter.accepts("One"));
        assert!(!filter.accepts("The One Piece"));
    }

    #[test]
    fn test_case_sensitive() {
        let filter = WatchFilter::new(["One Piece"]);
        assert!(!filter.accepts("one piece"));
        assert!(!filter.accepts("ONE PIECE"));
    }

    #[test]
    fn test_empty_list_rejects_all() {
        assert!(!WatchFilter::default().accepts("One Piece"));
    }
}
