//! Release record data structures.

/// Raw fields scraped for one candidate block.
///
/// Fields missing from the markup are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCandidate {
    /// Subject and chapter number, e.g. "One Piece Chapter 1100"
    pub title: String,

    /// Relative link to the chapter page
    pub link: String,

    /// Chapter sub-title
    pub detail_title: String,

    /// Release time as published by the source
    pub timestamp: String,
}

/// A validated, normalized chapter release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    /// Series name
    pub subject_title: String,

    /// Chapter label, may be fractional ("1100.5")
    pub sequence_label: String,

    /// Chapter sub-title (empty when the source has none)
    pub detail_title: String,

    /// Relative link to the chapter page
    pub link: String,

    /// Release time in RFC3339 wire format
    pub published_at: String,
}

impl ReleaseRecord {
    /// Key that identifies a release across observations.
    pub fn identity_key(&self) -> String {
        format!("{} {}", self.subject_title, self.sequence_label)
    }
}
