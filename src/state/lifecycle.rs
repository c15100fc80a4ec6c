/// Lifecycle status definitions for catalog entries
///
/// Status moves are split by owner: the reconciler produces `New` and
/// `Updated`, the staleness sweep produces `Inactive`, and only an operator
/// import produces `Imported`.
use std::fmt;

/// Review/import stage of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStatus {
    /// First sighting of the source URL
    New,

    /// Content changed at the source since the entry was created
    Updated,

    /// Not seen at the source within the staleness window
    Inactive,

    /// Curated by an operator; content is frozen for the pipeline
    Imported,
}

impl LifecycleStatus {
    /// Returns true if the pipeline may overwrite this entry's content
    pub fn accepts_content_updates(&self) -> bool {
        !matches!(self, Self::Imported)
    }

    /// Returns true if the staleness sweep may move this entry to `Inactive`
    pub fn is_sweepable(&self) -> bool {
        matches!(self, Self::New | Self::Updated)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Updated => "updated",
            Self::Inactive => "inactive",
            Self::Imported => "imported",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "updated" => Some(Self::Updated),
            "inactive" => Some(Self::Inactive),
            "imported" => Some(Self::Imported),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all() -> [Self; 4] {
        [Self::New, Self::Updated, Self::Inactive, Self::Imported]
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
