//! State and failure codes for searches and navigation requests

/// Lifecycle of a resumable search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchState {
    /// Never initialized
    #[default]
    Uninitialized,
    /// Seeded with a start node, no iteration run yet
    Initialized,
    /// At least one iteration run, more needed
    Processing,
    /// A path was found
    Complete,
    /// The open set emptied without reaching the goal
    Failed,
}

impl SearchState {
    /// True for `Complete` and `Failed`.
    pub fn is_finished(self) -> bool {
        matches!(self, SearchState::Complete | SearchState::Failed)
    }
}

impl std::fmt::Display for SearchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchState::Uninitialized => write!(f, "Uninitialized"),
            SearchState::Initialized => write!(f, "Initialized"),
            SearchState::Processing => write!(f, "Processing"),
            SearchState::Complete => write!(f, "Complete"),
            SearchState::Failed => write!(f, "Failed"),
        }
    }
}

/// State of a navigation request as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum NavRequestState {
    #[default]
    Processing,
    Complete,
    Failed,
}

impl NavRequestState {
    pub fn is_finished(self) -> bool {
        self != NavRequestState::Processing
    }
}

impl std::fmt::Display for NavRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavRequestState::Processing => write!(f, "Processing"),
            NavRequestState::Complete => write!(f, "Complete"),
            NavRequestState::Failed => write!(f, "Failed"),
        }
    }
}

/// Why a request finished in the `Failed` state.
///
/// These are normal runtime outcomes. They are recorded on the request
/// rather than returned as errors.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum NavFailure {
    #[error("location could not be snapped to the navigation mesh")]
    InvalidLocation,
    #[error("search exhausted without reaching the goal")]
    SearchExhausted,
    #[error("repair search found no reconnection within its depth")]
    RepairExhausted,
    #[error("navigator or path was disposed")]
    Disposed,
    #[error("request was discarded")]
    Cancelled,
}
