/// Where a (group, user) pair stands.
///
/// Persisted as the presence (`Pending`) or absence (`Unchallenged`) of a
/// `challenge` row; there is no status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VettingState {
    /// Never challenged, or the challenge was resolved. Free to post.
    Unchallenged,
    /// Joined a configured group and has not answered yet.
    Pending,
}

impl VettingState {
    #[must_use]
    pub fn is_vetted(self) -> bool {
        matches!(self, Self::Unchallenged)
    }

    #[must_use]
    pub fn from_vetted(vetted: bool) -> Self {
        if vetted { Self::Unchallenged } else { Self::Pending }
    }
}
