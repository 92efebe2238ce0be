//! Versioned aggregates and optimistic version checks.

use crate::error::{DomainError, DomainResult};

/// Aggregate root with a monotonically increasing version.
///
/// Every successful write produces `version() + 1`; the previous version is
/// kept as an immutable snapshot by the persistence collaborator.
pub trait Versioned {
    /// Identifier of the aggregate (entity id, user name, ...).
    fn key(&self) -> &str;

    /// Current version. Versions start at 1 on creation.
    fn version(&self) -> u32;
}

/// Optimistic concurrency expectation for a write: the stored aggregate
/// must be at exactly this version.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(pub u32);

impl ExpectedVersion {
    /// Expectation for writing `next`: the stored version must be `next - 1`.
    pub fn preceding(next: u32) -> Self {
        ExpectedVersion(next.saturating_sub(1))
    }

    pub fn matches(self, actual: u32) -> bool {
        self.0 == actual
    }

    pub fn check(self, actual: u32) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic version check failed (expected: {}, actual: {actual})",
                self.0
            )))
        }
    }
}

/// Check that `next` is the direct successor of `stored`: one version
/// ahead, same key.
pub fn ensure_successor<T: Versioned + ?Sized>(stored: &T, next: &T) -> DomainResult<()> {
    if stored.key() != next.key() {
        return Err(DomainError::invalid_parameter(format!(
            "cannot replace {} with {}",
            stored.key(),
            next.key()
        )));
    }
    if next.version() == stored.version() {
        return Err(DomainError::conflict(format!(
            "{} written without a version increment",
            next.key()
        )));
    }
    ExpectedVersion::preceding(next.version()).check(stored.version())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doc(&'static str, u32);

    impl Versioned for Doc {
        fn key(&self) -> &str {
            self.0
        }

        fn version(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn successor_is_exactly_one_ahead() {
        assert!(ensure_successor(&Doc("a", 1), &Doc("a", 2)).is_ok());
        assert!(matches!(ensure_successor(&Doc("a", 1), &Doc("a", 1)), Err(DomainError::Conflict(_))));
        assert!(matches!(ensure_successor(&Doc("a", 1), &Doc("a", 3)), Err(DomainError::Conflict(_))));
        assert!(matches!(
            ensure_successor(&Doc("a", 1), &Doc("b", 2)),
            Err(DomainError::InvalidParameter(_))
        ));
    }

    #[test]
    fn preceding_expects_previous_version() {
        assert_eq!(ExpectedVersion::preceding(4), ExpectedVersion(3));
        assert!(ExpectedVersion::preceding(4).check(3).is_ok());
        assert!(matches!(
            ExpectedVersion::preceding(4).check(4),
            Err(DomainError::Conflict(_))
        ));
        assert_eq!(ExpectedVersion::preceding(0), ExpectedVersion(0));
    }
}
