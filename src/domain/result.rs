//! Crate-wide result alias

use super::errors::CourierError;

/// Result of a fallible Courier operation
///
/// Read-side lineage queries on [`ReportGraph`](crate::core::lineage::ReportGraph)
/// degrade instead of returning this; writes, strict walks and strict
/// filter evaluation return it.
///
/// ```
/// use courier::domain::{CourierError, Result, Topic};
///
/// fn topic(raw: &str) -> Result<Topic> {
///     Topic::new(raw).map_err(CourierError::Validation)
/// }
///
/// assert!(topic("full-elr").is_ok());
/// assert!(topic("Full ELR").is_err());
/// ```
pub type Result<T> = std::result::Result<T, CourierError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LineageError;

    #[test]
    fn test_lineage_error_propagates_with_question_mark() {
        fn bounded() -> std::result::Result<(), LineageError> {
            Err(LineageError::IterationLimit { limit: 3 })
        }

        fn walk() -> Result<()> {
            bounded()?;
            Ok(())
        }

        assert!(matches!(
            walk(),
            Err(CourierError::Lineage(LineageError::IterationLimit { limit: 3 }))
        ));
    }
}
