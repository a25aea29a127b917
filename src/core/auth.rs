//! Acting principal used for audit fields.
//!
//! The records core never inspects roles; it only needs a name to write into
//! `created_by`, `modified_by` and `deactivated_by`.

/// Supplies the identity of whoever is performing the current operation.
pub trait AuthContext: Send + Sync {
    /// Name recorded in audit fields.
    fn principal(&self) -> &str;
}

/// A fixed principal, typically taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPrincipal(String);

impl StaticPrincipal {
    /// Wraps a principal name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl AuthContext for StaticPrincipal {
    fn principal(&self) -> &str {
        &self.0
    }
}
