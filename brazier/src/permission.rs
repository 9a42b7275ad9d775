//! Permission resolution and sender requirements.
//!
//! The library never decides who holds a permission; commands carry
//! permission strings and the host supplies a [`PermissionChecker`].

use std::fmt;
use std::sync::Arc;

/// Host-side permission resolution.
pub trait PermissionChecker<S>: Send + Sync {
    /// `true` when `sender` holds `permission`.
    fn has_permission(&self, sender: &S, permission: &str) -> bool;
}

impl<S, F> PermissionChecker<S> for F
where
    F: Fn(&S, &str) -> bool + Send + Sync,
{
    fn has_permission(&self, sender: &S, permission: &str) -> bool {
        self(sender, permission)
    }
}

/// The default checker: every sender holds every permission.
pub struct AllowAll;

impl<S> PermissionChecker<S> for AllowAll {
    fn has_permission(&self, _sender: &S, _permission: &str) -> bool {
        true
    }
}

/// A named predicate restricting which senders may run a command.
///
/// Hosts usually model senders as one enum, so the restriction is a predicate
/// over the sender value rather than a type check; the name appears in the
/// `InvalidSender` error when the predicate rejects.
pub struct SenderRequirement<S> {
    name: Arc<str>,
    test: Arc<dyn Fn(&S) -> bool + Send + Sync>,
}

impl<S> SenderRequirement<S> {
    /// Creates a requirement with a display name and a predicate.
    pub fn new(
        name: impl Into<Arc<str>>,
        test: impl Fn(&S) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            test: Arc::new(test),
        }
    }

    /// The requirement's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates the predicate.
    pub fn accepts(&self, sender: &S) -> bool {
        (self.test)(sender)
    }
}

impl<S> Clone for SenderRequirement<S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            test: Arc::clone(&self.test),
        }
    }
}

impl<S> fmt::Debug for SenderRequirement<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SenderRequirement").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_evaluates_its_predicate() {
        let console_only = SenderRequirement::new("console", |sender: &&str| *sender == "console");
        assert!(console_only.accepts(&"console"));
        assert!(!console_only.accepts(&"player"));
        assert_eq!(console_only.name(), "console");
    }
}
