//! Stable names computed once and never changed afterwards.

use crate::state::{Databag, UnitContext};

/// Suffix every file daemon name carries.
pub const FD_SUFFIX: &str = "-fd";

/// Publishes identities from exactly one writer.
///
/// The leader computes an identity the first time it finds it absent. Every
/// other unit only ever reads it and waits while it is missing.
#[derive(Debug, Clone, Copy)]
pub struct IdentityAllocator {
    leader: bool,
}

impl IdentityAllocator {
    pub fn new(leader: bool) -> Self {
        Self { leader }
    }

    /// Returns the identity stored under `key`, publishing `factory()` first
    /// if this unit is the leader and nothing has been published yet.
    /// `None` means the caller has to wait for the leader.
    pub fn ensure<F>(&self, databag: &mut Databag, key: &str, factory: F) -> Option<String>
    where
        F: FnOnce() -> String,
    {
        if let Some(existing) = databag.get(key) {
            return Some(existing.clone());
        }
        if !self.leader {
            return None;
        }

        let identity = factory();
        log::info!("Publishing identity {}={}", key, identity);
        databag.insert(key.to_string(), identity.clone());
        Some(identity)
    }
}

/// Name of the file daemon for `unit`:
/// `relation-<model>-<unit>-<last uuid segment>-fd`.
pub fn fd_identity(unit: &UnitContext) -> String {
    let uuid_tail = unit
        .model_uuid
        .rsplit('-')
        .next()
        .unwrap_or(&unit.model_uuid);
    format!(
        "relation-{}-{}-{}{}",
        unit.model_name,
        unit.unit_name.replace('/', "-"),
        uuid_tail,
        FD_SUFFIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> UnitContext {
        UnitContext {
            model_name: "prod".to_string(),
            model_uuid: "1b2c3d4e-0000-1111-2222-abcdef012345".to_string(),
            app_name: "ubuntu".to_string(),
            unit_name: "ubuntu/2".to_string(),
            leader: true,
        }
    }

    #[test]
    fn test_fd_identity_format() {
        assert_eq!(
            fd_identity(&unit()),
            "relation-prod-ubuntu-2-abcdef012345-fd"
        );
    }

    #[test]
    fn test_leader_publishes_once() {
        let allocator = IdentityAllocator::new(true);
        let mut databag = Databag::new();

        let first = allocator.ensure(&mut databag, "name", || "one".to_string());
        let second = allocator.ensure(&mut databag, "name", || "two".to_string());

        assert_eq!(first.as_deref(), Some("one"));
        assert_eq!(second.as_deref(), Some("one"));
    }

    #[test]
    fn test_follower_never_writes() {
        let allocator = IdentityAllocator::new(false);
        let mut databag = Databag::new();

        assert_eq!(
            allocator.ensure(&mut databag, "name", || "mine".to_string()),
            None
        );
        assert!(databag.is_empty());

        databag.insert("name".to_string(), "leaders".to_string());
        assert_eq!(
            allocator.ensure(&mut databag, "name", || "mine".to_string()),
            Some("leaders".to_string())
        );
    }
}
