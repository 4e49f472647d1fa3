use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{append_candidate, next_candidate, Member, MemberId, MembershipRegistry};
use crate::error::Result;
use crate::registry_error;

/// Registry kept in process memory, shared by every node of an in-process ring.
#[derive(Debug)]
pub struct InMemoryRegistry {
    entries: Mutex<Vec<MemberId>>,
    available: AtomicBool,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn with_members(members: impl IntoIterator<Item = MemberId>) -> Self {
        Self {
            entries: Mutex::new(members.into_iter().collect()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backing store going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(registry_error!("in-memory registry marked unavailable"))
        }
    }
}

#[async_trait]
impl MembershipRegistry for InMemoryRegistry {
    async fn register(&self, candidate: MemberId) -> Result<Member> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        let member = append_candidate(&mut entries, candidate);
        Ok(member)
    }

    async fn register_next(&self, base: MemberId) -> Result<Member> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        let candidate = next_candidate(&entries, base)?;
        let member = append_candidate(&mut entries, candidate);
        Ok(member)
    }

    async fn snapshot(&self) -> Result<Vec<MemberId>> {
        self.check_available()?;
        Ok(self.entries.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RingError;

    #[tokio::test]
    async fn test_register_assigns_positions_in_order() {
        let registry = InMemoryRegistry::new();
        let first = registry.register(MemberId::new(7)).await.unwrap();
        let second = registry.register(MemberId::new(3)).await.unwrap();
        assert!(first.starts_with_token());
        assert!(!second.starts_with_token());
        assert_eq!(second.join_order, 1);
        assert_eq!(
            registry.snapshot().await.unwrap(),
            vec![MemberId::new(7), MemberId::new(3)]
        );
    }

    #[tokio::test]
    async fn test_register_next_allocates_sequential_ids() {
        let registry = InMemoryRegistry::new();
        let base = MemberId::new(50000);
        let a = registry.register_next(base).await.unwrap();
        let b = registry.register_next(base).await.unwrap();
        assert_eq!(a.id, base);
        assert_eq!(b.id, MemberId::new(50001));
        assert_eq!(b.join_order, 1);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let registry = InMemoryRegistry::with_members([MemberId::new(1)]);
        registry.set_available(false);
        assert!(matches!(
            registry.snapshot().await,
            Err(RingError::RegistryUnavailable(_))
        ));
        registry.set_available(true);
        assert_eq!(registry.snapshot().await.unwrap().len(), 1);
    }
}
