use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use relay_core::domain::session::ConversationId;

/// One async mutex per conversation identity. Holding the guard serializes
/// the load/handle/save cycle for that identity while other conversations
/// proceed independently.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    inner: Arc<Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>>,
}

impl ConversationLocks {
    pub async fn acquire(&self, id: &ConversationId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.inner.lock().await;
            slots.entry(id.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        slot.lock_owned().await
    }

    pub async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relay_core::domain::session::ConversationId;

    use super::ConversationLocks;

    #[tokio::test]
    async fn same_identity_is_serialized() {
        let locks = ConversationLocks::default();
        let id = ConversationId("whatsapp:+15550000001".to_string());

        let guard = locks.acquire(&id).await;
        let contender = {
            let locks = locks.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished(), "second acquire should wait for the first guard");

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should finish once released")
            .expect("join contender");
    }

    #[tokio::test]
    async fn different_identities_do_not_block() {
        let locks = ConversationLocks::default();
        let _first = locks.acquire(&ConversationId("a".to_string())).await;

        tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire(&ConversationId("b".to_string())),
        )
        .await
        .expect("other identity should not wait");

        assert_eq!(locks.tracked().await, 2);
    }
}
