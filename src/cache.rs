use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dto::cart::CartView;

/// Read-through cache for cart snapshots, keyed by user id.
///
/// The relational cart rows stay authoritative: every cart mutation
/// invalidates its entry synchronously before the request returns, so a
/// client re-reading the cart never observes its own write as stale.
pub struct CartCache {
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, CacheEntry>>,
}

struct CacheEntry {
    stored_at: Instant,
    view: CartView,
}

impl CartCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, user_id: Uuid) -> Option<CartView> {
        {
            let entries = self.entries.read().await;
            match entries.get(&user_id) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(entry.view.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: drop the entry so the map does not grow unbounded.
        self.entries.write().await.remove(&user_id);
        None
    }

    pub async fn put(&self, user_id: Uuid, view: CartView) {
        let mut entries = self.entries.write().await;
        entries.insert(
            user_id,
            CacheEntry {
                stored_at: Instant::now(),
                view,
            },
        );
    }

    pub async fn invalidate(&self, user_id: Uuid) {
        self.entries.write().await.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view() -> CartView {
        CartView {
            id: Uuid::new_v4(),
            items: Vec::new(),
            subtotal: 0,
            total_discount: 0,
            total_price: 0,
        }
    }

    #[tokio::test]
    async fn returns_cached_view_before_ttl() {
        let cache = CartCache::new(Duration::from_secs(60));
        let user = Uuid::new_v4();
        let view = sample_view();
        cache.put(user, view.clone()).await;
        assert_eq!(cache.get(user).await.map(|v| v.id), Some(view.id));
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let cache = CartCache::new(Duration::from_millis(20));
        let user = Uuid::new_v4();
        cache.put(user, sample_view()).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get(user).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry_immediately() {
        let cache = CartCache::new(Duration::from_secs(60));
        let user = Uuid::new_v4();
        cache.put(user, sample_view()).await;
        cache.invalidate(user).await;
        assert!(cache.get(user).await.is_none());
    }
}
