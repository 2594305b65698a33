use std::future::Future;
use tokio::sync::{Mutex, MutexGuard};

/// Hands out nonces for the single keeper identity.
///
/// Seeded lazily from the chain, then counted locally. Nonces are only
/// handed out through a [`NonceLease`], which holds the allocator for as
/// long as the holder is broadcasting. While a lease is live no other
/// submission can reserve, so a lease may reset the counter after a failed
/// broadcast without touching nonces another submission still has to send.
#[derive(Debug, Default)]
pub struct NonceAllocator {
    next: Mutex<Option<u64>>,
}

/// Exclusive hold on a [`NonceAllocator`]. Keep it until every transaction
/// using the reserved nonces has been broadcast or has failed.
#[derive(Debug)]
pub struct NonceLease<'a> {
    next: MutexGuard<'a, Option<u64>>,
}

impl NonceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of the allocator.
    pub async fn lease(&self) -> NonceLease<'_> {
        NonceLease {
            next: self.next.lock().await,
        }
    }

    /// Next nonce that would be handed out, if seeded.
    pub async fn peek(&self) -> Option<u64> {
        *self.next.lock().await
    }
}

impl NonceLease<'_> {
    /// Reserve `count` consecutive nonces and return the first one.
    /// `fetch` reads the pending transaction count and is only called when
    /// the counter is unseeded.
    pub async fn reserve<F, Fut, E>(&mut self, count: u64, fetch: F) -> Result<u64, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, E>>,
    {
        let first = match *self.next {
            Some(n) => n,
            None => fetch().await?,
        };
        *self.next = Some(first + count);
        Ok(first)
    }

    /// Forget the local counter; the next reservation re-reads the chain.
    pub fn reset(&mut self) {
        *self.next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fetch closure reading a fake pending transaction count.
    fn chain(pending: &Arc<AtomicU64>) -> impl FnOnce() -> std::future::Ready<Result<u64, String>> {
        let pending = Arc::clone(pending);
        move || std::future::ready(Ok(pending.load(Ordering::SeqCst)))
    }

    #[tokio::test]
    async fn test_seeds_once_then_counts() {
        let allocator = NonceAllocator::new();
        let fetches = AtomicUsize::new(0);
        let counter = &fetches;
        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<u64, String>(7)
        };

        assert_eq!(allocator.lease().await.reserve(2, fetch).await.unwrap(), 7);
        assert_eq!(allocator.lease().await.reserve(2, fetch).await.unwrap(), 9);
        assert_eq!(allocator.peek().await, Some(11));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_reseeds_from_chain() {
        let allocator = NonceAllocator::new();
        let mut lease = allocator.lease().await;
        lease.reserve(2, || async { Ok::<u64, String>(0) }).await.unwrap();
        lease.reset();
        drop(lease);

        let first = allocator
            .lease()
            .await
            .reserve(2, || async { Ok::<u64, String>(1) })
            .await
            .unwrap();
        assert_eq!(first, 1);
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_allocator_unseeded() {
        let allocator = NonceAllocator::new();
        let err = allocator
            .lease()
            .await
            .reserve(2, || async { Err::<u64, String>("rpc down".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "rpc down");
        assert_eq!(allocator.peek().await, None);
    }

    #[tokio::test]
    async fn test_failed_broadcast_cannot_reissue_an_unsent_nonce() {
        let allocator = Arc::new(NonceAllocator::new());
        let pending = Arc::new(AtomicU64::new(5));

        // First submission reserves its pair and is still broadcasting.
        let mut first = allocator.lease().await;
        let first_nonce = first.reserve(2, chain(&pending)).await.unwrap();
        assert_eq!(first_nonce, 5);

        // A second submission reserves, fails and resets meanwhile.
        let second = tokio::spawn({
            let allocator = Arc::clone(&allocator);
            let pending = Arc::clone(&pending);
            async move {
                let mut lease = allocator.lease().await;
                let nonce = lease.reserve(2, chain(&pending)).await.unwrap();
                lease.reset();
                nonce
            }
        });
        tokio::task::yield_now().await;
        assert!(!second.is_finished());

        // Both transactions of the first pair reach the mempool.
        pending.store(7, Ordering::SeqCst);
        drop(first);
        let second_nonce = second.await.unwrap();
        assert_eq!(second_nonce, 7);

        // A third submission re-reads the chain after the reset.
        let third_nonce = allocator.lease().await.reserve(2, chain(&pending)).await.unwrap();
        assert_eq!(third_nonce, 7);
        assert!(third_nonce >= first_nonce + 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_never_overlap() {
        let allocator = Arc::new(NonceAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let allocator = Arc::clone(&allocator);
            handles.push(tokio::spawn(async move {
                let mut lease = allocator.lease().await;
                lease
                    .reserve(2, || async {
                        tokio::task::yield_now().await;
                        Ok::<u64, String>(100)
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut used = HashSet::new();
        for handle in handles {
            let first = handle.await.unwrap();
            assert!(used.insert(first));
            assert!(used.insert(first + 1));
        }
        assert_eq!(used.len(), 64);
        assert_eq!(allocator.peek().await, Some(164));
    }
}
