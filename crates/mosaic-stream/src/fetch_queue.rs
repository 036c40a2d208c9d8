use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use mosaic_core::types::TileId;

use crate::normalize::TilePixels;

/// A fetched, normalized tile waiting to be staged.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub tile: TileId,
    pub pixels: TilePixels,
}

/// Request/result channel pair shared by the consumer and the fetch worker.
///
/// Requests flow consumer → worker and are replaced wholesale every frame, so
/// stale requests never pile up. Results flow worker → consumer and are capped
/// at `max_outstanding` items. Each list has its own lock and every critical
/// section is a single swap, push, or pop; the two locks are never held
/// together.
///
/// A tile taken by the worker stays pending until its result is popped or
/// the worker releases it after a failed fetch. Pending tiles are left out of
/// new request lists, so a tile is never fetched twice while one copy is in
/// flight.
pub struct FetchQueue {
    requests: Mutex<RequestState>,
    results: Mutex<VecDeque<FetchResult>>,
    max_outstanding: usize,
}

#[derive(Default)]
struct RequestState {
    list: VecDeque<TileId>,
    /// Being fetched, or sitting in the result list.
    pending: HashSet<TileId>,
}

/// Lock ignoring poison: no user code runs while these locks are held, so a
/// panic elsewhere cannot leave the lists half-updated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FetchQueue {
    pub fn new(max_outstanding: usize) -> Self {
        Self {
            requests: Mutex::new(RequestState::default()),
            results: Mutex::new(VecDeque::with_capacity(max_outstanding)),
            max_outstanding,
        }
    }

    /// Replace the outgoing request list. Latest wins: anything the worker has
    /// not yet picked up from the previous list is discarded. Duplicate tiles
    /// keep their first position; pending tiles are skipped.
    pub fn set_requested(&self, tiles: impl IntoIterator<Item = TileId>) {
        let mut seen = HashSet::new();
        let next: VecDeque<TileId> = tiles.into_iter().filter(|t| seen.insert(*t)).collect();
        let mut state = lock(&self.requests);
        state.list = next;
        let RequestState { list, pending } = &mut *state;
        list.retain(|t| !pending.contains(t));
    }

    /// Take the head request, if any, and mark it pending.
    pub fn pop_next_request(&self) -> Option<TileId> {
        let mut state = lock(&self.requests);
        let tile = state.list.pop_front()?;
        state.pending.insert(tile);
        Some(tile)
    }

    /// Drop the pending mark of a tile whose fetch failed, so the next
    /// request list may ask for it again.
    pub fn release(&self, tile: TileId) {
        lock(&self.requests).pending.remove(&tile);
    }

    /// Append a result unless the result list is at capacity, in which case
    /// the item is handed back untouched.
    pub fn push_result(&self, item: FetchResult) -> Result<(), FetchResult> {
        let mut results = lock(&self.results);
        if results.len() >= self.max_outstanding {
            return Err(item);
        }
        results.push_back(item);
        Ok(())
    }

    /// Take the oldest completed result, if any. Never blocks on the worker.
    ///
    /// The tile stops being pending and is also removed from the current
    /// request list, which was built before this result arrived.
    pub fn pop_result(&self) -> Option<FetchResult> {
        let result = lock(&self.results).pop_front()?;
        let mut state = lock(&self.requests);
        state.pending.remove(&result.tile);
        state.list.retain(|t| *t != result.tile);
        Some(result)
    }

    /// Whether the worker must hold off pushing more results.
    pub fn results_full(&self) -> bool {
        lock(&self.results).len() >= self.max_outstanding
    }

    pub fn request_len(&self) -> usize {
        lock(&self.requests).list.len()
    }

    /// Tiles taken by the worker whose results have not been consumed.
    pub fn pending_len(&self) -> usize {
        lock(&self.requests).pending.len()
    }

    pub fn result_len(&self) -> usize {
        lock(&self.results).len()
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn result(x: i32) -> FetchResult {
        FetchResult {
            tile: TileId::new(x, 0, 0),
            pixels: TilePixels::solid(2, 2, [x as u8, 0, 0, 255]),
        }
    }

    #[test]
    fn test_set_requested_replaces_and_dedups() {
        let queue = FetchQueue::new(2);
        queue.set_requested([TileId::new(0, 0, 0), TileId::new(1, 0, 0)]);
        queue.set_requested([
            TileId::new(5, 0, 0),
            TileId::new(6, 0, 0),
            TileId::new(5, 0, 0),
        ]);
        assert_eq!(queue.request_len(), 2);
        assert_eq!(queue.pop_next_request(), Some(TileId::new(5, 0, 0)));
        assert_eq!(queue.pop_next_request(), Some(TileId::new(6, 0, 0)));
        assert_eq!(queue.pop_next_request(), None);
    }

    #[test]
    fn test_pending_tiles_not_requested_again() {
        let queue = FetchQueue::new(2);
        let a = TileId::new(1, 0, 0);
        let b = TileId::new(2, 0, 0);
        queue.set_requested([a, b]);
        assert_eq!(queue.pop_next_request(), Some(a));
        assert_eq!(queue.pending_len(), 1);

        // `a` is being fetched: a fresh list built from the same missing set
        // must not hand it out again.
        queue.set_requested([a, b]);
        assert_eq!(queue.request_len(), 1);
        assert_eq!(queue.pop_next_request(), Some(b));
        assert_eq!(queue.pop_next_request(), None);
    }

    #[test]
    fn test_pop_result_clears_pending_and_stale_request() {
        let queue = FetchQueue::new(2);
        let a = TileId::new(1, 0, 0);
        queue.set_requested([a]);
        assert_eq!(queue.pop_next_request(), Some(a));
        queue.push_result(result(1)).expect("room");

        // The consumer rebuilt its list before popping this frame's result.
        queue.set_requested([a, TileId::new(9, 0, 0)]);
        assert_eq!(queue.request_len(), 1);
        queue.set_requested([TileId::new(9, 0, 0), a]);
        assert_eq!(queue.pop_result().map(|r| r.tile), Some(a));
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.pop_next_request(), Some(TileId::new(9, 0, 0)));
        assert_eq!(queue.pop_next_request(), None);
    }

    #[test]
    fn test_release_allows_request_again() {
        let queue = FetchQueue::new(2);
        let a = TileId::new(3, 2, 0);
        queue.set_requested([a]);
        assert_eq!(queue.pop_next_request(), Some(a));
        queue.set_requested([a]);
        assert_eq!(queue.request_len(), 0);

        queue.release(a);
        queue.set_requested([a]);
        assert_eq!(queue.pop_next_request(), Some(a));
    }

    #[test]
    fn test_push_result_respects_capacity() {
        let queue = FetchQueue::new(2);
        assert!(queue.push_result(result(0)).is_ok());
        assert!(!queue.results_full());
        assert!(queue.push_result(result(1)).is_ok());
        assert!(queue.results_full());

        let rejected = queue.push_result(result(2)).unwrap_err();
        assert_eq!(rejected.tile, TileId::new(2, 0, 0));
        assert_eq!(queue.result_len(), 2);

        // FIFO drain
        assert_eq!(queue.pop_result().map(|r| r.tile), Some(TileId::new(0, 0, 0)));
        assert!(!queue.results_full());
        assert_eq!(queue.pop_result().map(|r| r.tile), Some(TileId::new(1, 0, 0)));
        assert!(queue.pop_result().is_none());
    }

    #[test]
    fn test_result_len_bounded_under_contention() {
        let queue = Arc::new(FetchQueue::new(2));
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let _ = queue.push_result(result(p * 1000 + i));
                        assert!(queue.result_len() <= 2);
                    }
                })
            })
            .collect();

        for _ in 0..2000 {
            assert!(queue.result_len() <= queue.max_outstanding());
            let _ = queue.pop_result();
        }
        for handle in producers {
            handle.join().expect("producer thread panicked");
        }
        assert!(queue.result_len() <= 2);
    }
}
