use crate::indexing::EntityId;
use crate::saturation::engine::Interrupter;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// The queue of contexts with pending conclusions, shared by the saturation workers.
///
/// It also counts the workers currently processing a context: saturation is over once the
/// queue is empty and no worker is busy, since only a busy worker may activate new contexts.
#[derive(Debug, Default)]
pub struct ActiveContexts {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<EntityId>,
    busy: usize,
}

impl ActiveContexts {
    /// Enqueues a context that has just been activated.
    pub fn push(&self, root: EntityId) {
        self.lock().queue.push_back(root);
        self.condvar.notify_one();
    }

    /// Waits for the next context to process and marks the caller as busy.
    ///
    /// Returns `None` once saturation is over or `interrupter` is set.
    /// Each returned context must be handed back with [`release`](Self::release).
    pub fn next(&self, interrupter: &Interrupter, poll: Duration) -> Option<EntityId> {
        let mut state = self.lock();
        loop {
            if interrupter.is_interrupted() {
                return None;
            }
            if let Some(root) = state.queue.pop_front() {
                state.busy += 1;
                return Some(root);
            }
            if state.busy == 0 {
                drop(state);
                self.condvar.notify_all();
                return None;
            }
            state = self
                .condvar
                .wait_timeout(state, poll)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Marks the caller as no longer busy.
    pub fn release(&self) {
        let mut state = self.lock();
        state.busy = state.busy.saturating_sub(1);
        let done = state.busy == 0 && state.queue.is_empty();
        drop(state);
        if done {
            self.condvar.notify_all();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn drains_in_fifo_order() {
        let queue = ActiveContexts::default();
        let interrupter = Interrupter::default();
        queue.push(EntityId::from_index(1));
        queue.push(EntityId::from_index(2));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next(&interrupter, POLL), Some(EntityId::from_index(1)));
        queue.release();
        assert_eq!(queue.next(&interrupter, POLL), Some(EntityId::from_index(2)));
        queue.release();
        assert_eq!(queue.next(&interrupter, POLL), None);
    }

    #[test]
    fn waits_for_busy_workers() {
        let queue = Arc::new(ActiveContexts::default());
        let interrupter = Interrupter::default();
        queue.push(EntityId::from_index(0));
        assert_eq!(queue.next(&interrupter, POLL), Some(EntityId::from_index(0)));
        let waiter = {
            let queue = Arc::clone(&queue);
            let interrupter = interrupter.clone();
            thread::spawn(move || queue.next(&interrupter, POLL))
        };
        // The busy worker activates another context before releasing
        thread::sleep(Duration::from_millis(20));
        queue.push(EntityId::from_index(7));
        queue.release();
        assert_eq!(waiter.join().unwrap(), Some(EntityId::from_index(7)));
    }

    #[test]
    fn interruption_keeps_the_queue() {
        let queue = ActiveContexts::default();
        let interrupter = Interrupter::default();
        queue.push(EntityId::from_index(3));
        interrupter.interrupt();
        assert_eq!(queue.next(&interrupter, POLL), None);
        assert_eq!(queue.len(), 1);
    }
}
