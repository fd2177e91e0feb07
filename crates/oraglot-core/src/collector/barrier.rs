//! Counting barrier for "N producers, one closer".

use std::sync::{Condvar, Mutex, PoisonError};

use tracing::warn;

#[derive(Debug)]
struct BarrierState {
    outstanding: usize,
    completed: usize,
}

/// Blocks waiters until a fixed number of participants have completed.
#[derive(Debug)]
pub struct CompletionBarrier {
    state: Mutex<BarrierState>,
    done: Condvar,
}

impl CompletionBarrier {
    /// Creates a barrier expecting `participants` completions.
    pub fn new(participants: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                outstanding: participants,
                completed: 0,
            }),
            done: Condvar::new(),
        }
    }

    /// Returns a guard that records one completion when dropped, including
    /// on early return or unwinding.
    pub fn guard(&self) -> CompletionGuard<'_> {
        CompletionGuard { barrier: self }
    }

    fn complete(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.outstanding == 0 {
            warn!("completion signalled on an exhausted barrier");
            return;
        }
        state.outstanding -= 1;
        state.completed += 1;
        if state.outstanding == 0 {
            self.done.notify_all();
        }
    }

    /// Blocks until every participant has completed. Returns the number of
    /// completions observed.
    pub fn wait(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while state.outstanding > 0 {
            state = self
                .done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.completed
    }

    /// Participants that have not completed yet.
    pub fn outstanding(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .outstanding
    }
}

/// Completion token of one participant.
#[must_use = "dropping the guard signals completion immediately"]
pub struct CompletionGuard<'a> {
    barrier: &'a CompletionBarrier,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.barrier.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn zero_participants_does_not_block() {
        let barrier = CompletionBarrier::new(0);
        assert_eq!(barrier.wait(), 0);
    }

    #[test]
    fn wait_returns_after_all_guards_drop() {
        let barrier = CompletionBarrier::new(3);
        let finished = AtomicUsize::new(0);

        thread::scope(|s| {
            for i in 0..3u64 {
                let guard = barrier.guard();
                let finished = &finished;
                s.spawn(move || {
                    thread::sleep(Duration::from_millis(10 * (i + 1)));
                    finished.fetch_add(1, Ordering::SeqCst);
                    drop(guard);
                });
            }

            assert_eq!(barrier.wait(), 3);
            assert_eq!(finished.load(Ordering::SeqCst), 3);
            assert_eq!(barrier.outstanding(), 0);
        });
    }

    #[test]
    fn guard_signals_on_panic() {
        let barrier = CompletionBarrier::new(1);
        thread::scope(|s| {
            let guard = barrier.guard();
            let handle = s.spawn(move || {
                let _guard = guard;
                panic!("collector blew up");
            });
            assert!(handle.join().is_err());
        });
        assert_eq!(barrier.wait(), 1);
    }

    #[test]
    fn extra_completion_is_ignored() {
        let barrier = CompletionBarrier::new(1);
        drop(barrier.guard());
        drop(barrier.guard());
        assert_eq!(barrier.wait(), 1);
    }
}
