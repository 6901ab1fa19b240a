use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};

/// Observable phase of an [`IdleTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdlePhase {
    Unarmed,
    Armed,
    Firing,
}

enum Slot {
    Unarmed,
    Armed {
        generation: u64,
        task: AbortHandle,
    },
    /// The delayed action is running and can no longer be aborted.
    /// `rearm` records an arm request that arrived meanwhile.
    Firing {
        generation: u64,
        rearm: bool,
    },
}

struct Inner {
    slot: Slot,
    next_generation: u64,
}

/// A cancellable delayed action with at most one live instance.
///
/// Every arming gets a generation number. The spawned task must call
/// [`begin_firing`](Self::begin_firing) with its generation before acting; a
/// stale task from an earlier arming is refused.
pub struct IdleTimer {
    inner: Mutex<Inner>,
}

impl Default for IdleTimer {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slot: Slot::Unarmed,
                next_generation: 1,
            }),
        }
    }
}

impl IdleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> IdlePhase {
        match self.inner.lock().slot {
            Slot::Unarmed => IdlePhase::Unarmed,
            Slot::Armed { .. } => IdlePhase::Armed,
            Slot::Firing { .. } => IdlePhase::Firing,
        }
    }

    /// Arms the timer with the task built by `spawn`. No-op (returns `false`)
    /// while already armed or firing.
    pub fn arm<F>(&self, spawn: F) -> bool
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match &mut inner.slot {
            Slot::Armed { .. } => false,
            Slot::Firing { rearm, .. } => {
                *rearm = true;
                false
            }
            Slot::Unarmed => {
                let generation = inner.next_generation;
                inner.next_generation += 1;
                let task = spawn(generation).abort_handle();
                inner.slot = Slot::Armed { generation, task };
                true
            }
        }
    }

    /// Aborts an armed timer. Firing timers are left alone, so the action can
    /// never cancel itself.
    pub fn cancel(&self) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match &mut inner.slot {
            Slot::Armed { task, .. } => {
                task.abort();
                inner.slot = Slot::Unarmed;
                true
            }
            Slot::Firing { rearm, .. } => {
                *rearm = false;
                false
            }
            Slot::Unarmed => false,
        }
    }

    /// Moves `Armed(generation)` to `Firing`. Returns `false` when the timer
    /// was cancelled or re-armed since this generation was spawned.
    pub fn begin_firing(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        match inner.slot {
            Slot::Armed { generation: armed, .. } if armed == generation => {
                inner.slot = Slot::Firing {
                    generation,
                    rearm: false,
                };
                true
            }
            _ => false,
        }
    }

    /// Returns to `Unarmed` after a fire. Yields whether someone asked to arm
    /// the timer while it was firing.
    pub fn finish_firing(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        match inner.slot {
            Slot::Firing {
                generation: firing,
                rearm,
            } if firing == generation => {
                inner.slot = Slot::Unarmed;
                rearm
            }
            _ => false,
        }
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        if let Slot::Armed { task, .. } = &self.inner.get_mut().slot {
            task.abort();
        }
    }
}
