//! Collective communication between the ranks of a group.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::thread;

const PEER_PANICKED: &str = "a peer rank panicked while this rank was waiting in a collective operation";
const TYPE_MISMATCH: &str = "ranks called the same collective operation with different payload types";

type Slot = Option<Box<dyn Any + Send>>;

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: usize,
    poisoned: bool,
}

/// A reusable barrier that releases waiting ranks with a panic if another rank of the group
/// panics, instead of blocking forever.
#[derive(Debug)]
struct GroupBarrier {
    size: usize,
    state: Mutex<BarrierState>,
    condvar: Condvar,
}

impl GroupBarrier {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                poisoned: false,
            }),
            condvar: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut state = self.state.lock();
        if state.poisoned {
            drop(state);
            panic!("{}", PEER_PANICKED);
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.condvar.notify_all();
        } else {
            while state.generation == generation && !state.poisoned {
                self.condvar.wait(&mut state);
            }
            if state.generation == generation {
                drop(state);
                panic!("{}", PEER_PANICKED);
            }
        }
    }

    fn poison(&self) {
        let mut state = self.state.lock();
        state.poisoned = true;
        self.condvar.notify_all();
    }
}

struct Shared {
    size: usize,
    barrier: GroupBarrier,
    slots: Mutex<Vec<Slot>>,
}

/// Handle through which a rank participates in the collective operations of its group.
///
/// All methods except the accessors are *collective*: every rank of the group must call them,
/// in the same order, with payloads of the same type. Results of reductions are combined in
/// rank order, so they are bitwise identical on all ranks and reproducible between runs.
#[derive(Clone)]
pub struct Communicator {
    rank: usize,
    shared: Arc<Shared>,
}

impl Debug for Communicator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.rank)
            .field("size", &self.size())
            .finish()
    }
}

impl Communicator {
    fn group(size: usize) -> Vec<Self> {
        assert!(size > 0, "a communicator group needs at least one rank");
        let shared = Arc::new(Shared {
            size,
            barrier: GroupBarrier::new(size),
            slots: Mutex::new((0..size).map(|_| None).collect()),
        });
        (0..size)
            .map(|rank| Self {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// A communicator for a group consisting only of the calling thread.
    pub fn serial() -> Self {
        Self::group(1).remove(0)
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Whether this is rank 0, the rank responsible for console output and shared files.
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    pub fn barrier(&self) {
        self.shared.barrier.wait();
    }

    /// Deposits `value` in this rank's slot, lets `read` inspect all slots once every rank has
    /// deposited, and clears the slot again.
    fn exchange<T, R>(&self, value: T, read: impl FnOnce(&mut [Slot]) -> R) -> R
    where
        T: Send + 'static,
    {
        self.shared.slots.lock()[self.rank] = Some(Box::new(value));
        self.shared.barrier.wait();
        let result = read(&mut self.shared.slots.lock());
        self.shared.barrier.wait();
        self.shared.slots.lock()[self.rank] = None;
        result
    }

    /// Gathers one value from every rank, returned in rank order on every rank.
    pub fn all_gather<T>(&self, value: T) -> Vec<T>
    where
        T: Clone + Send + 'static,
    {
        self.exchange(value, |slots| {
            slots
                .iter()
                .map(|slot| {
                    slot.as_ref()
                        .and_then(|payload| payload.downcast_ref::<T>())
                        .expect(TYPE_MISMATCH)
                        .clone()
                })
                .collect()
        })
    }

    /// Personalized exchange: entry `q` of `send` is delivered to rank `q`.
    ///
    /// Returns the entries addressed to this rank, indexed by the sending rank.
    ///
    /// # Panics
    ///
    /// Panics if `send` does not contain exactly one entry per rank.
    pub fn all_to_all<T>(&self, send: Vec<T>) -> Vec<T>
    where
        T: Send + 'static,
    {
        assert_eq!(send.len(), self.size(), "all_to_all needs one entry per rank");
        let outgoing: Vec<Option<T>> = send.into_iter().map(Some).collect();
        let rank = self.rank;
        self.exchange(outgoing, |slots| {
            slots
                .iter_mut()
                .map(|slot| {
                    slot.as_mut()
                        .and_then(|payload| payload.downcast_mut::<Vec<Option<T>>>())
                        .and_then(|entries| entries[rank].take())
                        .expect(TYPE_MISMATCH)
                })
                .collect()
        })
    }

    /// Sum of `value` over all ranks.
    pub fn all_reduce_sum(&self, value: f64) -> f64 {
        self.all_gather(value).into_iter().sum()
    }

    /// Sum of `value` over all ranks.
    pub fn all_reduce_sum_usize(&self, value: usize) -> usize {
        self.all_gather(value).into_iter().sum()
    }

    /// Maximum of `value` over all ranks. NaN values propagate.
    pub fn all_reduce_max(&self, value: f64) -> f64 {
        self.all_gather(value)
            .into_iter()
            .fold(f64::NEG_INFINITY, |max, x| if x.is_nan() || x > max { x } else { max })
    }

    /// Whether `flag` holds on any rank.
    pub fn all_reduce_or(&self, flag: bool) -> bool {
        self.all_gather(flag).into_iter().any(|f| f)
    }
}

/// Entry point for running a function on a group of ranks.
#[derive(Debug, Clone, Copy)]
pub struct Universe;

impl Universe {
    /// Runs `f` on `size` ranks and returns the per-rank results in rank order.
    ///
    /// A single rank runs on the calling thread. Otherwise every rank runs on its own scoped
    /// thread. If a rank panics, ranks blocked in collectives are released and the panic is
    /// propagated to the caller.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or if any rank panics.
    pub fn run<F, R>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(Communicator) -> R + Sync,
        R: Send,
    {
        let communicators = Communicator::group(size);
        if size == 1 {
            return communicators.into_iter().map(&f).collect();
        }

        thread::scope(|scope| {
            let handles: Vec<_> = communicators
                .into_iter()
                .map(|comm| {
                    let f = &f;
                    thread::Builder::new()
                        .name(format!("rank-{}", comm.rank()))
                        .spawn_scoped(scope, move || {
                            let _guard = PoisonOnPanic(Arc::clone(&comm.shared));
                            f(comm)
                        })
                        .expect("failed to spawn rank thread")
                })
                .collect();

            let mut results = Vec::with_capacity(size);
            let mut first_panic: Option<(bool, Box<dyn Any + Send>)> = None;
            for handle in handles {
                match handle.join() {
                    Ok(result) => results.push(result),
                    Err(payload) => {
                        let released = payload
                            .downcast_ref::<String>()
                            .map_or(false, |message| message == PEER_PANICKED);
                        // Prefer the panic that caused the others over the released ranks
                        let replace = match &first_panic {
                            None => true,
                            Some((previous_released, _)) => *previous_released && !released,
                        };
                        if replace {
                            first_panic = Some((released, payload));
                        }
                    }
                }
            }

            if let Some((_, payload)) = first_panic {
                std::panic::resume_unwind(payload);
            }
            results
        })
    }
}

struct PoisonOnPanic(Arc<Shared>);

impl Drop for PoisonOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("Rank panicked, releasing the remaining ranks of the group");
            self.0.barrier.poison();
        }
    }
}
