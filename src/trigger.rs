use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::error::TbResult;
use crate::signal::SimObject;
use crate::sim_if::{SimCallback, SimIf};

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

impl EdgeKind {
    /// Classifies a value change of a signal.
    pub fn of(old: u64, new: u64) -> EdgeKind {
        match (old == 0, new == 0) {
            (true, false) => EdgeKind::Rising,
            (false, true) => EdgeKind::Falling,
            _ => EdgeKind::Any,
        }
    }
}

/// Handed to the simulator when a trigger is first polled. Firing it marks the
/// trigger done and wakes the awaiting task.
#[derive(Debug, Clone)]
pub struct TrigShared {
    waker: Waker,
    // If trigger is an edge, the kernel needs to know if it is a rising or falling edge
    // so an existing callback does not have to be rescheduled.
    edge_kind: EdgeKind,
    fired: Arc<AtomicBool>,
}

impl TrigShared {
    pub fn edge_kind(&self) -> EdgeKind {
        self.edge_kind
    }

    pub fn fire(self) {
        self.fired.store(true, Ordering::Release);
        self.waker.wake();
    }
}

/// Splits the waiters of one signal into those woken by `edge` and those that
/// keep waiting.
pub(crate) fn split_edge_waiters(
    waiters: VecDeque<TrigShared>,
    edge: EdgeKind,
) -> (VecDeque<TrigShared>, VecDeque<TrigShared>) {
    let mut wake = VecDeque::new();
    let mut resched = VecDeque::new();
    for trig in waiters {
        if trig.edge_kind == EdgeKind::Any || trig.edge_kind == edge {
            wake.push_back(trig);
        } else {
            resched.push_back(trig);
        }
    }
    (wake, resched)
}

pub struct Trigger {
    kind: SimCallback,
    sim: Arc<dyn SimIf>,
    fired: Option<Arc<AtomicBool>>,
}

impl Trigger {
    fn new(kind: SimCallback, sim: Arc<dyn SimIf>) -> Self {
        Trigger {
            kind,
            sim,
            fired: None,
        }
    }
    pub fn timer_steps(sim: &Arc<dyn SimIf>, steps: u64) -> Self {
        Trigger::new(SimCallback::Time(steps), sim.clone())
    }
    pub fn rising_edge(signal: &SimObject) -> Self {
        Trigger::new(
            SimCallback::Edge(signal.handle(), EdgeKind::Rising),
            signal.sim().clone(),
        )
    }
    pub fn read_only(sim: &Arc<dyn SimIf>) -> Self {
        Trigger::new(SimCallback::ReadOnly, sim.clone())
    }
}

impl Future for Trigger {
    type Output = TbResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(fired) = &self.fired {
            // woken by something else than our callback: keep waiting
            return match fired.load(Ordering::Acquire) {
                true => Poll::Ready(Ok(())),
                false => Poll::Pending,
            };
        }
        let fired = Arc::new(AtomicBool::new(false));
        let shared = TrigShared {
            waker: cx.waker().clone(),
            edge_kind: match self.kind {
                SimCallback::Edge(_, kind) => kind,
                _ => EdgeKind::Any,
            },
            fired: fired.clone(),
        };
        match self.sim.register_callback(self.kind, shared) {
            Ok(()) => {
                self.fired = Some(fired);
                Poll::Pending
            }
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}
