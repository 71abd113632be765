use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::tb_obj::TbObj;

struct EventInner {
    set: bool,
    waiters: Vec<Waker>,
}

/// Level-triggered flag tasks can wait on. Waiting on a set event returns
/// immediately; `set` wakes every waiter.
#[derive(Clone)]
pub struct Event(TbObj<EventInner>);

impl Event {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Event(TbObj::new(EventInner {
            set: false,
            waiters: Vec::new(),
        }))
    }

    pub fn set(&self) {
        let waiters = self.0.with_mut(|e| {
            e.set = true;
            std::mem::take(&mut e.waiters)
        });
        for waker in waiters {
            waker.wake();
        }
    }

    pub fn clear(&self) {
        self.0.with_mut(|e| e.set = false);
    }

    pub fn is_set(&self) -> bool {
        self.0.get().set
    }

    pub fn wait(&self) -> EventWait {
        EventWait(self.clone())
    }
}

pub struct EventWait(Event);

impl Future for EventWait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0 .0.with_mut(|e| {
            if e.set {
                Poll::Ready(())
            } else {
                if !e.waiters.iter().any(|w| w.will_wake(cx.waker())) {
                    e.waiters.push(cx.waker().clone());
                }
                Poll::Pending
            }
        })
    }
}
