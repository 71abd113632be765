use futures::{
    future::{BoxFuture, FutureExt},
    task::{waker_ref, ArcWake, Context, Poll},
};
use futures_channel::oneshot;
use parking_lot::Mutex;
use queues::{IsQueue, Queue};
use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};
use tracing::trace;

use crate::error::{TbError, TbResult};
use crate::value::Val;

pub type TaskResult = TbResult<Val>;

thread_local! {
    // tasks are only woken and polled from the thread running the simulation
    static READY_QUEUE: RefCell<Queue<Arc<Task>>> = RefCell::new(Queue::new());
    // every task spawned on this thread, so teardown can stop the ones left parked
    static SPAWNED: RefCell<Vec<Weak<Task>>> = RefCell::new(Vec::new());
}

pub fn schedule_task(task: Arc<Task>) {
    READY_QUEUE.with(|queue| {
        let _ = queue.borrow_mut().add(task);
    });
}

fn next_task() -> Option<Arc<Task>> {
    READY_QUEUE.with(|queue| queue.borrow_mut().remove().ok())
}

pub(crate) fn clear_ready_queue() {
    READY_QUEUE.with(|queue| *queue.borrow_mut() = Queue::new());
}

/// Cancels every task spawned on this thread that has not finished yet. Their
/// futures are dropped along with whatever they hold.
pub(crate) fn cancel_all_tasks() {
    let spawned = SPAWNED.with(|tasks| std::mem::take(&mut *tasks.borrow_mut()));
    for task in spawned.iter().filter_map(Weak::upgrade) {
        task.cancel();
    }
}

/// Polls every ready task until the queue runs dry.
#[inline]
pub fn run_once() {
    while let Some(task) = next_task() {
        process_task(task);
    }
}

#[inline]
fn process_task(task: Arc<Task>) {
    task.queued.store(false, Ordering::Release);
    if *task.state.lock() != TaskState::Pending {
        // cancelled or finished, will be dropped once all references disappear
        return;
    }

    let mut fut_slot = task.future.lock();
    let Some(mut fut) = fut_slot.take() else {
        return;
    };
    trace!(task = %task.name, "poll");
    let waker = waker_ref(&task);
    let context = &mut Context::from_waker(&*waker);
    match fut.as_mut().poll(context) {
        Poll::Pending => {
            if *task.state.lock() == TaskState::Cancelled {
                // cancelled itself while running: drop at this suspension point
                drop(fut);
                task.join_tx.lock().take();
            } else {
                *fut_slot = Some(fut);
            }
        }
        Poll::Ready(result) => {
            trace!(task = %task.name, ok = result.is_ok(), "complete");
            *task.state.lock() = TaskState::Done;
            if let Some(tx) = task.join_tx.lock().take() {
                let _ = tx.send(result);
            }
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

pub struct Task {
    future: Mutex<Option<BoxFuture<'static, TaskResult>>>,
    state: Mutex<TaskState>,
    name: String,
    join_tx: Mutex<Option<oneshot::Sender<TaskResult>>>,
    queued: AtomicBool,
}

impl Task {
    pub fn fork(future: impl Future<Output = TaskResult> + Send + 'static) -> JoinHandle {
        Task::spawn(future, "forked")
    }

    pub fn spawn(
        future: impl Future<Output = TaskResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed(), name);
        SPAWNED.with(|tasks| {
            let mut tasks = tasks.borrow_mut();
            tasks.retain(|t| t.strong_count() > 0);
            tasks.push(Arc::downgrade(&task));
        });
        task.queued.store(true, Ordering::Release);
        schedule_task(task);
        join_handle
    }

    fn new(fut: BoxFuture<'static, TaskResult>, name: &str) -> (Arc<Self>, JoinHandle) {
        let (tx, rx) = oneshot::channel::<TaskResult>();
        let task = Arc::new(Self {
            future: Mutex::new(Some(fut)),
            state: Mutex::new(TaskState::Pending),
            name: name.to_string(),
            join_tx: Mutex::new(Some(tx)),
            queued: AtomicBool::new(false),
        });
        let join_handle = JoinHandle {
            awaited_task: task.clone(),
            join_rx: rx,
        };
        (task, join_handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the task at the suspension point it is parked on. Calling it on a
    /// finished or already cancelled task does nothing.
    pub fn cancel(&self) {
        {
            let mut state = self.state.lock();
            if *state != TaskState::Pending {
                return;
            }
            *state = TaskState::Cancelled;
        }
        // the slot is locked only while the task polls itself, process_task cleans up then
        if let Some(mut slot) = self.future.try_lock() {
            slot.take();
            self.join_tx.lock().take();
        }
        trace!(task = %self.name, "cancelled");
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if !arc_self.queued.swap(true, Ordering::AcqRel) {
            schedule_task(arc_self.clone());
        }
    }
}

pub struct JoinHandle {
    awaited_task: Arc<Task>,
    join_rx: oneshot::Receiver<TaskResult>,
}

impl JoinHandle {
    pub fn name(&self) -> &str {
        self.awaited_task.name()
    }

    pub fn cancel(&self) {
        self.awaited_task.cancel();
    }

    pub fn is_finished(&self) -> bool {
        *self.awaited_task.state.lock() != TaskState::Pending
    }

    /// Non-blocking join used by the simulation loop.
    pub(crate) fn try_join(&mut self) -> Option<TaskResult> {
        match self.join_rx.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(TbError::Cancelled(self.name().to_string()))),
        }
    }
}

impl Future for JoinHandle {
    type Output = TaskResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => {
                Poll::Ready(Err(TbError::Cancelled(self.name().to_string())))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
