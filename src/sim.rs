//! In-process simulation kernel.
//!
//! Holds the signal values, the pending callbacks and any number of behavioral
//! [`Model`]s, and advances time from one registered timer to the next. Within a
//! time step, writes are deferred and applied in delta cycles, so a task woken by
//! a clock edge always reads the values from before that edge.

use intmap::IntMap;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{TbError, TbResult};
use crate::executor::{self, JoinHandle, TaskResult};
use crate::sim_if::{SimCallback, SimIf};
use crate::trigger::{split_edge_waiters, EdgeKind, TrigShared};

const MAX_DELTAS: usize = 1000;

/// A port a [`Model`] exposes as signal `<model name>.<port name>`.
#[derive(Debug, Clone, Copy)]
pub struct Port {
    pub name: &'static str,
    pub width: u32,
    pub init: u64,
}

/// Behavioral stand-in for a synchronous design.
pub trait Model: Send {
    fn name(&self) -> &str;
    fn ports(&self) -> Vec<Port>;
    /// Name of the port whose rising edge clocks the model.
    fn clock(&self) -> &str;
    fn on_rising_edge(&mut self, io: &mut PortIo<'_>);
}

/// A model's view of its ports during evaluation. Reads see the values the edge
/// happened on; writes are deferred to the next delta cycle.
pub struct PortIo<'a> {
    ports: &'a HashMap<String, usize>,
    signals: &'a [Slot],
    pending: &'a mut Vec<(usize, u64)>,
}

impl PortIo<'_> {
    pub fn get(&self, port: &str) -> u64 {
        match self.ports.get(port) {
            Some(&handle) => self.signals[handle].value,
            None => {
                debug!(port, "read of unknown port");
                0
            }
        }
    }

    pub fn set(&mut self, port: &str, value: u64) {
        match self.ports.get(port) {
            Some(&handle) => {
                let value = value & mask(self.signals[handle].width);
                self.pending.push((handle, value));
            }
            None => debug!(port, "write to unknown port"),
        }
    }
}

struct Slot {
    name: String,
    width: u32,
    value: u64,
}

struct Hosted {
    model: Box<dyn Model>,
    clk: usize,
    ports: HashMap<String, usize>,
}

#[derive(Debug, Clone, Copy)]
struct Change {
    handle: usize,
    old: u64,
    new: u64,
}

struct Kernel {
    time: u64,
    signals: Vec<Slot>,
    by_name: HashMap<String, usize>,
    pending: Vec<(usize, u64)>,
    // key is absolute callback time
    timers: IntMap<VecDeque<TrigShared>>,
    timer_order: BTreeSet<u64>,
    // key is signal handle
    edges: IntMap<VecDeque<TrigShared>>,
    read_only: VecDeque<TrigShared>,
    models: Vec<Hosted>,
}

impl Kernel {
    fn new() -> Self {
        Kernel {
            time: 0,
            signals: Vec::new(),
            by_name: HashMap::new(),
            pending: Vec::new(),
            timers: IntMap::new(),
            timer_order: BTreeSet::new(),
            edges: IntMap::new(),
            read_only: VecDeque::new(),
            models: Vec::new(),
        }
    }

    fn slot(&self, handle: usize) -> TbResult<&Slot> {
        self.signals.get(handle).ok_or(TbError::InvalidHandle(handle))
    }

    fn add_signal(&mut self, name: &str, width: u32, init: u64) -> TbResult<usize> {
        if !(1..=64).contains(&width) {
            return Err(TbError::Config(format!(
                "signal `{}` has unsupported width {}",
                name, width
            )));
        }
        if self.by_name.contains_key(name) {
            return Err(TbError::DuplicateSignal(name.to_string()));
        }
        let handle = self.signals.len();
        self.signals.push(Slot {
            name: name.to_string(),
            width,
            value: init & mask(width),
        });
        self.by_name.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Applies deferred writes and returns the signals whose value changed.
    fn apply_pending(&mut self) -> Vec<Change> {
        let mut changes: Vec<Change> = Vec::new();
        for (handle, value) in std::mem::take(&mut self.pending) {
            let slot = &mut self.signals[handle];
            match changes.iter_mut().find(|c| c.handle == handle) {
                Some(change) => change.new = value,
                None => changes.push(Change {
                    handle,
                    old: slot.value,
                    new: value,
                }),
            }
            slot.value = value;
        }
        changes.retain(|c| c.old != c.new);
        changes
    }

    fn evaluate_models(&mut self, changes: &[Change]) {
        let mut models = std::mem::take(&mut self.models);
        for hosted in models.iter_mut() {
            let clocked = changes.iter().any(|c| {
                c.handle == hosted.clk && EdgeKind::of(c.old, c.new) == EdgeKind::Rising
            });
            if clocked {
                let mut io = PortIo {
                    ports: &hosted.ports,
                    signals: &self.signals,
                    pending: &mut self.pending,
                };
                hosted.model.on_rising_edge(&mut io);
            }
        }
        self.models = models;
    }

    fn take_edge_waiters(&mut self, changes: &[Change]) -> Vec<TrigShared> {
        let mut wake = Vec::new();
        for change in changes {
            if let Some(waiters) = self.edges.remove(change.handle as u64) {
                let (woken, resched) =
                    split_edge_waiters(waiters, EdgeKind::of(change.old, change.new));
                wake.extend(woken);
                if !resched.is_empty() {
                    let _ = self.edges.insert(change.handle as u64, resched);
                }
            }
        }
        wake
    }

    fn cancel_all_callbacks(&mut self) {
        self.timers.clear();
        self.timer_order.clear();
        self.edges.clear();
        self.read_only.clear();
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

struct SimCore {
    kernel: Mutex<Kernel>,
    precision: i8,
}

impl SimIf for SimCore {
    fn get_handle_by_name(&self, name: &str) -> TbResult<usize> {
        self.kernel
            .lock()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| TbError::SignalNotFound(name.to_string()))
    }

    fn get_full_name(&self, handle: usize) -> TbResult<String> {
        Ok(self.kernel.lock().slot(handle)?.name.clone())
    }

    fn get_size(&self, handle: usize) -> TbResult<u32> {
        Ok(self.kernel.lock().slot(handle)?.width)
    }

    fn get_value(&self, handle: usize) -> TbResult<u64> {
        Ok(self.kernel.lock().slot(handle)?.value)
    }

    fn set_value(&self, handle: usize, value: u64) -> TbResult<()> {
        let mut kernel = self.kernel.lock();
        let width = kernel.slot(handle)?.width;
        kernel.pending.push((handle, value & mask(width)));
        Ok(())
    }

    fn get_sim_time_steps(&self) -> u64 {
        self.kernel.lock().time
    }

    fn get_sim_precision(&self) -> i8 {
        self.precision
    }

    fn register_callback(&self, cb: SimCallback, shared: TrigShared) -> TbResult<()> {
        let mut kernel = self.kernel.lock();
        match cb {
            SimCallback::Time(t) => {
                // Add current time to key since timers are kept in absolute time
                let abs_time = kernel.time + t;
                if let Some(callbacks) = kernel.timers.get_mut(abs_time) {
                    callbacks.push_back(shared);
                } else {
                    let _ = kernel.timers.insert(abs_time, VecDeque::from([shared]));
                    kernel.timer_order.insert(abs_time);
                }
            }
            SimCallback::Edge(sig_hdl, _) => {
                kernel.slot(sig_hdl)?;
                if let Some(callbacks) = kernel.edges.get_mut(sig_hdl as u64) {
                    callbacks.push_back(shared);
                } else {
                    let _ = kernel
                        .edges
                        .insert(sig_hdl as u64, VecDeque::from([shared]));
                }
            }
            SimCallback::ReadOnly => kernel.read_only.push_back(shared),
        }
        Ok(())
    }
}

/// Owns one simulation run. Tasks are driven on the calling thread.
pub struct Simulator {
    core: Arc<SimCore>,
}

impl Simulator {
    pub fn new(precision: i8) -> Self {
        Simulator {
            core: Arc::new(SimCore {
                kernel: Mutex::new(Kernel::new()),
                precision,
            }),
        }
    }

    pub fn sim_if(&self) -> Arc<dyn SimIf> {
        self.core.clone()
    }

    pub fn add_signal(&self, name: &str, width: u32, init: u64) -> TbResult<usize> {
        self.core.kernel.lock().add_signal(name, width, init)
    }

    /// Registers the model's ports as signals and hooks it to its clock.
    pub fn add_model(&self, model: Box<dyn Model>) -> TbResult<()> {
        let mut kernel = self.core.kernel.lock();
        let scope = model.name().to_string();
        let mut ports = HashMap::new();
        for port in model.ports() {
            let handle = kernel.add_signal(&format!("{}.{}", scope, port.name), port.width, port.init)?;
            ports.insert(port.name.to_string(), handle);
        }
        let clk = ports
            .get(model.clock())
            .copied()
            .ok_or_else(|| TbError::SignalNotFound(format!("{}.{}", scope, model.clock())))?;
        debug!(model = %scope, ports = ports.len(), "model added");
        kernel.models.push(Hosted { model, clk, ports });
        Ok(())
    }

    pub fn time_steps(&self) -> u64 {
        self.core.get_sim_time_steps()
    }

    /// Runs until `main` finishes and returns its result. Fails if time would
    /// pass `limit_steps` first, or if nothing is left to wake any task.
    pub fn run(&self, mut main: JoinHandle, limit_steps: Option<u64>) -> TaskResult {
        let result = self.run_until(&mut main, limit_steps);
        main.cancel();
        self.tear_down();
        result
    }

    fn run_until(&self, main: &mut JoinHandle, limit_steps: Option<u64>) -> TaskResult {
        executor::run_once();
        loop {
            self.settle()?;
            if let Some(result) = main.try_join() {
                return result;
            }
            let fired = {
                let mut kernel = self.core.kernel.lock();
                let Some(next) = kernel.timer_order.pop_first() else {
                    return Err(TbError::Stalled(kernel.time));
                };
                if limit_steps.is_some_and(|limit| next > limit) {
                    return Err(TbError::Timeout(kernel.time));
                }
                kernel.time = next;
                kernel.timers.remove(next).unwrap_or_default()
            };
            trace!(time = self.time_steps(), n = fired.len(), "timers");
            for trig in fired {
                trig.fire();
            }
            executor::run_once();
        }
    }

    /// Runs delta cycles until no write is pending and no read-only callback is
    /// left for the current time step.
    fn settle(&self) -> TbResult<()> {
        for _ in 0..MAX_DELTAS {
            let (wake, settled) = {
                let mut kernel = self.core.kernel.lock();
                let changes = kernel.apply_pending();
                if changes.is_empty() {
                    let read_only: Vec<_> = kernel.read_only.drain(..).collect();
                    let settled = read_only.is_empty();
                    (read_only, settled)
                } else {
                    kernel.evaluate_models(&changes);
                    (kernel.take_edge_waiters(&changes), false)
                }
            };
            if settled {
                return Ok(());
            }
            for trig in wake {
                trig.fire();
            }
            executor::run_once();
        }
        Err(TbError::DeltaOverflow(self.time_steps()))
    }

    fn tear_down(&self) {
        executor::cancel_all_tasks();
        self.core.kernel.lock().cancel_all_callbacks();
        executor::clear_ready_queue();
    }
}
