//! Behavioral FIFO used as the design under test when no external simulator
//! is attached.
//!
//! Show-ahead FIFO with synchronous active-low reset. `dout` always shows the
//! head item and `dout_val` says whether there is one; `pop` consumes it on the
//! next rising edge of `clk`, `psh` stores `din` unless the FIFO is full.

use serde::Deserialize;
use std::collections::VecDeque;
use tracing::trace;

use crate::sim::{Model, Port, PortIo};

/// Defects that can be switched on to check that the harness catches them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Faults {
    /// Flip the LSB of every n-th stored item.
    pub corrupt_every: Option<u64>,
    /// Silently drop every n-th accepted push.
    pub drop_every: Option<u64>,
    /// Report `full` permanently after reset.
    pub stuck_full: bool,
}

pub struct FifoModel {
    name: String,
    depth: usize,
    width: u32,
    mem: VecDeque<u64>,
    pushes: u64,
    faults: Faults,
}

impl FifoModel {
    pub fn new(name: &str, depth: usize, width: u32) -> Self {
        FifoModel {
            name: name.to_string(),
            depth,
            width,
            mem: VecDeque::with_capacity(depth),
            pushes: 0,
            faults: Faults::default(),
        }
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    fn hits(every: Option<u64>, n: u64) -> bool {
        matches!(every, Some(every) if every > 0 && n % every == 0)
    }

    fn drive_outputs(&self, io: &mut PortIo<'_>) {
        io.set("dout", self.mem.front().copied().unwrap_or(0));
        io.set("dout_val", !self.mem.is_empty() as u64);
        let full = self.mem.len() >= self.depth || self.faults.stuck_full;
        io.set("full", full as u64);
    }
}

impl Model for FifoModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port { name: "clk", width: 1, init: 0 },
            Port { name: "rst_n", width: 1, init: 0 },
            Port { name: "psh", width: 1, init: 0 },
            Port { name: "din", width: self.width, init: 0 },
            Port { name: "pop", width: 1, init: 0 },
            Port { name: "dout", width: self.width, init: 0 },
            Port { name: "dout_val", width: 1, init: 0 },
            Port { name: "full", width: 1, init: 0 },
        ]
    }

    fn clock(&self) -> &str {
        "clk"
    }

    fn on_rising_edge(&mut self, io: &mut PortIo<'_>) {
        if io.get("rst_n") == 0 {
            self.mem.clear();
            self.pushes = 0;
            io.set("dout", 0);
            io.set("dout_val", 0);
            io.set("full", 0);
            return;
        }
        // both decisions use the occupancy the edge happened on
        let was_full = self.mem.len() >= self.depth;
        if io.get("pop") == 1 && !self.mem.is_empty() {
            let item = self.mem.pop_front();
            trace!(dut = %self.name, ?item, "pop");
        }
        if io.get("psh") == 1 && !was_full {
            self.pushes += 1;
            let mut data = io.get("din");
            if Self::hits(self.faults.corrupt_every, self.pushes) {
                data ^= 1;
            }
            if !Self::hits(self.faults.drop_every, self.pushes) {
                trace!(dut = %self.name, data, "push");
                self.mem.push_back(data);
            }
        }
        self.drive_outputs(io);
    }
}
