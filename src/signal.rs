use std::fmt;
use std::sync::Arc;

use crate::error::TbResult;
use crate::sim_if::SimIf;
use crate::trigger::Trigger;

/// A resolved signal or scope of the design.
#[derive(Clone)]
pub struct SimObject {
    handle: usize,
    name: String,
    sim: Arc<dyn SimIf>,
}

impl SimObject {
    /// A scope has no handle of its own, only a name prefix for its children.
    pub fn scope(sim: Arc<dyn SimIf>, name: &str) -> Self {
        SimObject {
            handle: usize::MAX,
            name: name.to_string(),
            sim,
        }
    }

    pub fn from_name(sim: &Arc<dyn SimIf>, full_name: &str) -> TbResult<Self> {
        let handle = sim.get_handle_by_name(full_name)?;
        Ok(SimObject {
            handle,
            name: sim.get_full_name(handle)?,
            sim: sim.clone(),
        })
    }

    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sim(&self) -> &Arc<dyn SimIf> {
        &self.sim
    }

    pub fn size(&self) -> TbResult<u32> {
        self.sim.get_size(self.handle)
    }

    pub fn get_child(&self, name: &str) -> TbResult<Self> {
        let child_name = format!("{}.{}", self.name, name);
        SimObject::from_name(&self.sim, &child_name)
    }

    /// Short for [`SimObject::get_child`].
    pub fn c(&self, name: &str) -> TbResult<Self> {
        self.get_child(name)
    }

    pub fn u64(&self) -> TbResult<u64> {
        self.sim.get_value(self.handle)
    }

    pub fn is_high(&self) -> TbResult<bool> {
        Ok(self.u64()? != 0)
    }

    pub fn set(&self, val: u64) -> TbResult<()> {
        self.sim.set_value(self.handle, val)
    }

    pub fn rising_edge(&self) -> Trigger {
        Trigger::rising_edge(self)
    }

    /// Rising edge, then the read-only phase of the same time step.
    pub async fn rising_edge_ro(&self) -> TbResult<()> {
        self.rising_edge().await?;
        Trigger::read_only(&self.sim).await
    }
}

impl fmt::Debug for SimObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimObject")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .finish()
    }
}
