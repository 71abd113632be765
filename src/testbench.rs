use tracing::warn;

use crate::error::TbError;
use crate::executor::TaskResult;
use crate::signal::SimObject;
use crate::trigger::Trigger;

/*
 * CLOCK
 */
/// Drives `clk` with the given period until the simulation is torn down.
pub async fn clock(clk: SimObject, period: u64, unit: &'static str) -> TaskResult {
    let high_t = period / 2;
    let low_t = period - high_t;
    if period % 2 != 0 {
        warn!(
            "Clock period {period}{unit} not dividable by 2. High time will be {high_t}{unit}; low time will be {low_t}{unit}."
        );
    }
    let sim = clk.sim().clone();
    let high = sim.get_sim_steps(high_t, unit)?;
    let low = sim.get_sim_steps(low_t, unit)?;
    if high == 0 {
        return Err(TbError::Config(format!(
            "clock period {period}{unit} is below the simulator precision"
        )));
    }
    loop {
        clk.set(0)?;
        Trigger::timer_steps(&sim, low).await?;
        clk.set(1)?;
        Trigger::timer_steps(&sim, high).await?;
    }
}
