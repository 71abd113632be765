//! The adapter between the testbench and whatever simulates the DUT.
//!
//! Everything the harness does to the design goes through [`SimIf`]: resolve a
//! signal by name, read it, drive it, and register a callback that wakes a
//! waiting task. The in-process kernel in [`crate::sim`] is one implementation;
//! a VPI or Verilator binding would be another.

use crate::error::{TbError, TbResult};
use crate::trigger::{EdgeKind, TrigShared};

#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    /// Relative delay in sim steps.
    Time(u64),
    Edge(usize, EdgeKind),
    /// Fires once all delta cycles of the current time step have settled.
    ReadOnly,
}

pub trait SimIf: Send + Sync {
    fn get_handle_by_name(&self, name: &str) -> TbResult<usize>;
    fn get_full_name(&self, handle: usize) -> TbResult<String>;
    fn get_size(&self, handle: usize) -> TbResult<u32>;
    fn get_value(&self, handle: usize) -> TbResult<u64>;
    /// Drives a signal. The new value becomes visible in the next delta cycle.
    fn set_value(&self, handle: usize, value: u64) -> TbResult<()>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn register_callback(&self, cb: SimCallback, shared: TrigShared) -> TbResult<()>;

    fn get_sim_time(&self, unit: &str) -> TbResult<f64> {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        Ok(ldexp10(t, self.get_sim_precision() - time_scale(unit)?))
    }

    fn get_sim_steps(&self, time: u64, unit: &str) -> TbResult<u64> {
        let precision = self.get_sim_precision();
        let exp = time_scale(unit)? - precision;
        let conversion_error = || TbError::TimeConversion {
            time,
            unit: unit.to_string(),
            precision,
        };
        if exp >= 0 {
            return 10_u64
                .checked_pow(exp as u32)
                .and_then(|scale| time.checked_mul(scale))
                .ok_or_else(conversion_error);
        }
        let div = 10_u64.pow(-exp as u32);
        if time % div == 0 {
            Ok(time / div)
        } else {
            Err(conversion_error())
        }
    }
}

pub fn time_scale(unit: &str) -> TbResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(TbError::TimeUnit(unit.to_string())),
    }
}

pub fn scale_time(scale: i8) -> TbResult<&'static str> {
    match scale {
        -15 => Ok("fs"),
        -12 => Ok("ps"),
        -9 => Ok("ns"),
        -6 => Ok("us"),
        -3 => Ok("ms"),
        0 => Ok("sec"),
        _ => Err(TbError::TimeUnit(format!("1e{}", scale))),
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_round_trip() {
        for unit in ["fs", "ps", "ns", "us", "ms", "sec"] {
            assert_eq!(scale_time(time_scale(unit).unwrap()).unwrap(), unit);
        }
        assert!(matches!(time_scale("min"), Err(TbError::TimeUnit(_))));
    }

    struct Fixed(i8);

    impl SimIf for Fixed {
        fn get_handle_by_name(&self, name: &str) -> TbResult<usize> {
            Err(TbError::SignalNotFound(name.to_string()))
        }
        fn get_full_name(&self, handle: usize) -> TbResult<String> {
            Err(TbError::InvalidHandle(handle))
        }
        fn get_size(&self, handle: usize) -> TbResult<u32> {
            Err(TbError::InvalidHandle(handle))
        }
        fn get_value(&self, handle: usize) -> TbResult<u64> {
            Err(TbError::InvalidHandle(handle))
        }
        fn set_value(&self, handle: usize, _value: u64) -> TbResult<()> {
            Err(TbError::InvalidHandle(handle))
        }
        fn get_sim_time_steps(&self) -> u64 {
            0
        }
        fn get_sim_precision(&self) -> i8 {
            self.0
        }
        fn register_callback(&self, _cb: SimCallback, _shared: TrigShared) -> TbResult<()> {
            Ok(())
        }
    }

    #[test]
    fn steps_convert_exactly_or_fail() {
        let ps = Fixed(-12);
        assert_eq!(ps.get_sim_steps(10, "ns").unwrap(), 10_000);
        assert_eq!(ps.get_sim_steps(3_000, "fs").unwrap(), 3);
        assert!(matches!(
            ps.get_sim_steps(1, "fs"),
            Err(TbError::TimeConversion { .. })
        ));
        assert!(matches!(
            ps.get_sim_steps(u64::MAX / 4, "ns"),
            Err(TbError::TimeConversion { .. })
        ));
    }

    #[test]
    fn ldexp10_shifts_decimal_point() {
        assert_eq!(ldexp10(5.0, 3), 5000.0);
        assert_eq!(ldexp10(5000.0, -3), 5.0);
    }
}
