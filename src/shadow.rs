//! Shadow model of the FIFO under test.
//!
//! [`FifoShadow`] mirrors what the DUT is expected to hold. Writers record each
//! accepted write with [`FifoShadow::try_enqueue`], readers check every value
//! the DUT hands out with [`FifoShadow::verify_and_dequeue`]. Each operation runs
//! under one lock from the length check to the counter update, so for any
//! [`FifoShadow::snapshot`]:
//!
//! * `count <= depth`
//! * `write_count - read_count == count`
//! * `verified_count <= read_count`

use std::collections::VecDeque;
use std::fmt;
use tracing::error;

use crate::error::{TbError, TbResult};
use crate::event::Event;
use crate::tb_obj::TbObj;

/// Point-in-time view of the shadow model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoStatus {
    pub depth: usize,
    pub count: usize,
    pub empty: bool,
    pub full: bool,
    pub almost_empty: bool,
    pub almost_full: bool,
    pub write_count: u64,
    pub read_count: u64,
    pub verified_count: u64,
    pub error_count: u64,
}

impl fmt::Display for FifoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={}/{}, empty={}, full={}, writes={}, reads={}, verified={}, errors={}",
            self.count,
            self.depth,
            self.empty,
            self.full,
            self.write_count,
            self.read_count,
            self.verified_count,
            self.error_count
        )
    }
}

struct ShadowInner {
    expected: VecDeque<u64>,
    depth: usize,
    write_count: u64,
    read_count: u64,
    verified_count: u64,
    error_count: u64,
}

#[derive(Clone)]
pub struct FifoShadow {
    inner: TbObj<ShadowInner>,
    data_ready: Event,
    writes_closed: Event,
}

impl FifoShadow {
    pub fn new(depth: usize) -> TbResult<Self> {
        if depth == 0 {
            return Err(TbError::Config("shadow model depth must be at least 1".into()));
        }
        Ok(FifoShadow {
            inner: TbObj::new(ShadowInner {
                expected: VecDeque::with_capacity(depth),
                depth,
                write_count: 0,
                read_count: 0,
                verified_count: 0,
                error_count: 0,
            }),
            data_ready: Event::new(),
            writes_closed: Event::new(),
        })
    }

    /// Appends `value` if there is room. A `false` return is backpressure, not an error.
    pub fn try_enqueue(&self, value: u64) -> bool {
        self.inner.with_mut(|s| {
            if s.expected.len() < s.depth {
                s.expected.push_back(value);
                s.write_count += 1;
                self.data_ready.set();
                true
            } else {
                false
            }
        })
    }

    pub fn try_dequeue(&self) -> Option<u64> {
        self.inner.with_mut(|s| {
            let value = s.expected.pop_front()?;
            s.read_count += 1;
            if s.expected.is_empty() {
                self.data_ready.clear();
            }
            Some(value)
        })
    }

    /// Consumes the expected head and compares it to what the DUT returned. The
    /// head is consumed on a mismatch too.
    pub fn verify_and_dequeue(&self, observed: u64) -> bool {
        self.inner.with_mut(|s| {
            let Some(expected) = s.expected.pop_front() else {
                s.error_count += 1;
                error!(observed, "read verification failed: DUT returned data but none was expected");
                return false;
            };
            s.read_count += 1;
            s.verified_count += 1;
            if s.expected.is_empty() {
                self.data_ready.clear();
            }
            if expected != observed {
                s.error_count += 1;
                error!(expected, observed, "data mismatch");
                return false;
            }
            true
        })
    }

    /// Counts a failure found outside the data path, e.g. a status flag mismatch.
    pub fn record_error(&self) {
        self.inner.with_mut(|s| s.error_count += 1);
    }

    pub fn snapshot(&self) -> FifoStatus {
        let s = self.inner.get();
        let count = s.expected.len();
        FifoStatus {
            depth: s.depth,
            count,
            empty: count == 0,
            full: count == s.depth,
            almost_empty: count <= 1,
            almost_full: count + 1 >= s.depth,
            write_count: s.write_count,
            read_count: s.read_count,
            verified_count: s.verified_count,
            error_count: s.error_count,
        }
    }

    /// Set while at least one item is expected.
    pub fn data_ready(&self) -> &Event {
        &self.data_ready
    }

    /// Marks that no further writes will be recorded.
    pub fn close_writes(&self) {
        self.writes_closed.set();
    }

    pub fn writes_closed(&self) -> &Event {
        &self.writes_closed
    }
}
