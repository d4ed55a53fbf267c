//! UE IP address pool
//!
//! Hands out IPv4 addresses from an inclusive range. Addresses below the
//! cursor are either in use or sitting in the reclaim set, so the lowest
//! free address is always the smallest reclaimed one or, failing that, the
//! cursor itself.

use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::PoolError;

#[derive(Debug)]
struct PoolState {
    first: u32,
    last: u32,
    /// Next never-allocated address; may run one past `last`
    cursor: u64,
    reclaimed: BTreeSet<u32>,
    in_use: HashSet<u32>,
}

/// UE IP Pool
#[derive(Debug)]
pub struct UeIpPool {
    state: Mutex<PoolState>,
}

impl UeIpPool {
    /// Create a pool over `first..=last`
    pub fn new(first: Ipv4Addr, last: Ipv4Addr) -> Result<Self, PoolError> {
        let (lo, hi) = (u32::from(first), u32::from(last));
        if hi < lo {
            return Err(PoolError::InvalidRange { first, last });
        }
        log::info!("UE IP pool {} - {} ({} addresses)", first, last, u64::from(hi - lo) + 1);
        Ok(Self {
            state: Mutex::new(PoolState {
                first: lo,
                last: hi,
                cursor: u64::from(lo),
                reclaimed: BTreeSet::new(),
                in_use: HashSet::new(),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the lowest address not currently held
    pub fn allocate(&self) -> Result<Ipv4Addr, PoolError> {
        let mut state = self.state();

        let addr = if let Some(addr) = state.reclaimed.pop_first() {
            addr
        } else if state.cursor <= u64::from(state.last) {
            let addr = state.cursor as u32;
            state.cursor += 1;
            addr
        } else {
            log::warn!("UE IP pool exhausted ({} in use)", state.in_use.len());
            return Err(PoolError::Exhausted);
        };

        state.in_use.insert(addr);
        log::debug!("UE IP allocated [{}]", Ipv4Addr::from(addr));
        Ok(Ipv4Addr::from(addr))
    }

    /// Return `addr` to the pool; no-op unless it is currently held
    pub fn release(&self, addr: Ipv4Addr) {
        let mut state = self.state();
        let raw = u32::from(addr);
        if state.in_use.remove(&raw) {
            state.reclaimed.insert(raw);
            log::debug!("UE IP released [{}]", addr);
        } else {
            log::debug!("UE IP release ignored, [{}] not in use", addr);
        }
    }

    pub fn is_allocated(&self, addr: Ipv4Addr) -> bool {
        self.state().in_use.contains(&u32::from(addr))
    }

    pub fn in_use_count(&self) -> usize {
        self.state().in_use.len()
    }

    pub fn capacity(&self) -> u64 {
        let state = self.state();
        u64::from(state.last - state.first) + 1
    }

    pub fn available(&self) -> u64 {
        self.capacity() - self.in_use_count() as u64
    }
}
