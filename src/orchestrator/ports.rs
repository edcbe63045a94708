//! Port allocation for new player instances.
//!
//! Allocation is advisory: it picks a port no live record holds, but does
//! not reserve it at the OS level. Losing the bind race to an external
//! process surfaces later as a spawn or probe failure.

use std::collections::HashSet;

use crate::errors::OrchestratorError;

/// How many candidate ports to try past the base before giving up.
const SEARCH_WINDOW: u16 = 1000;

/// Return the smallest port >= `base` not present in `in_use`.
///
/// Fails with `PortExhausted` when the search window (or the valid port
/// range) runs out.
pub fn allocate(base: u16, in_use: &HashSet<u16>) -> Result<u16, OrchestratorError> {
    for offset in 0..SEARCH_WINDOW {
        let Some(candidate) = base.checked_add(offset) else {
            break;
        };
        if !in_use.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(OrchestratorError::PortExhausted {
        base,
        window: SEARCH_WINDOW,
    })
}
