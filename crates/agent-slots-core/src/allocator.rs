//! Slot table and lowest-free-slot allocation.

use std::collections::BTreeMap;

/// Live slots mapped to the worker id holding them.
///
/// Rebuilt from disk on every registration attempt; never persisted.
pub type SlotTable = BTreeMap<u32, String>;

/// Smallest non-negative slot not present in `table`.
pub fn allocate(table: &SlotTable) -> u32 {
    // Keys are sorted, so the first gap between 0..n and the keys is the answer.
    let mut next = 0;
    for &slot in table.keys() {
        if slot != next {
            break;
        }
        next += 1;
    }
    next
}
