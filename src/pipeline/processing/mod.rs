// Row-level processing: evidence accounting, change tracking, sanity
// remediation, quality gating, and the row merge algorithm.

pub mod changes;
pub mod quality_gate;
pub mod row;
pub mod sanity;
pub mod sources;
