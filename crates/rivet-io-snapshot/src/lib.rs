//! Deterministic snapshot container for device state.
//!
//! Each device serializes into a tagged-field TLV blob with a 4-byte device
//! id and a version header, so snapshots restore field-by-field and tolerate
//! unknown future tags. Decoding is defensive: corrupt or truncated input
//! yields [`state::SnapshotError`], never a panic or an unbounded
//! allocation.

pub mod state;
