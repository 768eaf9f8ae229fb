//! # Id Management
//!
//! Recyclable integer handles for GPU-backed resources.
//!
//! ## Design Philosophy
//!
//! Per-frame resources (queries, transient buffers) churn through thousands
//! of ids per second:
//! - Lowest free id first, so handle tables stay dense
//! - Free ids kept as coalesced intervals, so memory tracks gaps, not history
//! - Double frees are reported, never absorbed

mod free_list;
mod id_allocator;

pub use id_allocator::IdAllocator;
