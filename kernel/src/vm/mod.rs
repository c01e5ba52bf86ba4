// SPDX-License-Identifier: MPL-2.0

//! Virtual memory: address-space maps, memory objects, the page cache,
//! simulated page tables, and fault handling.

pub mod anon;
pub mod fault;
pub mod mmobj;
pub mod page;
pub mod page_table;
pub mod shadow;
pub mod vmmap;

pub use fault::{handle_page_fault, FaultCause};
