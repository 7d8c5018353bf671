//! Background reconcilers (spec.md §4.8): startup recovery runs once at
//! boot, the task lifecycle observer and GC sweep run for the process
//! lifetime.

pub mod gc;
pub mod observer;
pub mod startup;
