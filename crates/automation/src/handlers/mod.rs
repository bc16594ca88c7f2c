//! API handlers module

pub mod automation;
pub mod batches;
pub mod health;
