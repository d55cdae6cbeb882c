// Utils module - Utility functions

pub mod clock;
pub mod interval;
pub mod retry;
