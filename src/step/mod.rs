//! Priority-ordered step execution used for bring-up and shutdown sequencing.

mod priority_queue;
mod scheduler;

pub use priority_queue::*;
pub use scheduler::*;

#[cfg(test)]
mod priority_queue_test;
#[cfg(test)]
mod scheduler_test;
