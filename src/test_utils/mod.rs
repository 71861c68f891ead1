//! the test_utils folder here will share utils or test components between unit
//! tests of the watch, registry and pool layers
mod common;
mod consumer;
mod scripted_connector;

pub use common::*;
pub use consumer::*;
pub use scripted_connector::*;
