pub mod async_task;

pub mod logging;

pub mod panic_guard;
