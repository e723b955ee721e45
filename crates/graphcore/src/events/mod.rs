mod base;

pub use base::{EventBus, RunEmitter, RunEvent, SuccessSource};
