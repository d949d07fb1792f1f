#![doc = "Executor, watchdog and shared timer state for the rearm protocol."]

pub mod coordinator;
pub mod dispatch;
pub mod executor;
pub mod stop;
pub mod timer_state;
pub mod watchdog;

pub use coordinator::*;
pub use dispatch::*;
pub use executor::*;
pub use stop::*;
pub use timer_state::*;
pub use watchdog::*;
