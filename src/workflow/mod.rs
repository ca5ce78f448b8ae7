pub mod account_ctx;
pub mod account_worker;
pub mod observer;
pub mod state;

pub use account_ctx::AccountCtx;
pub use account_worker::{AccountSnapshot, AccountWorker};
pub use observer::{ChannelObserver, LogLevel, Observer, TracingObserver, WorkerEvent};
pub use state::{Transition, WorkerState};
