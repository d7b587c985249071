//! The federation queue for outpost: the inbox dispatch table
//! (spec.md §4.1–§4.7) and the long-running workers that drain it
//! (spec.md §5).

pub mod dispatcher;
pub mod retry;
pub mod workers;

pub use dispatcher::{dispatch, is_transient, DispatchContext};
pub use retry::{DeadLetterEntry, RetryConfig};
pub use workers::{DeliveryWorker, InboxPoller, PollPoller};
