//! Application services: the fleet, the scheduler and everything they drive.

pub mod conversation;
pub mod export;
pub mod fleet;
pub mod grading;
pub mod human_reply;
pub mod live_updates;
pub mod pairing;
pub mod prompt;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use conversation::{ConversationDriver, ConversationSettings};
pub use export::export_csv;
pub use fleet::{FleetRegistry, ReconcileReport};
pub use grading::{new_run_id, GradeEvaluator};
pub use human_reply::{HumanPost, HumanReplyService};
pub use live_updates::{LiveUpdate, LiveUpdateBus};
pub use pairing::{select_pair, PairSelector};
pub use scheduler::{ConversationScheduler, SchedulerSettings, SchedulerState, SchedulerStats};
