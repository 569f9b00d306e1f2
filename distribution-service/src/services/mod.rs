pub mod database;
pub mod events;
pub mod live;
pub mod metrics;
pub mod reconciler;

pub use database::Database;
pub use events::{ChangeEvent, ChangeKind, EntityKind, EventHub};
pub use live::LiveView;
pub use metrics::get_metrics;
