//! rdkafka-backed consumer-group driver.

pub mod context;
pub mod session;
pub mod subscriber;

pub use context::{Assignment, GroupContext, RebalanceEvent, TopicPartition};
pub use session::KafkaSession;
pub use subscriber::KafkaSubscriber;
