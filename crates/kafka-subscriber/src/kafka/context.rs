//! rdkafka consumer context forwarding rebalance events to the driver.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use rdkafka::consumer::{BaseConsumer, ConsumerContext, Rebalance};
use rdkafka::error::KafkaResult;
use rdkafka::{ClientContext, TopicPartitionList};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A `(topic, partition)` pair.
pub type TopicPartition = (String, i32);

/// Events sent from the rebalance callbacks to the driver loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceEvent {
    /// Partitions have been assigned to this member
    Assign(Vec<TopicPartition>),
    /// Partitions are being taken away from this member
    Revoke(Vec<TopicPartition>),
}

/// Partitions currently owned by this member.
///
/// Updated synchronously inside the rebalance callbacks, so a commit racing
/// a revocation sees the partition as gone before librdkafka does.
#[derive(Debug, Default)]
pub struct Assignment {
    owned: Mutex<BTreeSet<TopicPartition>>,
}

impl Assignment {
    pub fn owns(&self, topic: &str, partition: i32) -> bool {
        self.owned
            .lock()
            .map(|owned| owned.contains(&(topic.to_string(), partition)))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.owned.lock().map(|owned| owned.is_empty()).unwrap_or(true)
    }

    pub fn add(&self, partitions: &[TopicPartition]) {
        if let Ok(mut owned) = self.owned.lock() {
            owned.extend(partitions.iter().cloned());
        }
    }

    pub fn remove(&self, partitions: &[TopicPartition]) {
        if let Ok(mut owned) = self.owned.lock() {
            for tp in partitions {
                owned.remove(tp);
            }
        }
    }

    /// Topic to owned partitions, partitions in ascending order.
    pub fn snapshot(&self) -> HashMap<String, Vec<i32>> {
        let mut claims: HashMap<String, Vec<i32>> = HashMap::new();
        if let Ok(owned) = self.owned.lock() {
            for (topic, partition) in owned.iter() {
                claims.entry(topic.clone()).or_default().push(*partition);
            }
        }
        claims
    }
}

pub(crate) fn partitions_of(tpl: &TopicPartitionList) -> Vec<TopicPartition> {
    tpl.elements()
        .iter()
        .map(|elem| (elem.topic().to_string(), elem.partition()))
        .collect()
}

pub struct GroupContext {
    assignment: Arc<Assignment>,
    events: mpsc::UnboundedSender<RebalanceEvent>,
}

impl GroupContext {
    pub fn new(
        assignment: Arc<Assignment>,
    ) -> (Self, mpsc::UnboundedReceiver<RebalanceEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { assignment, events }, rx)
    }

    pub fn assignment(&self) -> &Arc<Assignment> {
        &self.assignment
    }

    fn send(&self, event: RebalanceEvent) {
        if self.events.send(event).is_err() {
            debug!("Driver gone, dropping rebalance event");
        }
    }
}

impl ClientContext for GroupContext {}

impl ConsumerContext for GroupContext {
    fn pre_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Revoke(tpl) => {
                let partitions = partitions_of(tpl);
                if partitions.is_empty() {
                    return;
                }
                info!(?partitions, "Partitions revoked");
                self.assignment.remove(&partitions);
                self.send(RebalanceEvent::Revoke(partitions));
            }
            Rebalance::Assign(_) => {}
            Rebalance::Error(e) => warn!("Rebalance error: {e}"),
        }
    }

    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        if let Rebalance::Assign(tpl) = rebalance {
            let partitions = partitions_of(tpl);
            if partitions.is_empty() {
                return;
            }
            info!(?partitions, "Partitions assigned");
            self.assignment.add(&partitions);
            self.send(RebalanceEvent::Assign(partitions));
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => debug!("Committed offsets for {} partitions", offsets.count()),
            Err(e) => warn!("Failed to commit offsets: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_tracks_owned_partitions() {
        let assignment = Assignment::default();
        assert!(assignment.is_empty());

        assignment.add(&[
            ("orders".to_string(), 1),
            ("orders".to_string(), 0),
            ("refunds".to_string(), 3),
        ]);
        assert!(assignment.owns("orders", 1));
        assert_eq!(assignment.snapshot()["orders"], vec![0, 1]);

        assignment.remove(&[("orders".to_string(), 1)]);
        assert!(!assignment.owns("orders", 1));
        assert_eq!(assignment.snapshot()["refunds"], vec![3]);
    }

    #[test]
    fn test_partitions_of() {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition("orders", 0);
        tpl.add_partition("orders", 2);
        assert_eq!(
            partitions_of(&tpl),
            vec![("orders".to_string(), 0), ("orders".to_string(), 2)]
        );
    }
}
