//! Per-node result slots
//!
//! Each node owns exactly one slot. A slot moves through [`NodeStatus`]
//! following the transition table and, once terminal, rejects any further
//! write. Late results from a node that was already finalized (for example
//! after cancellation) are therefore discarded rather than overwriting the
//! recorded outcome.

use crate::{NodeStatus, Result, WorkflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Status and optional result of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot<V> {
    pub status: NodeStatus,
    pub result: Option<V>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            status: NodeStatus::Pending,
            result: None,
        }
    }
}

/// Ordered collection of node slots keyed by node identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize + Ord, V: Serialize",
    deserialize = "K: Deserialize<'de> + Ord, V: Deserialize<'de>"
))]
pub struct NodeSlots<K, V> {
    slots: BTreeMap<K, Slot<V>>,
}

impl<K, V> Default for NodeSlots<K, V>
where
    K: Ord,
{
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }
}

impl<K, V> NodeSlots<K, V>
where
    K: Ord + Clone + Debug,
{
    /// Create slots for `nodes`, all pending
    pub fn new(nodes: impl IntoIterator<Item = K>) -> Self {
        Self {
            slots: nodes.into_iter().map(|k| (k, Slot::default())).collect(),
        }
    }

    pub fn status(&self, node: &K) -> Option<NodeStatus> {
        self.slots.get(node).map(|s| s.status)
    }

    pub fn result(&self, node: &K) -> Option<&V> {
        self.slots.get(node).and_then(|s| s.result.as_ref())
    }

    pub fn get(&self, node: &K) -> Option<&Slot<V>> {
        self.slots.get(node)
    }

    /// Pending -> Running
    pub fn start(&mut self, node: &K) -> Result<()> {
        self.transition(node, NodeStatus::Running).map(|_| ())
    }

    /// Running -> Done, recording the result
    pub fn complete(&mut self, node: &K, result: V) -> Result<()> {
        let slot = self.transition(node, NodeStatus::Done)?;
        slot.result = Some(result);
        Ok(())
    }

    /// Running -> Failed
    pub fn fail(&mut self, node: &K) -> Result<()> {
        self.transition(node, NodeStatus::Failed).map(|_| ())
    }

    /// Pending -> Skipped
    pub fn skip(&mut self, node: &K) -> Result<()> {
        self.transition(node, NodeStatus::Skipped).map(|_| ())
    }

    /// Run `start` and then finalize in one go, for nodes that never suspend
    pub fn finish(&mut self, node: &K, result: Option<V>) -> Result<()> {
        self.start(node)?;
        match result {
            Some(value) => self.complete(node, value),
            None => self.fail(node),
        }
    }

    fn transition(&mut self, node: &K, to: NodeStatus) -> Result<&mut Slot<V>> {
        let slot = self
            .slots
            .get_mut(node)
            .ok_or_else(|| WorkflowError::UnknownNode(format!("{node:?}")))?;

        if slot.status.is_terminal() {
            return Err(WorkflowError::SlotFinalized(format!("{node:?}")));
        }
        if !slot.status.can_transition_to(to) {
            return Err(WorkflowError::IllegalTransition {
                node: format!("{node:?}"),
                from: slot.status,
                to,
            });
        }

        slot.status = to;
        Ok(slot)
    }

    /// Nodes whose status is not yet terminal
    pub fn unfinished(&self) -> Vec<K> {
        self.slots
            .iter()
            .filter(|(_, s)| !s.status.is_terminal())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn all_terminal(&self) -> bool {
        self.slots.values().all(|s| s.status.is_terminal())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Slot<V>)> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots() -> NodeSlots<&'static str, u32> {
        NodeSlots::new(["a", "b", "c"])
    }

    #[test]
    fn test_new_slots_are_pending() {
        let slots = slots();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots.status(&"a"), Some(NodeStatus::Pending));
        assert!(!slots.all_terminal());
    }

    #[test]
    fn test_complete_records_result() {
        let mut slots = slots();
        slots.start(&"a").unwrap();
        slots.complete(&"a", 7).unwrap();

        assert_eq!(slots.status(&"a"), Some(NodeStatus::Done));
        assert_eq!(slots.result(&"a"), Some(&7));
    }

    #[test]
    fn test_late_result_is_rejected() {
        let mut slots = slots();
        slots.start(&"a").unwrap();
        slots.fail(&"a").unwrap();

        let err = slots.complete(&"a", 1).unwrap_err();
        assert_eq!(err, WorkflowError::SlotFinalized("\"a\"".to_string()));
        assert_eq!(slots.result(&"a"), None);
        assert_eq!(slots.status(&"a"), Some(NodeStatus::Failed));
    }

    #[test]
    fn test_complete_without_start_is_illegal() {
        let mut slots = slots();
        let err = slots.complete(&"b", 1).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::IllegalTransition {
                from: NodeStatus::Pending,
                to: NodeStatus::Done,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_node() {
        let mut slots = slots();
        assert!(matches!(
            slots.start(&"z"),
            Err(WorkflowError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_unfinished_and_all_terminal() {
        let mut slots = slots();
        slots.finish(&"a", Some(1)).unwrap();
        slots.skip(&"b").unwrap();
        assert_eq!(slots.unfinished(), vec!["c"]);

        slots.finish(&"c", None).unwrap();
        assert!(slots.all_terminal());
    }

    #[test]
    fn test_serialization_keeps_order() {
        let mut slots = slots();
        slots.finish(&"b", Some(2)).unwrap();

        let json = serde_json::to_value(&slots).unwrap();
        assert_eq!(json["slots"]["b"]["status"], "done");
        assert_eq!(json["slots"]["b"]["result"], 2);
        assert_eq!(json["slots"]["a"]["status"], "pending");
    }
}
