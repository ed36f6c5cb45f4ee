//! Bookkeeping for composite drivers.
//!
//! A composite driver binds to a set of nodes, each matched separately. Matches are
//! collected per driver URL into sets of `num_nodes` slots. Slots only hold weak
//! references, so a node that goes away frees its slot for the next match with the
//! same index. A set completes once every slot holds a live node.

use crate::error::CompositeError;
use alloc::{
    boxed::Box,
    collections::BTreeMap,
    sync::{Arc, Weak},
    vec,
    vec::Vec,
};
use decl::MatchedCompositeInfo;
use log::error;

#[derive(Debug, PartialEq, Eq)]
pub enum CompositeStatus<T> {
    Complete(T),
    /// More nodes must match before the composite can be assembled.
    Pending,
}

/// Position of a node in a composite set. Valid until the table is next modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeSlot {
    url: Box<str>,
    set: usize,
    index: usize,
}

pub struct CompositeArgsTable<T> {
    sets: BTreeMap<Box<str>, Vec<Vec<Weak<T>>>>,
}

impl<T> Default for CompositeArgsTable<T> {
    fn default() -> Self {
        CompositeArgsTable::new()
    }
}

impl<T> CompositeArgsTable<T> {
    pub const fn new() -> CompositeArgsTable<T> {
        CompositeArgsTable { sets: BTreeMap::new() }
    }

    /// Find the set the node matched by `info` belongs to: the first set for the
    /// driver URL whose slot is free, or a new one.
    pub fn add_to_composite_args(&mut self, name: &str, info: &MatchedCompositeInfo) -> Result<CompositeSlot, CompositeError> {
        let (Some(index), Some(num_nodes)) = (info.node_index, info.num_nodes) else {
            error!("Failed to match Node '{}', missing fields for composite driver", name);
            return Err(CompositeError::MissingFields);
        };
        if index >= num_nodes {
            error!("Failed to match Node '{}', the node index is out of range", name);
            return Err(CompositeError::IndexOutOfRange { index, num_nodes });
        }
        let Some(url) = info.driver_info.as_ref().and_then(|driver| driver.url.as_deref()) else {
            error!("Failed to match Node '{}', missing fields for driver info", name);
            return Err(CompositeError::MissingDriverInfo);
        };
        let (index, num_nodes) = (index as usize, num_nodes as usize);

        let sets = self.sets.entry(url.into()).or_default();
        sets.retain(|set| is_live(set));
        let mut free = None;
        for (set_index, set) in sets.iter().enumerate() {
            if set.len() != num_nodes {
                error!("Failed to match Node '{}', the number of nodes does not match", name);
                return Err(CompositeError::CountMismatch {
                    expected: num_nodes as u32,
                    actual: set.len(),
                });
            }
            if set[index].strong_count() == 0 {
                free = Some(set_index);
                break;
            }
        }
        let set = match free {
            Some(set) => set,
            None => {
                sets.push(vec![Weak::new(); num_nodes]);
                sets.len() - 1
            }
        };
        Ok(CompositeSlot {
            url: url.into(),
            set,
            index,
        })
    }

    /// Put `node` into `slot`. Once every slot of the set is live, the set is
    /// consumed and its nodes returned in slot order.
    pub fn fill_slot(&mut self, slot: CompositeSlot, node: Weak<T>) -> CompositeStatus<Vec<Arc<T>>> {
        let Some(sets) = self.sets.get_mut(&slot.url) else {
            return CompositeStatus::Pending;
        };
        let Some(entry) = sets.get_mut(slot.set).and_then(|set| set.get_mut(slot.index)) else {
            return CompositeStatus::Pending;
        };
        *entry = node;
        let nodes: Option<Vec<Arc<T>>> = sets[slot.set].iter().map(Weak::upgrade).collect();
        let Some(nodes) = nodes else {
            return CompositeStatus::Pending;
        };
        sets.remove(slot.set);
        if sets.is_empty() {
            self.sets.remove(&slot.url);
        }
        CompositeStatus::Complete(nodes)
    }

    /// Number of incomplete sets that still hold a live node.
    pub fn pending(&self) -> usize {
        self.sets.values().flatten().filter(|set| is_live(set)).count()
    }
}

fn is_live<T>(set: &[Weak<T>]) -> bool {
    set.iter().any(|slot| slot.strong_count() > 0)
}
