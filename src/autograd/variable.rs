//! Graph handles and the slot arena that owns the nodes

use super::Function;
use crate::Tensor;
use std::fmt;

/// Index plus epoch; the epoch changes every time a slot is reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SlotKey {
    index: u32,
    epoch: u32,
}

/// Handle to a variable (graph node) owned by a [`Graph`](super::Graph)
///
/// Handles are plain data: copying one does not copy the value, and a
/// handle whose slot has been freed is rejected with `Error::StaleHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(pub(crate) SlotKey);

/// Handle to a recorded function application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub(crate) SlotKey);

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variable #{}.{}", self.0.index, self.0.epoch)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function #{}.{}", self.0.index, self.0.epoch)
    }
}

/// Payload of a variable slot
#[derive(Debug)]
pub(crate) struct VariableNode {
    pub(crate) value: Tensor,
    pub(crate) grad: Option<Tensor>,
    pub(crate) creator: Option<FunctionId>,
    pub(crate) generation: u32,
    pub(crate) requires_grad: bool,
    pub(crate) name: Option<String>,
}

impl VariableNode {
    pub(crate) fn leaf(value: Tensor, name: Option<String>, requires_grad: bool) -> Self {
        Self {
            value,
            grad: None,
            creator: None,
            generation: 0,
            requires_grad,
            name,
        }
    }

    /// Whether a function consuming this variable has to be recorded
    pub(crate) fn is_graph_eligible(&self) -> bool {
        self.requires_grad || self.creator.is_some()
    }
}

/// Payload of a function slot
#[derive(Debug)]
pub(crate) struct FunctionNode {
    pub(crate) op: Box<dyn Function>,
    pub(crate) inputs: Vec<Variable>,
    pub(crate) outputs: Vec<Variable>,
    /// Max generation of the inputs
    pub(crate) generation: u32,
    /// Creation order within the graph, used as the scheduling tiebreaker
    pub(crate) sequence: u64,
}

#[derive(Debug)]
struct Slot<T> {
    epoch: u32,
    value: Option<T>,
}

/// Vector of slots with a free list
#[derive(Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> SlotKey {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return SlotKey {
                index,
                epoch: slot.epoch,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            epoch: 0,
            value: Some(value),
        });
        SlotKey { index, epoch: 0 }
    }

    pub(crate) fn get(&self, key: SlotKey) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.epoch == key.epoch)
            .and_then(|slot| slot.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.epoch == key.epoch)
            .and_then(|slot| slot.value.as_mut())
    }

    pub(crate) fn remove(&mut self, key: SlotKey) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.epoch != key.epoch {
            return None;
        }
        let value = slot.value.take()?;
        slot.epoch = slot.epoch.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn keys(&self) -> Vec<SlotKey> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.value.is_some())
            .map(|(index, slot)| SlotKey {
                index: index as u32,
                epoch: slot.epoch,
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_reuses_slots_with_new_epoch() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        assert_eq!(arena.len(), 2);

        assert_eq!(arena.remove(a), Some(1));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);

        let c = arena.insert(3);
        assert_eq!(c.index, a.index);
        assert_ne!(c.epoch, a.epoch);
        assert_eq!(arena.get(c), Some(&3));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_arena_keys_skip_free_slots() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        arena.remove(a);
        assert_eq!(arena.keys(), vec![b]);
    }
}
