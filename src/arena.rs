//! Generation-checked storage for engine handles.

/// Identifier of an arena slot. Stale once the slot is retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn insert(&mut self, value: T) -> HandleId {
        self.len += 1;
        match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let (generation, next_free) = match *slot {
                    Slot::Vacant { generation, next_free } => (generation, next_free),
                    Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
                };
                *slot = Slot::Occupied { generation, value };
                self.free_head = next_free;
                HandleId { index, generation }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot::Occupied { generation: 0, value });
                HandleId { index, generation: 0 }
            }
        }
    }

    pub fn get(&self, id: HandleId) -> Option<&T> {
        match self.slots.get(id.index as usize)? {
            Slot::Occupied { generation, value } if *generation == id.generation => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, id: HandleId) -> bool {
        self.get(id).is_some()
    }

    /// Take the value out and bump the slot generation, invalidating `id`
    pub fn remove(&mut self, id: HandleId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        let vacant = Slot::Vacant {
            generation: id.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let old = std::mem::replace(&mut self.slots[id.index as usize], vacant);
        self.free_head = Some(id.index);
        self.len -= 1;
        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }
}
