//! Slot arena with idle and in-use lists.
//!
//! Slots live in a vector indexed by [`SlotId`]; freed indices are reused
//! with a bumped generation so stale ids never resolve. The two lists are
//! doubly linked through indices stored in the entries, giving O(1)
//! push-front, pop-front and unlink without pointer surgery.

use crate::net::connection::SlotId;

/// Which list a slot is linked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Idle,
    InUse,
}

struct Entry<T> {
    value: Option<T>,
    generation: u32,
    list: Option<ListKind>,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug, Default, Clone, Copy)]
struct ListHead {
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

pub struct SlotTable<T> {
    entries: Vec<Entry<T>>,
    free_list: Vec<u32>,
    idle: ListHead,
    in_use: ListHead,
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotTable<T> {
    pub fn new() -> Self {
        SlotTable {
            entries: Vec::new(),
            free_list: Vec::new(),
            idle: ListHead::default(),
            in_use: ListHead::default(),
        }
    }

    /// Store a value. It is not linked into any list yet.
    pub fn insert(&mut self, value: T) -> SlotId {
        let index = match self.free_list.pop() {
            Some(index) => {
                self.entries[index as usize].value = Some(value);
                index
            }
            None => {
                self.entries.push(Entry {
                    value: Some(value),
                    generation: 0,
                    list: None,
                    prev: None,
                    next: None,
                });
                (self.entries.len() - 1) as u32
            }
        };
        SlotId {
            index,
            generation: self.entries[index as usize].generation,
        }
    }

    /// Unlink and take the value out. The id becomes stale.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        self.unlink(id);
        let entry = &mut self.entries[id.index as usize];
        let value = entry.value.take();
        entry.generation = entry.generation.wrapping_add(1);
        self.free_list.push(id.index);
        value
    }

    pub fn contains(&self, id: SlotId) -> bool {
        self.entries
            .get(id.index as usize)
            .is_some_and(|e| e.generation == id.generation && e.value.is_some())
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.entries
            .get(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.value.as_ref())
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.value.as_mut())
    }

    /// List the slot is currently linked into.
    pub fn list_of(&self, id: SlotId) -> Option<ListKind> {
        if !self.contains(id) {
            return None;
        }
        self.entries[id.index as usize].list
    }

    /// Link `id` at the front of `list`. The slot must not be linked.
    pub fn push_front(&mut self, list: ListKind, id: SlotId) {
        if !self.contains(id) {
            return;
        }
        debug_assert!(self.entries[id.index as usize].list.is_none(), "slot linked twice");
        self.unlink(id);

        let old_head = self.head(list).head;
        {
            let entry = &mut self.entries[id.index as usize];
            entry.list = Some(list);
            entry.prev = None;
            entry.next = old_head;
        }
        match old_head {
            Some(h) => self.entries[h as usize].prev = Some(id.index),
            None => self.head_mut(list).tail = Some(id.index),
        }
        let head = self.head_mut(list);
        head.head = Some(id.index);
        head.len += 1;
    }

    /// Unlink and return the front of `list`.
    pub fn pop_front(&mut self, list: ListKind) -> Option<SlotId> {
        let index = self.head(list).head?;
        let id = SlotId {
            index,
            generation: self.entries[index as usize].generation,
        };
        self.unlink(id);
        Some(id)
    }

    /// Unlink `id` from whichever list holds it. Returns that list.
    pub fn unlink(&mut self, id: SlotId) -> Option<ListKind> {
        if !self.contains(id) {
            return None;
        }
        let (list, prev, next) = {
            let entry = &mut self.entries[id.index as usize];
            let list = entry.list.take()?;
            (list, entry.prev.take(), entry.next.take())
        };
        match prev {
            Some(p) => self.entries[p as usize].next = next,
            None => self.head_mut(list).head = next,
        }
        match next {
            Some(n) => self.entries[n as usize].prev = prev,
            None => self.head_mut(list).tail = prev,
        }
        self.head_mut(list).len -= 1;
        Some(list)
    }

    pub fn len(&self, list: ListKind) -> usize {
        self.head(list).len
    }

    /// Ids in `list`, front to back.
    pub fn ids(&self, list: ListKind) -> Vec<SlotId> {
        let mut ids = Vec::with_capacity(self.len(list));
        let mut cursor = self.head(list).head;
        while let Some(index) = cursor {
            let entry = &self.entries[index as usize];
            ids.push(SlotId {
                index,
                generation: entry.generation,
            });
            cursor = entry.next;
        }
        ids
    }

    /// Number of stored values, linked or not.
    pub fn live(&self) -> usize {
        self.entries.len() - self.free_list.len()
    }

    fn head(&self, list: ListKind) -> &ListHead {
        match list {
            ListKind::Idle => &self.idle,
            ListKind::InUse => &self.in_use,
        }
    }

    fn head_mut(&mut self, list: ListKind) -> &mut ListHead {
        match list {
            ListKind::Idle => &mut self.idle,
            ListKind::InUse => &mut self.in_use,
        }
    }
}
