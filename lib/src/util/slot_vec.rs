use std::fmt::{Debug, Error, Formatter};
use std::iter::FromIterator;

/// Elements that take up one or more slots (eg. `long` locals take two)
pub trait Width {
    fn width(&self) -> usize;
}

/// Slot offset into a `SlotVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

/// A vector whose entries are addressed by slot offset instead of by position.
///
/// JVM local variables and operand stacks are both measured this way: a `double` at local `3`
/// means the next local starts at `5`, and `max_stack` counts slots, not values.
#[derive(Clone)]
pub struct SlotVec<T> {
    /// Entries along with their starting slot
    entries: Vec<(Offset, T)>,

    /// Slot at which the next pushed element will start
    offset_len: Offset,
}

/// Result of looking up a slot
#[derive(Debug, PartialEq, Eq)]
pub enum SlotLookup<'a, T> {
    /// An element starts exactly at the slot
    Found(&'a T),

    /// The slot is the second half of a wider element
    Straddled,

    /// The slot is past the end
    Missing,
}

impl<T: Width> SlotVec<T> {
    pub fn new() -> SlotVec<T> {
        SlotVec {
            entries: vec![],
            offset_len: Offset(0),
        }
    }

    /// Number of entries (not slots)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of slots used
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Push an element, returning the slot it starts at
    pub fn push(&mut self, elem: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += elem.width();
        self.entries.push((offset, elem));
        offset
    }

    /// Pop the last element, along with the slot it started at
    pub fn pop(&mut self) -> Option<(Offset, T)> {
        let (offset, elem) = self.entries.pop()?;
        self.offset_len = offset;
        Some((offset, elem))
    }

    /// Find the element starting at a slot
    pub fn get_offset(&self, offset: Offset) -> SlotLookup<'_, T> {
        if offset >= self.offset_len {
            return SlotLookup::Missing;
        }
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Ok(idx) => SlotLookup::Found(&self.entries[idx].1),
            Err(_) => SlotLookup::Straddled,
        }
    }

    /// Overwrite (or append at the very end) the element at a slot
    ///
    /// Overwriting only works when the new element has the same width as the old one. This is
    /// stricter than the JVM (which would invalidate the neighbours) but we never need more.
    pub fn set_offset(&mut self, offset: Offset, elem: T) -> Result<(), (usize, usize)> {
        if offset == self.offset_len {
            self.push(elem);
            return Ok(());
        }
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Ok(idx) => {
                let existing = &mut self.entries[idx].1;
                if existing.width() != elem.width() {
                    Err((elem.width(), existing.width()))
                } else {
                    *existing = elem;
                    Ok(())
                }
            }
            Err(_) => Err((elem.width(), 0)),
        }
    }

    /// Last element, if there is one
    pub fn last(&self) -> Option<&T> {
        self.entries.last().map(|(_, elem)| elem)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Offset, &T)> {
        self.entries.iter().map(|(off, elem)| (*off, elem))
    }
}

impl<T: PartialEq> PartialEq for SlotVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<T: Eq> Eq for SlotVec<T> {}

impl<T: Width> Default for SlotVec<T> {
    fn default() -> Self {
        SlotVec::new()
    }
}

impl<T: Width> FromIterator<T> for SlotVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut slots = SlotVec::new();
        for elem in elems {
            slots.push(elem);
        }
        slots
    }
}

impl<T: Debug> Debug for SlotVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}
