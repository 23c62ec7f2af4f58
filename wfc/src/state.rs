use std::iter;
use std::ops::{Index, IndexMut};
use std::slice;

/// Identifies one (tile, rotation/reflection variant) combination.
pub type StateId = u32;

#[derive(Default, Clone, Debug, PartialEq)]
pub struct StateTable<T> {
    table: Vec<T>,
}

impl<T> StateTable<T> {
    pub fn from_vec(table: Vec<T>) -> Self {
        Self { table }
    }
    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
    pub fn iter(&self) -> slice::Iter<T> {
        self.table.iter()
    }
    pub fn enumerate(&self) -> impl Iterator<Item = (StateId, &T)> {
        self.iter()
            .enumerate()
            .map(|(index, item)| (index as StateId, item))
    }
    pub(crate) fn enumerate_mut(&mut self) -> impl Iterator<Item = (StateId, &mut T)> {
        self.table
            .iter_mut()
            .enumerate()
            .map(|(index, item)| (index as StateId, item))
    }
}

impl<T: Clone> StateTable<T> {
    pub(crate) fn resize(&mut self, size: usize, value: T) {
        self.table.resize(size, value);
    }
}

impl<T> iter::FromIterator<T> for StateTable<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            table: Vec::from_iter(iter),
        }
    }
}

impl<T> Index<StateId> for StateTable<T> {
    type Output = T;
    fn index(&self, index: StateId) -> &Self::Output {
        self.table.index(index as usize)
    }
}

impl<T> IndexMut<StateId> for StateTable<T> {
    fn index_mut(&mut self, index: StateId) -> &mut Self::Output {
        self.table.index_mut(index as usize)
    }
}
