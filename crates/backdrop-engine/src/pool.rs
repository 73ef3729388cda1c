//! The bounded population of live elements.

use std::time::Duration;

use crate::element::VisualElement;

/// Live elements in birth order (oldest first), never more than `capacity`.
#[derive(Debug, Default)]
pub struct Population {
    elements: Vec<VisualElement>,
    capacity: usize,
}

impl Population {
    /// Empty pool; storage for `capacity` elements is reserved up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn has_room(&self) -> bool {
        self.elements.len() < self.capacity
    }

    /// Add an element, handing it back when the pool is full.
    pub fn insert(&mut self, element: VisualElement) -> Result<(), VisualElement> {
        if !self.has_room() {
            return Err(element);
        }
        self.elements.push(element);
        Ok(())
    }

    /// Lower or raise the ceiling, returning the oldest elements that no
    /// longer fit.
    pub fn set_capacity(&mut self, capacity: usize) -> std::vec::Drain<'_, VisualElement> {
        self.capacity = capacity;
        let excess = self.elements.len().saturating_sub(capacity);
        self.elements.drain(..excess)
    }

    /// Remove every element whose lifetime has run out, passing each to
    /// `retire`. Survivors keep their relative order.
    pub fn retire_expired(&mut self, now: Duration, mut retire: impl FnMut(VisualElement)) -> usize {
        let mut retired = 0;
        let mut i = 0;
        while i < self.elements.len() {
            if self.elements[i].is_expired(now) {
                retire(self.elements.remove(i));
                retired += 1;
            } else {
                i += 1;
            }
        }
        retired
    }

    /// Remove the element at `index`.
    pub fn remove(&mut self, index: usize) -> VisualElement {
        self.elements.remove(index)
    }

    /// Remove everything, oldest first.
    pub fn drain(&mut self) -> std::vec::Drain<'_, VisualElement> {
        self.elements.drain(..)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VisualElement> {
        self.elements.iter()
    }

    pub fn as_slice(&self) -> &[VisualElement] {
        &self.elements
    }

    pub fn as_mut_slice(&mut self) -> &mut [VisualElement] {
        &mut self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementId, Position};
    use backdrop_core::{ElementKind, Rgba, Vec2};

    fn element(id: u64, born_ms: u64, lifetime_ms: Option<u64>) -> VisualElement {
        VisualElement::new(
            ElementId(id),
            ElementKind::Bubble,
            Position::Plane(Vec2::ZERO),
            None,
            10.0,
            Rgba::WHITE,
            Duration::from_millis(born_ms),
            lifetime_ms.map(Duration::from_millis),
        )
    }

    #[test]
    fn insert_refuses_at_capacity() {
        let mut pool = Population::with_capacity(2);
        assert!(pool.insert(element(1, 0, None)).is_ok());
        assert!(pool.insert(element(2, 0, None)).is_ok());
        let rejected = pool.insert(element(3, 0, None)).unwrap_err();
        assert_eq!(rejected.id, ElementId(3));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn shrinking_evicts_oldest_first() {
        let mut pool = Population::with_capacity(5);
        for id in 0..5 {
            pool.insert(element(id, id * 10, None)).unwrap();
        }
        let evicted: Vec<u64> = pool.set_capacity(2).map(|e| e.id.0).collect();
        assert_eq!(evicted, vec![0, 1, 2]);
        let left: Vec<u64> = pool.iter().map(|e| e.id.0).collect();
        assert_eq!(left, vec![3, 4]);
        assert!(!pool.has_room());
    }

    #[test]
    fn retire_expired_keeps_order_of_survivors() {
        let mut pool = Population::with_capacity(4);
        pool.insert(element(1, 0, Some(100))).unwrap();
        pool.insert(element(2, 0, Some(1_000))).unwrap();
        pool.insert(element(3, 50, Some(50))).unwrap();
        pool.insert(element(4, 0, None)).unwrap();

        let mut retired = Vec::new();
        let n = pool.retire_expired(Duration::from_millis(100), |e| retired.push(e.id.0));

        assert_eq!(n, 2);
        assert_eq!(retired, vec![1, 3]);
        let left: Vec<u64> = pool.iter().map(|e| e.id.0).collect();
        assert_eq!(left, vec![2, 4]);
    }
}
