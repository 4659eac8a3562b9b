//! LRU (Least Recently Used) ordered store
//!
//! Uses an index-linked list over a slab of slots for O(1) touch and eviction.
//! The hash map points at slot indices; freed slots are recycled through a
//! free list so the slab never grows past `capacity`.

use std::collections::HashMap;
use std::hash::Hash;

use ahash::RandomState;

use crate::error::{Error, Result};

/// Node in the LRU doubly-linked list
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// LRU store with fixed capacity
///
/// Head is the most recently used entry, tail the least recently used.
pub struct LruStore<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    capacity: usize,
}

impl<K, V> LruStore<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new LRU store with the given capacity
    ///
    /// # Errors
    /// * [`Error::InvalidConfiguration`] if `capacity` is zero
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("capacity must be greater than 0"));
        }

        Ok(Self {
            map: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_list: Vec::new(),
            capacity,
        })
    }

    /// Get a value and mark it most recently used
    ///
    /// Absent keys leave the recency order untouched.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Get a value without touching the recency order
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Check for a key without touching the recency order
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or update a key-value pair
    ///
    /// Returns the evicted `(key, value)` when a new key had to displace the
    /// least recently used entry.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.map.get(&key) {
            if let Some(node) = &mut self.nodes[idx] {
                node.value = value;
            }
            self.move_to_front(idx);
            return None;
        }

        let evicted = if self.map.len() >= self.capacity {
            self.evict()
        } else {
            None
        };

        let idx = self.alloc_node();
        self.nodes[idx] = Some(Node {
            key: key.clone(),
            value,
            prev: None,
            next: self.head,
        });

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }

        self.map.insert(key, idx);
        evicted
    }

    /// Remove a key from the store
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        self.free_node(idx);
        self.nodes[idx].take().map(|node| node.value)
    }

    /// Remove and return the least recently used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        self.evict()
    }

    /// Get the current number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry; capacity is unchanged
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
    }

    /// Iterate keys from most to least recently used
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            nodes: &self.nodes,
            cursor: self.head,
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        self.unlink(idx);

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match &self.nodes[idx] {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn evict(&mut self) -> Option<(K, V)> {
        let tail_idx = self.tail?;
        // Unlink while the slot is still populated so the neighbours get patched.
        self.unlink(tail_idx);
        let node = self.nodes[tail_idx].take()?;
        self.map.remove(&node.key);
        self.free_node(tail_idx);
        Some((node.key, node.value))
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.free_list.push(idx);
    }

    /// Walks the list both ways and checks it against the map.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let forward: Vec<usize> = {
            let mut out = Vec::new();
            let mut cursor = self.head;
            while let Some(idx) = cursor {
                out.push(idx);
                cursor = self.nodes[idx].as_ref().and_then(|n| n.next);
                assert!(out.len() <= self.capacity, "cycle in recency list");
            }
            out
        };
        let mut backward: Vec<usize> = {
            let mut out = Vec::new();
            let mut cursor = self.tail;
            while let Some(idx) = cursor {
                out.push(idx);
                cursor = self.nodes[idx].as_ref().and_then(|n| n.prev);
                assert!(out.len() <= self.capacity, "cycle in recency list");
            }
            out
        };
        backward.reverse();

        assert_eq!(forward, backward);
        assert_eq!(forward.len(), self.map.len());
        assert!(self.map.len() <= self.capacity);
        for idx in forward {
            let node = self.nodes[idx].as_ref().expect("linked slot is empty");
            assert_eq!(self.map.get(&node.key), Some(&idx));
        }
    }
}

/// Iterator over store keys, most recently used first
pub struct Keys<'a, K, V> {
    nodes: &'a [Option<Node<K, V>>],
    cursor: Option<usize>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes[self.cursor?].as_ref()?;
        self.cursor = node.next;
        Some(&node.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(store: &LruStore<i32, &'static str>) -> Vec<i32> {
        store.keys().copied().collect()
    }

    #[test]
    fn test_lru_basic() {
        let mut store = LruStore::new(2).unwrap();

        store.put(1, "a");
        store.put(2, "b");

        assert_eq!(store.get(&1), Some(&"a"));
        assert_eq!(store.get(&2), Some(&"b"));
        assert_eq!(store.len(), 2);
        store.assert_consistent();
    }

    #[test]
    fn test_lru_zero_capacity() {
        let result = LruStore::<i32, i32>::new(0);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_lru_eviction() {
        let mut store = LruStore::new(2).unwrap();

        store.put(1, "a");
        store.put(2, "b");
        let evicted = store.put(3, "c");

        assert_eq!(evicted, Some((1, "a")));
        assert_eq!(store.get(&1), None);
        assert_eq!(store.get(&2), Some(&"b"));
        assert_eq!(store.get(&3), Some(&"c"));
        store.assert_consistent();
    }

    #[test]
    fn test_lru_update() {
        let mut store = LruStore::new(2).unwrap();

        store.put(1, "a");
        store.put(2, "b");
        store.get(&1);
        store.put(3, "c"); // evicts 2

        assert_eq!(store.get(&1), Some(&"a"));
        assert_eq!(store.get(&2), None);
        assert_eq!(store.get(&3), Some(&"c"));
    }

    #[test]
    fn test_lru_touch_on_hit() {
        let mut store = LruStore::new(3).unwrap();

        store.put(1, "a");
        store.put(2, "b");
        store.put(3, "c");
        store.get(&1);
        let evicted = store.put(4, "d");

        assert_eq!(evicted, Some((2, "b")));
        assert_eq!(order(&store), vec![4, 1, 3]);
        store.assert_consistent();
    }

    #[test]
    fn test_lru_first_inserted_evicted_first() {
        let n = 5;
        let mut store = LruStore::new(n).unwrap();

        for key in 0..n as i32 {
            assert!(store.put(key, "v").is_none());
        }
        assert_eq!(store.put(100, "v"), Some((0, "v")));
        assert_eq!(store.put(101, "v"), Some((1, "v")));
        assert_eq!(store.len(), n);
    }

    #[test]
    fn test_lru_miss_has_no_side_effect() {
        let mut store = LruStore::new(2).unwrap();

        store.put(1, "a");
        store.put(2, "b");
        assert_eq!(store.get(&9), None);

        assert_eq!(order(&store), vec![2, 1]);
        assert_eq!(store.put(3, "c"), Some((1, "a")));
    }

    #[test]
    fn test_lru_peek_does_not_touch() {
        let mut store = LruStore::new(2).unwrap();

        store.put(1, "a");
        store.put(2, "b");
        assert_eq!(store.peek(&1), Some(&"a"));
        assert!(store.contains(&1));

        assert_eq!(store.put(3, "c"), Some((1, "a")));
        assert!(!store.contains(&1));
    }

    #[test]
    fn test_lru_remove() {
        let mut store = LruStore::new(3).unwrap();

        store.put(1, "a");
        store.put(2, "b");
        store.put(3, "c");

        assert_eq!(store.remove(&2), Some("b"));
        assert_eq!(store.remove(&2), None);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&2), None);
        assert_eq!(order(&store), vec![3, 1]);
        store.assert_consistent();
    }

    #[test]
    fn test_lru_remove_head_and_tail() {
        let mut store = LruStore::new(3).unwrap();

        store.put(1, "a");
        store.put(2, "b");
        store.put(3, "c");

        store.remove(&3);
        store.remove(&1);
        assert_eq!(order(&store), vec![2]);
        store.assert_consistent();

        store.put(4, "d");
        store.put(5, "e");
        assert_eq!(order(&store), vec![5, 4, 2]);
        store.assert_consistent();
    }

    #[test]
    fn test_lru_pop_lru() {
        let mut store = LruStore::new(3).unwrap();
        assert_eq!(store.pop_lru(), None);

        store.put(1, "a");
        store.put(2, "b");
        assert_eq!(store.pop_lru(), Some((1, "a")));
        assert_eq!(store.pop_lru(), Some((2, "b")));
        assert!(store.is_empty());
        store.assert_consistent();
    }

    #[test]
    fn test_lru_clear() {
        let mut store = LruStore::new(3).unwrap();

        store.put(1, "a");
        store.put(2, "b");
        store.clear();

        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 3);

        store.put(3, "c");
        assert_eq!(order(&store), vec![3]);
        store.assert_consistent();
    }

    #[test]
    fn test_lru_overwrite() {
        let mut store = LruStore::new(2).unwrap();

        store.put(1, "a");
        store.put(2, "b");
        assert!(store.put(1, "z").is_none());

        assert_eq!(store.peek(&1), Some(&"z"));
        assert_eq!(store.len(), 2);
        assert_eq!(order(&store), vec![1, 2]);
    }

    #[test]
    fn test_lru_capacity_one() {
        let mut store = LruStore::new(1).unwrap();

        store.put(1, "a");
        assert_eq!(store.put(2, "b"), Some((1, "a")));
        assert_eq!(store.get(&2), Some(&"b"));
        assert_eq!(store.len(), 1);
        store.assert_consistent();
    }

    #[test]
    fn test_lru_slots_are_recycled() {
        let mut store = LruStore::new(4).unwrap();

        for key in 0..1_000 {
            store.put(key, "v");
            if key % 3 == 0 {
                store.get(&(key - 1));
            }
            if key % 7 == 0 {
                store.remove(&(key - 2));
            }
            assert!(store.len() <= 4);
        }
        assert!(store.nodes.len() <= 4);
        store.assert_consistent();
    }
}
