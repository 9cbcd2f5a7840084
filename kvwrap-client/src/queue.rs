//! # Response Queue
//!
//! Ordered store of converted response payloads owned by one connection.
//!
//! ## Orientation
//! New entries are inserted at the **front**; the front is always the most
//! recently queued entry and the **back** is the oldest. Reading from the back
//! therefore drains entries in the order they arrived, and an array reply
//! `[A, B, C]` drains as `A, B, C`. Reading from the front returns the newest
//! entry first.

use std::collections::VecDeque;

/// Queue of successful response payloads, newest at the front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseQueue {
    entries: VecDeque<String>,
}

impl ResponseQueue {
    /// Empty queue.
    pub fn new() -> Self {
        ResponseQueue::default()
    }

    /// Number of queued payloads.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Queues a payload as the newest entry.
    pub fn push(&mut self, payload: String) {
        self.entries.push_front(payload);
    }

    /// Reads the newest (`from_front`) or oldest entry without removing it.
    pub fn peek(&self, from_front: bool) -> Option<&str> {
        let entry = if from_front {
            self.entries.front()
        } else {
            self.entries.back()
        };
        entry.map(String::as_str)
    }

    /// Removes and returns the newest (`from_front`) or oldest entry.
    pub fn pop(&mut self, from_front: bool) -> Option<String> {
        if from_front {
            self.entries.pop_front()
        } else {
            self.entries.pop_back()
        }
    }

    /// Most recently queued payload.
    pub fn newest(&self) -> Option<&str> {
        self.peek(true)
    }

    /// Longest-waiting payload.
    pub fn oldest(&self) -> Option<&str> {
        self.peek(false)
    }

    /// Drops the newest entries until only `len` remain; returns how many
    /// were removed.
    ///
    /// Used to undo everything queued since `len` was observed.
    pub fn rollback_to(&mut self, len: usize) -> usize {
        let mut removed = 0;
        while self.entries.len() > len {
            self.entries.pop_front();
            removed += 1;
        }
        removed
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.entries.iter().rev().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(items: &[&str]) -> ResponseQueue {
        let mut queue = ResponseQueue::new();
        for item in items {
            queue.push(item.to_string());
        }
        queue
    }

    #[test]
    fn back_is_oldest_front_is_newest() {
        let queue = queue_of(&["a", "b", "c"]);
        assert_eq!(queue.oldest(), Some("a"));
        assert_eq!(queue.newest(), Some("c"));
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn popping_from_back_drains_in_arrival_order() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert_eq!(queue.pop(false).as_deref(), Some("a"));
        assert_eq!(queue.pop(false).as_deref(), Some("b"));
        assert_eq!(queue.pop(true).as_deref(), Some("c"));
        assert_eq!(queue.pop(false), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn rollback_only_removes_newer_entries() {
        let mut queue = queue_of(&["kept"]);
        let mark = queue.len();
        queue.push("x".to_string());
        queue.push("y".to_string());
        assert_eq!(queue.rollback_to(mark), 2);
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec!["kept"]);
        assert_eq!(queue.rollback_to(5), 0);
    }

    #[test]
    fn clear_empties_queue() {
        let mut queue = queue_of(&["a", "b"]);
        queue.clear();
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.peek(true), None);
    }
}
