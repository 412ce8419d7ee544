// Connect/disconnect observer bus

use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

pub type ListenerId = u64;

type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// Ordered set of callbacks. A panicking callback is logged and skipped;
/// the rest still run.
pub struct Listeners<T> {
    next_id: ListenerId,
    entries: Vec<(ListenerId, Callback<T>)>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&T) + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, Box::new(callback)));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn emit(&mut self, value: &T) {
        for (id, callback) in self.entries.iter_mut() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(value)));
            if result.is_err() {
                warn!(listener = *id, "pad listener panicked");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_reaches_all_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        for tag in ["a", "b"] {
            let seen = seen.clone();
            listeners.add(move |v: &u32| seen.lock().unwrap().push(format!("{}{}", tag, v)));
        }

        listeners.emit(&1);
        assert_eq!(*seen.lock().unwrap(), vec!["a1", "b1"]);
    }

    #[test]
    fn test_removed_listener_is_not_called() {
        let count = Arc::new(Mutex::new(0));
        let mut listeners = Listeners::new();
        let c = count.clone();
        let id = listeners.add(move |_: &()| *c.lock().unwrap() += 1);

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.emit(&());
        assert_eq!(*count.lock().unwrap(), 0);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let count = Arc::new(Mutex::new(0));
        let mut listeners = Listeners::new();
        listeners.add(|_: &()| panic!("listener failure"));
        let c = count.clone();
        listeners.add(move |_: &()| *c.lock().unwrap() += 1);

        listeners.emit(&());
        listeners.emit(&());
        assert_eq!(*count.lock().unwrap(), 2);
    }
}
