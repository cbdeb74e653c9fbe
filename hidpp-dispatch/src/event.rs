use std::sync::Mutex;

struct Slot<T> {
    current: T,
    listeners: Vec<flume::Sender<T>>,
}

/// Holds a value and broadcasts every change of it to any number of MPMC
/// listeners.
pub struct StateCell<T: Copy + PartialEq> {
    slot: Mutex<Slot<T>>,
}

impl<T: Copy + PartialEq> StateCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slot: Mutex::new(Slot {
                current: initial,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.slot.lock().unwrap().current
    }

    /// Replaces the value. Listeners are only notified if it differs from the
    /// previous one, which is returned in that case.
    ///
    /// Listeners whose receivers were dropped are forgotten.
    pub fn set(&self, value: T) -> Option<T> {
        let mut slot = self.slot.lock().unwrap();
        if slot.current == value {
            return None;
        }

        let previous = std::mem::replace(&mut slot.current, value);
        slot.listeners
            .retain(|listener| listener.send(value).is_ok());
        Some(previous)
    }

    /// Creates a receiver for all future changes.
    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (tx, rx) = flume::unbounded();
        self.slot.lock().unwrap().listeners.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_changes_are_broadcast() {
        let cell = StateCell::new(0u8);
        let listener = cell.subscribe();

        assert_eq!(cell.set(0), None);
        assert_eq!(cell.set(7), Some(0));
        assert_eq!(cell.get(), 7);

        assert_eq!(listener.try_recv(), Ok(7));
        assert!(listener.try_recv().is_err());
    }

    #[test]
    fn dropped_listeners_are_forgotten() {
        let cell = StateCell::new(0u8);
        let kept = cell.subscribe();
        drop(cell.subscribe());

        cell.set(1);
        assert_eq!(kept.try_recv(), Ok(1));
        assert_eq!(cell.slot.lock().unwrap().listeners.len(), 1);
    }
}
