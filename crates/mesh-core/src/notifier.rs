//! State-change notifier.

use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use tracing::debug;

/// Set of change-event flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Events(u32);

impl Events {
    pub const NONE: Events = Events(0);
    /// Network interface went up or down.
    pub const THREAD_NETIF_STATE: Events = Events(1 << 0);
    /// Device role changed.
    pub const ROLE: Events = Events(1 << 1);
    /// Backbone router state changed.
    pub const BACKBONE_ROUTER_STATE: Events = Events(1 << 2);

    const ALL: [Events; 3] = [
        Events::THREAD_NETIF_STATE,
        Events::ROLE,
        Events::BACKBONE_ROUTER_STATE,
    ];

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Events) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Events {
    type Output = Events;

    fn bitor(self, rhs: Events) -> Events {
        Events(self.0 | rhs.0)
    }
}

impl BitOrAssign for Events {
    fn bitor_assign(&mut self, rhs: Events) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Events::ALL
            .iter()
            .filter(|e| self.contains(**e))
            .map(|e| match *e {
                Events::THREAD_NETIF_STATE => "netif-state",
                Events::ROLE => "role",
                _ => "bbr-state",
            })
            .collect();
        write!(f, "[{}]", names.join(","))
    }
}

pub type EventCallback = Box<dyn FnMut(Events)>;

/// Delivers change events to subscribed callbacks.
#[derive(Default)]
pub struct Notifier {
    callbacks: Vec<EventCallback>,
    signal_counts: HashMap<u32, u64>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("callbacks", &self.callbacks.len())
            .field("signal_counts", &self.signal_counts)
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: EventCallback) {
        self.callbacks.push(callback);
    }

    /// Delivers `events` to every subscriber.
    pub fn signal(&mut self, events: Events) {
        if events.is_empty() {
            return;
        }

        for flag in Events::ALL.iter().filter(|f| events.contains(**f)) {
            *self.signal_counts.entry(flag.bits()).or_insert(0) += 1;
        }

        debug!(events = %events, subscribers = self.callbacks.len(), "Signaling events");
        for callback in self.callbacks.iter_mut() {
            callback(events);
        }
    }

    /// Number of signals carrying `flag` since creation.
    pub fn signal_count(&self, flag: Events) -> u64 {
        self.signal_counts.get(&flag.bits()).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_signal_reaches_subscribers() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();

        let mut notifier = Notifier::new();
        notifier.subscribe(Box::new(move |e| sink.borrow_mut().push(e)));

        notifier.signal(Events::THREAD_NETIF_STATE);
        notifier.signal(Events::ROLE | Events::BACKBONE_ROUTER_STATE);

        assert_eq!(
            *received.borrow(),
            vec![
                Events::THREAD_NETIF_STATE,
                Events::ROLE | Events::BACKBONE_ROUTER_STATE
            ]
        );
    }

    #[test]
    fn test_signal_counts_per_flag() {
        let mut notifier = Notifier::new();
        notifier.signal(Events::THREAD_NETIF_STATE);
        notifier.signal(Events::THREAD_NETIF_STATE | Events::ROLE);
        notifier.signal(Events::NONE);

        assert_eq!(notifier.signal_count(Events::THREAD_NETIF_STATE), 2);
        assert_eq!(notifier.signal_count(Events::ROLE), 1);
        assert_eq!(notifier.signal_count(Events::BACKBONE_ROUTER_STATE), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!((Events::ROLE | Events::THREAD_NETIF_STATE).to_string(), "[netif-state,role]");
        assert_eq!(Events::NONE.to_string(), "[]");
    }
}
