//! SignalBus - listener registration and signal delivery
//!
//! The bus is responsible for:
//! - Subscribing and unsubscribing listeners by id
//! - Delivering a signal to every listener that asked for it, in subscription order
//! - Tracking per-listener delivery statistics

use dashmap::DashMap;

use super::types::{BoxedListener, ListenerStats, SignalKind, StudySignal};

pub struct SignalBus {
    /// Subscribed listeners by id
    listeners: DashMap<String, BoxedListener>,
    /// Listener ids per signal, in subscription order
    listeners_by_signal: DashMap<SignalKind, Vec<String>>,
    stats: DashMap<String, ListenerStats>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            listeners_by_signal: DashMap::new(),
            stats: DashMap::new(),
        }
    }

    /// Subscribe a listener. Re-subscribing an id replaces the earlier listener.
    pub fn subscribe(&self, listener: BoxedListener) {
        let id = listener.id().to_string();
        self.unsubscribe(&id);

        for kind in listener.signals() {
            self.listeners_by_signal
                .entry(kind)
                .or_default()
                .push(id.clone());
        }
        self.listeners.insert(id.clone(), listener);
        self.stats.insert(id.clone(), ListenerStats::default());

        log::debug!("[SIGNALS] Subscribed listener: {}", id);
    }

    pub fn unsubscribe(&self, id: &str) {
        if self.listeners.remove(id).is_some() {
            for mut entry in self.listeners_by_signal.iter_mut() {
                entry.value_mut().retain(|listener_id| listener_id != id);
            }
            self.stats.remove(id);
            log::debug!("[SIGNALS] Unsubscribed listener: {}", id);
        }
    }

    /// Deliver a signal, returning how many listeners received it
    pub fn emit(&self, signal: &StudySignal) -> usize {
        let kind = signal.kind();
        let ids: Vec<String> = self
            .listeners_by_signal
            .get(&kind)
            .map(|v| v.clone())
            .unwrap_or_default();

        log::info!("[SIGNALS] Emitting '{}' to {} listeners", kind.as_str(), ids.len());

        let mut delivered = 0;
        for id in ids {
            // Clone out of the map so a listener may (un)subscribe while handling
            let listener = match self.listeners.get(&id) {
                Some(l) => l.clone(),
                None => continue,
            };
            listener.on_signal(signal);
            if let Some(mut stats) = self.stats.get_mut(&id) {
                stats.record_delivery(kind);
            }
            delivered += 1;
        }
        delivered
    }

    pub fn get_stats(&self, id: &str) -> Option<ListenerStats> {
        self.stats.get(id).map(|s| s.clone())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{FnListener, SignalRecorder};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use study_types::{EndingOutcome, EndingReason};

    fn end_signal() -> StudySignal {
        StudySignal::End(EndingOutcome {
            ending_reason: EndingReason::Expired,
            ending_name: "expired".to_string(),
            urls: Vec::new(),
        })
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = SignalBus::new();
        bus.subscribe(Arc::new(SignalRecorder::new("recorder")));
        assert_eq!(bus.listener_count(), 1);

        bus.unsubscribe("recorder");
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.emit(&end_signal()), 0);
    }

    #[test]
    fn test_emit_respects_signal_filter() {
        let bus = SignalBus::new();
        let ready_calls = Arc::new(AtomicUsize::new(0));
        let counter = ready_calls.clone();
        bus.subscribe(Arc::new(FnListener::new("ready-only", vec![SignalKind::Ready], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        let recorder = Arc::new(SignalRecorder::new("all"));
        bus.subscribe(recorder.clone());

        assert_eq!(bus.emit(&end_signal()), 1);
        assert_eq!(ready_calls.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.count(SignalKind::End), 1);
        let stats = bus.get_stats("all").unwrap();
        assert_eq!((stats.ready, stats.end), (0, 1));
        assert_eq!(stats.deliveries(), 1);
        assert_eq!(bus.get_stats("ready-only").unwrap().deliveries(), 0);
    }

    #[test]
    fn test_resubscribe_replaces_listener() {
        let bus = SignalBus::new();
        let first = Arc::new(SignalRecorder::new("same"));
        let second = Arc::new(SignalRecorder::new("same"));
        bus.subscribe(first.clone());
        bus.subscribe(second.clone());

        assert_eq!(bus.emit(&end_signal()), 1);
        assert!(first.received().is_empty());
        assert_eq!(second.received().len(), 1);
    }
}
