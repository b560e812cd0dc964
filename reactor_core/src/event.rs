//! Decision records emitted by automations and the sinks that consume them.
use std::fmt;

use crossbeam_channel::Sender;

/// Category of action an automation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DilutionEvent,
    UpdatedHeaterDc,
    ChangedLedIntensity,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::DilutionEvent => "DilutionEvent",
            EventKind::UpdatedHeaterDc => "UpdatedHeaterDC",
            EventKind::ChangedLedIntensity => "ChangedLedIntensity",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message plus named numeric fields, in insertion order.
///
/// Field names are consumed by dashboards and logs; keep them stable.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionEvent {
    kind: EventKind,
    message: String,
    data: Vec<(&'static str, f64)>,
}

impl DecisionEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: Vec::new(),
        }
    }

    /// Attach a field. A repeated name replaces the earlier value.
    #[must_use]
    pub fn with(mut self, name: &'static str, value: f64) -> Self {
        match self.data.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.data.push((name, value)),
        }
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.data.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }

    pub fn fields(&self) -> &[(&'static str, f64)] {
        &self.data
    }
}

impl fmt::Display for DecisionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Telemetry collaborator receiving every emitted event.
pub trait EventSink {
    fn emit(&mut self, event: &DecisionEvent);
}

impl EventSink for Vec<DecisionEvent> {
    fn emit(&mut self, event: &DecisionEvent) {
        self.push(event.clone());
    }
}

/// Logs each event at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &DecisionEvent) {
        let fields = event
            .fields()
            .iter()
            .map(|(k, v)| format!("{k}={v:.4}"))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(kind = %event.kind(), fields = %fields, "{}", event.message());
    }
}

/// Forwards events to another thread (e.g. a publisher) over a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<DecisionEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<DecisionEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: &DecisionEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!("event receiver dropped; discarding {}", event.kind());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_keep_insertion_order_and_replace_duplicates() {
        let ev = DecisionEvent::new(EventKind::DilutionEvent, "cycled")
            .with("latest_od", 0.7)
            .with("target_od", 0.6)
            .with("latest_od", 0.8);
        assert_eq!(ev.fields(), &[("latest_od", 0.8), ("target_od", 0.6)]);
        assert_eq!(ev.get("target_od"), Some(0.6));
        assert_eq!(ev.get("volume"), None);
    }

    #[test]
    fn channel_sink_forwards_and_survives_dropped_receiver() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut sink = ChannelSink::new(tx);
        let ev = DecisionEvent::new(EventKind::UpdatedHeaterDc, "delta_dc=1.0");
        sink.emit(&ev);
        assert_eq!(rx.try_recv().ok(), Some(ev.clone()));
        drop(rx);
        sink.emit(&ev);
    }
}
