use chrono::Utc;

use crate::{
    api::UserId,
    consent::{ConsentGate, ConsentStorage},
};

/// An analytics backend, eg. a Google Analytics or PostHog wrapper
pub trait AnalyticsSink {
    fn track(&self, event: &str, properties: &serde_json::Value);
    fn page_view(&self, path: &str);
    fn identify(&self, user: UserId);

    /// Forgets the identified user
    fn reset(&self);
}

/// Forwards to `sink` only what the user consented to being tracked
pub struct GatedAnalytics<S, A> {
    gate: ConsentGate<S>,
    sink: A,
}

impl<S: ConsentStorage, A: AnalyticsSink> GatedAnalytics<S, A> {
    pub fn new(gate: ConsentGate<S>, sink: A) -> GatedAnalytics<S, A> {
        GatedAnalytics { gate, sink }
    }

    pub fn gate(&self) -> &ConsentGate<S> {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut ConsentGate<S> {
        &mut self.gate
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    fn enabled(&self) -> bool {
        self.gate.analytics_enabled(Utc::now())
    }

    pub fn track(&self, event: &str, properties: &serde_json::Value) {
        if self.enabled() {
            self.sink.track(event, properties);
        } else {
            tracing::trace!(event, "analytics disabled, dropping event");
        }
    }

    pub fn page_view(&self, path: &str) {
        if self.enabled() {
            self.sink.page_view(path);
        }
    }

    pub fn identify(&self, user: UserId) {
        if self.enabled() {
            self.sink.identify(user);
        }
    }

    /// Always forwarded, so that revoking consent also forgets the user
    pub fn reset(&self) {
        self.sink.reset();
    }
}
