//! # State notifications.
//!
//! Coordinators and actors push every visible change to a [`StateSink`].
//! Sinks are observers only: they run on the actor's thread after the
//! critical section has been left and must never block for long.

use crate::types::{ActorId, ActorState, ProblemKind, ResourceId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, trace};
use std::sync::Arc;

/// Observer of a running problem. Every method defaults to doing nothing.
pub trait StateSink: Send + Sync {
    fn on_resource_level_changed(&self, _resource: ResourceId, _value: u32) {}

    fn on_actor_state_changed(&self, _actor: ActorId, _state: ActorState) {}

    fn on_actor_arrived(&self, _actor: ActorId) {}

    fn on_actor_departed(&self, _actor: ActorId) {}

    /// `actor` is now waiting for `resource`.
    fn on_request_edge(&self, _actor: ActorId, _resource: ResourceId) {}

    /// `resource` is now held by `actor`.
    fn on_grant_edge(&self, _resource: ResourceId, _actor: ActorId) {}

    /// Any edge between `actor` and `resource` is gone.
    fn on_edge_cleared(&self, _actor: ActorId, _resource: ResourceId) {}

    fn on_invariant_violation(&self, _problem: ProblemKind, _detail: &str) {}
}

/// One recorded call on a [`StateSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ResourceLevel(ResourceId, u32),
    ActorState(ActorId, ActorState),
    Arrived(ActorId),
    Departed(ActorId),
    Request(ActorId, ResourceId),
    Grant(ResourceId, ActorId),
    Cleared(ActorId, ResourceId),
    InvariantViolation(ProblemKind, String),
}

impl Notification {
    pub fn deliver(&self, sink: &dyn StateSink) {
        match self {
            Notification::ResourceLevel(resource, value) => {
                sink.on_resource_level_changed(*resource, *value)
            }
            Notification::ActorState(actor, state) => sink.on_actor_state_changed(*actor, *state),
            Notification::Arrived(actor) => sink.on_actor_arrived(*actor),
            Notification::Departed(actor) => sink.on_actor_departed(*actor),
            Notification::Request(actor, resource) => sink.on_request_edge(*actor, *resource),
            Notification::Grant(resource, actor) => sink.on_grant_edge(*resource, *actor),
            Notification::Cleared(actor, resource) => sink.on_edge_cleared(*actor, *resource),
            Notification::InvariantViolation(problem, detail) => {
                sink.on_invariant_violation(*problem, detail)
            }
        }
    }
}

/// Notifications gathered inside a critical section, published after it.
#[derive(Debug, Default)]
pub struct Events {
    pending: Vec<Notification>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&mut self, resource: ResourceId, value: u32) {
        self.pending.push(Notification::ResourceLevel(resource, value));
    }

    pub fn state(&mut self, actor: ActorId, state: ActorState) {
        self.pending.push(Notification::ActorState(actor, state));
    }

    pub fn request(&mut self, actor: ActorId, resource: ResourceId) {
        self.pending.push(Notification::Request(actor, resource));
    }

    pub fn grant(&mut self, resource: ResourceId, actor: ActorId) {
        self.pending.push(Notification::Grant(resource, actor));
    }

    pub fn clear(&mut self, actor: ActorId, resource: ResourceId) {
        self.pending.push(Notification::Cleared(actor, resource));
    }

    pub fn publish(self, sink: &dyn StateSink) {
        for notification in &self.pending {
            notification.deliver(sink);
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StateSink for NullSink {}

/// Renders the notification stream through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StateSink for LogSink {
    fn on_resource_level_changed(&self, resource: ResourceId, value: u32) {
        debug!("{} = {}", resource, value);
    }

    fn on_actor_state_changed(&self, actor: ActorId, state: ActorState) {
        debug!("{} is {}", actor, state);
    }

    fn on_actor_arrived(&self, actor: ActorId) {
        info!("{} arrived", actor);
    }

    fn on_actor_departed(&self, actor: ActorId) {
        info!("{} departed", actor);
    }

    fn on_request_edge(&self, actor: ActorId, resource: ResourceId) {
        trace!("{} -> {} (request)", actor, resource);
    }

    fn on_grant_edge(&self, resource: ResourceId, actor: ActorId) {
        trace!("{} -> {} (grant)", resource, actor);
    }

    fn on_edge_cleared(&self, actor: ActorId, resource: ResourceId) {
        trace!("{} -- {} cleared", actor, resource);
    }

    fn on_invariant_violation(&self, problem: ProblemKind, detail: &str) {
        error!("{}: invariant violated: {}", problem, detail);
    }
}

/// Forwards every notification to a single consumer thread.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Notification>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    fn forward(&self, notification: Notification) {
        // A consumer that hung up no longer wants updates.
        let _ = self.tx.send(notification);
    }
}

impl StateSink for ChannelSink {
    fn on_resource_level_changed(&self, resource: ResourceId, value: u32) {
        self.forward(Notification::ResourceLevel(resource, value));
    }

    fn on_actor_state_changed(&self, actor: ActorId, state: ActorState) {
        self.forward(Notification::ActorState(actor, state));
    }

    fn on_actor_arrived(&self, actor: ActorId) {
        self.forward(Notification::Arrived(actor));
    }

    fn on_actor_departed(&self, actor: ActorId) {
        self.forward(Notification::Departed(actor));
    }

    fn on_request_edge(&self, actor: ActorId, resource: ResourceId) {
        self.forward(Notification::Request(actor, resource));
    }

    fn on_grant_edge(&self, resource: ResourceId, actor: ActorId) {
        self.forward(Notification::Grant(resource, actor));
    }

    fn on_edge_cleared(&self, actor: ActorId, resource: ResourceId) {
        self.forward(Notification::Cleared(actor, resource));
    }

    fn on_invariant_violation(&self, problem: ProblemKind, detail: &str) {
        self.forward(Notification::InvariantViolation(problem, detail.to_string()));
    }
}

/// Fans one notification stream out to several sinks, in order.
#[derive(Default, Clone)]
pub struct Tee {
    sinks: Vec<Arc<dyn StateSink>>,
}

impl Tee {
    pub fn new(sinks: Vec<Arc<dyn StateSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn StateSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StateSink for Tee {
    fn on_resource_level_changed(&self, resource: ResourceId, value: u32) {
        self.sinks
            .iter()
            .for_each(|s| s.on_resource_level_changed(resource, value));
    }

    fn on_actor_state_changed(&self, actor: ActorId, state: ActorState) {
        self.sinks
            .iter()
            .for_each(|s| s.on_actor_state_changed(actor, state));
    }

    fn on_actor_arrived(&self, actor: ActorId) {
        self.sinks.iter().for_each(|s| s.on_actor_arrived(actor));
    }

    fn on_actor_departed(&self, actor: ActorId) {
        self.sinks.iter().for_each(|s| s.on_actor_departed(actor));
    }

    fn on_request_edge(&self, actor: ActorId, resource: ResourceId) {
        self.sinks
            .iter()
            .for_each(|s| s.on_request_edge(actor, resource));
    }

    fn on_grant_edge(&self, resource: ResourceId, actor: ActorId) {
        self.sinks.iter().for_each(|s| s.on_grant_edge(resource, actor));
    }

    fn on_edge_cleared(&self, actor: ActorId, resource: ResourceId) {
        self.sinks
            .iter()
            .for_each(|s| s.on_edge_cleared(actor, resource));
    }

    fn on_invariant_violation(&self, problem: ProblemKind, detail: &str) {
        self.sinks
            .iter()
            .for_each(|s| s.on_invariant_violation(problem, detail));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_publish_in_order() {
        let (sink, rx) = ChannelSink::new();
        let mut events = Events::new();
        events.request(ActorId::Philosopher(1), ResourceId::Fork(1));
        events.grant(ResourceId::Fork(1), ActorId::Philosopher(1));
        events.level(ResourceId::Buffer, 40);
        events.publish(&sink);
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![
                Notification::Request(ActorId::Philosopher(1), ResourceId::Fork(1)),
                Notification::Grant(ResourceId::Fork(1), ActorId::Philosopher(1)),
                Notification::ResourceLevel(ResourceId::Buffer, 40),
            ]
        );
    }

    #[test]
    fn tee_reaches_every_sink() {
        let (a, rx_a) = ChannelSink::new();
        let (b, rx_b) = ChannelSink::new();
        let tee = Tee::default().with(Arc::new(a)).with(Arc::new(b));
        tee.on_actor_arrived(ActorId::Barber);
        assert_eq!(rx_a.try_recv().unwrap(), Notification::Arrived(ActorId::Barber));
        assert_eq!(rx_b.try_recv().unwrap(), Notification::Arrived(ActorId::Barber));
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_actor_departed(ActorId::Agent);
    }
}
