//! Actor threads.
//!
//! Each actor runs on its own named OS thread with a [`CancelToken`]. The
//! body gets an [`ActorContext`] for cancellable pacing and for reporting
//! state changes that happen outside any critical section.

use crate::cancel::{CancelToken, WaitOutcome};
use crate::config::Span;
use crate::error::{ControllerError, CoordinatorError};
use crate::sink::StateSink;
use crate::types::{ActorId, ActorState};
use log::{debug, error, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct ActorContext {
    id: ActorId,
    cancel: CancelToken,
    sink: Arc<dyn StateSink>,
}

impl ActorContext {
    pub fn new(id: ActorId, cancel: CancelToken, sink: Arc<dyn StateSink>) -> Self {
        Self { id, cancel, sink }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleeps for a random duration drawn from `span`.
    pub fn pause(&self, span: Span) -> WaitOutcome {
        let duration = span.sample(&mut rand::thread_rng());
        self.cancel.sleep(duration)
    }

    pub fn set_state(&self, state: ActorState) {
        self.sink.on_actor_state_changed(self.id, state);
    }

    pub fn sink(&self) -> &dyn StateSink {
        self.sink.as_ref()
    }
}

/// A spawned actor thread.
pub struct ActorHandle {
    id: ActorId,
    cancel: CancelToken,
    thread: JoinHandle<()>,
}

impl ActorHandle {
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the thread. Returns false if the actor panicked.
    pub fn join(self) -> bool {
        match self.thread.join() {
            Ok(()) => true,
            Err(_) => {
                error!("{} panicked", self.id);
                false
            }
        }
    }
}

/// Spawns `body` as actor `id`. Arrival and departure are reported around it.
pub fn spawn<F>(
    id: ActorId,
    cancel: CancelToken,
    sink: Arc<dyn StateSink>,
    body: F,
) -> Result<ActorHandle, ControllerError>
where
    F: FnOnce(&ActorContext) -> Result<(), CoordinatorError> + Send + 'static,
{
    let ctx = ActorContext::new(id, cancel.clone(), sink);
    let thread = thread::Builder::new()
        .name(id.to_string())
        .spawn(move || {
            ctx.sink().on_actor_arrived(id);
            debug!("{} started", id);
            match body(&ctx) {
                Ok(()) => debug!("{} stopped", id),
                Err(err) => warn!("{} stopped: {}", id, err),
            }
            ctx.sink().on_actor_departed(id);
        })?;
    Ok(ActorHandle { id, cancel, thread })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ChannelSink, Notification};
    use std::time::Duration;

    #[test]
    fn arrival_and_departure_bracket_the_body() {
        let (sink, rx) = ChannelSink::new();
        let handle = spawn(ActorId::Agent, CancelToken::new(), Arc::new(sink), |ctx| {
            ctx.set_state(ActorState::Placing);
            Ok(())
        })
        .unwrap();
        assert!(handle.join());
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![
                Notification::Arrived(ActorId::Agent),
                Notification::ActorState(ActorId::Agent, ActorState::Placing),
                Notification::Departed(ActorId::Agent),
            ]
        );
    }

    #[test]
    fn cancel_interrupts_pacing() {
        let (sink, _rx) = ChannelSink::new();
        let handle = spawn(ActorId::Reader(0), CancelToken::new(), Arc::new(sink), |ctx| {
            while !ctx.pause(Span::fixed(Duration::from_secs(30))).is_cancelled() {}
            Ok(())
        })
        .unwrap();
        handle.cancel();
        assert!(handle.join());
    }
}
