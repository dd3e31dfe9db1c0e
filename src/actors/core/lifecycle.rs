use actix::prelude::*;

// ============================================================================
// Actor Lifecycle
// ============================================================================
//
// Supervisors learn about a child's death through an explicit one-shot
// notice the child sends from `stopped()`. The supervisor hands the child a
// `TerminationWatch` when it starts it; nothing is polled.
//
// ============================================================================

/// Message asking an actor to stop after the current message
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct Passivate;

/// Notice that a supervised actor has stopped.
///
/// Carries the address of the actor that stopped so the supervisor can tell a
/// stale notice apart from the current owner of `key`.
pub struct Terminated<A: Actor> {
    pub key: String,
    pub addr: Addr<A>,
}

impl<A: Actor> Message for Terminated<A> {
    type Result = ();
}

impl<A: Actor> std::fmt::Debug for Terminated<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminated").field("key", &self.key).finish()
    }
}

/// One-shot subscription to a child actor's termination
pub struct TerminationWatch<A: Actor> {
    key: String,
    supervisor: Option<Recipient<Terminated<A>>>,
}

impl<A: Actor> TerminationWatch<A> {
    pub fn new(key: impl Into<String>, supervisor: Recipient<Terminated<A>>) -> Self {
        Self {
            key: key.into(),
            supervisor: Some(supervisor),
        }
    }

    /// A watch nobody listens to
    pub fn unwatched(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            supervisor: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Deliver the notice. Later calls are no-ops.
    pub fn notify(&mut self, addr: Addr<A>) {
        if let Some(supervisor) = self.supervisor.take() {
            // A supervisor that already stopped has nothing left to clean up
            supervisor.do_send(Terminated {
                key: self.key.clone(),
                addr,
            });
        }
    }
}
