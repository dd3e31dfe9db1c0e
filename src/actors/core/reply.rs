use actix::prelude::*;
use tokio::sync::mpsc;

// ============================================================================
// Reply Channel
// ============================================================================
//
// Bridges the reply-to protocol into plain async code. The channel actor
// forwards every reply it receives into an unbounded tokio channel, so a
// caller that is not itself an actor can hand out a `Recipient<M>` and await
// the answer.
//
// ============================================================================

pub struct ReplyChannel<M>
where
    M: Message<Result = ()> + Send + 'static,
{
    tx: mpsc::UnboundedSender<M>,
}

impl<M> ReplyChannel<M>
where
    M: Message<Result = ()> + Send + 'static,
{
    /// Start a channel actor on the current arbiter
    pub fn open() -> (Recipient<M>, mpsc::UnboundedReceiver<M>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr = ReplyChannel { tx }.start();
        (addr.recipient(), rx)
    }
}

impl<M> Actor for ReplyChannel<M>
where
    M: Message<Result = ()> + Send + 'static,
{
    type Context = Context<Self>;
}

impl<M> Handler<M> for ReplyChannel<M>
where
    M: Message<Result = ()> + Send + 'static,
{
    type Result = ();

    fn handle(&mut self, msg: M, ctx: &mut Self::Context) {
        if self.tx.send(msg).is_err() {
            // Receiver dropped, nobody is waiting any more
            ctx.stop();
        }
    }
}
