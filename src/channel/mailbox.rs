//! Single-slot command mailbox and completion tickets.

use tokio::sync::{mpsc, oneshot};

use crate::error::{DfsError, Result};

/// One command in flight per service.
pub const MAILBOX_CAPACITY: usize = 1;

/// A command together with the slot its result goes back through.
pub struct Envelope<C, R> {
    pub command: C,
    reply: oneshot::Sender<Result<R>>,
}

impl<C, R> Envelope<C, R> {
    /// Sends the result back. A submitter that stopped waiting is not an error.
    pub fn respond(self, result: Result<R>) {
        let _ = self.reply.send(result);
    }

    pub fn into_parts(self) -> (C, oneshot::Sender<Result<R>>) {
        (self.command, self.reply)
    }
}

pub type MailboxReceiver<C, R> = mpsc::Receiver<Envelope<C, R>>;

/// Sending half of a service's command slot.
pub struct Mailbox<C, R> {
    owner: String,
    tx: mpsc::Sender<Envelope<C, R>>,
}

impl<C, R> Clone for Mailbox<C, R> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            tx: self.tx.clone(),
        }
    }
}

/// Creates the mailbox for the service named `owner`.
pub fn mailbox<C, R>(owner: &str) -> (Mailbox<C, R>, MailboxReceiver<C, R>) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    (
        Mailbox {
            owner: owner.to_string(),
            tx,
        },
        rx,
    )
}

impl<C, R> Mailbox<C, R> {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Places `command` in the slot, waiting while another command occupies it.
    ///
    /// Returns once the command is accepted; the ticket resolves when it completes.
    pub async fn submit(&self, command: C) -> Result<Ticket<R>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| DfsError::Unreachable(self.owner.clone()))?;

        Ok(Ticket {
            owner: self.owner.clone(),
            rx,
        })
    }

    /// Submits and waits for completion.
    pub async fn call(&self, command: C) -> Result<R> {
        self.submit(command).await?.wait().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Completion handle of a submitted command.
pub struct Ticket<R> {
    owner: String,
    rx: oneshot::Receiver<Result<R>>,
}

impl<R> Ticket<R> {
    /// A detached ticket, for transports that complete commands out of band.
    pub fn channel(owner: &str) -> (oneshot::Sender<Result<R>>, Ticket<R>) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Ticket {
                owner: owner.to_string(),
                rx,
            },
        )
    }

    pub async fn wait(self) -> Result<R> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(DfsError::Unreachable(self.owner)),
        }
    }
}
