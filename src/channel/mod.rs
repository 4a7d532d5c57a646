//! Command/Data Channel Protocol
//!
//! The transport discipline shared by the name service and every data service.
//!
//! ## Core Concepts
//! - **Mailbox**: A single-slot command queue. Only one command is in flight per service;
//!   a second submitter waits until the slot drains (backpressure, not a bug).
//! - **Ticket**: Every submitted command carries a oneshot reply. The submitter awaits the
//!   ticket to learn whether the command completed.
//! - **Data Lanes**: Two unbounded FIFO lanes per service (inbound, outbound) that carry
//!   chunks one at a time, so neither side buffers a whole file.
//!
//! ## Stream Discipline
//! A stream on a lane ends with exactly one terminator: the empty-chunk sentinel, or an
//! `Err` item marking the stream as failed. Consumers always read up to the terminator,
//! even after a local failure, so a lane never carries leftovers into the next command.

pub mod lane;
pub mod mailbox;
pub mod types;

#[cfg(test)]
mod tests;
