/*!
 * Synchronization Module
 * Keyed wait queues for blocking kernel operations
 */

pub mod wait;

pub use wait::{Ticket, WaitQueue};
