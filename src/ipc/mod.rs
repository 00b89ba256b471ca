/*!
 * IPC
 * Pipes and the socket rendezvous built on top of them
 */

pub mod pipe;
pub mod socket;
