//! Invocation sessions
//!
//! One session per plugin run: the message-routing state machine
//! ([`invocation`]) and the host-supplied capability set it reports into
//! ([`delegate`]).

pub mod delegate;
pub mod invocation;

#[cfg(test)]
mod invocation_test;

pub use delegate::{AccumulatingDelegate, PluginInvocationDelegate};
pub use invocation::{InvocationSession, SessionOutcome};
