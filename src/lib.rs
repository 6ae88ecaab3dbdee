//! 💠 SnsGate — authenticated intake for SNS HTTP(S) push notifications
//!
//! Every inbound message is parsed, checked against the topic and origin
//! policy, rebuilt into its canonical form and verified against the sender's
//! certificate before anything downstream may act on it.

pub mod envelope;
pub mod canonical;
pub mod policy;
pub mod crypto;
pub mod fetch;
pub mod confirm;
pub mod config;
pub mod receiver;

pub use config::ReceiverConfig;
pub use envelope::{Envelope, MessageType};
pub use policy::Policy;
pub use receiver::{RejectReason, SnsReceiver, VerificationResult};
