//! # Application Module
//!
//! The epoch step and the synchronizer service that drives it.

pub mod cancel;
pub mod epoch_step;
pub mod service;

pub use cancel::{StopSender, StopSignal};
pub use epoch_step::EpochProcessor;
pub use service::EpochSynchronizer;
