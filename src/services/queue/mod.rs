//! Waiting line for members who asked while every instance was busy

pub mod dispatch;
pub mod wait;

pub use dispatch::{admit, dispatch_next, spawn_queue_dispatcher, Admission};
pub use wait::{QueuePosition, WaitEntry, WaitQueue};
