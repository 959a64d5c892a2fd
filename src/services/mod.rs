pub mod guard;
pub mod media;
pub mod queue;
pub mod snapshot;
pub mod stats;
pub mod voice;
