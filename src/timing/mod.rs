mod clock;
mod loader;
mod scheduler;

pub use clock::TempoClock;
pub use loader::{EventList, LoadedSequence, load_track};
pub use scheduler::MergeScheduler;
