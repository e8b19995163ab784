pub mod callbacks;
pub mod channels;
pub mod lock;
pub mod mixer;

pub use callbacks::{CallbackQueue, finished_channel};
pub use channels::PlayOptions;
pub use lock::LockEvents;
pub use mixer::Mixer;
