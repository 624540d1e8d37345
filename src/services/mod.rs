pub mod delivery;
pub mod file_watcher;
pub mod watch_session;


pub use delivery::{PlanStream, PlanUpdate};
pub use file_watcher::FileWatcher;
pub use watch_session::{WatchHandle, WatchSettings};
