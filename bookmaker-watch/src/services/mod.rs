//! Service modules for the watch pipeline
//!
//! - `file_placer`   - canonical naming, output/quarantine moves, directory lifecycle
//! - `event_handler` - per-file extract → resolve → place, reported to the status channel
//! - `watch_session` - observer lifecycle and the dispatching worker task

pub mod event_handler;
pub mod file_placer;
pub mod watch_session;

pub use event_handler::{matches_extension, EventHandler};
pub use file_placer::{canonical_name, FilePlacer, PlaceError, PlaceOutcome};
pub use watch_session::{WatchSession, END_MESSAGE};
