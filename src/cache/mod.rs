pub mod clock;
pub mod facade;
pub mod key;
pub mod store;
pub mod sweeper;

use std::time::Duration;

pub use clock::{Clock, ManualClock, SystemClock};
pub use facade::{CacheSnapshot, EntrySnapshot, ResponseCache};
pub use key::{build_key, city_params, Params};
pub use store::{CacheStats, EntryInfo, TimeBoundedCache};
pub use sweeper::{spawn_sweeper, SweeperHandle};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
