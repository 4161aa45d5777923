// Reexports from elsewhere in the crate.

pub use crate::buf::{Buf32, Buf64};
pub use crate::group::{BrokerConfig, ChainIndex, GroupIndex};
pub use crate::params::Params;
pub use crate::time::{Clock, SystemClock, Timestamp};
