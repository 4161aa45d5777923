//! The block flow: every per-(from, to) chain DAG, tip tracking, weight
//! accounting, dependency selection and the sync view over it all.

pub mod chain;
pub mod errors;
pub mod flow;
pub mod locator;
pub mod orphan;
pub mod retarget;

pub use errors::{FlowError, ValidationError};
pub use flow::{AddOutcome, AddedInfo, BlockFlow, BlockFlowTemplate};
pub use orphan::{OrphanBuffer, OrphanItem};
pub use retarget::{RetargetStrategy, WindowedMeanRetarget};
