//! Presence payload models.
//!
//! Pure data structures describing the activity an application publishes to
//! the companion process. They carry no protocol logic; `presence-core`
//! serializes them into `SET_ACTIVITY` requests.

pub mod activity;
pub mod error;

pub use activity::assets::{ActivityAssets, ActivityAssetsBuilder};
pub use activity::builder::ActivityBuilder;
pub use activity::party::{ActivityParty, ActivityPartyBuilder, PartyPrivacy};
pub use activity::timestamps::ActivityTimestamps;
pub use activity::{Activity, ActivityType, StatusDisplayType};
pub use common::ErrorLocation;
pub use error::model_error::ModelError;
