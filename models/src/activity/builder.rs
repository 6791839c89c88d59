use crate::activity::{
    Activity, ActivityAssets, ActivityParty, ActivityTimestamps, ActivityType, StatusDisplayType,
    validate_text, validate_url,
};
use crate::ModelError;

/// Builder for creating validated [`Activity`] instances.
///
/// Every field is optional; `build` rejects display strings outside
/// 2-128 characters and URLs that are not http(s).
#[derive(Debug, Default)]
pub struct ActivityBuilder {
    activity_type: ActivityType,
    details: Option<String>,
    details_url: Option<String>,
    state: Option<String>,
    state_url: Option<String>,
    status_display_type: Option<StatusDisplayType>,
    party: Option<ActivityParty>,
    timestamps: Option<ActivityTimestamps>,
    assets: Option<ActivityAssets>,
}

impl ActivityBuilder {
    pub fn with_type(mut self, activity_type: ActivityType) -> Self {
        self.activity_type = activity_type;
        self
    }

    /// What the user is currently doing, e.g. "Selecting a game mode".
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_details_url(mut self, url: impl Into<String>) -> Self {
        self.details_url = Some(url.into());
        self
    }

    /// The party's state, e.g. "In lobby".
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_state_url(mut self, url: impl Into<String>) -> Self {
        self.state_url = Some(url.into());
        self
    }

    pub fn with_status_display_type(mut self, display_type: StatusDisplayType) -> Self {
        self.status_display_type = Some(display_type);
        self
    }

    pub fn with_party(mut self, party: ActivityParty) -> Self {
        self.party = Some(party);
        self
    }

    pub fn with_timestamps(mut self, timestamps: ActivityTimestamps) -> Self {
        self.timestamps = Some(timestamps);
        self
    }

    pub fn with_assets(mut self, assets: ActivityAssets) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Build the Activity with validation.
    #[track_caller]
    pub fn build(self) -> Result<Activity, ModelError> {
        if let Some(ref details) = self.details {
            validate_text("Details", details)?;
        }

        if let Some(ref state) = self.state {
            validate_text("State", state)?;
        }

        if let Some(ref url) = self.details_url {
            validate_url("details URL", url)?;
        }

        if let Some(ref url) = self.state_url {
            validate_url("state URL", url)?;
        }

        Ok(Activity {
            activity_type: self.activity_type,
            details: self.details,
            details_url: self.details_url,
            state: self.state,
            state_url: self.state_url,
            status_display_type: self.status_display_type,
            party: self.party,
            timestamps: self.timestamps,
            assets: self.assets,
        })
    }
}
