use crate::ModelError;
use crate::activity::validate_text;

use serde::{Deserialize, Serialize};

/// Images and hover texts rendered on the activity card.
///
/// Images are either asset keys from the developer portal or URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityAssets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

impl ActivityAssets {
    pub fn builder() -> ActivityAssetsBuilder {
        ActivityAssetsBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct ActivityAssetsBuilder {
    large_image: Option<String>,
    large_text: Option<String>,
    small_image: Option<String>,
    small_text: Option<String>,
}

impl ActivityAssetsBuilder {
    pub fn with_large_image(mut self, image: impl Into<String>) -> Self {
        self.large_image = Some(image.into());
        self
    }

    pub fn with_large_text(mut self, text: impl Into<String>) -> Self {
        self.large_text = Some(text.into());
        self
    }

    pub fn with_small_image(mut self, image: impl Into<String>) -> Self {
        self.small_image = Some(image.into());
        self
    }

    pub fn with_small_text(mut self, text: impl Into<String>) -> Self {
        self.small_text = Some(text.into());
        self
    }

    /// Build the assets, validating hover text lengths.
    #[track_caller]
    pub fn build(self) -> Result<ActivityAssets, ModelError> {
        if let Some(ref text) = self.large_text {
            validate_text("Large image text", text)?;
        }
        if let Some(ref text) = self.small_text {
            validate_text("Small image text", text)?;
        }

        Ok(ActivityAssets {
            large_image: self.large_image,
            large_text: self.large_text,
            small_image: self.small_image,
            small_text: self.small_text,
        })
    }
}
