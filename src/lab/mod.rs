//! Experiment workflow: additive transformations over ideas.
//!
//! An experiment takes a source idea and one [`AdditiveConfig`], runs the
//! vision / generation / image-synthesis adapters in sequence, and persists
//! a new generated idea linked to its lineage. See
//! [`ExperimentOrchestrator`] for the pipeline and [`LineageResolver`] for
//! ancestry reconstruction.

mod generation;
mod lineage;
mod orchestrator;
mod steps;
mod synthesis;
mod vision;

pub use generation::*;
pub use lineage::*;
pub use orchestrator::*;
pub use steps::*;
pub use synthesis::*;
pub use vision::*;

use serde::{Deserialize, Serialize};

/// Sentinel returned when vision analysis is unavailable or fails.
pub const NO_ANALYSIS: &str = "no analysis available";

/// A named transformation applied to an idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Additive {
    /// Push the concept toward novel, unexpected directions.
    Creativity,
    /// Rework the concept's visual and formal language.
    Aesthetics,
    /// Reduce friction in how the concept is used.
    Usability,
}

impl Additive {
    /// Get the additive name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Additive::Creativity => "creativity",
            Additive::Aesthetics => "aesthetics",
            Additive::Usability => "usability",
        }
    }

    /// User-facing label, as shown in result titles
    pub fn label(&self) -> &'static str {
        match self {
            Additive::Creativity => "창의성",
            Additive::Aesthetics => "심미성",
            Additive::Usability => "사용성",
        }
    }
}

impl std::fmt::Display for Additive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Additive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "creativity" => Ok(Additive::Creativity),
            "aesthetics" => Ok(Additive::Aesthetics),
            "usability" => Ok(Additive::Usability),
            _ => Err(format!("Unknown additive: {}", s)),
        }
    }
}

/// The user's transformation choice for one experiment.
///
/// `intensity` is 0-100 and reflects explicit user intent; the UI boundary
/// is responsible for rejecting an untouched control. `reference_image` is
/// a data URL and is only meaningful for [`Additive::Aesthetics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditiveConfig {
    pub additive: Additive,
    pub intensity: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
}

impl AdditiveConfig {
    /// Create a new config with additive and intensity
    pub fn new(additive: Additive, intensity: u8) -> Self {
        Self {
            additive,
            intensity,
            reference_image: None,
        }
    }

    /// Attach a reference image (data URL)
    pub fn with_reference_image(mut self, data_url: impl Into<String>) -> Self {
        self.reference_image = Some(data_url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_additive_as_str() {
        assert_eq!(Additive::Creativity.as_str(), "creativity");
        assert_eq!(Additive::Aesthetics.as_str(), "aesthetics");
        assert_eq!(Additive::Usability.as_str(), "usability");
    }

    #[test]
    fn test_additive_display() {
        assert_eq!(format!("{}", Additive::Creativity), "creativity");
        assert_eq!(format!("{}", Additive::Usability), "usability");
    }

    #[test]
    fn test_additive_from_str_valid() {
        assert_eq!(
            "creativity".parse::<Additive>().unwrap(),
            Additive::Creativity
        );
        assert_eq!(
            "aesthetics".parse::<Additive>().unwrap(),
            Additive::Aesthetics
        );
        assert_eq!("usability".parse::<Additive>().unwrap(), Additive::Usability);
    }

    #[test]
    fn test_additive_from_str_case_insensitive() {
        assert_eq!(
            "CREATIVITY".parse::<Additive>().unwrap(),
            Additive::Creativity
        );
        assert_eq!(
            "Aesthetics".parse::<Additive>().unwrap(),
            Additive::Aesthetics
        );
    }

    #[test]
    fn test_additive_from_str_invalid() {
        let result = "novelty".parse::<Additive>();
        assert!(result.is_err());
        assert_eq!(result.unwrap_err(), "Unknown additive: novelty");
    }

    #[test]
    fn test_additive_config_builder() {
        let config = AdditiveConfig::new(Additive::Aesthetics, 70)
            .with_reference_image("data:image/png;base64,AAAA");

        assert_eq!(config.additive, Additive::Aesthetics);
        assert_eq!(config.intensity, 70);
        assert!(config.reference_image.is_some());
    }
}
