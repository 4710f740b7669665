//! Plushie style, subject category and gallery filter definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Available plushie rendering styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlushieStyle {
    /// Traditional teddy-bear look
    Classic,
    /// Oversized eyes, pastel palette
    Kawaii,
    /// Faithful to the source photo
    Realistic,
}

impl PlushieStyle {
    /// All available styles.
    pub const ALL: &'static [PlushieStyle] = &[
        PlushieStyle::Classic,
        PlushieStyle::Kawaii,
        PlushieStyle::Realistic,
    ];

    /// Returns the style name as stored and used in image keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlushieStyle::Classic => "classic",
            PlushieStyle::Kawaii => "kawaii",
            PlushieStyle::Realistic => "realistic",
        }
    }
}

impl fmt::Display for PlushieStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlushieStyle {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classic" => Ok(PlushieStyle::Classic),
            "kawaii" => Ok(PlushieStyle::Kawaii),
            "realistic" => Ok(PlushieStyle::Realistic),
            _ => Err(StyleParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown plushie style: {0}")]
pub struct StyleParseError(String);

/// Subject category of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationCategory {
    People,
    Pets,
}

impl GenerationCategory {
    pub const ALL: &'static [GenerationCategory] =
        &[GenerationCategory::People, GenerationCategory::Pets];

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationCategory::People => "people",
            GenerationCategory::Pets => "pets",
        }
    }
}

impl fmt::Display for GenerationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GenerationCategory {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "people" => Ok(GenerationCategory::People),
            "pets" => Ok(GenerationCategory::Pets),
            _ => Err(CategoryParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown generation category: {0}")]
pub struct CategoryParseError(String);

/// Gallery listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GalleryFilter {
    #[default]
    All,
    People,
    Pets,
    Favorites,
}

impl GalleryFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            GalleryFilter::All => "all",
            GalleryFilter::People => "people",
            GalleryFilter::Pets => "pets",
            GalleryFilter::Favorites => "favorites",
        }
    }

    /// Category constraint implied by the filter, if any.
    pub fn category(&self) -> Option<GenerationCategory> {
        match self {
            GalleryFilter::People => Some(GenerationCategory::People),
            GalleryFilter::Pets => Some(GenerationCategory::Pets),
            _ => None,
        }
    }

    /// Whether the filter restricts to favorites.
    pub fn favorites_only(&self) -> bool {
        matches!(self, GalleryFilter::Favorites)
    }
}

impl FromStr for GalleryFilter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(GalleryFilter::All),
            "people" => Ok(GalleryFilter::People),
            "pets" => Ok(GalleryFilter::Pets),
            "favorites" => Ok(GalleryFilter::Favorites),
            _ => Err(FilterParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown gallery filter: {0}")]
pub struct FilterParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parse() {
        assert_eq!("kawaii".parse::<PlushieStyle>().unwrap(), PlushieStyle::Kawaii);
        assert_eq!("CLASSIC".parse::<PlushieStyle>().unwrap(), PlushieStyle::Classic);
        assert!("velvet".parse::<PlushieStyle>().is_err());
    }

    #[test]
    fn test_style_display_roundtrip() {
        for style in PlushieStyle::ALL {
            assert_eq!(style.to_string().parse::<PlushieStyle>().unwrap(), *style);
        }
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(
            "pets".parse::<GenerationCategory>().unwrap(),
            GenerationCategory::Pets
        );
        assert!("plants".parse::<GenerationCategory>().is_err());
        for category in GenerationCategory::ALL {
            assert_eq!(
                category.as_str().parse::<GenerationCategory>().unwrap(),
                *category
            );
        }
    }

    #[test]
    fn test_filter_constraints() {
        assert_eq!(
            "people".parse::<GalleryFilter>().unwrap().category(),
            Some(GenerationCategory::People)
        );
        assert_eq!(GalleryFilter::All.category(), None);
        assert!(GalleryFilter::Favorites.favorites_only());
        assert!(!GalleryFilter::Pets.favorites_only());
    }

    #[test]
    fn test_filter_default_is_all() {
        assert_eq!(GalleryFilter::default(), GalleryFilter::All);
    }

    #[test]
    fn test_filter_name_roundtrip() {
        for filter in [
            GalleryFilter::All,
            GalleryFilter::People,
            GalleryFilter::Pets,
            GalleryFilter::Favorites,
        ] {
            assert_eq!(filter.as_str().parse::<GalleryFilter>().unwrap(), filter);
        }
    }
}
