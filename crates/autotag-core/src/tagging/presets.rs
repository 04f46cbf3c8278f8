//! Built-in tag pools and custom pool files.
//!
//! Three presets ship with the binary:
//!
//! - `photography`: 14 curated categories with descriptive prompts. Suited to
//!   the single-label and caption-mediated policies.
//! - `scenes`: a broad vocabulary of short scene/subject labels, rendered
//!   through the prompt template. Suited to multi-label tagging.
//! - `styles`: descriptive photographic style prompts used verbatim as labels.
//!
//! Anything else is treated as a path to a TOML file of `[[tags]]` tables.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

use super::pool::TagEntry;

/// Names accepted by [`resolve_entries`] without touching the filesystem.
pub const PRESET_NAMES: &[&str] = &["photography", "scenes", "styles"];

const PHOTOGRAPHY: &[(&str, &str)] = &[
    (
        "Landscape",
        "A photo of a landscape. There could be mountains, forests, or coastlines. All taken at a distance.",
    ),
    ("Night", "A photo at night, outside, illuminated with city lights"),
    (
        "Winter Snow",
        "A photo of the outdoors in the winter. Outside, snow covering the ground or environment.",
    ),
    (
        "Urban Downtown",
        "A photo of urban downtown life, with skyscrapers or bustling streets.",
    ),
    (
        "Silhouette",
        "A silhouette photo, where the subject is dark against a bright background.",
    ),
    (
        "Portrait",
        "A portrait photo focusing on a person's face or upper body.",
    ),
    (
        "Closeup Nature",
        "A photo of close-up natural elements, like leaves, insects, or small details.",
    ),
    (
        "Patterns/Detail",
        "A photo emphasizing detail, patterns, or repetition in textures.",
    ),
    (
        "Fall Colors",
        "A photo showing autumn foliage with red, orange, or yellow leaves.",
    ),
    ("Garden/Flowers", "A photo of a garden or flowers in bloom."),
    (
        "Bodies of Water",
        "A photo including lakes, rivers, or other bodies of water.",
    ),
    ("Cat", "A photo of a housecat"),
    (
        "Suburbs",
        "A photo highlighting the suburbs. The photo is predominantly small residential houses.",
    ),
    (
        "Lights & Shadow",
        "A photo that focuses predominantly on lighting and harsh shadows",
    ),
];

const SCENES: &[&str] = &[
    "Portrait", "Selfie", "Group Photo", "Drone Shot", "Wedding", "Party", "Family", "Children",
    "Couple", "Fashion", "Model", "Street Photography", "Candid", "Lifestyle", "Concert",
    "Festival", "Nightlife", "Sports", "Fitness", "Action", "Macro", "Flowers", "Insect",
    "Snowflake", "Texture", "Abstract", "Minimalist", "Still Life", "Product", "Food",
    "Cuisine", "Dessert", "Coffee", "Drink", "Technology", "Computer", "Smartphone", "Robotics",
    "Electronics", "Architecture", "Interior", "Furniture", "Design", "Office", "Vehicle",
    "Car", "Motorcycle", "Bicycle", "Aircraft", "Ship", "Train", "Drone", "Underwater", "Scuba",
    "Snorkeling", "Landscape", "Mountain", "Desert", "Forest", "Beach", "Cityscape",
    "Skyscraper", "Bridge", "Historic Building", "Street Art", "Graffiti", "Alleyway", "Market",
    "Night Photography", "Sunrise", "Sunset", "Storm", "Fog", "Snow", "Rain", "Rainbow",
    "Lightning", "Astrophotography", "Milky Way", "Star Trails", "Moon", "Wildlife", "Bird",
    "Dog", "Cat", "Butterfly", "Bees", "Farm", "Agriculture", "Camping", "Hiking",
    "Backpacking", "Travel", "Tourism", "Waterfall", "Island", "Canyon", "Cliff", "Glacier",
    "Volcano", "Cave", "Lake", "River", "Coast", "Prairie", "Jungle", "Meadow", "Patterns",
    "Silhouette", "Reflection", "Bokeh", "High Key", "Low Key", "Black and White", "Vintage",
    "Retro", "Film", "Experimental", "Infrared", "Long Exposure", "Motion Blur", "Light Trails",
    "Light Painting", "Double Exposure", "Panorama", "Collage", "Diptych", "Triptych",
    "Self-Portrait", "Surreal", "Fantasy", "Cosplay", "Boudoir", "Editorial", "Magazine",
    "Advertising", "Branding", "Social Media", "Influencer", "Event", "Skateboarding",
    "Surfing", "Snowboarding", "Skiing", "Sculpture", "Museum", "Gallery", "Exhibition",
    "Home Interior", "Kitchen", "Living Room", "Street Scene", "Photojournalism", "Fine Art",
    "Street Style", "Glamour", "Headshot", "Documentary", "Golden Hour", "Blue Hour",
    "Overcast", "Protest", "Market Stall", "Busker", "Festival Crowd", "Fireworks",
    "Reflection Pool", "Urban Skyline", "Traffic Jam", "Painted Mural", "Farmers Market",
    "Hot Air Balloon", "Vineyard", "Lighthouse",
];

const STYLES: &[&str] = &[
    "A close-up portrait emphasizing the subject's expression and personality.",
    "A dramatic cityscape showcasing skyscrapers, bridges, and urban design.",
    "A sweeping natural vista with mountains, forests, or coastlines.",
    "A candid street scene capturing real-life moments and everyday urban life.",
    "A moody nighttime shot featuring light trails or illuminated city streets.",
    "An extreme close-up revealing fine details, textures, or abstract patterns.",
    "A high-energy moment freezing intense motion in a sporting event.",
    "A stylish editorial scene focusing on clothing, models, and trendy settings.",
    "A surreal or experimental composition playing with light, form, or symbolism.",
    "A vibrant travel scene featuring cultural landmarks, bustling markets, or scenic wonders.",
];

/// On-disk pool file layout.
#[derive(Debug, Deserialize)]
struct PoolFile {
    tags: Vec<PoolFileEntry>,
}

#[derive(Debug, Deserialize)]
struct PoolFileEntry {
    label: String,
    prompt: Option<String>,
}

/// Render a label through a prompt template containing `{label}`.
pub fn apply_template(template: &str, label: &str) -> String {
    template.replace("{label}", label)
}

/// Resolve a pool name into ordered entries.
///
/// Preset prompts that were written by hand are kept as-is; bare labels go
/// through `template`.
pub fn resolve_entries(pool: &str, template: &str) -> Result<Vec<TagEntry>, ConfigError> {
    let entries = match pool {
        "photography" => PHOTOGRAPHY
            .iter()
            .map(|(label, prompt)| TagEntry::new(*label, *prompt))
            .collect(),
        "scenes" => SCENES
            .iter()
            .map(|label| TagEntry::new(*label, apply_template(template, label)))
            .collect(),
        "styles" => STYLES
            .iter()
            .map(|prompt| TagEntry::new(*prompt, *prompt))
            .collect(),
        other => load_pool_file(Path::new(other), template)?,
    };
    check_entries(&entries)?;
    Ok(entries)
}

/// Load `[[tags]]` entries from a TOML pool file.
pub fn load_pool_file(path: &Path, template: &str) -> Result<Vec<TagEntry>, ConfigError> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = Path::new(&expanded);
    if !path.is_file() {
        return Err(ConfigError::UnknownPool(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let file: PoolFile = toml::from_str(&content)?;

    let entries = file
        .tags
        .into_iter()
        .map(|entry| {
            let prompt = entry
                .prompt
                .unwrap_or_else(|| apply_template(template, &entry.label));
            TagEntry::new(entry.label, prompt)
        })
        .collect();

    tracing::debug!("Loaded pool file {:?}", path);
    Ok(entries)
}

/// A pool must be non-empty with unique, non-blank labels.
fn check_entries(entries: &[TagEntry]) -> Result<(), ConfigError> {
    if entries.is_empty() {
        return Err(ConfigError::ValidationError(
            "tag pool must contain at least one tag".into(),
        ));
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.label.trim().is_empty() || entry.prompt.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tag labels and prompts must not be blank".into(),
            ));
        }
        if !seen.insert(entry.label.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate tag label in pool: {:?}",
                entry.label
            )));
        }
    }
    Ok(())
}
