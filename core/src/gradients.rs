use serde::Serialize;

/// A curated gradient preset for tweet backgrounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradientPreset {
    pub name: &'static str,
    /// Start and end color as hex strings.
    pub colors: [&'static str; 2],
    /// CSS angle in degrees.
    pub angle: u16,
}

impl GradientPreset {
    /// Render the preset as a CSS `linear-gradient(...)` value.
    pub fn css(&self) -> String {
        format!(
            "linear-gradient({}deg, {}, {})",
            self.angle, self.colors[0], self.colors[1]
        )
    }
}

/// The 25 curated presets, addressed by zero-based index.
pub const GRADIENTS: [GradientPreset; 25] = [
    GradientPreset { name: "Sunset Blaze", colors: ["#FF6B6B", "#FFE66D"], angle: 135 },
    GradientPreset { name: "Ocean Deep", colors: ["#00D4FF", "#0099FF"], angle: 180 },
    GradientPreset { name: "Forest Dawn", colors: ["#11998E", "#38EF7D"], angle: 120 },
    GradientPreset { name: "Purple Haze", colors: ["#9D50BB", "#6E48AA"], angle: 135 },
    GradientPreset { name: "Fire Burst", colors: ["#FF512F", "#DD2476"], angle: 45 },
    GradientPreset { name: "Candy Floss", colors: ["#FFA8D5", "#FF85E4"], angle: 90 },
    GradientPreset { name: "Northern Lights", colors: ["#00C9FF", "#92FE9D"], angle: 45 },
    GradientPreset { name: "Peachy Keen", colors: ["#FF9A56", "#FFBE76"], angle: 180 },
    GradientPreset { name: "Neon Nights", colors: ["#FF006E", "#8338EC"], angle: 135 },
    GradientPreset { name: "Emerald Sea", colors: ["#08AEEA", "#2AF598"], angle: 90 },
    GradientPreset { name: "Lavender Dream", colors: ["#B993D6", "#8CA6DB"], angle: 120 },
    GradientPreset { name: "Cosmic Dust", colors: ["#7F00FF", "#E100FF"], angle: 45 },
    GradientPreset { name: "Mango Tango", colors: ["#FF8008", "#FFC837"], angle: 90 },
    GradientPreset { name: "Sky Blue", colors: ["#56CCF2", "#2F80ED"], angle: 180 },
    GradientPreset { name: "Rose Gold", colors: ["#F093FB", "#F5576C"], angle: 135 },
    GradientPreset { name: "Mint Fresh", colors: ["#A8EDEA", "#FED6E3"], angle: 120 },
    GradientPreset { name: "Electric Violet", colors: ["#4776E6", "#8E54E9"], angle: 45 },
    GradientPreset { name: "Citrus Burst", colors: ["#FDFC47", "#24FE41"], angle: 90 },
    GradientPreset { name: "Cherry Blossom", colors: ["#FBC2EB", "#A6C1EE"], angle: 135 },
    GradientPreset { name: "Aqua Marine", colors: ["#1CB5E0", "#000851"], angle: 180 },
    GradientPreset { name: "Golden Hour", colors: ["#FDBB2D", "#22C1C3"], angle: 45 },
    GradientPreset { name: "Berry Smoothie", colors: ["#E94057", "#8A2387"], angle: 120 },
    GradientPreset { name: "Ice Blue", colors: ["#AAFFA9", "#11FFBD"], angle: 90 },
    GradientPreset { name: "Sunset Purple", colors: ["#6D28D9", "#DB2777"], angle: 135 },
    GradientPreset { name: "Coral Reef", colors: ["#FF7E5F", "#FEB47B"], angle: 180 },
];

/// Indexes of the 8 presets that render best behind tweet cards.
pub const HERO_GRADIENT_INDEXES: [usize; 8] = [0, 1, 3, 4, 9, 12, 14, 24];

/// Resolve a caller-supplied preset index.
///
/// Any out-of-range index (negative or past the end) resolves to preset 0.
/// This mirrors the long-standing catalog behavior; callers relying on the
/// default get "Sunset Blaze", never an error.
pub fn resolve(index: i64) -> &'static GradientPreset {
    let index = usize::try_from(index)
        .ok()
        .filter(|i| *i < GRADIENTS.len())
        .unwrap_or(0);
    &GRADIENTS[index]
}

/// Normalize a caller-supplied index to the value `resolve` will use.
pub fn effective_index(index: i64) -> usize {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < GRADIENTS.len())
        .unwrap_or(0)
}

/// Look up a preset by case-insensitive name. Unknown names fall back to preset 0.
pub fn by_name(name: &str) -> &'static GradientPreset {
    GRADIENTS
        .iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(name))
        .unwrap_or(&GRADIENTS[0])
}

/// Resolve one of the 8 hero presets by safe index (0..8). Out-of-range
/// indices fall back to the first hero preset.
pub fn hero(index: i64) -> &'static GradientPreset {
    let index = usize::try_from(index)
        .ok()
        .filter(|i| *i < HERO_GRADIENT_INDEXES.len())
        .unwrap_or(0);
    &GRADIENTS[HERO_GRADIENT_INDEXES[index]]
}
