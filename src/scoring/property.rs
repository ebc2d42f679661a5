use serde::{Deserialize, Serialize};

pub const DEFAULT_LOT_SIZE_SQFT: f64 = 5000.0;
pub const DEFAULT_IMPERVIOUS_PCT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PesticideFrequency {
    #[default]
    Never,
    Rarely,
    Sometimes,
    Often,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MowingFrequency {
    #[default]
    Weekly,
    Biweekly,
    Monthly,
    Rarely,
    Never,
}

/// One reported plant species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantEntry {
    pub species: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub bloom_seasons: Vec<Season>,
    #[serde(default = "default_true")]
    pub is_native: bool,
    #[serde(default)]
    pub is_milkweed: bool,
}

fn default_count() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl PlantEntry {
    pub fn new(species: impl Into<String>) -> Self {
        Self {
            species: species.into(),
            count: 1,
            bloom_seasons: Vec::new(),
            is_native: true,
            is_milkweed: false,
        }
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn blooms(mut self, seasons: &[Season]) -> Self {
        self.bloom_seasons = seasons.to_vec();
        self
    }

    pub fn non_native(mut self) -> Self {
        self.is_native = false;
        self
    }

    pub fn milkweed(mut self) -> Self {
        self.is_milkweed = true;
        self
    }

    pub fn blooms_in(&self, season: Season) -> bool {
        self.bloom_seasons.contains(&season)
    }
}

/// Site inventory read by the habitat rule set.
///
/// Every field has a default, so partial provider payloads deserialize into a
/// usable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyData {
    // Floral resources
    pub plants: Vec<PlantEntry>,
    pub estimated_flower_coverage_pct: f64,

    // Nesting habitat
    pub has_bare_ground: bool,
    pub bare_ground_sqft: f64,
    pub has_dead_wood: bool,
    pub has_brush_pile: bool,
    pub has_bee_hotel: bool,
    pub leaves_stems_over_winter: bool,

    // Connectivity
    pub neighbors_in_program: u32,
    pub green_space_within_500m: f64,

    // Management
    pub uses_pesticides: bool,
    pub pesticide_frequency: PesticideFrequency,
    pub mowing_frequency: MowingFrequency,

    // Parcel
    pub lot_size_sqft: f64,
    pub impervious_surface_pct: f64,
}

impl Default for PropertyData {
    fn default() -> Self {
        Self {
            plants: Vec::new(),
            estimated_flower_coverage_pct: 0.0,
            has_bare_ground: false,
            bare_ground_sqft: 0.0,
            has_dead_wood: false,
            has_brush_pile: false,
            has_bee_hotel: false,
            leaves_stems_over_winter: false,
            neighbors_in_program: 0,
            green_space_within_500m: 0.0,
            uses_pesticides: false,
            pesticide_frequency: PesticideFrequency::Never,
            mowing_frequency: MowingFrequency::Weekly,
            lot_size_sqft: DEFAULT_LOT_SIZE_SQFT,
            impervious_surface_pct: DEFAULT_IMPERVIOUS_PCT,
        }
    }
}

impl PropertyData {
    pub fn native_count(&self) -> usize {
        self.plants.iter().filter(|p| p.is_native).count()
    }

    pub fn has_bloom_in(&self, season: Season) -> bool {
        self.plants.iter().any(|p| p.blooms_in(season))
    }

    pub fn milkweed_count(&self) -> u32 {
        self.plants
            .iter()
            .filter(|p| p.is_milkweed)
            .map(|p| p.count)
            .sum()
    }

    pub fn has_milkweed(&self) -> bool {
        self.plants.iter().any(|p| p.is_milkweed)
    }

    /// Share of the ten reportable signals the user supplied or changed from
    /// their defaults, as a percentage.
    pub fn completeness_pct(&self) -> f64 {
        let signals = [
            !self.plants.is_empty(),
            self.estimated_flower_coverage_pct > 0.0,
            self.has_bare_ground || self.bare_ground_sqft > 0.0,
            self.has_dead_wood || self.has_bee_hotel || self.has_brush_pile,
            self.leaves_stems_over_winter,
            self.mowing_frequency != MowingFrequency::Weekly,
            self.pesticide_frequency != PesticideFrequency::Never,
            self.lot_size_sqft != DEFAULT_LOT_SIZE_SQFT,
            self.impervious_surface_pct != DEFAULT_IMPERVIOUS_PCT,
            self.neighbors_in_program > 0,
        ];
        let provided = signals.iter().filter(|s| **s).count();
        provided as f64 / signals.len() as f64 * 100.0
    }
}
