use crate::error::ConfigurationError;
use coord_2d::{Coord, Size};
use grid_2d::Grid;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Biome {
    Snow,
    Water,
    Forest,
    ShallowWater,
    Grass,
    Sand,
}

pub const NUM_BIOMES: usize = 6;

pub const ALL: [Biome; NUM_BIOMES] = [
    Biome::Snow,
    Biome::Water,
    Biome::Forest,
    Biome::ShallowWater,
    Biome::Grass,
    Biome::Sand,
];

impl Biome {
    pub fn index(self) -> usize {
        self as usize
    }
    pub fn from_index(index: usize) -> Option<Self> {
        ALL.get(index).cloned()
    }
    pub fn name(self) -> &'static str {
        match self {
            Biome::Snow => "snow",
            Biome::Water => "water",
            Biome::Forest => "forest",
            Biome::ShallowWater => "shallowWater",
            Biome::Grass => "grass",
            Biome::Sand => "sand",
        }
    }
}

impl FromStr for Biome {
    type Err = ConfigurationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL.iter()
            .cloned()
            .find(|biome| biome.name().eq_ignore_ascii_case(s))
            .or_else(|| match s.to_ascii_lowercase().as_str() {
                "shallow_water" | "shallow-water" | "shallow water" => {
                    Some(Biome::ShallowWater)
                }
                _ => None,
            })
            .ok_or_else(|| ConfigurationError::UnknownBiome(s.to_string()))
    }
}

/// One value per biome, indexed by `Biome`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BiomeTable<T> {
    table: [T; NUM_BIOMES],
}

impl<T> BiomeTable<T> {
    pub const fn new_array(table: [T; NUM_BIOMES]) -> Self {
        Self { table }
    }
    pub fn new_fn<F: FnMut(Biome) -> T>(mut f: F) -> Self {
        Self {
            table: [
                f(Biome::Snow),
                f(Biome::Water),
                f(Biome::Forest),
                f(Biome::ShallowWater),
                f(Biome::Grass),
                f(Biome::Sand),
            ],
        }
    }
    pub fn get(&self, biome: Biome) -> &T {
        &self.table[biome.index()]
    }
    pub fn get_mut(&mut self, biome: Biome) -> &mut T {
        &mut self.table[biome.index()]
    }
    pub fn iter(&self) -> std::slice::Iter<T> {
        self.table.iter()
    }
    pub fn enumerate(&self) -> impl Iterator<Item = (Biome, &T)> {
        ALL.iter().cloned().zip(self.table.iter())
    }
}

impl<T> Index<Biome> for BiomeTable<T> {
    type Output = T;
    fn index(&self, biome: Biome) -> &T {
        self.get(biome)
    }
}

impl<T> IndexMut<Biome> for BiomeTable<T> {
    fn index_mut(&mut self, biome: Biome) -> &mut T {
        self.get_mut(biome)
    }
}

/// The biome label of every output cell.
#[derive(Debug, Clone, PartialEq)]
pub struct BiomeField {
    grid: Grid<Biome>,
}

impl BiomeField {
    pub fn new(grid: Grid<Biome>) -> Self {
        Self { grid }
    }
    pub fn new_fn<F: FnMut(Coord) -> Biome>(size: Size, f: F) -> Self {
        Self {
            grid: Grid::new_fn(size, f),
        }
    }
    pub fn uniform(size: Size, biome: Biome) -> Self {
        Self {
            grid: Grid::new_clone(size, biome),
        }
    }
    pub fn size(&self) -> Size {
        self.grid.size()
    }
    pub fn get(&self, coord: Coord) -> Option<Biome> {
        self.grid.get(coord).cloned()
    }
    pub fn get_checked(&self, coord: Coord) -> Biome {
        *self.grid.get_checked(coord)
    }
    pub fn set(&mut self, coord: Coord, biome: Biome) {
        *self.grid.get_checked_mut(coord) = biome;
    }
    pub fn grid(&self) -> &Grid<Biome> {
        &self.grid
    }
    pub fn count(&self, biome: Biome) -> usize {
        self.grid.iter().filter(|&&b| b == biome).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BiasConfig {
    /// Minimum number of collapsed grid-neighbours before a cell may take the
    /// majority biome of its neighbours instead of its own.
    pub collapsed_neighbour_threshold: u32,
    /// Per-biome chance in [0, 1] of not enforcing the home biome.
    pub spread: BiomeTable<f64>,
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            collapsed_neighbour_threshold: 1,
            spread: BiomeTable::new_array([0.0; NUM_BIOMES]),
        }
    }
}

impl BiasConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (biome, &value) in self.spread.enumerate() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigurationError::SpreadOutOfRange { biome, value });
            }
        }
        Ok(())
    }
}

/// A biome field together with the rules for applying it during collapse.
#[derive(Debug, Clone)]
pub struct BiomeBias {
    field: BiomeField,
    config: BiasConfig,
}

impl BiomeBias {
    pub fn new(field: BiomeField, config: BiasConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { field, config })
    }
    pub fn field(&self) -> &BiomeField {
        &self.field
    }
    pub fn config(&self) -> &BiasConfig {
        &self.config
    }
}

/// Collapsed grid-neighbours of a cell and the biomes they collapsed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighbourTally {
    pub num_collapsed: u32,
    counts: [u32; NUM_BIOMES],
}

impl NeighbourTally {
    pub fn add_collapsed(&mut self, biome: Option<Biome>) {
        self.num_collapsed += 1;
        if let Some(biome) = biome {
            self.counts[biome.index()] += 1;
        }
    }
    pub fn count(&self, biome: Biome) -> u32 {
        self.counts[biome.index()]
    }
    /// The most frequent remaining biome. Ties go to the lowest biome index.
    pub fn most_frequent(&self) -> Option<Biome> {
        let mut max = 0;
        let mut max_biome = None;
        for (index, &count) in self.counts.iter().enumerate() {
            if count > max {
                max = count;
                max_biome = Biome::from_index(index);
            }
        }
        max_biome
    }
    pub fn exclude(&mut self, biome: Biome) {
        self.counts[biome.index()] = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_biome_names() {
        assert_eq!("snow".parse::<Biome>().unwrap(), Biome::Snow);
        assert_eq!("shallowWater".parse::<Biome>().unwrap(), Biome::ShallowWater);
        assert_eq!("shallow_water".parse::<Biome>().unwrap(), Biome::ShallowWater);
        assert_eq!("Grass".parse::<Biome>().unwrap(), Biome::Grass);
        assert!("lava".parse::<Biome>().is_err());
    }

    #[test]
    fn tally_most_frequent_with_exclusion() {
        let mut tally = NeighbourTally::default();
        tally.add_collapsed(Some(Biome::Sand));
        tally.add_collapsed(Some(Biome::Sand));
        tally.add_collapsed(Some(Biome::Water));
        tally.add_collapsed(None);
        assert_eq!(tally.num_collapsed, 4);
        assert_eq!(tally.most_frequent(), Some(Biome::Sand));
        tally.exclude(Biome::Sand);
        assert_eq!(tally.most_frequent(), Some(Biome::Water));
        tally.exclude(Biome::Water);
        assert_eq!(tally.most_frequent(), None);
    }

    #[test]
    fn tally_ties_prefer_lower_index() {
        let mut tally = NeighbourTally::default();
        tally.add_collapsed(Some(Biome::Sand));
        tally.add_collapsed(Some(Biome::Forest));
        assert_eq!(tally.most_frequent(), Some(Biome::Forest));
    }

    #[test]
    fn spread_values_are_validated() {
        let mut config = BiasConfig::default();
        assert!(config.validate().is_ok());
        config.spread[Biome::Grass] = 1.5;
        match config.validate() {
            Err(ConfigurationError::SpreadOutOfRange { biome, .. }) => {
                assert_eq!(biome, Biome::Grass)
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
