use crate::biome::Biome;
use coord_2d::Size;
use thiserror::Error;

/// A malformed or inconsistent tileset or solver configuration. Reported
/// before any run starts.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to parse tileset document: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed attribute in tileset document: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("tileset document is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("element `{element}` is missing attribute `{attribute}`")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("invalid value `{value}` for attribute `{attribute}`")]
    InvalidAttribute { attribute: &'static str, value: String },
    #[error("tile `{0}` is declared more than once")]
    DuplicateTile(String),
    #[error("tile `{0}` is not defined")]
    UndefinedTile(String),
    #[error("subset `{0}` is not defined")]
    UndefinedSubset(String),
    #[error("tile `{name}` has weight {weight}, weights must be positive")]
    NonPositiveWeight { name: String, weight: f64 },
    #[error("unknown symmetry class `{0}`")]
    UnknownSymmetry(String),
    #[error("unknown biome `{0}`")]
    UnknownBiome(String),
    #[error("variant {variant} of tile `{name}` is out of range 0..8")]
    VariantOutOfRange { name: String, variant: u32 },
    #[error("state {state} refers to neighbour {neighbour} but there are {count} states")]
    StateOutOfRange {
        state: u32,
        neighbour: u32,
        count: usize,
    },
    #[error("propagator is not symmetric: {from} allows {to} but not the reverse")]
    AsymmetricPropagator { from: u32, to: u32 },
    #[error("tileset has no tile states")]
    ZeroTileCount,
    #[error("grid size {0:?} has a zero dimension")]
    EmptyGrid(Size),
    #[error("biome field is {field:?} but the grid is {grid:?}")]
    BiomeFieldSizeMismatch { field: Size, grid: Size },
    #[error("spread value {value} for {biome:?} is outside [0, 1]")]
    SpreadOutOfRange { biome: Biome, value: f64 },
    #[error("entropy noise {0} must be finite and non-negative")]
    InvalidEntropyNoise(f64),
}

/// Why a run stopped without collapsing every cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Failure {
    /// A cell ran out of possible states. A different seed may succeed.
    #[error("contradiction: a cell has no possible tile states")]
    Contradiction,
    /// A cell's biome had to be enforced but no tile in the tileset belongs
    /// to that biome. Retrying cannot help.
    #[error("no tile in the tileset belongs to biome {0:?}")]
    BiomeInconsistency(Biome),
}
