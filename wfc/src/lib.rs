extern crate coord_2d;
extern crate direction;
extern crate grid_2d;
extern crate hashbrown;
extern crate log;
extern crate quick_xml;
extern crate rand;
extern crate rand_xorshift;
extern crate thiserror;

mod bias;
pub mod biome;
pub mod description;
mod error;
pub mod retry;
mod solver;
mod state;
pub mod tileset;
mod wave;
pub mod wrap;

pub use bias::{BiasStats, Selection};
pub use biome::{BiasConfig, Biome, BiomeBias, BiomeField, BiomeTable};
pub use coord_2d::{Coord, Size};
pub use error::{ConfigurationError, Failure};
pub use solver::*;
pub use state::{StateId, StateTable};
pub use tileset::{StateDescription, TileId, Tileset};
pub use wave::{ChosenStateError, Wave, WaveCell, WaveCellStats};
pub use wrap::Wrap;
