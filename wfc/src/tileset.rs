use crate::biome::{Biome, BiomeTable};
use crate::description::{Symmetry, TileRef, TilesetDescription};
use crate::error::ConfigurationError;
use crate::state::{StateId, StateTable};
use direction::{CardinalDirection, CardinalDirectionTable, CardinalDirections};
use hashbrown::{HashMap, HashSet};
use log::debug;

pub type TileId = u32;

/// Number of entries in a state's symmetry action row: four rotations
/// followed by the four rotations of the mirror image.
const NUM_ACTIONS: usize = 8;

/// Directions of the propagator in the order the adjacency expansion
/// indexes them.
const DIRECTIONS: [CardinalDirection; 4] = [
    CardinalDirection::West,
    CardinalDirection::South,
    CardinalDirection::East,
    CardinalDirection::North,
];

#[derive(Debug, Clone)]
pub struct Tile {
    name: String,
    symmetry: Symmetry,
    biome: Option<Biome>,
    first_state: StateId,
}

impl Tile {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }
    pub fn biome(&self) -> Option<Biome> {
        self.biome
    }
    pub fn first_state(&self) -> StateId {
        self.first_state
    }
    pub fn cardinality(&self) -> u32 {
        self.symmetry.cardinality()
    }
}

#[derive(Debug, Clone)]
pub struct TileState {
    tile: TileId,
    rotation: u32,
    weight: f64,
    weight_log_weight: f64,
    biome: Option<Biome>,
}

impl TileState {
    fn new(tile: TileId, rotation: u32, weight: f64, biome: Option<Biome>) -> Self {
        Self {
            tile,
            rotation,
            weight,
            weight_log_weight: weight * weight.ln(),
            biome,
        }
    }
    pub fn tile(&self) -> TileId {
        self.tile
    }
    pub fn rotation(&self) -> u32 {
        self.rotation
    }
    pub fn weight(&self) -> f64 {
        self.weight
    }
    pub fn weight_log_weight(&self) -> f64 {
        self.weight_log_weight
    }
    pub fn biome(&self) -> Option<Biome> {
        self.biome
    }
}

/// Input for building a tileset directly from per-state tables.
#[derive(Debug, Clone)]
pub struct StateDescription {
    pub name: String,
    pub weight: f64,
    pub biome: Option<Biome>,
    /// States permitted in the neighbouring cell in each direction.
    pub allowed_neighbours: CardinalDirectionTable<Vec<StateId>>,
}

impl StateDescription {
    pub fn new(
        name: impl Into<String>,
        weight: f64,
        allowed_neighbours: CardinalDirectionTable<Vec<StateId>>,
    ) -> Self {
        Self {
            name: name.into(),
            weight,
            biome: None,
            allowed_neighbours,
        }
    }
    pub fn with_biome(self, biome: Biome) -> Self {
        Self {
            biome: Some(biome),
            ..self
        }
    }
}

/// The immutable product of compiling a tileset: every tile state with its
/// weight, and the propagator listing which states may sit next to each
/// state in each direction.
#[derive(Debug, Clone)]
pub struct Tileset {
    tiles: Vec<Tile>,
    states: StateTable<TileState>,
    compatibility_per_state: StateTable<CardinalDirectionTable<Vec<StateId>>>,
    sum_weight: f64,
    sum_weight_log_weight: f64,
    starting_entropy: f64,
    states_by_biome: BiomeTable<Vec<StateId>>,
}

fn check_weight(name: &str, weight: f64) -> Result<(), ConfigurationError> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::NonPositiveWeight {
            name: name.to_string(),
            weight,
        })
    }
}

fn action_row(symmetry: Symmetry, offset: StateId, variant: u32) -> [StateId; NUM_ACTIONS] {
    let a = |i| symmetry.rotate(i);
    let b = |i| symmetry.reflect(i);
    let t = variant;
    let row = [
        t,
        a(t),
        a(a(t)),
        a(a(a(t))),
        b(t),
        b(a(t)),
        b(a(a(t))),
        b(a(a(a(t)))),
    ];
    let mut out = [0; NUM_ACTIONS];
    for (dst, src) in out.iter_mut().zip(row.iter()) {
        *dst = offset + src;
    }
    out
}

struct Dense {
    num_states: usize,
    allowed: Vec<Vec<bool>>,
}

impl Dense {
    fn new(num_states: usize) -> Self {
        Self {
            num_states,
            allowed: vec![vec![false; num_states * num_states]; DIRECTIONS.len()],
        }
    }
    fn set(&mut self, d: usize, from: StateId, to: StateId) {
        self.allowed[d][from as usize * self.num_states + to as usize] = true;
    }
    fn get(&self, d: usize, from: StateId, to: StateId) -> bool {
        self.allowed[d][from as usize * self.num_states + to as usize]
    }
}

impl Tileset {
    /// Compiles a tileset description, optionally restricted to one of its
    /// named subsets.
    pub fn compile(
        description: &TilesetDescription,
        subset: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let mut declared = HashSet::new();
        // every declared tile is validated, including those outside the subset
        for tile in description.tiles.iter() {
            if !declared.insert(tile.name.as_str()) {
                return Err(ConfigurationError::DuplicateTile(tile.name.clone()));
            }
            check_weight(&tile.name, tile.weight)?;
        }
        let selected = match subset {
            None => None,
            Some(subset_name) => {
                let subset = description
                    .subsets
                    .iter()
                    .find(|s| s.name == subset_name)
                    .ok_or_else(|| ConfigurationError::UndefinedSubset(subset_name.to_string()))?;
                let mut selected = HashSet::new();
                for name in subset.tiles.iter() {
                    if !declared.contains(name.as_str()) {
                        return Err(ConfigurationError::UndefinedTile(name.clone()));
                    }
                    selected.insert(name.as_str());
                }
                Some(selected)
            }
        };
        let in_subset = |name: &str| selected.as_ref().map_or(true, |s| s.contains(name));

        let mut tiles = Vec::new();
        let mut states = Vec::new();
        let mut actions: Vec<[StateId; NUM_ACTIONS]> = Vec::new();
        let mut first_state_by_name = HashMap::new();
        for tile in description.tiles.iter() {
            if !in_subset(&tile.name) {
                continue;
            }
            let tile_id = tiles.len() as TileId;
            let first_state = states.len() as StateId;
            for rotation in 0..tile.symmetry.cardinality() {
                actions.push(action_row(tile.symmetry, first_state, rotation));
                states.push(TileState::new(tile_id, rotation, tile.weight, tile.biome));
            }
            first_state_by_name.insert(tile.name.as_str(), first_state);
            tiles.push(Tile {
                name: tile.name.clone(),
                symmetry: tile.symmetry,
                biome: tile.biome,
                first_state,
            });
        }
        if states.is_empty() {
            return Err(ConfigurationError::ZeroTileCount);
        }

        let resolve = |tile_ref: &TileRef| -> Result<Option<StateId>, ConfigurationError> {
            if !declared.contains(tile_ref.name.as_str()) {
                return Err(ConfigurationError::UndefinedTile(tile_ref.name.clone()));
            }
            if tile_ref.variant as usize >= NUM_ACTIONS {
                return Err(ConfigurationError::VariantOutOfRange {
                    name: tile_ref.name.clone(),
                    variant: tile_ref.variant,
                });
            }
            Ok(first_state_by_name
                .get(tile_ref.name.as_str())
                .map(|&first| actions[first as usize][tile_ref.variant as usize]))
        };

        let mut dense = Dense::new(states.len());
        for rule in description.neighbours.iter() {
            let (l, r) = match (resolve(&rule.left)?, resolve(&rule.right)?) {
                (Some(l), Some(r)) => (l, r),
                _ => continue,
            };
            let action = |state: StateId, i: usize| actions[state as usize][i];
            let d = action(l, 1);
            let u = action(r, 1);
            dense.set(0, r, l);
            dense.set(0, action(r, 6), action(l, 6));
            dense.set(0, action(l, 4), action(r, 4));
            dense.set(0, action(l, 2), action(r, 2));
            dense.set(1, u, d);
            dense.set(1, action(d, 6), action(u, 6));
            dense.set(1, action(u, 4), action(d, 4));
            dense.set(1, action(d, 2), action(u, 2));
        }
        let num_states = states.len() as StateId;
        for from in 0..num_states {
            for to in 0..num_states {
                if dense.get(0, from, to) {
                    dense.set(2, to, from);
                }
                if dense.get(1, from, to) {
                    dense.set(3, to, from);
                }
            }
        }
        let compatibility_per_state = (0..num_states)
            .map(|from| {
                let mut table = CardinalDirectionTable::default();
                for (d, &direction) in DIRECTIONS.iter().enumerate() {
                    *table.get_mut(direction) = (0..num_states)
                        .filter(|&to| dense.get(d, from, to))
                        .collect::<Vec<_>>();
                }
                table
            })
            .collect::<StateTable<_>>();

        let tileset = Self::new(tiles, StateTable::from_vec(states), compatibility_per_state);
        debug!(
            "compiled tileset with {} tiles and {} states",
            tileset.num_tiles(),
            tileset.num_states()
        );
        Ok(tileset)
    }

    /// Builds a tileset from explicit per-state weights and neighbour lists.
    /// Each state becomes a tile of its own with no symmetry.
    pub fn from_state_descriptions(
        state_descriptions: StateTable<StateDescription>,
    ) -> Result<Self, ConfigurationError> {
        if state_descriptions.is_empty() {
            return Err(ConfigurationError::ZeroTileCount);
        }
        let count = state_descriptions.len();
        let mut tiles = Vec::with_capacity(count);
        let mut states = Vec::with_capacity(count);
        let mut compatibility_per_state = Vec::with_capacity(count);
        for (state_id, desc) in state_descriptions.enumerate() {
            check_weight(&desc.name, desc.weight)?;
            let mut allowed_neighbours = desc.allowed_neighbours.clone();
            for direction in CardinalDirections {
                let neighbours = allowed_neighbours.get_mut(direction);
                if let Some(&neighbour) = neighbours.iter().find(|&&n| n as usize >= count) {
                    return Err(ConfigurationError::StateOutOfRange {
                        state: state_id,
                        neighbour,
                        count,
                    });
                }
                neighbours.sort_unstable();
                neighbours.dedup();
            }
            tiles.push(Tile {
                name: desc.name.clone(),
                symmetry: Symmetry::X,
                biome: desc.biome,
                first_state: state_id,
            });
            states.push(TileState::new(state_id, 0, desc.weight, desc.biome));
            compatibility_per_state.push(allowed_neighbours);
        }
        let tileset = Self::new(
            tiles,
            StateTable::from_vec(states),
            StateTable::from_vec(compatibility_per_state),
        );
        tileset.check_symmetric()?;
        Ok(tileset)
    }

    fn new(
        tiles: Vec<Tile>,
        states: StateTable<TileState>,
        compatibility_per_state: StateTable<CardinalDirectionTable<Vec<StateId>>>,
    ) -> Self {
        let sum_weight: f64 = states.iter().map(|s| s.weight).sum();
        let sum_weight_log_weight: f64 = states.iter().map(|s| s.weight_log_weight).sum();
        let starting_entropy = sum_weight.ln() - sum_weight_log_weight / sum_weight;
        let mut states_by_biome = BiomeTable::<Vec<StateId>>::default();
        for (state_id, state) in states.enumerate() {
            if let Some(biome) = state.biome {
                states_by_biome[biome].push(state_id);
            }
        }
        Self {
            tiles,
            states,
            compatibility_per_state,
            sum_weight,
            sum_weight_log_weight,
            starting_entropy,
            states_by_biome,
        }
    }

    /// Checks that whenever `b` may neighbour `a` in some direction, `a` may
    /// neighbour `b` in the opposite direction.
    pub fn check_symmetric(&self) -> Result<(), ConfigurationError> {
        for (from, compatible) in self.compatibility_per_state.enumerate() {
            for direction in CardinalDirections {
                for &to in compatible.get(direction) {
                    if !self.compatibility_per_state[to]
                        .get(direction.opposite())
                        .contains(&from)
                    {
                        return Err(ConfigurationError::AsymmetricPropagator { from, to });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }
    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }
    pub fn tile(&self, tile_id: TileId) -> &Tile {
        &self.tiles[tile_id as usize]
    }
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }
    pub fn tile_id(&self, name: &str) -> Option<TileId> {
        self.tiles
            .iter()
            .position(|tile| tile.name == name)
            .map(|index| index as TileId)
    }
    /// The state of tile `name` at the given variant index.
    pub fn state_id(&self, name: &str, rotation: u32) -> Option<StateId> {
        let tile = self.tile(self.tile_id(name)?);
        if rotation < tile.cardinality() {
            Some(tile.first_state + rotation)
        } else {
            None
        }
    }
    pub fn state(&self, state_id: StateId) -> &TileState {
        &self.states[state_id]
    }
    pub fn states(&self) -> &StateTable<TileState> {
        &self.states
    }
    pub fn compatible_states(&self, state_id: StateId, direction: CardinalDirection) -> &[StateId] {
        self.compatibility_per_state[state_id].get(direction)
    }
    pub fn sum_weight(&self) -> f64 {
        self.sum_weight
    }
    pub fn sum_weight_log_weight(&self) -> f64 {
        self.sum_weight_log_weight
    }
    pub fn starting_entropy(&self) -> f64 {
        self.starting_entropy
    }
    pub fn states_of_biome(&self, biome: Biome) -> &[StateId] {
        &self.states_by_biome[biome]
    }
    /// Number of supporters a state starts with from the given direction.
    pub(crate) fn initial_support(&self, state_id: StateId, direction: CardinalDirection) -> u32 {
        self.compatibility_per_state[state_id]
            .get(direction.opposite())
            .len() as u32
    }
}
