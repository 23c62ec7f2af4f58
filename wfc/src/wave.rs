use crate::state::{StateId, StateTable};
use crate::tileset::Tileset;
use crate::wrap::Wrap;
use coord_2d::{Coord, Size};
use direction::{CardinalDirection, CardinalDirectionTable, CardinalDirections};
use grid_2d::Grid;

#[derive(Default, Debug, Clone, PartialEq)]
pub struct WaveCellStats {
    num_possible_states: u32,
    // w0 + w1 + w2 + ...
    sum_possible_weight: f64,
    // w0*ln(w0) + w1*ln(w1) + w2*ln(w2) + ...
    sum_possible_weight_log_weight: f64,
    entropy: f64,
}

impl WaveCellStats {
    fn init(&mut self, tileset: &Tileset) {
        self.num_possible_states = tileset.num_states() as u32;
        self.sum_possible_weight = tileset.sum_weight();
        self.sum_possible_weight_log_weight = tileset.sum_weight_log_weight();
        self.entropy = tileset.starting_entropy();
    }
    // sum(w*ln(w)) / sum(w) - ln(sum(w)), the negated entropy
    fn negative_entropy(&self) -> f64 {
        if self.num_possible_states == 0 || self.sum_possible_weight <= 0.0 {
            0.0
        } else {
            self.sum_possible_weight_log_weight / self.sum_possible_weight
                - self.sum_possible_weight.ln()
        }
    }
    fn remove_state(&mut self, weight: f64, weight_log_weight: f64) {
        assert!(self.num_possible_states >= 1);

        self.entropy += self.negative_entropy();
        self.num_possible_states -= 1;
        self.sum_possible_weight -= weight;
        self.sum_possible_weight_log_weight -= weight_log_weight;
        self.entropy -= self.negative_entropy();
    }
    pub fn num_possible_states(&self) -> u32 {
        self.num_possible_states
    }
    pub fn sum_possible_weight(&self) -> f64 {
        self.sum_possible_weight
    }
    pub fn sum_possible_weight_log_weight(&self) -> f64 {
        self.sum_possible_weight_log_weight
    }
    pub fn entropy(&self) -> f64 {
        self.entropy
    }
}

#[derive(Default, Clone, Debug)]
struct NumWaysToBecomeState {
    possible: bool,
    direction_table: CardinalDirectionTable<u32>,
}

pub(crate) struct DecrementedToZero;

impl NumWaysToBecomeState {
    const ZERO_CARDINAL_DIRECTION_TABLE: CardinalDirectionTable<u32> =
        CardinalDirectionTable::new_array([0, 0, 0, 0]);
    fn clear_all_directions(&mut self) {
        self.possible = false;
        self.direction_table = Self::ZERO_CARDINAL_DIRECTION_TABLE;
    }
    fn try_decrement(&mut self, direction: CardinalDirection) -> Option<DecrementedToZero> {
        if !self.possible {
            return None;
        }
        let count = self.direction_table.get_mut(direction);
        match *count {
            0 => None,
            1 => {
                *count = 0;
                Some(DecrementedToZero)
            }
            _ => {
                *count -= 1;
                None
            }
        }
    }
}

#[derive(Debug)]
pub enum ChosenStateError {
    NoPossibleStates,
    MultiplePossibleStates,
}

#[derive(Default, Debug, Clone)]
pub struct WaveCell {
    stats: WaveCellStats,
    // For each state, the number of states each neighbour could still take
    // which allow this cell to be that state. Also records whether the state
    // is still possible.
    num_ways_to_become_each_state: StateTable<NumWaysToBecomeState>,
}

impl WaveCell {
    fn init(&mut self, tileset: &Tileset) {
        self.stats.init(tileset);
        self.num_ways_to_become_each_state
            .resize(tileset.num_states(), Default::default());
        for (state_id, num_ways) in self.num_ways_to_become_each_state.enumerate_mut() {
            num_ways.possible = true;
            for direction in CardinalDirections {
                *num_ways.direction_table.get_mut(direction) =
                    tileset.initial_support(state_id, direction);
            }
        }
    }
    pub fn is_possible(&self, state_id: StateId) -> bool {
        self.num_ways_to_become_each_state[state_id].possible
    }
    pub fn num_possible_states(&self) -> u32 {
        self.stats.num_possible_states
    }
    pub fn is_collapsed(&self) -> bool {
        self.stats.num_possible_states == 1
    }
    pub fn is_contradiction(&self) -> bool {
        self.stats.num_possible_states == 0
    }
    pub fn entropy(&self) -> f64 {
        self.stats.entropy
    }
    pub fn stats(&self) -> &WaveCellStats {
        &self.stats
    }
    pub fn possible_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.num_ways_to_become_each_state
            .enumerate()
            .filter(|(_, num_ways)| num_ways.possible)
            .map(|(state_id, _)| state_id)
    }
    pub fn chosen_state(&self) -> Result<StateId, ChosenStateError> {
        match self.stats.num_possible_states {
            0 => Err(ChosenStateError::NoPossibleStates),
            1 => self
                .possible_states()
                .next()
                .ok_or(ChosenStateError::NoPossibleStates),
            _ => Err(ChosenStateError::MultiplePossibleStates),
        }
    }
    /// Number of supporters of a state from the given direction.
    pub fn support(&self, state_id: StateId, direction: CardinalDirection) -> u32 {
        *self.num_ways_to_become_each_state[state_id]
            .direction_table
            .get(direction)
    }
    fn remove_state(&mut self, state_id: StateId, tileset: &Tileset) {
        let num_ways = &mut self.num_ways_to_become_each_state[state_id];
        assert!(num_ways.possible);
        num_ways.clear_all_directions();
        let state = tileset.state(state_id);
        self.stats
            .remove_state(state.weight(), state.weight_log_weight());
    }
    fn try_decrement(
        &mut self,
        state_id: StateId,
        direction: CardinalDirection,
    ) -> Option<DecrementedToZero> {
        self.num_ways_to_become_each_state[state_id].try_decrement(direction)
    }
    #[cfg(test)]
    pub(crate) fn stats_from_scratch(&self, tileset: &Tileset) -> WaveCellStats {
        let mut stats = WaveCellStats::default();
        for state_id in self.possible_states() {
            let state = tileset.state(state_id);
            stats.num_possible_states += 1;
            stats.sum_possible_weight += state.weight();
            stats.sum_possible_weight_log_weight += state.weight_log_weight();
        }
        stats.entropy = -stats.negative_entropy();
        stats
    }
}

/// Per-cell superpositions of the output grid.
#[derive(Clone, Debug)]
pub struct Wave {
    grid: Grid<WaveCell>,
}

impl Wave {
    pub fn new(size: Size) -> Self {
        Self {
            grid: Grid::new_default(size),
        }
    }
    pub(crate) fn init(&mut self, tileset: &Tileset) {
        self.grid.iter_mut().for_each(|cell| cell.init(tileset));
    }
    pub fn grid(&self) -> &Grid<WaveCell> {
        &self.grid
    }
    pub fn size(&self) -> Size {
        self.grid.size()
    }
    pub fn cell(&self, coord: Coord) -> &WaveCell {
        self.grid.get_checked(coord)
    }
}

#[derive(Debug, Clone)]
struct RemovedState {
    coord: Coord,
    state_id: StateId,
}

/// Worklist of removed states whose consequences have not yet been pushed
/// to neighbouring cells.
#[derive(Default, Clone, Debug)]
pub(crate) struct Propagator {
    removed_states_to_propagate: Vec<RemovedState>,
}

impl Propagator {
    pub(crate) fn clear(&mut self) {
        self.removed_states_to_propagate.clear();
    }
    pub(crate) fn is_empty(&self) -> bool {
        self.removed_states_to_propagate.is_empty()
    }
    /// Marks a state impossible in one cell and queues it for propagation.
    pub(crate) fn ban(
        &mut self,
        wave: &mut Wave,
        coord: Coord,
        state_id: StateId,
        tileset: &Tileset,
    ) {
        wave.grid
            .get_checked_mut(coord)
            .remove_state(state_id, tileset);
        self.removed_states_to_propagate.push(RemovedState { coord, state_id });
    }
    pub(crate) fn propagate(&mut self, wave: &mut Wave, tileset: &Tileset, wrap: Wrap) {
        let wave_size = wave.grid.size();
        while let Some(removed_state) = self.removed_states_to_propagate.pop() {
            for direction in CardinalDirections {
                let coord_to_update = match wrap
                    .normalize_coord(removed_state.coord + direction.coord(), wave_size)
                {
                    Some(coord_to_update) => coord_to_update,
                    None => continue,
                };
                let cell = wave.grid.get_checked_mut(coord_to_update);
                for &state_id in tileset.compatible_states(removed_state.state_id, direction) {
                    if let Some(DecrementedToZero) = cell.try_decrement(state_id, direction) {
                        cell.remove_state(state_id, tileset);
                        self.removed_states_to_propagate.push(RemovedState {
                            coord: coord_to_update,
                            state_id,
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::biome::Biome;
    use crate::description::{Symmetry, TileDescription, TilesetDescription};
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    fn tileset() -> Tileset {
        let description = TilesetDescription::new()
            .tile(TileDescription::new("Water", Symmetry::X).with_biome(Biome::Water))
            .tile(
                TileDescription::new("Shallow", Symmetry::X)
                    .with_weight(0.5)
                    .with_biome(Biome::ShallowWater),
            )
            .tile(
                TileDescription::new("Coast", Symmetry::L)
                    .with_weight(0.2)
                    .with_biome(Biome::Sand),
            )
            .tile(TileDescription::new("Beach", Symmetry::X).with_weight(2.0))
            .neighbour("Water", "Water")
            .neighbour("Water", "Shallow")
            .neighbour("Shallow", "Shallow")
            .neighbour("Shallow", "Coast")
            .neighbour("Coast 1", "Beach")
            .neighbour("Coast", "Coast 2")
            .neighbour("Beach", "Beach");
        Tileset::compile(&description, None).unwrap()
    }

    #[test]
    fn init_sets_supports_from_opposite_direction() {
        let tileset = tileset();
        let mut wave = Wave::new(Size::new(2, 2));
        wave.init(&tileset);
        let cell = wave.cell(Coord::new(0, 0));
        assert_eq!(cell.num_possible_states() as usize, tileset.num_states());
        for state_id in 0..tileset.num_states() as StateId {
            assert!(cell.is_possible(state_id));
            for direction in CardinalDirections {
                assert_eq!(
                    cell.support(state_id, direction),
                    tileset.compatible_states(state_id, direction.opposite()).len() as u32
                );
            }
        }
        assert_eq!(cell.entropy(), tileset.starting_entropy());
    }

    #[test]
    fn ban_decrements_by_one_and_zeroes_supports() {
        let tileset = tileset();
        let mut wave = Wave::new(Size::new(3, 3));
        wave.init(&tileset);
        let mut propagator = Propagator::default();
        let coord = Coord::new(1, 1);
        let before = wave.cell(coord).num_possible_states();
        propagator.ban(&mut wave, coord, 0, &tileset);
        let cell = wave.cell(coord);
        assert_eq!(cell.num_possible_states(), before - 1);
        assert!(!cell.is_possible(0));
        for direction in CardinalDirections {
            assert_eq!(cell.support(0, direction), 0);
        }
        assert!(!propagator.is_empty());
        propagator.propagate(&mut wave, &tileset, Wrap::None);
        assert!(propagator.is_empty());
    }

    #[test]
    fn incremental_entropy_matches_recomputed() {
        let tileset = tileset();
        let mut rng = XorShiftRng::seed_from_u64(0x5eed);
        let size = Size::new(4, 4);
        for _ in 0..50 {
            let mut wave = Wave::new(size);
            wave.init(&tileset);
            let mut propagator = Propagator::default();
            for _ in 0..12 {
                let coord = Coord::new(
                    rng.gen_range(0..size.width() as i32),
                    rng.gen_range(0..size.height() as i32),
                );
                let possible = wave.cell(coord).possible_states().collect::<Vec<_>>();
                if possible.len() <= 1 {
                    continue;
                }
                let state_id = possible[rng.gen_range(0..possible.len())];
                propagator.ban(&mut wave, coord, state_id, &tileset);
                propagator.propagate(&mut wave, &tileset, Wrap::XY);
            }
            for cell in wave.grid().iter() {
                let expected = cell.stats_from_scratch(&tileset);
                let actual = cell.stats();
                assert_eq!(actual.num_possible_states(), expected.num_possible_states());
                let weight_error = actual.sum_possible_weight() - expected.sum_possible_weight();
                assert!(weight_error.abs() < 1e-9);
                if expected.num_possible_states() > 0 {
                    assert!((actual.entropy() - expected.entropy()).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn propagation_removes_unsupported_neighbours() {
        let tileset = tileset();
        let mut wave = Wave::new(Size::new(3, 1));
        wave.init(&tileset);
        let mut propagator = Propagator::default();
        let water = tileset.state_id("Water", 0).unwrap();
        let coord = Coord::new(0, 0);
        for state_id in 0..tileset.num_states() as StateId {
            if state_id != water {
                propagator.ban(&mut wave, coord, state_id, &tileset);
            }
        }
        propagator.propagate(&mut wave, &tileset, Wrap::None);
        let east = wave.cell(Coord::new(1, 0));
        for state_id in east.possible_states() {
            assert!(tileset
                .compatible_states(water, CardinalDirection::East)
                .contains(&state_id));
        }
        assert!(!east.is_possible(tileset.state_id("Beach", 0).unwrap()));
    }
}
