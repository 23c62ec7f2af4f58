use crate::bias::{self, BiasStats, Selection};
use crate::biome::BiomeBias;
use crate::error::{ConfigurationError, Failure};
use crate::retry;
use crate::state::StateId;
use crate::tileset::{TileId, Tileset};
use crate::wave::{Propagator, Wave, WaveCell};
use crate::wrap::Wrap;
use coord_2d::{Coord, Size};
use grid_2d::Grid;
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_ENTROPY_NOISE: f64 = 1e-6;

const STRUCTURE_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;
const BIAS_SEED_SALT: u64 = 0xc2b2_ae3d_27d4_eb4f;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub size: Size,
    pub wrap: Wrap,
    /// Upper bound of the random value added to each candidate's entropy to
    /// break ties.
    pub entropy_noise: f64,
}

impl Config {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            wrap: Wrap::None,
            entropy_noise: DEFAULT_ENTROPY_NOISE,
        }
    }
    pub fn with_wrap(self, wrap: Wrap) -> Self {
        Self { wrap, ..self }
    }
    pub fn with_entropy_noise(self, entropy_noise: f64) -> Self {
        Self {
            entropy_noise,
            ..self
        }
    }
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.size.width() == 0 || self.size.height() == 0 {
            return Err(ConfigurationError::EmptyGrid(self.size));
        }
        if !self.entropy_noise.is_finite() || self.entropy_noise < 0.0 {
            return Err(ConfigurationError::InvalidEntropyNoise(self.entropy_noise));
        }
        Ok(())
    }
}

/// Effective seeds of the current run, after replacing zero with a
/// time-derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Seeds {
    pub structure: u64,
    pub bias: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Uninitialized,
    Ready,
    Running,
    Succeeded,
    Failed(Failure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observe {
    Continue,
    Succeeded,
    Failed(Failure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Run {
    Succeeded,
    Failed(Failure),
    /// The step limit was reached before the run finished.
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOutput {
    Undetermined,
    Collapsed { tile: TileId, rotation: u32 },
}

fn time_seed(salt: u64) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos() as u64)
        .unwrap_or(0);
    let mut seed = (nanos ^ salt).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    seed ^= seed >> 31;
    if seed == 0 {
        salt
    } else {
        seed
    }
}

fn stream_rng(seed: u64, salt: u64) -> XorShiftRng {
    XorShiftRng::seed_from_u64(seed ^ salt)
}

/// Read-only view of one cell for presenters.
pub struct WaveCellRef<'a> {
    wave_cell: &'a WaveCell,
    tileset: &'a Tileset,
}

impl<'a> WaveCellRef<'a> {
    pub fn num_possible_states(&self) -> u32 {
        self.wave_cell.num_possible_states()
    }
    pub fn sum_possible_weight(&self) -> f64 {
        self.wave_cell.stats().sum_possible_weight()
    }
    pub fn entropy(&self) -> f64 {
        self.wave_cell.entropy()
    }
    pub fn enumerate_possible_state_weights(&self) -> impl Iterator<Item = (StateId, f64)> + 'a {
        let tileset = self.tileset;
        let wave_cell: &'a WaveCell = self.wave_cell;
        wave_cell
            .possible_states()
            .map(move |state_id| (state_id, tileset.state(state_id).weight()))
    }
    pub fn cell_output(&self) -> CellOutput {
        match self.wave_cell.chosen_state() {
            Ok(state_id) => {
                let state = self.tileset.state(state_id);
                CellOutput::Collapsed {
                    tile: state.tile(),
                    rotation: state.rotation(),
                }
            }
            Err(_) => CellOutput::Undetermined,
        }
    }
}

/// A biome-biased wave function collapse run over one output grid. Memory
/// is allocated once and reused by every reset.
pub struct Solver {
    tileset: Arc<Tileset>,
    bias: Option<BiomeBias>,
    wave: Wave,
    propagator: Propagator,
    wrap: Wrap,
    entropy_noise: f64,
    structure_rng: XorShiftRng,
    bias_rng: XorShiftRng,
    seeds: Seeds,
    state: SolverState,
    observed: Option<Grid<StateId>>,
    bias_stats: BiasStats,
}

impl Solver {
    pub fn new(
        config: Config,
        tileset: Arc<Tileset>,
        bias: Option<BiomeBias>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        if tileset.num_states() == 0 {
            return Err(ConfigurationError::ZeroTileCount);
        }
        if let Some(bias) = bias.as_ref() {
            if bias.field().size() != config.size {
                return Err(ConfigurationError::BiomeFieldSizeMismatch {
                    field: bias.field().size(),
                    grid: config.size,
                });
            }
            bias.config().validate()?;
        }
        Ok(Self {
            tileset,
            bias,
            wave: Wave::new(config.size),
            propagator: Propagator::default(),
            wrap: config.wrap,
            entropy_noise: config.entropy_noise,
            structure_rng: XorShiftRng::seed_from_u64(0),
            bias_rng: XorShiftRng::seed_from_u64(0),
            seeds: Seeds::default(),
            state: SolverState::Uninitialized,
            observed: None,
            bias_stats: BiasStats::default(),
        })
    }

    /// Restores every cell to full superposition and reseeds both random
    /// number generators. A seed of 0 is replaced with a time-derived one.
    /// Each generator mixes in its own salt, so equal seeds still give
    /// different streams.
    pub fn reset(&mut self, seed: u64, bias_seed: u64) -> Seeds {
        let structure = if seed == 0 {
            time_seed(STRUCTURE_SEED_SALT)
        } else {
            seed
        };
        let bias = if bias_seed == 0 {
            time_seed(BIAS_SEED_SALT)
        } else {
            bias_seed
        };
        self.seeds = Seeds { structure, bias };
        self.structure_rng = stream_rng(structure, STRUCTURE_SEED_SALT);
        self.bias_rng = stream_rng(bias, BIAS_SEED_SALT);
        self.wave.init(&self.tileset);
        self.propagator.clear();
        self.observed = None;
        self.bias_stats = BiasStats::default();
        self.state = SolverState::Ready;
        debug!(
            "reset {}x{} wave with structure seed {} and bias seed {}",
            self.size().width(),
            self.size().height(),
            structure,
            bias
        );
        self.seeds
    }

    fn fail(&mut self, failure: Failure) -> Observe {
        match failure {
            Failure::Contradiction => {
                info!("run with seeds {:?} ended in a contradiction", self.seeds)
            }
            Failure::BiomeInconsistency(biome) => {
                warn!("no tile in the tileset belongs to biome {:?}", biome)
            }
        }
        self.state = SolverState::Failed(failure);
        Observe::Failed(failure)
    }

    fn succeed(&mut self) -> Observe {
        let wave = &self.wave;
        self.observed = Some(Grid::new_fn(wave.size(), |coord| {
            wave.cell(coord)
                .chosen_state()
                .expect("every cell has exactly one state")
        }));
        info!("run with seeds {:?} succeeded", self.seeds);
        self.state = SolverState::Succeeded;
        Observe::Succeeded
    }

    fn choose_next_cell(&mut self) -> Result<Option<Coord>, Failure> {
        let mut min_entropy = f64::INFINITY;
        let mut argmin = None;
        for (coord, cell) in self.wave.grid().enumerate() {
            let num_possible_states = cell.num_possible_states();
            if num_possible_states == 0 {
                return Err(Failure::Contradiction);
            }
            let entropy = cell.entropy();
            if num_possible_states > 1 && entropy <= min_entropy {
                let noise = self.entropy_noise * self.structure_rng.gen::<f64>();
                if entropy + noise < min_entropy {
                    min_entropy = entropy + noise;
                    argmin = Some(coord);
                }
            }
        }
        Ok(argmin)
    }

    /// Picks the undetermined cell of lowest entropy and collapses it to a
    /// single state. Does not propagate.
    pub fn step_observe(&mut self) -> Observe {
        match self.state {
            SolverState::Uninitialized => panic!("step_observe called before reset"),
            SolverState::Succeeded => return Observe::Succeeded,
            SolverState::Failed(failure) => return Observe::Failed(failure),
            SolverState::Ready | SolverState::Running => (),
        }
        self.state = SolverState::Running;
        let coord = match self.choose_next_cell() {
            Err(failure) => return self.fail(failure),
            Ok(None) => return self.succeed(),
            Ok(Some(coord)) => coord,
        };
        let selection = match self.bias.as_ref() {
            Some(bias) => bias::select(
                bias,
                &self.wave,
                coord,
                &self.tileset,
                self.wrap,
                &mut self.bias_stats,
                &mut self.bias_rng,
            ),
            None => Selection::Unbiased,
        };
        let biome = selection.biome();
        if let Some(biome) = biome {
            if self.tileset.states_of_biome(biome).is_empty() {
                return self.fail(Failure::BiomeInconsistency(biome));
            }
        }
        let chosen = bias::choose_state(
            &self.wave,
            coord,
            &self.tileset,
            biome,
            &mut self.structure_rng,
        );
        // with no candidate every state is banned and the next observation
        // reports the contradiction
        self.ban_all_except(coord, chosen);
        Observe::Continue
    }

    fn ban_all_except(&mut self, coord: Coord, keep: Option<StateId>) {
        let to_ban = self
            .wave
            .cell(coord)
            .possible_states()
            .filter(|&state_id| Some(state_id) != keep)
            .collect::<Vec<_>>();
        for state_id in to_ban {
            self.propagator
                .ban(&mut self.wave, coord, state_id, &self.tileset);
        }
    }

    /// Pushes every pending removal to the neighbouring cells until no
    /// removal is left.
    pub fn propagate(&mut self) {
        self.propagator
            .propagate(&mut self.wave, &self.tileset, self.wrap);
    }

    /// Alternates observation and propagation until the run finishes or
    /// `step_limit` observations have been made (0 means no limit). Starts a
    /// new run from the given seeds unless one is in progress.
    pub fn run(&mut self, seed: u64, bias_seed: u64, step_limit: u32) -> Run {
        match self.state {
            SolverState::Uninitialized | SolverState::Succeeded | SolverState::Failed(_) => {
                self.reset(seed, bias_seed);
            }
            SolverState::Ready | SolverState::Running => (),
        }
        let mut num_steps = 0;
        loop {
            match self.step_observe() {
                Observe::Succeeded => return Run::Succeeded,
                Observe::Failed(failure) => return Run::Failed(failure),
                Observe::Continue => self.propagate(),
            }
            num_steps += 1;
            if step_limit != 0 && num_steps >= step_limit {
                return Run::Incomplete;
            }
        }
    }

    pub fn run_retrying<R: retry::Retry>(
        &mut self,
        mut retry: R,
        seed: u64,
        bias_seed: u64,
    ) -> R::Return {
        retry.retry(self, seed, bias_seed)
    }

    /// Removes one state from one cell. The state must still be possible
    /// there. Call `propagate` afterwards.
    pub fn ban(&mut self, coord: Coord, state_id: StateId) {
        assert!(self.state != SolverState::Uninitialized, "ban called before reset");
        let possible = self.wave.cell(coord).is_possible(state_id);
        debug_assert!(possible, "state {} is already banned at {:?}", state_id, coord);
        if possible {
            self.propagator
                .ban(&mut self.wave, coord, state_id, &self.tileset);
        }
    }

    /// Restricts a cell to a single state and propagates the consequences.
    pub fn collapse_cell(&mut self, coord: Coord, state_id: StateId) {
        assert!(
            self.state != SolverState::Uninitialized,
            "collapse_cell called before reset"
        );
        self.ban_all_except(coord, Some(state_id));
        self.propagate();
    }

    pub fn state(&self) -> SolverState {
        self.state
    }
    pub fn seeds(&self) -> Seeds {
        self.seeds
    }
    pub fn bias_stats(&self) -> BiasStats {
        self.bias_stats
    }
    pub fn tileset(&self) -> &Arc<Tileset> {
        &self.tileset
    }
    pub fn bias(&self) -> Option<&BiomeBias> {
        self.bias.as_ref()
    }
    pub fn size(&self) -> Size {
        self.wave.size()
    }
    pub fn wrap(&self) -> Wrap {
        self.wrap
    }
    pub fn wave(&self) -> &Wave {
        &self.wave
    }
    /// The chosen state of every cell, available once a run has succeeded.
    pub fn observed(&self) -> Option<&Grid<StateId>> {
        self.observed.as_ref()
    }
    pub fn cell_output(&self, coord: Coord) -> CellOutput {
        self.wave_cell_ref(coord).cell_output()
    }
    pub fn cell_output_enumerate(&self) -> impl Iterator<Item = (Coord, CellOutput)> + '_ {
        self.wave_cell_ref_enumerate()
            .map(|(coord, wave_cell_ref)| (coord, wave_cell_ref.cell_output()))
    }
    pub fn wave_cell_ref(&self, coord: Coord) -> WaveCellRef {
        WaveCellRef {
            wave_cell: self.wave.cell(coord),
            tileset: &self.tileset,
        }
    }
    pub fn wave_cell_ref_enumerate(&self) -> impl Iterator<Item = (Coord, WaveCellRef)> {
        self.wave.grid().enumerate().map(move |(coord, wave_cell)| {
            let wave_cell_ref = WaveCellRef {
                wave_cell,
                tileset: &self.tileset,
            };
            (coord, wave_cell_ref)
        })
    }
}
