use crate::biome::{Biome, BiomeBias, NeighbourTally};
use crate::state::StateId;
use crate::tileset::Tileset;
use crate::wave::Wave;
use crate::wrap::Wrap;
use coord_2d::Coord;
use direction::CardinalDirections;
use rand::Rng;

/// Counts of how each biased collapse chose its distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BiasStats {
    pub home_biome_forced: u64,
    pub neighbour_spread: u64,
    pub unbiased: u64,
}

impl BiasStats {
    pub fn total(&self) -> u64 {
        self.home_biome_forced + self.neighbour_spread + self.unbiased
    }
    fn record(&mut self, selection: Selection) {
        match selection {
            Selection::HomeBiome(_) => self.home_biome_forced += 1,
            Selection::NeighbourSpread(_) => self.neighbour_spread += 1,
            Selection::Unbiased => self.unbiased += 1,
        }
    }
}

/// Which distribution a cell collapses from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    HomeBiome(Biome),
    NeighbourSpread(Biome),
    Unbiased,
}

impl Selection {
    pub fn biome(self) -> Option<Biome> {
        match self {
            Selection::HomeBiome(biome) | Selection::NeighbourSpread(biome) => Some(biome),
            Selection::Unbiased => None,
        }
    }
}

fn has_possible_state_of_biome(wave: &Wave, coord: Coord, tileset: &Tileset, biome: Biome) -> bool {
    let cell = wave.cell(coord);
    tileset
        .states_of_biome(biome)
        .iter()
        .any(|&state_id| cell.is_possible(state_id))
}

pub(crate) fn neighbour_tally(
    wave: &Wave,
    coord: Coord,
    tileset: &Tileset,
    wrap: Wrap,
) -> NeighbourTally {
    let mut tally = NeighbourTally::default();
    for direction in CardinalDirections {
        let neighbour_coord = match wrap.normalize_coord(coord + direction.coord(), wave.size()) {
            Some(neighbour_coord) => neighbour_coord,
            None => continue,
        };
        if let Ok(state_id) = wave.cell(neighbour_coord).chosen_state() {
            tally.add_collapsed(tileset.state(state_id).biome());
        }
    }
    tally
}

/// Picks the distribution for the cell at `coord` and records the choice.
pub(crate) fn select<R: Rng>(
    bias: &BiomeBias,
    wave: &Wave,
    coord: Coord,
    tileset: &Tileset,
    wrap: Wrap,
    stats: &mut BiasStats,
    rng: &mut R,
) -> Selection {
    let home = bias.field().get_checked(coord);
    let config = bias.config();
    let roll: f64 = rng.gen();
    let selection = if roll <= 1.0 - config.spread[home] {
        Selection::HomeBiome(home)
    } else {
        let mut tally = neighbour_tally(wave, coord, tileset, wrap);
        if tally.num_collapsed >= config.collapsed_neighbour_threshold {
            loop {
                match tally.most_frequent() {
                    None => break Selection::Unbiased,
                    Some(biome) => {
                        if has_possible_state_of_biome(wave, coord, tileset, biome) {
                            break Selection::NeighbourSpread(biome);
                        }
                        tally.exclude(biome);
                    }
                }
            }
        } else {
            Selection::HomeBiome(home)
        }
    };
    stats.record(selection);
    selection
}

/// Draws a state from the possible states of a cell, restricted to `biome`
/// when one is given. Returns `None` when nothing in the distribution has
/// positive weight.
pub(crate) fn choose_state<R: Rng>(
    wave: &Wave,
    coord: Coord,
    tileset: &Tileset,
    biome: Option<Biome>,
    rng: &mut R,
) -> Option<StateId> {
    let cell = wave.cell(coord);
    let candidates = cell
        .possible_states()
        .filter(|&state_id| {
            biome.map_or(true, |biome| tileset.state(state_id).biome() == Some(biome))
        })
        .map(|state_id| (state_id, tileset.state(state_id).weight()))
        .collect::<Vec<_>>();
    let sum_weight: f64 = candidates.iter().map(|&(_, weight)| weight).sum();
    if candidates.is_empty() || sum_weight <= 0.0 {
        return None;
    }
    let threshold = rng.gen::<f64>() * sum_weight;
    let mut cumulative = 0.0;
    for &(state_id, weight) in candidates.iter() {
        cumulative += weight;
        if cumulative > threshold {
            return Some(state_id);
        }
    }
    // rounding can leave the threshold just above the final cumulative sum
    candidates.last().map(|&(state_id, _)| state_id)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::biome::{BiasConfig, BiomeField, BiomeTable};
    use crate::description::{Symmetry, TileDescription, TilesetDescription};
    use crate::wave::Propagator;
    use coord_2d::Size;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn tileset() -> Tileset {
        let description = TilesetDescription::new()
            .tile(TileDescription::new("Grass", Symmetry::X).with_biome(Biome::Grass))
            .tile(TileDescription::new("Sand", Symmetry::X).with_biome(Biome::Sand))
            .tile(TileDescription::new("Snow", Symmetry::X).with_biome(Biome::Snow))
            .neighbour("Grass", "Grass")
            .neighbour("Sand", "Sand")
            .neighbour("Snow", "Snow")
            .neighbour("Grass", "Sand")
            .neighbour("Grass", "Snow");
        Tileset::compile(&description, None).unwrap()
    }

    fn collapse(wave: &mut Wave, coord: Coord, keep: StateId, tileset: &Tileset) {
        let mut propagator = Propagator::default();
        let others = wave
            .cell(coord)
            .possible_states()
            .filter(|&state_id| state_id != keep)
            .collect::<Vec<_>>();
        for state_id in others {
            propagator.ban(wave, coord, state_id, tileset);
        }
        propagator.propagate(wave, tileset, Wrap::None);
    }

    fn spread_everywhere(threshold: u32) -> BiasConfig {
        BiasConfig {
            collapsed_neighbour_threshold: threshold,
            spread: BiomeTable::new_array([1.0; 6]),
        }
    }

    #[test]
    fn zero_spread_always_forces_home_biome() {
        let tileset = tileset();
        let size = Size::new(3, 3);
        let mut wave = Wave::new(size);
        wave.init(&tileset);
        let field = BiomeField::uniform(size, Biome::Snow);
        let bias = BiomeBias::new(field, BiasConfig::default()).unwrap();
        let mut stats = BiasStats::default();
        let mut rng = XorShiftRng::seed_from_u64(1);
        for _ in 0..100 {
            let selection = select(
                &bias,
                &wave,
                Coord::new(1,
                1),
                &tileset,
                Wrap::None,
                &mut stats,
                &mut rng,
            );
            assert_eq!(selection, Selection::HomeBiome(Biome::Snow));
        }
        assert_eq!(stats.home_biome_forced, 100);
    }

    #[test]
    fn spread_takes_majority_neighbour_biome() {
        let tileset = tileset();
        let size = Size::new(3, 3);
        let mut wave = Wave::new(size);
        wave.init(&tileset);
        let grass = tileset.state_id("Grass", 0).unwrap();
        let sand = tileset.state_id("Sand", 0).unwrap();
        collapse(&mut wave, Coord::new(0, 1), sand, &tileset);
        collapse(&mut wave, Coord::new(1, 0), sand, &tileset);
        collapse(&mut wave, Coord::new(2, 1), grass, &tileset);
        let field = BiomeField::uniform(size, Biome::Snow);
        let bias = BiomeBias::new(field, spread_everywhere(2)).unwrap();
        let mut stats = BiasStats::default();
        let mut rng = XorShiftRng::seed_from_u64(2);
        let selection = select(
            &bias,
            &wave,
            Coord::new(1,
            1),
            &tileset,
            Wrap::None,
            &mut stats,
            &mut rng,
        );
        assert_eq!(selection, Selection::NeighbourSpread(Biome::Sand));
        assert_eq!(stats.neighbour_spread, 1);
    }

    #[test]
    fn spread_skips_biomes_impossible_in_cell() {
        let tileset = tileset();
        let size = Size::new(3, 3);
        let mut wave = Wave::new(size);
        wave.init(&tileset);
        let sand = tileset.state_id("Sand", 0).unwrap();
        collapse(&mut wave, Coord::new(0, 1), sand, &tileset);
        collapse(&mut wave, Coord::new(1, 0), sand, &tileset);
        collapse(&mut wave, Coord::new(2, 1), tileset.state_id("Snow", 0).unwrap(), &tileset);
        collapse(&mut wave, Coord::new(1, 2), tileset.state_id("Grass", 0).unwrap(), &tileset);
        // sand and snow neighbours leave only grass possible in the centre
        let field = BiomeField::uniform(size, Biome::Sand);
        let bias = BiomeBias::new(field, spread_everywhere(1)).unwrap();
        let mut stats = BiasStats::default();
        let mut rng = XorShiftRng::seed_from_u64(3);
        let selection = select(
            &bias,
            &wave,
            Coord::new(1,
            1),
            &tileset,
            Wrap::None,
            &mut stats,
            &mut rng,
        );
        assert_eq!(selection, Selection::NeighbourSpread(Biome::Grass));
    }

    #[test]
    fn spread_falls_back_when_tally_exhausted() {
        let tileset = tileset();
        let size = Size::new(2, 1);
        let mut wave = Wave::new(size);
        wave.init(&tileset);
        let sand = tileset.state_id("Sand", 0).unwrap();
        collapse(&mut wave, Coord::new(0, 0), sand, &tileset);
        let mut propagator = Propagator::default();
        propagator.ban(&mut wave, Coord::new(1, 0), sand, &tileset);
        let field = BiomeField::uniform(size, Biome::Grass);
        let bias = BiomeBias::new(field, spread_everywhere(1)).unwrap();
        let mut stats = BiasStats::default();
        let mut rng = XorShiftRng::seed_from_u64(4);
        let selection = select(
            &bias,
            &wave,
            Coord::new(1,
            0),
            &tileset,
            Wrap::None,
            &mut stats,
            &mut rng,
        );
        assert_eq!(selection, Selection::Unbiased);
        assert_eq!(stats.unbiased, 1);
    }

    #[test]
    fn threshold_not_met_forces_home() {
        let tileset = tileset();
        let size = Size::new(3, 3);
        let mut wave = Wave::new(size);
        wave.init(&tileset);
        collapse(&mut wave, Coord::new(0, 1), tileset.state_id("Sand", 0).unwrap(), &tileset);
        let field = BiomeField::uniform(size, Biome::Grass);
        let bias = BiomeBias::new(field, spread_everywhere(5)).unwrap();
        let mut stats = BiasStats::default();
        let mut rng = XorShiftRng::seed_from_u64(5);
        let selection = select(
            &bias,
            &wave,
            Coord::new(1,
            1),
            &tileset,
            Wrap::None,
            &mut stats,
            &mut rng,
        );
        assert_eq!(selection, Selection::HomeBiome(Biome::Grass));
        assert_eq!(stats.neighbour_spread, 0);
    }

    #[test]
    fn choose_state_respects_biome_and_weights() {
        let tileset = tileset();
        let mut wave = Wave::new(Size::new(1, 1));
        wave.init(&tileset);
        let mut rng = XorShiftRng::seed_from_u64(6);
        let snow = tileset.state_id("Snow", 0).unwrap();
        for _ in 0..20 {
            assert_eq!(
                choose_state(&wave, Coord::new(0, 0), &tileset, Some(Biome::Snow), &mut rng),
                Some(snow)
            );
        }
        assert_eq!(
            choose_state(&wave, Coord::new(0, 0), &tileset, Some(Biome::Water), &mut rng),
            None
        );
        let mut counts = [0; 3];
        for _ in 0..3000 {
            let state_id = choose_state(&wave, Coord::new(0, 0), &tileset, None, &mut rng).unwrap();
            counts[state_id as usize] += 1;
        }
        for &count in counts.iter() {
            assert!(count > 800 && count < 1200, "{:?}", counts);
        }
    }
}
