extern crate biome_wfc;
extern crate coord_2d;
extern crate direction;
extern crate grid_2d;
extern crate log;
extern crate rand;
extern crate thiserror;

use biome_wfc::biome::ALL as ALL_BIOMES;
use biome_wfc::{Biome, BiomeField, BiomeTable};
use coord_2d::{Coord, Size};
use direction::CardinalDirections;
use grid_2d::Grid;
use log::{debug, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use thiserror::Error;

pub type RegionId = u32;

/// Biome pairs that may touch, besides every biome with itself.
const ADJACENT_BIOMES: &[(Biome, Biome)] = &[
    (Biome::Grass, Biome::Sand),
    (Biome::Sand, Biome::ShallowWater),
    (Biome::ShallowWater, Biome::Water),
    (Biome::Grass, Biome::Forest),
    (Biome::Grass, Biome::Snow),
];

// keeps biomes absent from the map from dividing by zero
const SHARE_EPSILON: f64 = 0.001;

pub fn biomes_may_touch(a: Biome, b: Biome) -> bool {
    a == b
        || ADJACENT_BIOMES
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
}

#[derive(Debug, Error)]
pub enum VoronoiError {
    #[error("grid size {0:?} has a zero dimension")]
    EmptyGrid(Size),
    #[error("at least one region is required")]
    NoRegions,
    #[error("region weights must be non-negative with a positive sum")]
    InvalidRegionWeights,
}

#[derive(Debug, Clone)]
pub struct VoronoiConfig {
    pub size: Size,
    pub regions: u32,
    pub lloyd_iterations: u32,
    /// Desired share of regions of each biome. Need not sum to 1.
    pub region_weights: BiomeTable<f64>,
    pub max_correction_passes: u32,
}

impl VoronoiConfig {
    pub fn new(size: Size, regions: u32) -> Self {
        Self {
            size,
            regions,
            lloyd_iterations: 2,
            region_weights: BiomeTable::new_array([1.0; 6]),
            max_correction_passes: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    fn distance2(self, coord: Coord) -> f64 {
        let dx = coord.x as f64 - self.x;
        let dy = coord.y as f64 - self.y;
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone)]
pub struct VoronoiDiagram {
    pub field: BiomeField,
    pub regions: Grid<RegionId>,
    pub centroids: Vec<Centroid>,
    pub region_biomes: Vec<Biome>,
    /// False if adjacency correction stopped at the pass cap with rules
    /// still broken.
    pub converged: bool,
    pub correction_passes: u32,
}

fn closest_centroid(centroids: &[Centroid], coord: Coord) -> RegionId {
    let mut min_distance2 = f64::INFINITY;
    let mut closest = 0;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance2 = centroid.distance2(coord);
        if distance2 < min_distance2 {
            min_distance2 = distance2;
            closest = index as RegionId;
        }
    }
    closest
}

fn assign_regions(size: Size, centroids: &[Centroid]) -> Grid<RegionId> {
    Grid::new_fn(size, |coord| closest_centroid(centroids, coord))
}

fn relax(centroids: &mut [Centroid], regions: &Grid<RegionId>) {
    let mut sums = vec![(0.0, 0.0, 0u32); centroids.len()];
    for (coord, &region) in regions.enumerate() {
        let sum = &mut sums[region as usize];
        sum.0 += coord.x as f64;
        sum.1 += coord.y as f64;
        sum.2 += 1;
    }
    for (centroid, &(x, y, count)) in centroids.iter_mut().zip(sums.iter()) {
        // a region with no cells keeps its centroid
        if count > 0 {
            centroid.x = x / count as f64;
            centroid.y = y / count as f64;
        }
    }
}

struct Correction<'a> {
    region_weights: &'a BiomeTable<f64>,
    region_biomes: Vec<Biome>,
    members: Vec<Vec<Coord>>,
    field: BiomeField,
}

impl<'a> Correction<'a> {
    // desired / (current share + epsilon)
    fn biome_weight(&self, biome: Biome) -> f64 {
        let count = self.region_biomes.iter().filter(|&&b| b == biome).count();
        let share = count as f64 / self.region_biomes.len() as f64;
        self.region_weights[biome] / (share + SHARE_EPSILON)
    }

    fn recolour<R: Rng>(&mut self, region: RegionId, next_to: Biome, rng: &mut R) {
        let candidates = ALL_BIOMES
            .iter()
            .cloned()
            .filter(|&biome| biomes_may_touch(next_to, biome))
            .collect::<Vec<_>>();
        let weights = candidates
            .iter()
            .map(|&biome| self.biome_weight(biome))
            .collect::<Vec<_>>();
        let biome = match WeightedIndex::<f64>::new(&weights) {
            Ok(distribution) => candidates[distribution.sample(rng)],
            Err(_) => next_to,
        };
        self.region_biomes[region as usize] = biome;
        for &coord in self.members[region as usize].iter() {
            self.field.set(coord, biome);
        }
    }

    fn pass<R: Rng>(&mut self, regions: &Grid<RegionId>, rng: &mut R) -> bool {
        let size = regions.size();
        let mut modified = false;
        for coord in size.coord_iter_row_major() {
            let biome = self.field.get_checked(coord);
            for direction in CardinalDirections {
                let neighbour = coord + direction.coord();
                if !neighbour.is_valid(size) {
                    continue;
                }
                if !biomes_may_touch(biome, self.field.get_checked(neighbour)) {
                    modified = true;
                    self.recolour(*regions.get_checked(neighbour), biome, rng);
                    break;
                }
            }
        }
        modified
    }
}

/// Builds a biome map: random centroids, Lloyd relaxation, then repeated
/// recolouring of whole regions until neighbouring biomes are compatible.
pub fn generate<R: Rng>(
    config: &VoronoiConfig,
    rng: &mut R,
) -> Result<VoronoiDiagram, VoronoiError> {
    let size = config.size;
    if size.width() == 0 || size.height() == 0 {
        return Err(VoronoiError::EmptyGrid(size));
    }
    if config.regions == 0 {
        return Err(VoronoiError::NoRegions);
    }
    let biome_distribution = WeightedIndex::<f64>::new(config.region_weights.iter())
        .map_err(|_| VoronoiError::InvalidRegionWeights)?;
    let region_biomes = (0..config.regions)
        .map(|_| ALL_BIOMES[biome_distribution.sample(rng)])
        .collect::<Vec<_>>();
    let mut centroids = (0..config.regions)
        .map(|_| Centroid {
            x: rng.gen_range(0..size.width()) as f64,
            y: rng.gen_range(0..size.height()) as f64,
        })
        .collect::<Vec<_>>();
    let mut regions = assign_regions(size, &centroids);
    for _ in 0..config.lloyd_iterations {
        relax(&mut centroids, &regions);
        regions = assign_regions(size, &centroids);
    }
    let mut members = vec![Vec::new(); config.regions as usize];
    for (coord, &region) in regions.enumerate() {
        members[region as usize].push(coord);
    }
    let field = BiomeField::new_fn(size, |coord| {
        region_biomes[*regions.get_checked(coord) as usize]
    });
    let mut correction = Correction {
        region_weights: &config.region_weights,
        region_biomes,
        members,
        field,
    };
    let mut converged = false;
    let mut correction_passes = 0;
    while correction_passes < config.max_correction_passes {
        correction_passes += 1;
        if !correction.pass(&regions, rng) {
            converged = true;
            break;
        }
    }
    if converged {
        debug!("biome adjacency corrected in {} passes", correction_passes);
    } else {
        warn!(
            "biome adjacency correction did not converge after {} passes",
            correction_passes
        );
    }
    Ok(VoronoiDiagram {
        field: correction.field,
        regions,
        centroids,
        region_biomes: correction.region_biomes,
        converged,
        correction_passes,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn weights(biomes: &[Biome]) -> BiomeTable<f64> {
        BiomeTable::new_fn(|biome| if biomes.contains(&biome) { 1.0 } else { 0.0 })
    }

    #[test]
    fn touching_rules_are_symmetric() {
        for &a in ALL_BIOMES.iter() {
            assert!(biomes_may_touch(a, a));
            for &b in ALL_BIOMES.iter() {
                assert_eq!(biomes_may_touch(a, b), biomes_may_touch(b, a));
            }
        }
        assert!(biomes_may_touch(Biome::Sand, Biome::ShallowWater));
        assert!(!biomes_may_touch(Biome::Water, Biome::Grass));
        assert!(!biomes_may_touch(Biome::Snow, Biome::Forest));
    }

    #[test]
    fn cells_belong_to_closest_centroid() {
        let mut rng = XorShiftRng::seed_from_u64(42);
        let config = VoronoiConfig::new(Size::new(24, 16), 7);
        let diagram = generate(&config, &mut rng).unwrap();
        for (coord, &region) in diagram.regions.enumerate() {
            let own = diagram.centroids[region as usize].distance2(coord);
            for centroid in diagram.centroids.iter() {
                assert!(own <= centroid.distance2(coord));
            }
            assert_eq!(
                diagram.field.get_checked(coord),
                diagram.region_biomes[region as usize]
            );
        }
    }

    #[test]
    fn converged_maps_respect_adjacency() {
        for seed in 0..10 {
            let mut rng = XorShiftRng::seed_from_u64(seed);
            let config = VoronoiConfig::new(Size::new(20, 20), 9);
            let diagram = generate(&config, &mut rng).unwrap();
            if !diagram.converged {
                continue;
            }
            let size = diagram.field.size();
            for coord in size.coord_iter_row_major() {
                for direction in CardinalDirections {
                    if let Some(neighbour) = diagram.field.get(coord + direction.coord()) {
                        assert!(biomes_may_touch(diagram.field.get_checked(coord), neighbour));
                    }
                }
            }
        }
    }

    #[test]
    fn compatible_weights_need_no_correction() {
        let mut rng = XorShiftRng::seed_from_u64(3);
        let mut config = VoronoiConfig::new(Size::new(16, 16), 6);
        config.region_weights = weights(&[Biome::Grass, Biome::Sand]);
        let diagram = generate(&config, &mut rng).unwrap();
        assert!(diagram.converged);
        assert_eq!(diagram.correction_passes, 1);
        let total = diagram.field.count(Biome::Grass) + diagram.field.count(Biome::Sand);
        assert_eq!(total, 16 * 16);
    }

    #[test]
    fn two_regions_merge_into_one_biome() {
        for seed in 0..10 {
            let mut rng = XorShiftRng::seed_from_u64(seed);
            let mut config = VoronoiConfig::new(Size::new(12, 12), 2);
            config.region_weights = weights(&[Biome::Grass, Biome::Water]);
            let diagram = generate(&config, &mut rng).unwrap();
            assert!(diagram.converged);
            let grass = diagram.field.count(Biome::Grass);
            let water = diagram.field.count(Biome::Water);
            assert!(grass == 144 || water == 144);
        }
    }

    #[test]
    fn same_seed_same_map() {
        let config = VoronoiConfig::new(Size::new(20, 12), 5);
        let a = generate(&config, &mut XorShiftRng::seed_from_u64(9)).unwrap();
        let b = generate(&config, &mut XorShiftRng::seed_from_u64(9)).unwrap();
        assert_eq!(a.field, b.field);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn invalid_configurations() {
        let mut rng = XorShiftRng::seed_from_u64(0);
        assert!(matches!(
            generate(&VoronoiConfig::new(Size::new(0, 4), 3), &mut rng),
            Err(VoronoiError::EmptyGrid(_))
        ));
        assert!(matches!(
            generate(&VoronoiConfig::new(Size::new(4, 4), 0), &mut rng),
            Err(VoronoiError::NoRegions)
        ));
        let mut config = VoronoiConfig::new(Size::new(4, 4), 2);
        config.region_weights = weights(&[]);
        assert!(matches!(
            generate(&config, &mut rng),
            Err(VoronoiError::InvalidRegionWeights)
        ));
    }
}
