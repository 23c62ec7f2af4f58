extern crate biome_wfc;
extern crate coord_2d;
extern crate image;
extern crate log;

use biome_wfc::{Biome, BiomeField, BiomeTable, Solver, StateId, Tileset, WaveCellRef};
use coord_2d::Coord;
pub use coord_2d::Size;
use image::{DynamicImage, Rgb, RgbImage};
use log::debug;

/// Colours used to draw biomes and cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiomePalette {
    pub biomes: BiomeTable<Rgb<u8>>,
    /// Colour of states whose tile has no biome.
    pub no_biome: Rgb<u8>,
    /// Colour of cells with no remaining state.
    pub empty: Rgb<u8>,
}

impl Default for BiomePalette {
    fn default() -> Self {
        Self {
            biomes: BiomeTable::new_fn(|biome| match biome {
                Biome::Snow => Rgb([240, 240, 250]),
                Biome::Water => Rgb([30, 70, 200]),
                Biome::Forest => Rgb([20, 90, 30]),
                Biome::ShallowWater => Rgb([60, 200, 220]),
                Biome::Grass => Rgb([80, 190, 60]),
                Biome::Sand => Rgb([230, 210, 110]),
            }),
            no_biome: Rgb([128, 128, 128]),
            empty: Rgb([0, 0, 0]),
        }
    }
}

impl BiomePalette {
    pub fn biome_colour(&self, biome: Biome) -> Rgb<u8> {
        self.biomes[biome]
    }

    pub fn state_colour(&self, tileset: &Tileset, state_id: StateId) -> Rgb<u8> {
        match tileset.state(state_id).biome() {
            Some(biome) => self.biome_colour(biome),
            None => self.no_biome,
        }
    }

    /// Average colour of the remaining states of a cell, weighted by state
    /// weight.
    pub fn weighted_average_colour(&self, tileset: &Tileset, cell: &WaveCellRef) -> Rgb<u8> {
        let total_weight = cell.sum_possible_weight();
        if cell.num_possible_states() == 0 || total_weight <= 0.0 {
            return self.empty;
        }
        let (r, g, b) = cell
            .enumerate_possible_state_weights()
            .map(|(state_id, weight)| {
                let Rgb([r, g, b]) = self.state_colour(tileset, state_id);
                (r as f64 * weight, g as f64 * weight, b as f64 * weight)
            })
            .fold((0., 0., 0.), |(acc_r, acc_g, acc_b), (r, g, b)| {
                (acc_r + r, acc_g + g, acc_b + b)
            });
        Rgb([
            (r / total_weight).round().min(255.) as u8,
            (g / total_weight).round().min(255.) as u8,
            (b / total_weight).round().min(255.) as u8,
        ])
    }
}

fn scaled_image(size: Size, pixel_size: u32) -> RgbImage {
    assert!(pixel_size > 0, "pixel size may not be zero");
    RgbImage::new(size.width() * pixel_size, size.height() * pixel_size)
}

fn fill_cell(rgb_image: &mut RgbImage, Coord { x, y }: Coord, pixel_size: u32, colour: Rgb<u8>) {
    let (left, top) = (x as u32 * pixel_size, y as u32 * pixel_size);
    for j in 0..pixel_size {
        for i in 0..pixel_size {
            rgb_image.put_pixel(left + i, top + j, colour);
        }
    }
}

pub fn image_from_biome_field(
    field: &BiomeField,
    palette: &BiomePalette,
    pixel_size: u32,
) -> DynamicImage {
    let mut rgb_image = scaled_image(field.size(), pixel_size);
    for (coord, &biome) in field.grid().enumerate() {
        fill_cell(&mut rgb_image, coord, pixel_size, palette.biome_colour(biome));
    }
    DynamicImage::ImageRgb8(rgb_image)
}

/// Draws the current wave. Collapsed cells take the colour of their state,
/// undecided cells the weighted average of what remains, and contradicted
/// cells the empty colour.
pub fn image_from_solver(
    solver: &Solver,
    palette: &BiomePalette,
    pixel_size: u32,
) -> DynamicImage {
    let tileset = solver.tileset();
    let mut rgb_image = scaled_image(solver.size(), pixel_size);
    let mut num_contradictions = 0;
    for (coord, cell) in solver.wave_cell_ref_enumerate() {
        let colour = if cell.num_possible_states() == 0 {
            num_contradictions += 1;
            palette.empty
        } else {
            palette.weighted_average_colour(tileset, &cell)
        };
        fill_cell(&mut rgb_image, coord, pixel_size, colour);
    }
    if num_contradictions > 0 {
        debug!("drew {} contradicted cells", num_contradictions);
    }
    DynamicImage::ImageRgb8(rgb_image)
}
