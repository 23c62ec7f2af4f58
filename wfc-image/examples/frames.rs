use biome_wfc::description::TilesetDescription;
use biome_wfc::*;
use biome_wfc_image::*;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::path::PathBuf;
use std::sync::Arc;
use wfc_voronoi::VoronoiConfig;

fn main() {
    env_logger::init();
    let (
        width,
        height,
        seed,
        bias_seed,
        map_seed_opt,
        output_dir,
        step_limit,
        regions,
        spread,
        pixel_size,
    ) = meap::all! {
        opt_opt::<u32, _>("INT", 'x').name("width").desc("output width").with_default(48),
        opt_opt::<u32, _>("INT", 'y').name("height").desc("output height").with_default(32),
        opt_opt::<u64, _>("INT", 's').name("seed").desc("structural rng seed (0 picks one)").with_default(0),
        opt_opt::<u64, _>("INT", 'b').name("bias-seed").desc("biome rng seed (0 picks one)").with_default(0),
        opt_opt::<u64, _>("INT", 'm').name("map-seed").desc("biome map rng seed"),
        opt_req::<String, _>("PATH", 'o').name("output-dir").desc("directory to write frames to"),
        opt_opt::<u32, _>("INT", 'n').name("step-limit").desc("observations per frame").with_default(32),
        opt_opt::<u32, _>("INT", 'r').name("regions").desc("number of voronoi regions").with_default(12),
        opt_opt::<f64, _>("FLOAT", "spread").desc("chance of not forcing the home biome").with_default(0.1),
        opt_opt::<u32, _>("INT", 'p').name("pixel-size").desc("pixels per cell").with_default(8),
    }
    .with_help_default()
    .parse_env_or_exit();
    let map_seed = map_seed_opt.unwrap_or_else(|| rand::thread_rng().gen());
    println!("map seed: {}", map_seed);
    let description = TilesetDescription::from_xml(include_str!("../tilesets/biomes.xml"))
        .expect("built-in tileset is valid");
    let tileset =
        Arc::new(Tileset::compile(&description, None).expect("built-in tileset compiles"));
    let size = Size::new(width, height);
    let diagram = wfc_voronoi::generate(
        &VoronoiConfig::new(size, regions),
        &mut XorShiftRng::seed_from_u64(map_seed),
    )
    .unwrap();
    let bias_config = BiasConfig {
        spread: BiomeTable::new_fn(|_| spread),
        ..BiasConfig::default()
    };
    let bias = BiomeBias::new(diagram.field, bias_config).unwrap();
    let mut solver = Solver::new(Config::new(size), tileset, Some(bias)).unwrap();
    let seeds = solver.reset(seed, bias_seed);
    println!("seeds: {} {}", seeds.structure, seeds.bias);
    let output_dir = PathBuf::from(output_dir);
    std::fs::create_dir_all(&output_dir).unwrap();
    let palette = BiomePalette::default();
    let mut frame = 0;
    loop {
        let run = solver.run(seeds.structure, seeds.bias, step_limit);
        image_from_solver(&solver, &palette, pixel_size)
            .save(output_dir.join(format!("frame{:05}.png", frame)))
            .unwrap();
        frame += 1;
        match run {
            Run::Incomplete => (),
            Run::Succeeded => {
                println!("done after {} frames", frame);
                break;
            }
            Run::Failed(failure) => {
                eprintln!("{} after {} frames", failure, frame);
                ::std::process::exit(1);
            }
        }
    }
}
