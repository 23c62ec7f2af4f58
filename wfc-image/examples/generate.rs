use biome_wfc::retry::NumTimes;
use biome_wfc::*;
use biome_wfc::description::TilesetDescription;
use biome_wfc_image::*;
use meap::Parser;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::sync::Arc;
use wfc_voronoi::VoronoiConfig;

const DEFAULT_TILESET: &str = include_str!("../tilesets/biomes.xml");

struct Args {
    output_size: Size,
    seed: u64,
    bias_seed: u64,
    map_seed: u64,
    tileset_path: Option<String>,
    subset: Option<String>,
    output_path: String,
    biome_output_path: Option<String>,
    regions: u32,
    lloyd_iterations: u32,
    threshold: u32,
    spread: f64,
    wrap: Wrap,
    retries: usize,
    pixel_size: u32,
}

impl Args {
    fn parser() -> impl Parser<Item = Self> {
        meap::let_map! {
            let {
                width = opt_opt("INT", 'x').name("width").desc("output width").with_default(64);
                height = opt_opt("INT", 'y').name("height").desc("output height").with_default(48);
                seed = opt_opt("INT", 's').name("seed").desc("structural rng seed (0 picks one)").with_default(0);
                bias_seed = opt_opt("INT", 'b').name("bias-seed").desc("biome rng seed (0 picks one)").with_default(0);
                map_seed_opt = opt_opt("INT", 'm').name("map-seed").desc("biome map rng seed");
                tileset_path = opt_opt::<String, _>("PATH", 't').name("tileset").desc("tileset xml (defaults to the built-in biome set)");
                subset = opt_opt::<String, _>("NAME", "subset").desc("tileset subset");
                output_path = opt_req::<String, _>("PATH", 'o').name("output").desc("output path");
                biome_output_path = opt_opt::<String, _>("PATH", "biome-output").desc("write the biome map here");
                regions = opt_opt("INT", 'r').name("regions").desc("number of voronoi regions").with_default(24);
                lloyd_iterations = opt_opt("INT", 'l').name("lloyd").desc("lloyd relaxation iterations").with_default(2);
                threshold = opt_opt("INT", "threshold").desc("collapsed neighbours before biomes spread").with_default(2);
                spread = opt_opt("FLOAT", "spread").desc("chance of not forcing the home biome").with_default(0.1);
                wrap_x = flag("wrap-x").desc("wrap horizontally");
                wrap_y = flag("wrap-y").desc("wrap vertically");
                retries = opt_opt("INT", "retries").desc("number of retries").with_default(10);
                pixel_size = opt_opt("INT", 'p').name("pixel-size").desc("pixels per cell").with_default(8);
            } in {
                Self {
                    output_size: Size::new(width, height),
                    seed,
                    bias_seed,
                    map_seed: map_seed_opt.unwrap_or_else(|| rand::thread_rng().gen()),
                    tileset_path,
                    subset,
                    output_path,
                    biome_output_path,
                    regions,
                    lloyd_iterations,
                    threshold,
                    spread,
                    wrap: match (wrap_x, wrap_y) {
                        (false, false) => Wrap::None,
                        (true, false) => Wrap::X,
                        (false, true) => Wrap::Y,
                        (true, true) => Wrap::XY,
                    },
                    retries,
                    pixel_size,
                }
            }
        }
    }
}

fn app(args: Args) -> Result<(), String> {
    let xml = match args.tileset_path {
        Some(ref path) => std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?,
        None => DEFAULT_TILESET.to_string(),
    };
    let description = TilesetDescription::from_xml(&xml).map_err(|e| e.to_string())?;
    let tileset =
        Tileset::compile(&description, args.subset.as_deref()).map_err(|e| e.to_string())?;
    println!("map seed: {}", args.map_seed);
    let mut map_rng = XorShiftRng::seed_from_u64(args.map_seed);
    let voronoi_config = VoronoiConfig {
        lloyd_iterations: args.lloyd_iterations,
        ..VoronoiConfig::new(args.output_size, args.regions)
    };
    let diagram = wfc_voronoi::generate(&voronoi_config, &mut map_rng).map_err(|e| e.to_string())?;
    let palette = BiomePalette::default();
    if let Some(ref path) = args.biome_output_path {
        image_from_biome_field(&diagram.field, &palette, args.pixel_size)
            .save(path)
            .map_err(|e| e.to_string())?;
    }
    let bias_config = BiasConfig {
        collapsed_neighbour_threshold: args.threshold,
        spread: BiomeTable::new_fn(|_| args.spread),
    };
    let bias = BiomeBias::new(diagram.field, bias_config).map_err(|e| e.to_string())?;
    let config = Config::new(args.output_size).with_wrap(args.wrap);
    let mut solver = Solver::new(config, Arc::new(tileset), Some(bias)).map_err(|e| e.to_string())?;
    let start_time = ::std::time::Instant::now();
    let result = solver.run_retrying(NumTimes(args.retries), args.seed, args.bias_seed);
    let end_time = ::std::time::Instant::now();
    println!("{:?}", end_time - start_time);
    let image = image_from_solver(&solver, &palette, args.pixel_size);
    image.save(&args.output_path).map_err(|e| e.to_string())?;
    match result {
        Ok(seeds) => {
            let stats = solver.bias_stats();
            println!("seeds: {} {}", seeds.structure, seeds.bias);
            println!(
                "home biome: {}, spread: {}, unbiased: {}",
                stats.home_biome_forced, stats.neighbour_spread, stats.unbiased
            );
            Ok(())
        }
        Err(failure) => Err(failure.to_string()),
    }
}

fn main() {
    env_logger::init();
    ::std::process::exit(match app(Args::parser().with_help_default().parse_env_or_exit()) {
        Ok(()) => 0,
        Err(message) => {
            eprintln!("{}", message);
            1
        }
    })
}
