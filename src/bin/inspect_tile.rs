use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use terrawin::data_loader::{list_layers, load_tile, read_tile_bounds, tile_name};
use terrawin::tile::Coordinate;
use terrawin::tile_index::choose_tile;

/// Print the groups, layers and axes of a tile file
#[derive(Parser, Debug)]
#[command(name = "inspect_tile")]
struct Args {
    /// Tile file to inspect
    path: PathBuf,

    /// Report whether the tile covers this latitude (needs --lon)
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Report whether the tile covers this longitude (needs --lat)
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let path = &args.path;

    println!("Inspecting tile: {}", path.display());
    println!("  name: {}", tile_name(path));

    let file = netcdf::open(path).with_context(|| format!("opening {}", path.display()))?;
    println!("\n=== GROUPS ===");
    for group in file.groups()? {
        println!("  {}", group.name());
        for var in group.variables() {
            let dims: Vec<String> = var
                .dimensions()
                .iter()
                .map(|d| format!("{} = {}", d.name(), d.len()))
                .collect();
            println!("    {} ({:?}) [{}]", var.name(), var.vartype(), dims.join(", "));
        }
    }
    drop(file);

    let bbox = read_tile_bounds(path).context("reading coordinate axes")?;
    println!("\n=== BOUNDS ===");
    println!("  latitude:  {} .. {}", bbox.lat_min, bbox.lat_max);
    println!("  longitude: {} .. {}", bbox.lon_min, bbox.lon_max);

    let layers = list_layers(path)?;
    let tile = load_tile(path, Some(&layers)).context("loading layers")?;
    let (rows, cols) = tile.shape();
    println!("\n=== LAYERS ({} x {}) ===", rows, cols);
    for layer in tile.layer_paths() {
        let data = tile.layer(layer)?;
        let (min, max) = data
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        println!(
            "  {} [{}]  min = {}  max = {}",
            layer,
            layer.kind(),
            min,
            max
        );
    }

    match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => {
            let covered = choose_tile(path, Coordinate::new(lat, lon))?.is_some();
            println!("\n({}, {}) covered: {}", lat, lon, covered);
        }
        (None, None) => {}
        _ => bail!("--lat and --lon must be given together"),
    }

    Ok(())
}
