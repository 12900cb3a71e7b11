//! CLI utility for trinav path queries

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use glam::Vec3;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use trinav::{
    DistanceHeuristic, MasterNavigator, NavMeshConfig, NavRequestState, NavigatorConfig,
    TriNavMesh,
};
use trinav_common::TriMesh;

/// Upper bound on waypoints printed for one path
const MAX_WAYPOINTS: usize = 256;

/// A CLI utility for triangle navigation mesh pathfinding
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging (RUST_LOG overrides)
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

/// Where the navigation mesh comes from
#[derive(ClapArgs, Debug)]
struct MeshSource {
    /// Input mesh file (OBJ format)
    #[clap(long, value_parser, conflicts_with = "grid")]
    mesh: Option<PathBuf>,

    /// Generate a flat grid of WxH quads instead of loading a mesh
    #[clap(long, value_parser = parse_grid)]
    grid: Option<(usize, usize)>,

    /// Quad size of a generated grid
    #[clap(long, default_value = "1.0")]
    cell_size: f32,

    /// Reverse triangle winding of a loaded mesh (for counter-clockwise input)
    #[clap(long)]
    flip_winding: bool,

    /// Maximum depth of the spatial index
    #[clap(long, default_value = "8")]
    spatial_depth: u32,

    /// Vertical tolerance for on-mesh tests
    #[clap(long, default_value = "0.5")]
    plane_tolerance: f32,

    /// Fraction used to pull waypoints off walls and vertices
    #[clap(long, default_value = "0.1")]
    offset_scale: f32,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find a path between two points
    FindPath {
        #[clap(flatten)]
        source: MeshSource,

        /// Start position (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        start: Vec3,

        /// Goal position (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        goal: Vec3,

        /// Distance heuristic (longest-axis, manhattan, euclidean)
        #[clap(long, default_value = "longest-axis")]
        heuristic: DistanceHeuristic,

        /// Output path file
        #[clap(long, value_parser)]
        output: Option<PathBuf>,
    },

    /// Check whether a point lies on the mesh and find the nearest valid location
    Validate {
        #[clap(flatten)]
        source: MeshSource,

        /// Point to check (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        point: Vec3,

        /// Vertical tolerance for the validity check
        #[clap(long, default_value = "0.5")]
        tolerance: f32,
    },

    /// Print mesh statistics
    Info {
        #[clap(flatten)]
        source: MeshSource,
    },
}

/// Parse a comma-separated vector
fn parse_vector(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').collect();

    if parts.len() != 3 {
        return Err(format!(
            "Vector must have 3 components, got {}",
            parts.len()
        ));
    }

    let x = parts[0].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = parts[1].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let z = parts[2].trim().parse::<f32>().map_err(|e| e.to_string())?;

    Ok(Vec3::new(x, y, z))
}

/// Parse grid dimensions written as WxH
fn parse_grid(s: &str) -> Result<(usize, usize), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Grid must be written as WxH, got '{s}'"))?;
    let w = w.trim().parse::<usize>().map_err(|e| e.to_string())?;
    let h = h.trim().parse::<usize>().map_err(|e| e.to_string())?;
    if w == 0 || h == 0 {
        return Err("Grid dimensions must be positive".to_string());
    }
    Ok((w, h))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match args.command {
        Commands::FindPath {
            source,
            start,
            goal,
            heuristic,
            output,
        } => find_path(&source, start, goal, heuristic, output.as_deref()),
        Commands::Validate {
            source,
            point,
            tolerance,
        } => validate(&source, point, tolerance),
        Commands::Info { source } => info(&source),
    }
}

/// Load or generate the navigation mesh
fn load_mesh(source: &MeshSource) -> Result<TriNavMesh> {
    let tri_mesh = match (&source.mesh, source.grid) {
        (Some(path), _) => {
            println!("Loading mesh from {}...", path.display());
            let mut mesh =
                TriMesh::from_obj(path).map_err(|e| anyhow!("Failed to load mesh: {}", e))?;
            if source.flip_winding {
                mesh.flip_winding();
            }
            mesh
        }
        (None, Some((cols, rows))) => {
            println!("Generating {}x{} grid...", cols, rows);
            TriMesh::grid(cols, rows, source.cell_size, (0.0, 0.0), 0.0)
        }
        (None, None) => bail!("Either --mesh or --grid is required"),
    };

    println!(
        "Mesh loaded: {} vertices, {} triangles",
        tri_mesh.vert_count(),
        tri_mesh.tri_count()
    );

    let config = NavMeshConfig::new()
        .with_spatial_depth(source.spatial_depth)
        .with_plane_tolerance(source.plane_tolerance)
        .with_offset_scale(source.offset_scale);
    TriNavMesh::from_tri_mesh(&tri_mesh, &config)
        .map_err(|e| anyhow!("Failed to build navigation mesh: {}", e))
}

fn create_navigator(mesh: TriNavMesh, heuristic: DistanceHeuristic) -> Result<MasterNavigator> {
    let config = NavigatorConfig::new().with_heuristic(heuristic);
    MasterNavigator::new(Arc::new(mesh), config)
        .map_err(|e| anyhow!("Failed to create navigator: {}", e))
}

/// Find a path on a navigation mesh
fn find_path(
    source: &MeshSource,
    start: Vec3,
    goal: Vec3,
    heuristic: DistanceHeuristic,
    output: Option<&Path>,
) -> Result<()> {
    let mesh = load_mesh(source)?;
    let mut navigator = create_navigator(mesh, heuristic)?;

    println!("Finding path from {} to {}...", start, goal);
    let request = navigator.get_path(start, goal);
    navigator.process_all(false);

    if request.state() != NavRequestState::Complete {
        let reason = request
            .failure()
            .map(|f| f.to_string())
            .unwrap_or_else(|| request.state().to_string());
        bail!("Failed to find path: {}", reason);
    }
    let path = request
        .data()
        .ok_or_else(|| anyhow!("Completed request has no path"))?;

    println!("Found path {} with {} cells", path.id(), path.cell_count());

    let mut waypoints = vec![start];
    let mut position = start;
    while waypoints.len() < MAX_WAYPOINTS {
        let Some(target) = path.get_target(position) else {
            log::warn!("Position {} left the path corridor", position);
            break;
        };
        waypoints.push(target);
        if target == path.goal() {
            break;
        }
        position = target;
    }

    println!("Generated {} waypoints", waypoints.len());

    if let Some(output_path) = output {
        println!("Saving path to {}...", output_path.display());

        let mut file = File::create(output_path)
            .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;

        writeln!(file, "# Path from {} to {}", start, goal)?;
        writeln!(file, "# {} waypoints", waypoints.len())?;
        for waypoint in &waypoints {
            writeln!(file, "{},{},{}", waypoint.x, waypoint.y, waypoint.z)?;
        }
    } else {
        println!("Path:");
        for (i, waypoint) in waypoints.iter().enumerate() {
            println!("{}: {},{},{}", i, waypoint.x, waypoint.y, waypoint.z);
        }
    }

    Ok(())
}

/// Check a point against the mesh
fn validate(source: &MeshSource, point: Vec3, tolerance: f32) -> Result<()> {
    let mesh = load_mesh(source)?;
    let mut navigator = create_navigator(mesh, DistanceHeuristic::default())?;

    let valid = navigator.is_valid_location(point, tolerance);
    let nearest = navigator.get_nearest_valid_location(point);
    navigator.process_all(false);

    match (valid.state(), valid.data()) {
        (NavRequestState::Complete, Some(true)) => println!("{} is on the mesh", point),
        (NavRequestState::Complete, _) => {
            println!("{} is above or below the mesh beyond {}", point, tolerance)
        }
        _ => println!("{} is outside every cell column", point),
    }

    match nearest.data() {
        Some(location) => println!("Nearest valid location: {}", location),
        None => println!("No valid location (empty mesh)"),
    }

    Ok(())
}

/// Print mesh statistics
fn info(source: &MeshSource) -> Result<()> {
    let mesh = load_mesh(source)?;

    println!("Cells: {}", mesh.cell_count());
    println!("Links: {}", mesh.link_count());
    match mesh.bounds() {
        Some(bounds) => println!(
            "Bounds: x {}..{}, z {}..{}",
            bounds.min.x, bounds.max.x, bounds.min.y, bounds.max.y
        ),
        None => println!("Bounds: none (empty mesh)"),
    }
    if let Some(index) = mesh.spatial_index() {
        println!(
            "Spatial index: {} nodes, depth {}",
            index.node_count(),
            index.max_depth()
        );
    }
    let dead_ends = mesh.cells().iter().filter(|c| c.link_count() == 1).count();
    println!("Dead-end cells: {}", dead_ends);

    Ok(())
}
