//! Split heuristic comparison for facet_bvh.
//!
//! Builds one registry entry per heuristic over the same generated scene,
//! fires the same seeded rays at every entry and checks that all of them
//! agree on every nearest hit before printing the cost table.
//!
//! Probability-aware heuristics get a warm-up pass first, so their measured
//! tree is rebuilt from real hit statistics.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use facet_bvh::{
	scene, BuildConfig, BuildStats, BvhRegistry, BvhTraverser, Ray, SplitMethod, TraversalCost,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::path::PathBuf;
use web_time::Instant;

use config::Config;

/// Compare BVH split heuristics on a synthetic scene.
#[derive(Parser, Debug)]
#[command(name = "bvh_bench")]
#[command(about = "Builds one BVH per split heuristic and compares query cost")]
struct Args {
	/// Path to scene TOML file.
	#[arg(short, long)]
	config: PathBuf,

	/// Rays per heuristic (default: from config).
	#[arg(short, long)]
	rays: Option<usize>,

	/// RNG seed (default: from config).
	#[arg(short, long)]
	seed: Option<u64>,

	/// Comma-separated heuristics, e.g. `sah,probsplit` (default: from config).
	#[arg(short, long, value_delimiter = ',')]
	methods: Option<Vec<String>>,

	/// Report facets whose mean traversal steps exceed this multiple of the
	/// average.
	#[arg(long, default_value_t = 4.0)]
	expensive: f64,
}

/// Measured outcome for one heuristic.
struct Row {
	method: SplitMethod,
	build: BuildStats,
	hits: usize,
	cost: TraversalCost64,
	query_ms: f64,
	expensive: usize,
}

#[derive(Default, Clone, Copy)]
struct TraversalCost64 {
	node_tests: u64,
	facet_tests: u64,
}

impl TraversalCost64 {
	fn add(mut self, cost: TraversalCost) -> Self {
		self.node_tests += cost.node_tests as u64;
		self.facet_tests += cost.facet_tests as u64;
		self
	}
}

fn main() -> Result<()> {
	env_logger::init();
	let args = Args::parse();

	println!("Loading scene from: {}", args.config.display());
	let mut config = Config::load(&args.config)?;
	if let Some(methods) = args.methods {
		config.methods = methods;
	}
	let rays = args.rays.unwrap_or(config.rays);
	let seed = args.seed.unwrap_or(config.seed);
	let methods = config.split_methods()?;

	let facets: std::sync::Arc<[facet_bvh::Facet]> = config.generate(seed).into();
	let bounds = scene::scene_bounds(&facets);
	let rays = scene::random_rays(&bounds, rays, &mut StdRng::seed_from_u64(seed.wrapping_add(1)));
	println!(
		"{} facets, {} rays, {} heuristics",
		facets.len(),
		rays.len(),
		methods.len()
	);

	let mut registry = BvhRegistry::new();
	let mut rows = Vec::with_capacity(methods.len());
	let mut reference: Option<(SplitMethod, Vec<Option<usize>>)> = None;

	for &method in &methods {
		let index = registry.add_structure(method.name());
		let build_config = BuildConfig {
			split_method: method,
			..config.build
		};

		let mut build = registry
			.rebuild(index, facets.clone(), &build_config)
			.with_context(|| format!("Building {}", method))?;
		if method.uses_hit_probability() {
			// Warm-up pass; the rebuild picks up its hit statistics as priors.
			fire(&registry, index, &rays)?;
			build = registry.rebuild(index, facets.clone(), &build_config)?;
			registry.clear_stats(index)?;
		}

		let started = Instant::now();
		let (hits, cost) = fire(&registry, index, &rays)?;
		let query_ms = started.elapsed().as_secs_f64() * 1000.0;

		if let Some((first, expected)) = &reference {
			let mismatches = hits.iter().zip(expected).filter(|(a, b)| a != b).count();
			if mismatches > 0 {
				anyhow::bail!(
					"{} disagrees with {} on {} of {} rays",
					method,
					first,
					mismatches,
					rays.len()
				);
			}
		}

		let snapshot = registry.snapshot(index)?;
		let expensive = snapshot.expensive_facets(args.expensive);
		log::debug!("{}: expensive facets {:?}", method, &expensive[..expensive.len().min(16)]);

		rows.push(Row {
			method,
			build,
			hits: hits.iter().filter(|h| h.is_some()).count(),
			cost,
			query_ms,
			expensive: expensive.len(),
		});
		if reference.is_none() {
			reference = Some((method, hits));
		}
	}

	print_table(&rows, rays.len());
	println!("\nAll {} heuristics agree on every nearest hit.", rows.len());

	Ok(())
}

/// Query every ray in parallel; returns hit facet indices in ray order and
/// the summed traversal cost.
fn fire(
	registry: &BvhRegistry,
	index: usize,
	rays: &[Ray],
) -> Result<(Vec<Option<usize>>, TraversalCost64)> {
	let tree = registry.tree(index)?;
	let results = rays
		.par_iter()
		.map(|ray| BvhTraverser::intersect_counted(&tree, ray))
		.collect::<Result<Vec<_>, _>>()?;
	let cost = results
		.iter()
		.fold(TraversalCost64::default(), |acc, (_, c)| acc.add(*c));
	let hits = results
		.into_iter()
		.map(|(hit, _)| hit.map(|h| h.facet_index))
		.collect();
	Ok((hits, cost))
}

fn print_table(rows: &[Row], ray_count: usize) {
	let per_ray = |n: u64| n as f64 / ray_count.max(1) as f64;
	println!(
		"\n{:<13} {:>10} {:>8} {:>6} {:>9} {:>10} {:>11} {:>10} {:>9}",
		"method", "build ms", "nodes", "depth", "avg leaf", "node/ray", "facet/ray", "query ms", "hot"
	);
	for row in rows {
		println!(
			"{:<13} {:>10.2} {:>8} {:>6} {:>9.2} {:>10.2} {:>11.2} {:>10.2} {:>9}",
			row.method.name(),
			row.build.build_us as f64 / 1000.0,
			row.build.node_count,
			row.build.max_depth,
			row.build.avg_leaf_size,
			per_ray(row.cost.node_tests),
			per_ray(row.cost.facet_tests),
			row.query_ms,
			row.expensive,
		);
	}
	if let Some(row) = rows.first() {
		println!(
			"\n{} of {} rays hit ({:.1}%)",
			row.hits,
			ray_count,
			100.0 * per_ray(row.hits as u64)
		);
	}
}
