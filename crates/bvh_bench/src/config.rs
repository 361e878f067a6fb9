//! Scene description parsing for the heuristic benchmark.

use anyhow::{Context, Result};
use facet_bvh::{scene, BuildConfig, Facet, SplitMethod};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::path::Path;

/// Root configuration: the scene plus run defaults.
#[derive(Debug, Deserialize)]
pub struct Config {
	/// Rays fired per heuristic (overridden by `--rays`).
	#[serde(default = "default_rays")]
	pub rays: usize,
	/// RNG seed for random geometry and rays (overridden by `--seed`).
	#[serde(default)]
	pub seed: u64,
	/// Heuristics to compare; empty means all of them.
	#[serde(default)]
	pub methods: Vec<String>,
	/// Shared build parameters; `split_method` is replaced per heuristic.
	#[serde(default)]
	pub build: BuildConfig,
	/// Structures merged into one facet set.
	pub structures: Vec<StructureConfig>,
}

/// One generated piece of geometry.
#[derive(Debug, Deserialize)]
pub struct StructureConfig {
	pub name: String,
	/// Translation applied to every vertex.
	#[serde(default)]
	pub offset: [f64; 3],
	#[serde(flatten)]
	pub shape: Shape,
}

/// Generator and its parameters.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
	/// Quad grid in the z = 0 plane.
	Grid {
		nx: u32,
		ny: u32,
		#[serde(default = "default_size")]
		size: f64,
		#[serde(default)]
		gap: f64,
	},
	/// Polygonal pipe along +z.
	Tube {
		sides: u32,
		segments: u32,
		radius: f64,
		length: f64,
		#[serde(default = "default_capped")]
		capped: bool,
	},
	/// Uniformly scattered triangles.
	RandomTriangles {
		count: u32,
		extent: f64,
		#[serde(default = "default_size")]
		size: f64,
	},
}

fn default_rays() -> usize {
	100_000
}

fn default_size() -> f64 {
	1.0
}

fn default_capped() -> bool {
	true
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		let config: Config =
			toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;

		if config.structures.is_empty() {
			anyhow::bail!("Config must have at least one structure");
		}
		config
			.build
			.validate()
			.with_context(|| "Invalid [build] section")?;
		for structure in &config.structures {
			structure
				.shape
				.validate()
				.with_context(|| format!("Invalid structure '{}'", structure.name))?;
		}

		Ok(config)
	}

	/// Requested heuristics, in declaration order when none are named.
	pub fn split_methods(&self) -> Result<Vec<SplitMethod>> {
		if self.methods.is_empty() {
			return Ok(SplitMethod::ALL.to_vec());
		}
		let mut methods = Vec::with_capacity(self.methods.len());
		for name in &self.methods {
			let method: SplitMethod = name.parse()?;
			if !methods.contains(&method) {
				methods.push(method);
			}
		}
		Ok(methods)
	}

	/// Generate every structure and merge them; facet ids are renumbered to
	/// stay unique across structures.
	pub fn generate(&self, seed: u64) -> Vec<Facet> {
		let mut rng = StdRng::seed_from_u64(seed);
		let mut facets = Vec::new();
		for structure in &self.structures {
			let offset = DVec3::from_array(structure.offset);
			let base = facets.len() as u32;
			let generated = match structure.shape {
				Shape::Grid { nx, ny, size, gap } => scene::grid(nx, ny, size, gap),
				Shape::Tube {
					sides,
					segments,
					radius,
					length,
					capped,
				} => scene::tube(sides, segments, radius, length, capped),
				Shape::RandomTriangles { count, extent, size } => {
					scene::random_triangles(count, extent, size, &mut rng)
				}
			};
			log::debug!("{}: {} facets", structure.name, generated.len());
			facets.extend(generated.into_iter().enumerate().map(|(i, f)| {
				Facet::new(base + i as u32, f.vertices().iter().map(|v| *v + offset))
			}));
		}
		facets
	}
}

impl Shape {
	fn validate(&self) -> Result<()> {
		match *self {
			Shape::Grid { nx, ny, size, gap } => {
				if nx == 0 || ny == 0 {
					anyhow::bail!("grid needs nx, ny >= 1, got {}x{}", nx, ny);
				}
				if !(size > 0.0) || !(gap >= 0.0) {
					anyhow::bail!("grid needs size > 0 and gap >= 0, got {} / {}", size, gap);
				}
			}
			Shape::Tube {
				sides,
				segments,
				radius,
				length,
				..
			} => {
				if sides < 3 || segments == 0 {
					anyhow::bail!("tube needs sides >= 3 and segments >= 1");
				}
				if !(radius > 0.0) || !(length > 0.0) {
					anyhow::bail!("tube needs positive radius and length");
				}
			}
			Shape::RandomTriangles { count, extent, size } => {
				if count == 0 {
					anyhow::bail!("random_triangles needs count >= 1");
				}
				if !(extent > 0.0) || !(size > 0.0) {
					anyhow::bail!("random_triangles needs positive extent and size");
				}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(text: &str) -> Config {
		toml::from_str(text).unwrap()
	}

	#[test]
	fn test_parse_scene() {
		let config = parse(
			r#"
			rays = 500
			methods = ["sah", "ProbSplit", "SAH"]

			[build]
			max_prims_in_node = 2

			[[structures]]
			name = "pipe"
			kind = "tube"
			sides = 8
			segments = 4
			radius = 1.0
			length = 10.0

			[[structures]]
			name = "floor"
			kind = "grid"
			nx = 3
			ny = 2
			offset = [0.0, 0.0, -1.0]
			"#,
		);
		assert_eq!(config.rays, 500);
		assert_eq!(config.build.max_prims_in_node, 2);
		assert_eq!(
			config.split_methods().unwrap(),
			vec![SplitMethod::Sah, SplitMethod::ProbSplit]
		);

		let facets = config.generate(0);
		assert_eq!(facets.len(), 8 * 4 + 2 + 6);
		let ids: Vec<u32> = facets.iter().map(|f| f.id).collect();
		assert_eq!(ids, (0..facets.len() as u32).collect::<Vec<_>>());
		assert_eq!(facets[34].vertices()[0].z, -1.0);
	}

	#[test]
	fn test_unknown_method_rejected() {
		let config = parse(
			r#"
			methods = ["octree"]
			[[structures]]
			name = "g"
			kind = "grid"
			nx = 1
			ny = 1
			"#,
		);
		assert!(config.split_methods().is_err());
	}

	#[test]
	fn test_invalid_shape_rejected() {
		let shape = Shape::Tube {
			sides: 2,
			segments: 1,
			radius: 1.0,
			length: 1.0,
			capped: false,
		};
		assert!(shape.validate().is_err());
		let shape = Shape::Grid {
			nx: 2,
			ny: 2,
			size: 1.0,
			gap: 0.0,
		};
		assert!(shape.validate().is_ok());
	}
}
