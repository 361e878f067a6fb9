//! BvhRegistry - owns one tree per structure and swaps them on rebuild.
//!
//! # Flow
//!
//! ```text
//! Controller                          Async (rayon)
//! ┌──────────────────┐
//! │ start_rebuild(i) │──── facets, config, priors ───►┌──────────────┐
//! │ entry: Building  │                                │ BvhBuilder   │
//! └────────┬─────────┘                                │ (cancellable)│
//!          │  workers keep their Arc<Bvh>             └──────┬───────┘
//!          ▼                                                 │
//! ┌──────────────────┐                                       │
//! │ poll_rebuild(i)  │◄──────────── bounded(1) ──────────────┘
//! │ - publish Arc    │
//! │ - entry: Ready   │
//! └──────────────────┘
//! ```
//!
//! A published tree stays valid for every holder of its `Arc` until it is
//! superseded; failed or cancelled builds leave it authoritative.
//!
//! # Usage
//!
//! ```ignore
//! let mut registry = BvhRegistry::new();
//! let pipe = registry.add_structure("pipe");
//! registry.rebuild(pipe, facets, &BuildConfig::default())?;
//!
//! let hit = registry.query(QueryTarget::All, &ray)?;
//!
//! // Geometry edit: stop workers, then
//! registry.invalidate(pipe)?;
//! registry.start_rebuild(pipe, edited, &config)?;
//! while registry.poll_rebuild(pipe)?.is_none() { /* frame */ }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, TryRecvError};

use crate::build::{BuildStats, BvhBuilder, CancelToken};
use crate::config::BuildConfig;
use crate::error::{BvhError, BvhResult};
use crate::facet::Facet;
use crate::stats::{BuildMetrics, StatsSnapshot};
use crate::traverse::BvhTraverser;
use crate::tree::{Bvh, BvhState};
use crate::types::{Hit, Ray};

/// Which registry entries a query runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryTarget {
	Structure(usize),
	/// Every entry; all must be Ready.
	All,
}

/// Nearest hit across the queried entries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegistryHit {
	/// Registry index of the entry that was hit.
	pub structure: usize,
	pub hit: Hit,
}

/// In-flight asynchronous build.
struct PendingBuild {
	receiver: Receiver<BvhResult<Bvh>>,
	cancel: CancelToken,
	/// Entry state to restore if the build does not publish.
	previous: BvhState,
}

struct Entry {
	label: String,
	state: BvhState,
	tree: Option<Arc<Bvh>>,
	pending: Option<PendingBuild>,
	metrics: BuildMetrics,
}

impl Entry {
	fn publish(&mut self, bvh: Bvh) -> BuildStats {
		let stats = *bvh.build_stats();
		self.metrics.record_build(stats.build_us);
		self.tree = Some(Arc::new(bvh));
		self.state = BvhState::Ready;
		stats
	}

	/// Cancel any in-flight build; returns the state it would have restored.
	fn abort_pending(&mut self) -> Option<BvhState> {
		let pending = self.pending.take()?;
		pending.cancel.cancel();
		self.metrics.record_failure();
		Some(pending.previous)
	}

	fn ready_tree(&self) -> BvhResult<&Arc<Bvh>> {
		match (&self.tree, self.state) {
			(Some(tree), BvhState::Ready) => Ok(tree),
			(_, found) => Err(BvhError::InvalidState {
				expected: BvhState::Ready,
				found,
			}),
		}
	}
}

/// Ordered collection of trees, one per structure.
///
/// Mutating operations take `&mut self`; the owning controller serializes
/// them against worker queries.
#[derive(Default)]
pub struct BvhRegistry {
	entries: Vec<Entry>,
}

impl BvhRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an Unbuilt entry; returns its index.
	pub fn add_structure(&mut self, label: impl Into<String>) -> usize {
		self.entries.push(Entry {
			label: label.into(),
			state: BvhState::Unbuilt,
			tree: None,
			pending: None,
			metrics: BuildMetrics::default(),
		});
		self.entries.len() - 1
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn state(&self, index: usize) -> BvhResult<BvhState> {
		Ok(self.entry(index)?.state)
	}

	pub fn label(&self, index: usize) -> BvhResult<&str> {
		Ok(&self.entry(index)?.label)
	}

	pub fn metrics(&self, index: usize) -> BvhResult<&BuildMetrics> {
		Ok(&self.entry(index)?.metrics)
	}

	/// True while an asynchronous build is in flight.
	pub fn is_busy(&self, index: usize) -> BvhResult<bool> {
		Ok(self.entry(index)?.pending.is_some())
	}

	/// Build synchronously and publish.
	///
	/// An in-flight asynchronous build of the same entry is cancelled first.
	/// On failure the previously published tree stays authoritative.
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "registry::rebuild"))]
	pub fn rebuild(
		&mut self,
		index: usize,
		facets: impl Into<Arc<[Facet]>>,
		config: &BuildConfig,
	) -> BvhResult<BuildStats> {
		config.validate()?;
		let facets = facets.into();
		let entry = self.entry_mut(index)?;
		let previous = entry.abort_pending().unwrap_or(entry.state);

		let priors = hit_priors(entry, &facets, config);
		entry.state = BvhState::Building;
		match BvhBuilder::build_shared(facets, config, priors.as_deref(), None) {
			Ok(bvh) => {
				let stats = entry.publish(bvh);
				tracing::debug!(index, label = %entry.label, nodes = stats.node_count, "published rebuilt tree");
				Ok(stats)
			}
			Err(e) => {
				entry.state = previous;
				entry.metrics.record_failure();
				Err(e)
			}
		}
	}

	/// Start an asynchronous build on the rayon pool.
	///
	/// Returns `Ok(false)` if a build for this entry is already running.
	pub fn start_rebuild(
		&mut self,
		index: usize,
		facets: impl Into<Arc<[Facet]>>,
		config: &BuildConfig,
	) -> BvhResult<bool> {
		config.validate()?;
		let facets = facets.into();
		let entry = self.entry_mut(index)?;
		if entry.pending.is_some() {
			return Ok(false);
		}

		let priors = hit_priors(entry, &facets, config);
		let (sender, receiver) = channel::bounded(1);
		let cancel = CancelToken::new();
		let token = cancel.clone();
		let config = *config;
		rayon::spawn(move || {
			let result = BvhBuilder::build_shared(facets, &config, priors.as_deref(), Some(&token));
			// Receiver dropped = cancelled or discarded
			let _ = sender.send(result);
		});

		entry.pending = Some(PendingBuild {
			receiver,
			cancel,
			previous: entry.state,
		});
		entry.state = BvhState::Building;
		Ok(true)
	}

	/// Publish a finished asynchronous build (non-blocking).
	///
	/// `Ok(Some(stats))` when a tree was published, `Ok(None)` while the build
	/// is still running or when none was started, `Err` when it failed (the
	/// previous state is restored).
	pub fn poll_rebuild(&mut self, index: usize) -> BvhResult<Option<BuildStats>> {
		let entry = self.entry_mut(index)?;
		let Some(pending) = entry.pending.as_ref() else {
			return Ok(None);
		};
		let outcome = match pending.receiver.try_recv() {
			Ok(result) => result,
			Err(TryRecvError::Empty) => return Ok(None),
			Err(TryRecvError::Disconnected) => Err(BvhError::PartialBuildAborted),
		};
		finish_pending(entry, outcome).map(Some)
	}

	/// Block until the in-flight build finishes, then publish it.
	///
	/// Fails with `InvalidState` when no build is running.
	pub fn wait_rebuild(&mut self, index: usize) -> BvhResult<BuildStats> {
		let entry = self.entry_mut(index)?;
		let Some(pending) = entry.pending.as_ref() else {
			return Err(BvhError::InvalidState {
				expected: BvhState::Building,
				found: entry.state,
			});
		};
		let outcome = pending
			.receiver
			.recv()
			.unwrap_or(Err(BvhError::PartialBuildAborted));
		finish_pending(entry, outcome)
	}

	/// Signal cancellation of the in-flight build and restore the previous
	/// state. Reports `PartialBuildAborted` when a build was cancelled.
	pub fn cancel_rebuild(&mut self, index: usize) -> BvhResult<()> {
		let entry = self.entry_mut(index)?;
		match entry.abort_pending() {
			Some(previous) => {
				entry.state = previous;
				Err(BvhError::PartialBuildAborted)
			}
			None => Ok(()),
		}
	}

	/// Structural geometry edit: the entry and its published tree go Stale.
	///
	/// An in-flight build was working on outdated geometry and is cancelled.
	pub fn invalidate(&mut self, index: usize) -> BvhResult<()> {
		let entry = self.entry_mut(index)?;
		entry.abort_pending();
		match &entry.tree {
			Some(tree) => {
				tree.mark_stale();
				entry.state = BvhState::Stale;
			}
			None => entry.state = BvhState::Unbuilt,
		}
		Ok(())
	}

	/// Drop the entry's tree; the entry returns to Unbuilt.
	pub fn discard(&mut self, index: usize) -> BvhResult<()> {
		let entry = self.entry_mut(index)?;
		entry.abort_pending();
		if let Some(tree) = entry.tree.take() {
			tree.mark_stale();
		}
		entry.state = BvhState::Unbuilt;
		Ok(())
	}

	/// Shared handle to a Ready tree for worker threads.
	pub fn tree(&self, index: usize) -> BvhResult<Arc<Bvh>> {
		self.entry(index)?.ready_tree().cloned()
	}

	/// Nearest hit over one entry or all of them.
	///
	/// Every queried entry must be Ready. Equal distances prefer the lower
	/// structure index.
	pub fn query(&self, target: QueryTarget, ray: &Ray) -> BvhResult<Option<RegistryHit>> {
		match target {
			QueryTarget::Structure(index) => {
				let tree = self.entry(index)?.ready_tree()?;
				Ok(BvhTraverser::intersect(tree, ray)?.map(|hit| RegistryHit { structure: index, hit }))
			}
			QueryTarget::All => {
				let trees = self
					.entries
					.iter()
					.map(Entry::ready_tree)
					.collect::<BvhResult<Vec<_>>>()?;
				let mut best: Option<RegistryHit> = None;
				for (structure, tree) in trees.into_iter().enumerate() {
					if let Some(hit) = BvhTraverser::intersect(tree, ray)? {
						if best.map_or(true, |b| hit.distance < b.hit.distance) {
							best = Some(RegistryHit { structure, hit });
						}
					}
				}
				Ok(best)
			}
		}
	}

	/// Owned copy of the published tree's counters (Ready or Stale).
	pub fn snapshot(&self, index: usize) -> BvhResult<StatsSnapshot> {
		let entry = self.entry(index)?;
		match &entry.tree {
			Some(tree) => Ok(tree.snapshot()),
			None => Err(BvhError::InvalidState {
				expected: BvhState::Ready,
				found: entry.state,
			}),
		}
	}

	/// Reset the published tree's counters; no-op without a tree.
	pub fn clear_stats(&self, index: usize) -> BvhResult<()> {
		if let Some(tree) = &self.entry(index)?.tree {
			tree.clear_stats();
		}
		Ok(())
	}

	fn entry(&self, index: usize) -> BvhResult<&Entry> {
		self.entries.get(index).ok_or(BvhError::UnknownStructure(index))
	}

	fn entry_mut(&mut self, index: usize) -> BvhResult<&mut Entry> {
		self.entries.get_mut(index).ok_or(BvhError::UnknownStructure(index))
	}
}

fn finish_pending(entry: &mut Entry, outcome: BvhResult<Bvh>) -> BvhResult<BuildStats> {
	let previous = entry.pending.take().map_or(entry.state, |p| p.previous);
	match outcome {
		Ok(bvh) => {
			let stats = entry.publish(bvh);
			tracing::debug!(label = %entry.label, nodes = stats.node_count, "published async build");
			Ok(stats)
		}
		Err(e) => {
			entry.state = previous;
			entry.metrics.record_failure();
			Err(e)
		}
	}
}

/// Prior hit probabilities for a probability-aware rebuild, taken from the
/// entry's current tree and matched to the new facets by id.
fn hit_priors(entry: &Entry, facets: &[Facet], config: &BuildConfig) -> Option<Vec<f64>> {
	if !config.split_method.uses_hit_probability() {
		return None;
	}
	let tree = entry.tree.as_ref()?;
	let probabilities = tree.snapshot().hit_probabilities()?;
	let by_id: HashMap<u32, f64> = tree
		.facets()
		.iter()
		.zip(probabilities)
		.map(|(f, p)| (f.id, p))
		.collect();
	Some(facets.iter().map(|f| by_id.get(&f.id).copied().unwrap_or(0.0)).collect())
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
