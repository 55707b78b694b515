use crossbeam_channel::unbounded;
use geo::Polygon;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    config::ScreeningConfig,
    crs_geo::CrsGeometry,
    errors::Result,
    indices::SpectralIndices,
    item::{CatalogItem, ItemProcessor},
};

/// Step of the per item pipeline a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelinePhase {
    Screening,
    Load,
    Compute,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Screening => "screening",
            Self::Load => "load",
            Self::Compute => "compute",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenedItem {
    /// Position of the item in the input slice.
    pub index: usize,
    pub id: String,
    pub acquired: String,
    pub reported_cloud_cover: Option<f64>,
    pub usable_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub index: usize,
    pub id: String,
    pub phase: PipelinePhase,
    pub error: String,
}

impl ItemFailure {
    fn new<I: CatalogItem>(index: usize, item: &I, phase: PipelinePhase, error: impl fmt::Display) -> Self {
        let failure = Self {
            index,
            id: item.id().to_string(),
            phase,
            error: error.to_string(),
        };
        warn!(
            "item {} ({}) excluded, {} failed: {}",
            failure.index, failure.id, failure.phase, failure.error
        );
        failure
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Accepted(ScreenedItem),
    Rejected(ScreenedItem),
    Failed(ItemFailure),
}

/// Screening results, every list in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub accepted: Vec<ScreenedItem>,
    pub rejected: Vec<ScreenedItem>,
    pub failed: Vec<ItemFailure>,
}

impl ScreeningReport {
    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len() + self.failed.len()
    }

    /// Input indexes of the accepted items.
    pub fn accepted_indexes(&self) -> Vec<usize> {
        self.accepted.iter().map(|item| item.index).collect()
    }
}

impl FromIterator<ItemOutcome> for ScreeningReport {
    fn from_iter<T: IntoIterator<Item = ItemOutcome>>(iter: T) -> Self {
        let mut report = Self::default();
        for outcome in iter {
            match outcome {
                ItemOutcome::Accepted(item) => report.accepted.push(item),
                ItemOutcome::Rejected(item) => report.rejected.push(item),
                ItemOutcome::Failed(failure) => report.failed.push(failure),
            }
        }
        report.accepted.sort_by_key(|item| item.index);
        report.rejected.sort_by_key(|item| item.index);
        report.failed.sort_by_key(|failure| failure.index);
        report
    }
}

/// Index bundles of a batch, `computed` in input order.
#[derive(Debug)]
pub struct IndicesBatch {
    pub computed: Vec<(usize, SpectralIndices<u16>)>,
    pub failed: Vec<ItemFailure>,
}

/// Runs `task` once per item on a dedicated pool and gathers the results
/// through a channel, sorted back into input order.
fn fan_out<I, R, F>(items: &[I], num_workers: Option<usize>, task: F) -> Result<Vec<R>>
where
    I: CatalogItem,
    R: Send,
    F: Fn(usize, &I) -> R + Sync,
{
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(num_workers) = num_workers {
        builder = builder.num_threads(num_workers);
    }
    let pool = builder.build()?;
    let (sender, receiver) = unbounded();
    let task = &task;
    pool.scope(|scope| {
        for (index, item) in items.iter().enumerate() {
            let sender = sender.clone();
            scope.spawn(move |_| {
                let _ = sender.send((index, task(index, item)));
            });
        }
    });
    drop(sender);
    let mut results: Vec<(usize, R)> = receiver.iter().collect();
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}

fn screen_item<I: CatalogItem>(
    index: usize,
    item: &I,
    aoi: &CrsGeometry<Polygon>,
    min_usable_pct: f64,
) -> ItemOutcome {
    let usable_pct = match ItemProcessor::new(item, aoi).usable_pixel_percentage() {
        Ok(usable_pct) => usable_pct,
        Err(error) => {
            return ItemOutcome::Failed(ItemFailure::new(index, item, PipelinePhase::Screening, error))
        }
    };
    let screened = ScreenedItem {
        index,
        id: item.id().to_string(),
        acquired: item.acquired().to_string(),
        reported_cloud_cover: item.cloud_cover(),
        usable_pct,
    };
    if usable_pct >= min_usable_pct {
        ItemOutcome::Accepted(screened)
    } else {
        ItemOutcome::Rejected(screened)
    }
}

/// Splits `items` by their clear pixel percentage over `aoi`.
///
/// Items that cannot be screened are reported as failed, they never abort the batch.
pub fn screen_items<I: CatalogItem>(
    items: &[I],
    aoi: &CrsGeometry<Polygon>,
    config: &ScreeningConfig,
) -> Result<ScreeningReport> {
    let report: ScreeningReport = fan_out(items, config.num_workers, |index, item| {
        screen_item(index, item, aoi, config.min_usable_pct)
    })?
    .into_iter()
    .collect();
    info!(
        "{} out of {} item(s) kept at {}% usable pixels, {} failed",
        report.accepted.len(),
        items.len(),
        config.min_usable_pct,
        report.failed.len()
    );
    Ok(report)
}

/// Loads and computes the index bundle of every item in parallel.
pub fn compute_indices_batch<I: CatalogItem>(
    items: &[I],
    aoi: &CrsGeometry<Polygon>,
    config: &ScreeningConfig,
) -> Result<IndicesBatch> {
    let results = fan_out(items, config.num_workers, |index, item| {
        let processor = ItemProcessor::new(item, aoi);
        let bands = processor
            .load_bands()
            .map_err(|error| ItemFailure::new(index, item, PipelinePhase::Load, error))?;
        bands
            .compute_indices()
            .map_err(|error| ItemFailure::new(index, item, PipelinePhase::Compute, error))
    })?;

    let mut batch = IndicesBatch {
        computed: Vec::new(),
        failed: Vec::new(),
    };
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(indices) => batch.computed.push((index, indices)),
            Err(failure) => batch.failed.push(failure),
        }
    }
    info!(
        "computed indices of {} out of {} item(s)",
        batch.computed.len(),
        items.len()
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        item::tests::{memory_item, scene_aoi, MemoryItem},
        sensors::Sentinel2Band,
    };
    use rstest::{fixture, rstest};

    #[fixture]
    fn catalog() -> Vec<MemoryItem> {
        let mut broken = memory_item("broken", 0);
        broken.assets.remove(&Sentinel2Band::SceneClassification);
        vec![
            memory_item("clear", 0),
            memory_item("cloudy", 2),
            broken,
            memory_item("mostly clear", 0),
            memory_item("overcast", 4),
        ]
    }

    #[rstest]
    #[case(None)]
    #[case(Some(1))]
    #[case(Some(3))]
    fn screening_is_deterministic(catalog: Vec<MemoryItem>, #[case] num_workers: Option<usize>) {
        let config = ScreeningConfig {
            min_usable_pct: 85.,
            num_workers,
        };
        let report = screen_items(&catalog, &scene_aoi(), &config).unwrap();
        assert_eq!(report.total(), catalog.len());
        assert_eq!(report.accepted_indexes(), vec![0, 3]);
        assert_eq!(
            report.rejected.iter().map(|item| item.usable_pct).collect::<Vec<_>>(),
            vec![50., 0.]
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 2);
        assert_eq!(report.failed[0].phase, PipelinePhase::Screening);
        assert_eq!(report.accepted[0].reported_cloud_cover, Some(12.5));
        assert_eq!(report.accepted[0].acquired, "2024-11-26");
    }

    #[test_log::test]
    fn failures_do_not_abort_index_batch() {
        let mut catalog = catalog();
        catalog[3].assets.remove(&Sentinel2Band::Blue);
        let batch = compute_indices_batch(&catalog, &scene_aoi(), &ScreeningConfig::default()).unwrap();
        assert_eq!(
            batch.computed.iter().map(|(index, _)| *index).collect::<Vec<_>>(),
            vec![0, 1, 4]
        );
        assert_eq!(
            batch.failed.iter().map(|failure| failure.index).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert!(batch.failed.iter().all(|failure| failure.phase == PipelinePhase::Load));
        assert!(batch.computed[2].1.cloud_mask.pixels().iter().all(|&v| v == 1));
    }

    #[rstest]
    fn empty_catalog() {
        let report = screen_items::<MemoryItem>(&[], &scene_aoi(), &ScreeningConfig::default()).unwrap();
        assert_eq!(report, ScreeningReport::default());
    }
}
