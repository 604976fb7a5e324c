use crate::errors::PipelineResult;
use crate::normalize::source::ValueSource;
use crate::normalize::{normalize, validate, NormalizeStats};
use crate::record::StrategyRecord;
use crate::schema::SchemaRegistry;
use crate::store::Dataset;
use std::collections::BTreeMap;
use std::path::Path;

/// Per-view stats of one pipeline run, keyed by view name.
pub type RunReport = BTreeMap<String, NormalizeStats>;

/// Normalizes every view of `raw` against its registered schema.
/// The benchmark is carried over untouched. Any failure aborts the whole run.
pub fn normalize_dataset(
    raw: Dataset,
    registry: &SchemaRegistry,
    source: &mut dyn ValueSource,
) -> PipelineResult<(Dataset, RunReport)> {
    warn_missing_views(&raw, registry);

    let (views, benchmark) = raw.into_parts();
    let mut out = Dataset::new();
    let mut report = RunReport::new();

    for (view, records) in views {
        let schema = registry.get(&view)?;
        let (records, stats) = normalize(records, schema, source)?;
        tracing::info!(
            view = %view,
            records = stats.records,
            aliased = stats.aliased,
            derived = stats.derived,
            synthesized = stats.synthesized,
            coerced = stats.coerced,
            "view normalized"
        );
        out.put(&view, records)?;
        report.insert(view, stats);
    }

    if let Some(b) = benchmark {
        out.set_benchmark(b);
    }
    Ok((out, report))
}

/// Normalize then publish. `path` is only written once every view has succeeded.
pub fn run_and_publish(
    raw: Dataset,
    registry: &SchemaRegistry,
    source: &mut dyn ValueSource,
    path: &Path,
) -> PipelineResult<RunReport> {
    let (dataset, report) = normalize_dataset(raw, registry, source)?;
    dataset.publish(path)?;
    Ok(report)
}

/// Validates a stored dataset without modifying it. Returns row counts per view.
/// Records are validated on a copy, so coercible values still pass.
pub fn check_dataset(
    dataset: &Dataset,
    registry: &SchemaRegistry,
) -> PipelineResult<BTreeMap<String, usize>> {
    warn_missing_views(dataset, registry);

    let mut counts = BTreeMap::new();
    for (view, records) in dataset.views() {
        view_conforms(records, view, registry)?;
        counts.insert(view.to_string(), records.len());
    }
    Ok(counts)
}

/// First violation in one view, if any.
pub fn view_conforms(
    records: &[StrategyRecord],
    view: &str,
    registry: &SchemaRegistry,
) -> PipelineResult<()> {
    let schema = registry.get(view)?;
    for (index, record) in records.iter().enumerate() {
        validate(&mut record.clone(), index, schema)?;
    }
    Ok(())
}

fn warn_missing_views(dataset: &Dataset, registry: &SchemaRegistry) {
    for schema in registry.views() {
        if dataset.get(&schema.view).is_err() {
            tracing::warn!(view = %schema.view, "registered view missing from document");
        }
    }
}
