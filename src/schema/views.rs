/// Built-in view declarations: one schema per table the dashboard renders.
///
/// Every view shares the identity `category` field and the ten performance
/// fields. View-specific fields carry the legacy names earlier generator
/// revisions emitted as aliases, listed highest priority first.
use super::{DefaultRule, FieldKind, FieldSpec, Range, Schema};
use crate::record::StrategyRecord;
use serde_json::Value;

/// Length of the backing historical window, in years.
pub const OBSERVATION_YEARS: f64 = 15.0;

pub const MACRO_CLUSTERING_VIEWS: [&str; 6] = [
    "macroClusteringKmeansData",
    "macroClusteringHierarchicalData",
    "macroClusteringPcaData",
    "macroClusteringDbscanData",
    "macroClusteringGaussianData",
    "macroClusteringSpectralData",
];

/// Orthogonal views with the source label their table shows.
pub const ORTHOGONAL_VIEWS: [(&str, &[&str]); 3] = [
    ("macroOrthogonalData", &["Macro Indicators"]),
    ("spyOrthogonalData", &["SPY Technical"]),
    ("combinedOrthogonalData", &["Multi-Strategy"]),
];

const HOLDING_PERIODS: &[&str] = &["1D", "5D", "10D", "20D", "1M", "2M", "3M", "6M"];

const TRANSFORM_TYPES: &[&str] = &["momentum", "mean_reversion", "trend_following", "breakout"];

/// Strategy family a view belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Individual,
    Combination,
    Clustering,
    Ml,
    Orthogonal,
}

impl Category {
    fn choices(&self) -> &'static [&'static str] {
        match self {
            Self::Individual => &["individual"],
            Self::Combination => &["combination"],
            Self::Clustering => &["clustering"],
            Self::Ml => &["ml"],
            Self::Orthogonal => &["orthogonal"],
        }
    }
}

pub fn builtin_schemas() -> Vec<Schema> {
    let mut schemas = vec![
        individual("individualData"),
        individual("technicalIndividualData"),
        combination(),
        technical_combination(),
        spy_clustering(),
        spy_ml(),
    ];
    schemas.extend(MACRO_CLUSTERING_VIEWS.iter().map(|v| macro_clustering(v)));
    schemas.extend(
        ORTHOGONAL_VIEWS
            .iter()
            .map(|&(view, sources)| orthogonal(view, sources)),
    );
    schemas
}

fn build(view: &str, label_field: &'static str, category: Category, specific: Vec<FieldSpec>) -> Schema {
    let mut fields = specific;
    fields.push(
        FieldSpec::required("category", FieldKind::Text).default(DefaultRule::Choice(category.choices())),
    );
    fields.extend(performance_fields());
    Schema {
        view: view.to_string(),
        label_field,
        fields,
    }
}

/// Fields every rendering consumer reads. Defaults keep placeholder data plausible.
/// Only `max_drawdown` is a magnitude: a signed drawdown is a sign convention, not bad data.
fn performance_fields() -> Vec<FieldSpec> {
    use FieldKind::*;
    vec![
        FieldSpec::required("terminal_value", Number)
            .range(Range::positive())
            .default(DefaultRule::Uniform { min: 20_000.0, max: 50_000.0 }),
        FieldSpec::required("annual_return", Number)
            .default(DefaultRule::Uniform { min: 0.03, max: 0.15 }),
        FieldSpec::required("volatility", Number)
            .range(Range::non_negative())
            .default(DefaultRule::Uniform { min: 0.06, max: 0.20 }),
        FieldSpec::required("max_drawdown", Magnitude)
            .default(DefaultRule::Uniform { min: 0.05, max: 0.30 }),
        FieldSpec::required("sharpe_ratio", Number)
            .default(DefaultRule::Uniform { min: 0.3, max: 1.2 }),
        FieldSpec::required("sortino_ratio", Number).default(DefaultRule::Scaled {
            from: "sharpe_ratio",
            min: 1.0,
            max: 1.3,
            clamp: Range::closed(0.4, 1.4),
        }),
        FieldSpec::required("calmar_ratio", Number).default(DefaultRule::Scaled {
            from: "sharpe_ratio",
            min: 0.6,
            max: 0.9,
            clamp: Range::closed(0.15, 0.9),
        }),
        FieldSpec::required("win_rate", Number)
            .range(Range::closed(0.0, 1.0))
            .default(DefaultRule::Uniform { min: 0.30, max: 0.70 }),
        FieldSpec::required("total_trades", Count)
            .default(DefaultRule::IntRange { min: 50, max: 300 }),
        FieldSpec::required("avg_trades_per_year", Number)
            .range(Range::positive())
            .derive(&["total_trades", "years_observed"], avg_trades_per_year)
            .default(DefaultRule::Rederive),
    ]
}

fn individual(view: &str) -> Schema {
    build(
        view,
        "indicator",
        Category::Individual,
        vec![
            FieldSpec::required("indicator", FieldKind::Text).aliases(&["name", "strategy_name"]),
            FieldSpec::required("transform_type", FieldKind::Text)
                .default(DefaultRule::Choice(TRANSFORM_TYPES)),
        ],
    )
}

fn combination() -> Schema {
    build(
        "combinationData",
        "strategy_name",
        Category::Combination,
        vec![
            FieldSpec::required("strategy_name", FieldKind::Text).aliases(&["name"]),
            FieldSpec::required("indicators_used", FieldKind::Text)
                .aliases(&["indicators", "sources"]),
        ],
    )
}

fn technical_combination() -> Schema {
    build(
        "technicalCombinationData",
        "combination_name",
        Category::Combination,
        vec![
            FieldSpec::required("combination_name", FieldKind::Text)
                .aliases(&["strategy_name", "name"]),
            FieldSpec::required("components", FieldKind::Text).aliases(&["indicators_used"]),
            FieldSpec::required("indicator", FieldKind::Text)
                .derive(&["combination_name"], indicator_from_combination),
            FieldSpec::required("transform_type", FieldKind::Text)
                .default(DefaultRule::Choice(&["combination"])),
        ],
    )
}

fn macro_clustering(view: &str) -> Schema {
    build(
        view,
        "strategy_name",
        Category::Clustering,
        vec![
            FieldSpec::required("strategy_name", FieldKind::Text).aliases(&["name"]),
            FieldSpec::required("method_params", FieldKind::Text)
                .aliases(&["algorithm", "configuration"])
                .default(DefaultRule::Choice(&["default"])),
            FieldSpec::required("dimensions", FieldKind::Count)
                .aliases(&["features"])
                .default(DefaultRule::IntChoice(&[2, 3, 4, 5])),
        ],
    )
}

fn spy_clustering() -> Schema {
    build(
        "spyClusteringData",
        "strategy_name",
        Category::Clustering,
        vec![
            FieldSpec::required("strategy_name", FieldKind::Text).aliases(&["name"]),
            FieldSpec::required("method", FieldKind::Text)
                .aliases(&["algorithm"])
                .default(DefaultRule::Choice(&["K-Means"])),
            FieldSpec::required("dimensions", FieldKind::Count)
                .aliases(&["features"])
                .default(DefaultRule::IntChoice(&[3, 4, 5, 6])),
            FieldSpec::required("clusters_components", FieldKind::Count)
                .aliases(&["cluster"])
                .derive(&["dimensions"], copy_dimensions)
                .default(DefaultRule::Rederive),
        ],
    )
}

fn spy_ml() -> Schema {
    build(
        "spyMLData",
        "model_name",
        Category::Ml,
        vec![
            FieldSpec::optional("strategy_name", FieldKind::Text),
            FieldSpec::optional("algorithm", FieldKind::Text),
            FieldSpec::optional("features", FieldKind::Count),
            FieldSpec::required("model_name", FieldKind::Text)
                .aliases(&["model"])
                .derive(&["algorithm", "strategy_name"], model_name),
            FieldSpec::required("holding_period", FieldKind::Text)
                .default(DefaultRule::Cycle(HOLDING_PERIODS)),
            FieldSpec::required("dimensions", FieldKind::Count)
                .derive(&["features"], dimensions_from_features)
                .default(DefaultRule::IntChoice(&[5, 8, 12, 15, 20])),
        ],
    )
}

fn orthogonal(view: &str, sources: &'static [&'static str]) -> Schema {
    build(
        view,
        "strategy_name",
        Category::Orthogonal,
        vec![
            FieldSpec::required("strategy_name", FieldKind::Text).aliases(&["name"]),
            FieldSpec::required("factor", FieldKind::Text).derive(&["strategy_name"], factor_from_name),
            FieldSpec::required("loading", FieldKind::Number)
                .default(DefaultRule::Uniform { min: -0.8, max: 0.8 }),
            FieldSpec::required("source_methods", FieldKind::Text)
                .aliases(&["sources"])
                .default(DefaultRule::Choice(sources)),
            FieldSpec::required("dimensions", FieldKind::Count)
                .aliases(&["features"])
                .default(DefaultRule::IntRange { min: 3, max: 8 }),
            FieldSpec::required("correlation", FieldKind::Number)
                .aliases(&["cross_correlation"])
                .default(DefaultRule::Uniform { min: -0.3, max: 0.8 }),
            FieldSpec::required("indicator", FieldKind::Text)
                .derive(&["strategy_name"], indicator_from_orthogonal),
            FieldSpec::required("transform_type", FieldKind::Text)
                .default(DefaultRule::Choice(&["orthogonal"])),
        ],
    )
}

// ── Derivations (pure, single pass) ──

/// `total_trades / years_observed`; a record may carry its own window length.
pub fn avg_trades_per_year(r: &StrategyRecord) -> Option<Value> {
    let total = r.number("total_trades")?;
    let years = r
        .number("years_observed")
        .filter(|y| *y > 0.0)
        .unwrap_or(OBSERVATION_YEARS);
    serde_json::Number::from_f64(total / years).map(Value::Number)
}

fn indicator_from_combination(r: &StrategyRecord) -> Option<Value> {
    let name = r.text("combination_name")?;
    Some(Value::String(name.strip_prefix("SPY ").unwrap_or(name).to_string()))
}

fn copy_dimensions(r: &StrategyRecord) -> Option<Value> {
    r.get("dimensions").cloned()
}

fn model_name(r: &StrategyRecord) -> Option<Value> {
    if let Some(algo) = r.text("algorithm") {
        return Some(Value::String(format!("{algo} Model")));
    }
    r.text("strategy_name").map(|s| Value::String(s.to_string()))
}

fn dimensions_from_features(r: &StrategyRecord) -> Option<Value> {
    r.get("features").cloned()
}

fn factor_from_name(r: &StrategyRecord) -> Option<Value> {
    r.text("strategy_name").map(|s| Value::String(s.to_string()))
}

/// "Macro Factor 3" -> "3": view prefixes and the factor word are dropped.
fn indicator_from_orthogonal(r: &StrategyRecord) -> Option<Value> {
    let name = r.text("strategy_name")?;
    let mut short = name.replace(" Factor", "");
    for prefix in ["Macro ", "SPY ", "Combined "] {
        short = short.replace(prefix, "");
    }
    Some(Value::String(short.trim().to_string()))
}
