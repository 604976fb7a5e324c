/// Placeholder data generator.
///
/// Emits records in the raw, legacy shapes older dashboard revisions
/// consumed (`algorithm`, `features`, `cluster`, `indicators_used`, signed
/// drawdowns). The normalizer turns them into what each table reads.
/// Every number is a placeholder sampled from a fixed range.
use crate::errors::PipelineResult;
use crate::normalize::source::ValueSource;
use crate::record::StrategyRecord;
use crate::schema::views::{MACRO_CLUSTERING_VIEWS, OBSERVATION_YEARS};
use crate::store::Dataset;

/// Base strategies a clustering view may draw from.
const CLUSTER_POOL: usize = 50;

const MACRO_INDICATORS: &[&str] = &[
    "T10Y3M", "VIXCLS", "DGS30", "DGS10", "DFF", "UNRATE", "CPIAUCSL", "T10Y2Y", "BAMLH0A0HYM2",
    "DTWEXBGS", "ICSA", "UMCSENT", "INDPRO", "PAYEMS", "M2SL", "HOUST",
];

const TRANSFORMS: &[&str] = &["mean_reversion", "momentum", "trend_following", "breakout"];

const COMBINATION_NAMES: &[&str] = &[
    "Alpha", "Beta", "Gamma", "Delta", "Epsilon", "Zeta", "Eta", "Theta", "Iota", "Kappa",
    "Lambda", "Mu", "Nu", "Xi", "Omicron", "Pi", "Rho", "Sigma", "Tau", "Upsilon",
];

/// Clustering methods in view order, matching [`MACRO_CLUSTERING_VIEWS`].
const CLUSTER_METHODS: [(&str, usize); 6] = [
    ("kmeans", 12),
    ("hierarchical", 10),
    ("pca", 8),
    ("dbscan", 6),
    ("gaussian", 7),
    ("spectral", 9),
];

const ML_ALGORITHMS: &[&str] = &[
    "Random Forest",
    "XGBoost",
    "Neural Network",
    "SVM",
    "Linear Regression",
    "Decision Tree",
    "Gradient Boosting",
    "AdaBoost",
    "KNN",
    "Naive Bayes",
    "Ridge Regression",
    "Lasso Regression",
];

const SPY_CLUSTERS: &[&str] = &[
    "High Vol Cluster",
    "Low Vol Cluster",
    "Trend Cluster",
    "Mean Reversion Cluster",
    "Momentum Cluster",
    "Contrarian Cluster",
    "Breakout Cluster",
    "Range Bound Cluster",
    "Bull Market Cluster",
    "Bear Market Cluster",
];

/// Orthogonal view, name prefix, strategy count.
const ORTHOGONAL_SETS: [(&str, &str, usize); 3] = [
    ("macroOrthogonalData", "Macro", 8),
    ("spyOrthogonalData", "SPY", 6),
    ("combinedOrthogonalData", "Combined", 10),
];

/// Sizes of the two base sets everything else is built from.
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub individual: usize,
    pub combinations: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            individual: 60,
            combinations: 20,
        }
    }
}

/// Fixed reference strategy. Ground truth: shipped as-is, never normalized.
pub fn spy_benchmark() -> StrategyRecord {
    let mut b = StrategyRecord::new();
    b.set_number("terminal_value", 43265.41);
    b.set_number("annual_return", 0.10234);
    b.set_number("volatility", 0.15435);
    b.set_number("max_drawdown", -0.18766);
    b.set_number("sharpe_ratio", 0.6634);
    b.set_number("sortino_ratio", 0.9845);
    b.set_number("calmar_ratio", 0.5453);
    b.set_number("win_rate", 0.5234);
    b
}

/// Builds every view in raw form, plus the benchmark.
pub fn generate(opts: GenerateOptions, src: &mut dyn ValueSource) -> PipelineResult<Dataset> {
    let individual = individual(opts.individual, src);
    let combinations = combinations(opts.combinations, src);

    let mut raw = Dataset::new();
    for (view, (method, n)) in MACRO_CLUSTERING_VIEWS.iter().zip(CLUSTER_METHODS) {
        raw.put(view, clustering(&individual, method, n, src))?;
    }
    raw.put("spyMLData", spy_ml(ML_ALGORITHMS.len(), src))?;
    raw.put("spyClusteringData", spy_clustering(SPY_CLUSTERS.len(), src))?;
    for (view, prefix, n) in ORTHOGONAL_SETS {
        raw.put(view, orthogonal(prefix, n, src))?;
    }
    raw.put("technicalIndividualData", technical_individual(&individual, 25, src))?;
    raw.put("technicalCombinationData", technical_combination(&combinations, 15, src))?;
    raw.put("individualData", individual)?;
    raw.put("combinationData", combinations)?;
    raw.set_benchmark(spy_benchmark());

    tracing::info!(
        views = raw.view_count(),
        records = raw.record_count(),
        "raw placeholder dataset generated"
    );
    Ok(raw)
}

/// Sampled performance block shared by the base generators.
struct Metrics {
    terminal_value: f64,
    annual_return: f64,
    volatility: f64,
    max_drawdown: f64,
    sharpe_ratio: f64,
    sortino_ratio: f64,
    calmar_ratio: f64,
    win_rate: f64,
    total_trades: i64,
}

impl Metrics {
    fn write(&self, r: &mut StrategyRecord) {
        r.set_number("terminal_value", self.terminal_value);
        r.set_number("annual_return", self.annual_return);
        r.set_number("volatility", self.volatility);
        r.set_number("max_drawdown", self.max_drawdown);
        r.set_number("sharpe_ratio", self.sharpe_ratio);
        r.set_number("sortino_ratio", self.sortino_ratio);
        r.set_number("calmar_ratio", self.calmar_ratio);
        r.set_number("win_rate", self.win_rate);
        r.set_int("total_trades", self.total_trades);
    }
}

fn individual(n: usize, src: &mut dyn ValueSource) -> Vec<StrategyRecord> {
    (0..n)
        .map(|i| {
            let indicator = MACRO_INDICATORS[i % MACRO_INDICATORS.len()];
            let transform = TRANSFORMS[(i / MACRO_INDICATORS.len()) % TRANSFORMS.len()];
            let mut r = StrategyRecord::new();
            r.set_text("indicator", indicator);
            r.set_text("transform_type", transform);
            let total_trades = src.int_between(120, 380);
            Metrics {
                terminal_value: src.uniform(15_000.0, 65_000.0),
                annual_return: src.uniform(0.02, 0.14),
                volatility: src.uniform(0.08, 0.20),
                // signed, as the first generator revision stored it
                max_drawdown: -src.uniform(0.10, 0.35),
                sharpe_ratio: src.uniform(0.1, 1.1),
                sortino_ratio: src.uniform(0.2, 1.4),
                calmar_ratio: src.uniform(0.1, 0.8),
                win_rate: src.uniform(0.30, 0.60),
                total_trades,
            }
            .write(&mut r);
            r.set_number("avg_trades_per_year", total_trades as f64 / OBSERVATION_YEARS);
            r
        })
        .collect()
}

fn combinations(n: usize, src: &mut dyn ValueSource) -> Vec<StrategyRecord> {
    (0..n)
        .map(|i| {
            let label = COMBINATION_NAMES[i % COMBINATION_NAMES.len()];
            let round = i / COMBINATION_NAMES.len();
            let name = if round == 0 {
                format!("Multi-Factor Model {label}")
            } else {
                format!("Multi-Factor Model {label} {}", round + 1)
            };
            let picked = sample(MACRO_INDICATORS, src.int_between(2, 4) as usize, src);
            let mut r = StrategyRecord::new();
            r.set_text("strategy_name", name);
            r.set_text("indicators_used", picked.join(", "));
            Metrics {
                terminal_value: src.uniform(25_000.0, 70_000.0),
                annual_return: src.uniform(0.05, 0.15),
                volatility: src.uniform(0.09, 0.16),
                max_drawdown: -src.uniform(0.12, 0.25),
                sharpe_ratio: src.uniform(0.5, 1.3),
                sortino_ratio: src.uniform(0.6, 1.7),
                calmar_ratio: src.uniform(0.4, 0.9),
                win_rate: src.uniform(0.40, 0.60),
                total_trades: src.int_between(100, 250),
            }
            .write(&mut r);
            r
        })
        .collect()
}

/// Variants of the best base strategies by Sharpe ratio, with perturbed metrics.
fn clustering(
    base: &[StrategyRecord],
    method: &str,
    n: usize,
    src: &mut dyn ValueSource,
) -> Vec<StrategyRecord> {
    let mut top: Vec<&StrategyRecord> = base.iter().take(CLUSTER_POOL).collect();
    top.sort_by(|a, b| sharpe(b).total_cmp(&sharpe(a)));
    top.truncate(n);

    let title = title_case(method);
    top.into_iter()
        .enumerate()
        .map(|(i, s)| {
            let mut r = StrategyRecord::new();
            r.set_text("strategy_name", format!("Cluster {} - {title}", i + 1));
            r.set_text("algorithm", method.to_uppercase());
            r.set_int("features", pick_int(&[2, 3, 4, 5], src));
            scaled(s, &mut r, src, Scale::CLUSTER);
            r
        })
        .collect()
}

fn spy_ml(n: usize, src: &mut dyn ValueSource) -> Vec<StrategyRecord> {
    ML_ALGORITHMS
        .iter()
        .take(n)
        .map(|algo| {
            let mut r = StrategyRecord::new();
            r.set_text("strategy_name", format!("SPY {algo} Model"));
            r.set_text("algorithm", *algo);
            r.set_int("features", pick_int(&[5, 8, 12, 15, 20], src));
            Metrics {
                terminal_value: src.uniform(25_000.0, 55_000.0),
                annual_return: src.uniform(0.06, 0.14),
                volatility: src.uniform(0.08, 0.16),
                max_drawdown: src.uniform(0.10, 0.25),
                sharpe_ratio: src.uniform(0.4, 1.0),
                sortino_ratio: src.uniform(0.5, 1.2),
                calmar_ratio: src.uniform(0.25, 0.8),
                win_rate: src.uniform(0.45, 0.65),
                total_trades: src.int_between(150, 300),
            }
            .write(&mut r);
            r
        })
        .collect()
}

fn spy_clustering(n: usize, src: &mut dyn ValueSource) -> Vec<StrategyRecord> {
    SPY_CLUSTERS
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, cluster)| {
            let mut r = StrategyRecord::new();
            r.set_text("strategy_name", format!("SPY {cluster}"));
            r.set_text("algorithm", "K-Means");
            r.set_int("features", pick_int(&[3, 4, 5, 6], src));
            r.set_int("cluster", i as i64 + 1);
            Metrics {
                terminal_value: src.uniform(20_000.0, 50_000.0),
                annual_return: src.uniform(0.04, 0.12),
                volatility: src.uniform(0.07, 0.18),
                max_drawdown: src.uniform(0.08, 0.30),
                sharpe_ratio: src.uniform(0.3, 0.9),
                sortino_ratio: src.uniform(0.4, 1.0),
                calmar_ratio: src.uniform(0.2, 0.7),
                win_rate: src.uniform(0.40, 0.70),
                total_trades: src.int_between(100, 250),
            }
            .write(&mut r);
            r
        })
        .collect()
}

fn orthogonal(prefix: &str, n: usize, src: &mut dyn ValueSource) -> Vec<StrategyRecord> {
    (1..=n)
        .map(|k| {
            let mut r = StrategyRecord::new();
            r.set_text("strategy_name", format!("{prefix} Factor {k}"));
            r.set_number("loading", src.uniform(-0.8, 0.8));
            Metrics {
                terminal_value: src.uniform(18_000.0, 45_000.0),
                annual_return: src.uniform(0.03, 0.11),
                volatility: src.uniform(0.06, 0.15),
                max_drawdown: src.uniform(0.05, 0.28),
                sharpe_ratio: src.uniform(0.2, 0.85),
                sortino_ratio: src.uniform(0.3, 1.0),
                calmar_ratio: src.uniform(0.15, 0.65),
                win_rate: src.uniform(0.35, 0.65),
                total_trades: src.int_between(80, 220),
            }
            .write(&mut r);
            r
        })
        .collect()
}

fn technical_individual(
    base: &[StrategyRecord],
    n: usize,
    src: &mut dyn ValueSource,
) -> Vec<StrategyRecord> {
    base.iter()
        .take(n)
        .map(|s| {
            let mut r = StrategyRecord::new();
            let indicator = s.text("indicator").unwrap_or("Indicator");
            r.set_text("indicator", format!("SPY {indicator}"));
            if let Some(t) = s.text("transform_type") {
                r.set_text("transform_type", t);
            }
            scaled(s, &mut r, src, Scale::TECHNICAL);
            r
        })
        .collect()
}

fn technical_combination(
    base: &[StrategyRecord],
    n: usize,
    src: &mut dyn ValueSource,
) -> Vec<StrategyRecord> {
    base.iter()
        .take(n)
        .map(|s| {
            let mut r = StrategyRecord::new();
            let name = s.text("strategy_name").unwrap_or("Combination");
            r.set_text("strategy_name", format!("SPY {name}"));
            let used = s.text("indicators_used").unwrap_or_default();
            let short: String = used.chars().take(50).collect();
            r.set_text("indicators_used", format!("SPY-based {short}..."));
            scaled(s, &mut r, src, Scale::TECHNICAL);
            r
        })
        .collect()
}

/// Multiplier ranges applied to a base strategy's metrics.
#[derive(Debug, Clone, Copy)]
struct Scale {
    terminal_value: (f64, f64),
    annual_return: (f64, f64),
    volatility: (f64, f64),
    max_drawdown: (f64, f64),
    sharpe_ratio: (f64, f64),
    sortino_ratio: (f64, f64),
    calmar_ratio: (f64, f64),
    win_rate: (f64, f64),
    total_trades: (f64, f64),
}

impl Scale {
    const CLUSTER: Scale = Scale {
        terminal_value: (0.8, 1.3),
        annual_return: (0.85, 1.2),
        volatility: (0.9, 1.1),
        max_drawdown: (0.7, 1.2),
        sharpe_ratio: (0.8, 1.15),
        sortino_ratio: (0.85, 1.1),
        calmar_ratio: (0.8, 1.1),
        win_rate: (0.9, 1.1),
        total_trades: (0.8, 1.2),
    };

    const TECHNICAL: Scale = Scale {
        terminal_value: (0.7, 1.1),
        annual_return: (0.8, 1.1),
        volatility: (0.9, 1.2),
        max_drawdown: (0.8, 1.3),
        sharpe_ratio: (0.7, 1.0),
        sortino_ratio: (0.8, 1.0),
        calmar_ratio: (0.7, 1.0),
        win_rate: (0.85, 1.15),
        total_trades: (0.7, 1.3),
    };
}

/// Writes `base` metrics times a factor drawn per field. Drawdowns come out as magnitudes;
/// missing Sortino/Calmar fall back to multiples of Sharpe.
fn scaled(base: &StrategyRecord, r: &mut StrategyRecord, src: &mut dyn ValueSource, s: Scale) {
    let mut factor = |(lo, hi): (f64, f64)| src.uniform(lo, hi);
    let sharpe_ratio = sharpe(base);
    let sortino = base.number("sortino_ratio").unwrap_or(sharpe_ratio * 1.2);
    let calmar = base.number("calmar_ratio").unwrap_or(sharpe_ratio * 0.8);
    let total = base.number("total_trades").unwrap_or(150.0);

    Metrics {
        terminal_value: base.number("terminal_value").unwrap_or(30_000.0) * factor(s.terminal_value),
        annual_return: base.number("annual_return").unwrap_or(0.08) * factor(s.annual_return),
        volatility: base.number("volatility").unwrap_or(0.12) * factor(s.volatility),
        max_drawdown: base.number("max_drawdown").unwrap_or(0.2).abs() * factor(s.max_drawdown),
        sharpe_ratio: sharpe_ratio * factor(s.sharpe_ratio),
        sortino_ratio: sortino * factor(s.sortino_ratio),
        calmar_ratio: calmar * factor(s.calmar_ratio),
        win_rate: (base.number("win_rate").unwrap_or(0.5) * factor(s.win_rate)).min(1.0),
        total_trades: ((total * factor(s.total_trades)) as i64).max(1),
    }
    .write(r);
}

fn sharpe(r: &StrategyRecord) -> f64 {
    r.number("sharpe_ratio").unwrap_or(0.0)
}

fn pick_int(choices: &[i64], src: &mut dyn ValueSource) -> i64 {
    choices[src.index(choices.len())]
}

/// Up to `k` distinct items, in draw order.
fn sample<'a>(items: &[&'a str], k: usize, src: &mut dyn ValueSource) -> Vec<&'a str> {
    let mut pool: Vec<&'a str> = items.to_vec();
    let mut out = Vec::with_capacity(k);
    while out.len() < k && !pool.is_empty() {
        let i = src.index(pool.len());
        out.push(pool.swap_remove(i));
    }
    out
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
