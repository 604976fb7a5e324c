pub mod source;

use crate::errors::{PipelineError, PipelineResult};
use crate::record::StrategyRecord;
use crate::schema::{DefaultRule, FieldKind, Schema};
use serde_json::Value;
use source::ValueSource;

/// Per-view counters, logged after each view is normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub records: usize,
    pub aliased: usize,
    pub derived: usize,
    pub synthesized: usize,
    pub coerced: usize,
}

impl NormalizeStats {
    fn absorb(&mut self, other: NormalizeStats) {
        self.records += other.records;
        self.aliased += other.aliased;
        self.derived += other.derived;
        self.synthesized += other.synthesized;
        self.coerced += other.coerced;
    }
}

/// Normalize every record of one view. The first violation aborts the whole view:
/// records are never dropped silently.
pub fn normalize(
    records: Vec<StrategyRecord>,
    schema: &Schema,
    source: &mut dyn ValueSource,
) -> PipelineResult<(Vec<StrategyRecord>, NormalizeStats)> {
    let mut stats = NormalizeStats::default();
    let mut out = Vec::with_capacity(records.len());

    for (index, mut record) in records.into_iter().enumerate() {
        let rec_stats = normalize_record(&mut record, index, schema, source)?;
        stats.absorb(rec_stats);
        out.push(record);
    }

    Ok((out, stats))
}

/// Rename, derive, synthesize, then validate, in that order, in place.
pub fn normalize_record(
    record: &mut StrategyRecord,
    index: usize,
    schema: &Schema,
    source: &mut dyn ValueSource,
) -> PipelineResult<NormalizeStats> {
    let mut stats = NormalizeStats {
        records: 1,
        ..Default::default()
    };
    stats.aliased = resolve_aliases(record, schema);
    stats.derived = derive_missing(record, schema);
    stats.synthesized = synthesize_defaults(record, index, schema, source);
    stats.coerced = validate(record, index, schema)?;
    Ok(stats)
}

/// Step 1: move the first present alias onto each absent canonical field.
/// Returns how many fields were renamed.
pub fn resolve_aliases(record: &mut StrategyRecord, schema: &Schema) -> usize {
    let mut renamed = 0;
    for field in &schema.fields {
        if !record.is_absent(field.name) {
            continue;
        }
        for alias in field.aliases {
            if let Some(value) = record.take(alias) {
                record.insert(field.name, value);
                renamed += 1;
                break;
            }
        }
    }
    renamed
}

/// Step 2: single pass over derivable fields. Inputs are never derived themselves.
pub fn derive_missing(record: &mut StrategyRecord, schema: &Schema) -> usize {
    let mut derived = 0;
    for field in &schema.fields {
        let Some(derivation) = &field.derive else {
            continue;
        };
        if !record.is_absent(field.name) {
            continue;
        }
        if let Some(value) = derivation.apply(record) {
            record.insert(field.name, value);
            derived += 1;
        }
    }
    derived
}

/// Step 3: draw declared defaults for whatever is still missing.
pub fn synthesize_defaults(
    record: &mut StrategyRecord,
    index: usize,
    schema: &Schema,
    source: &mut dyn ValueSource,
) -> usize {
    let mut synthesized = 0;
    for field in &schema.fields {
        if !record.is_absent(field.name) {
            continue;
        }
        let value = match (field.default, &field.derive) {
            (Some(DefaultRule::Rederive), Some(derivation)) => derivation.apply(record),
            (Some(rule), _) => rule.draw(record, source, index),
            (None, _) => None,
        };
        if let Some(value) = value {
            record.insert(field.name, value);
            synthesized += 1;
        }
    }
    synthesized
}

/// Step 4: every required field present, of its declared kind and inside its declared range.
/// Canonicalizes magnitudes and integral counts; returns how many values were coerced.
pub fn validate(record: &mut StrategyRecord, index: usize, schema: &Schema) -> PipelineResult<usize> {
    let mut coerced = 0;
    for field in &schema.fields {
        let Some(value) = record.get(field.name) else {
            if field.required {
                return Err(violation(schema, record, index, field.name, "is missing".into()));
            }
            continue;
        };

        let value = match check_kind(value, field.kind) {
            KindCheck::Ok => value.clone(),
            KindCheck::Coerce(fixed) => {
                record.insert(field.name, fixed.clone());
                coerced += 1;
                fixed
            }
            KindCheck::Mismatch => {
                let reason = format!("expected {}, found {}", field.kind, describe(value));
                return Err(violation(schema, record, index, field.name, reason));
            }
        };

        if let (Some(range), Some(x)) = (field.range, value.as_f64()) {
            if !range.contains(x) {
                let reason = format!("must lie in {range}, found {}", describe(&value));
                return Err(violation(schema, record, index, field.name, reason));
            }
        }
    }
    Ok(coerced)
}

fn violation(
    schema: &Schema,
    record: &StrategyRecord,
    index: usize,
    field: &str,
    reason: String,
) -> PipelineError {
    PipelineError::SchemaViolation {
        view: schema.view.clone(),
        record: schema.record_label(record, index),
        field: field.to_string(),
        reason,
    }
}

enum KindCheck {
    Ok,
    Coerce(Value),
    Mismatch,
}

fn check_kind(value: &Value, kind: FieldKind) -> KindCheck {
    match kind {
        FieldKind::Text => match value {
            Value::String(_) => KindCheck::Ok,
            _ => KindCheck::Mismatch,
        },
        FieldKind::Number => match value.as_f64() {
            Some(x) if x.is_finite() => KindCheck::Ok,
            _ => KindCheck::Mismatch,
        },
        FieldKind::Magnitude => match value.as_f64() {
            Some(x) if x.is_finite() && x >= 0.0 => KindCheck::Ok,
            Some(x) if x.is_finite() => match serde_json::Number::from_f64(x.abs()) {
                Some(n) => KindCheck::Coerce(Value::Number(n)),
                None => KindCheck::Mismatch,
            },
            _ => KindCheck::Mismatch,
        },
        FieldKind::Count => {
            if let Some(n) = value.as_i64() {
                return if n > 0 { KindCheck::Ok } else { KindCheck::Mismatch };
            }
            if value.as_u64().is_some() {
                return KindCheck::Ok;
            }
            match value.as_f64() {
                Some(x) if x.is_finite() && x.fract() == 0.0 && x >= 1.0 && x <= i64::MAX as f64 => {
                    KindCheck::Coerce(Value::from(x as i64))
                }
                _ => KindCheck::Mismatch,
            }
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("text {s:?}"),
        Value::Array(_) => "array".into(),
        Value::Object(_) => "object".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::source::{FixedSource, SeededSource};
    use super::*;
    use crate::schema::{FieldSpec, SchemaRegistry};
    use serde_json::json;

    fn rec(value: Value) -> StrategyRecord {
        serde_json::from_value(value).unwrap()
    }

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin().unwrap()
    }

    #[test]
    fn test_clustering_aliases_renamed() {
        let reg = registry();
        let schema = reg.get("macroClusteringKmeansData").unwrap();
        let mut r = rec(json!({"strategy_name": "Cluster 1", "algorithm": "KMEANS", "features": 4}));
        normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)).unwrap();
        assert_eq!(r.text("method_params"), Some("KMEANS"));
        assert_eq!(r.get("dimensions"), Some(&json!(4)));
        assert!(!r.contains_key("algorithm"));
        assert!(!r.contains_key("features"));
    }

    #[test]
    fn test_first_declared_alias_wins() {
        let reg = registry();
        let schema = reg.get("macroClusteringPcaData").unwrap();
        let mut r = rec(json!({
            "strategy_name": "Cluster 2",
            "configuration": "Ward Linkage",
            "algorithm": "PCA",
        }));
        resolve_aliases(&mut r, schema);
        assert_eq!(r.text("method_params"), Some("PCA"));
        // the losing alias passes through untouched
        assert_eq!(r.text("configuration"), Some("Ward Linkage"));
    }

    #[test]
    fn test_null_canonical_takes_alias() {
        let reg = registry();
        let schema = reg.get("spyClusteringData").unwrap();
        let mut r = rec(json!({"strategy_name": "SPY Trend Cluster", "method": null, "algorithm": "K-Means"}));
        assert_eq!(resolve_aliases(&mut r, schema), 1);
        assert_eq!(r.text("method"), Some("K-Means"));
    }

    #[test]
    fn test_avg_trades_derived_from_total() {
        let reg = registry();
        let schema = reg.get("combinationData").unwrap();
        let mut r = rec(json!({
            "strategy_name": "Multi-Factor Model Alpha",
            "indicators_used": "T10Y3M, VIXCLS, DGS30",
            "total_trades": 300,
        }));
        normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)).unwrap();
        assert_eq!(r.number("avg_trades_per_year"), Some(20.0));
    }

    #[test]
    fn test_avg_trades_follows_synthesized_total() {
        let reg = registry();
        let schema = reg.get("combinationData").unwrap();
        let mut r = rec(json!({"strategy_name": "Alpha", "indicators_used": "DGS30"}));
        normalize_record(&mut r, 0, schema, &mut FixedSource(1.0)).unwrap();
        assert_eq!(r.get("total_trades"), Some(&json!(300)));
        assert_eq!(r.number("avg_trades_per_year"), Some(20.0));
    }

    #[test]
    fn test_missing_sharpe_within_bounds() {
        let reg = registry();
        let schema = reg.get("individualData").unwrap();
        let mut src = SeededSource::from_seed(11);
        for i in 0..200 {
            let mut r = rec(json!({"indicator": "VIXCLS", "transform_type": "mean_reversion"}));
            normalize_record(&mut r, i, schema, &mut src).unwrap();
            let sharpe = r.number("sharpe_ratio").unwrap();
            assert!((0.3..=1.2).contains(&sharpe), "sharpe out of bounds: {sharpe}");
            let win = r.number("win_rate").unwrap();
            assert!((0.30..=0.70).contains(&win), "win_rate out of bounds: {win}");
            let ret = r.number("annual_return").unwrap();
            assert!((0.03..=0.15).contains(&ret), "annual_return out of bounds: {ret}");
        }
    }

    #[test]
    fn test_fixed_source_hits_range_edges() {
        let reg = registry();
        let schema = reg.get("individualData").unwrap();
        let mut lo = rec(json!({"indicator": "DFF"}));
        let mut hi = rec(json!({"indicator": "DFF"}));
        normalize_record(&mut lo, 0, schema, &mut FixedSource(0.0)).unwrap();
        normalize_record(&mut hi, 0, schema, &mut FixedSource(1.0)).unwrap();
        assert_eq!(lo.number("sharpe_ratio"), Some(0.3));
        assert_eq!(hi.number("sharpe_ratio"), Some(1.2));
    }

    #[test]
    fn test_missing_required_without_rule_fails() {
        let schema = Schema {
            view: "testData".into(),
            label_field: "strategy_name",
            fields: vec![
                FieldSpec::required("strategy_name", FieldKind::Text),
                FieldSpec::required("loading", FieldKind::Number),
            ],
        };
        let mut r = rec(json!({"strategy_name": "Factor 1"}));
        match normalize_record(&mut r, 0, &schema, &mut FixedSource(0.5)) {
            Err(PipelineError::SchemaViolation { view, record, field, .. }) => {
                assert_eq!(view, "testData");
                assert_eq!(record, "Factor 1");
                assert_eq!(field, "loading");
            }
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_identity_names_record_by_index() {
        let reg = registry();
        let schema = reg.get("combinationData").unwrap();
        let records = vec![
            rec(json!({"strategy_name": "A", "indicators_used": "DFF"})),
            rec(json!({"indicators_used": "DGS10"})),
        ];
        let err = normalize(records, schema, &mut FixedSource(0.5)).unwrap_err();
        match err {
            PipelineError::SchemaViolation { record, field, .. } => {
                assert_eq!(record, "#1");
                assert_eq!(field, "strategy_name");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_wrong_kind_fails() {
        let reg = registry();
        let schema = reg.get("individualData").unwrap();
        let mut r = rec(json!({"indicator": "DFF", "win_rate": "high"}));
        let err = normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)).unwrap_err();
        assert!(err.to_string().contains("win_rate"), "{err}");
        assert!(err.to_string().contains("expected number"), "{err}");
    }

    #[test]
    fn test_negative_drawdown_becomes_magnitude() {
        let reg = registry();
        let schema = reg.get("individualData").unwrap();
        let mut r = rec(json!({"indicator": "T10Y3M", "max_drawdown": -0.18577}));
        let stats = normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)).unwrap();
        assert_eq!(r.number("max_drawdown"), Some(0.18577));
        assert_eq!(stats.coerced, 1);
    }

    #[test]
    fn test_integral_float_count_coerced() {
        let reg = registry();
        let schema = reg.get("individualData").unwrap();
        let mut r = rec(json!({"indicator": "T10Y3M", "total_trades": 232.0}));
        normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)).unwrap();
        assert_eq!(r.get("total_trades"), Some(&json!(232)));
        assert!(r.get("total_trades").unwrap().is_i64());
    }

    #[test]
    fn test_zero_trades_rejected() {
        let reg = registry();
        let schema = reg.get("individualData").unwrap();
        let mut r = rec(json!({"indicator": "T10Y3M", "total_trades": 0}));
        assert!(normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)).is_err());
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let reg = registry();
        let schema = reg.get("macroOrthogonalData").unwrap();
        let mut r = rec(json!({"strategy_name": "Macro Factor 1", "notes": {"x": [1, 2]}, "rank": 3}));
        normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)).unwrap();
        assert_eq!(r.get("notes"), Some(&json!({"x": [1, 2]})));
        assert_eq!(r.get("rank"), Some(&json!(3)));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let reg = registry();
        let mut src = SeededSource::from_seed(3);
        for schema in reg.views() {
            let raw = rec(json!({
                "strategy_name": "SPY Factor 2",
                "name": "Legacy Name",
                "indicator": "VIXCLS",
                "algorithm": "XGBoost",
                "features": 4,
                "cluster": 2,
                "indicators_used": "SPY + VIX",
                "max_drawdown": -0.2,
            }));
            let (once, _) = normalize(vec![raw], schema, &mut src).unwrap();
            let (twice, stats) = normalize(once.clone(), schema, &mut src).unwrap();
            assert_eq!(once, twice, "second pass changed {}", schema.view);
            assert_eq!(stats.aliased + stats.derived + stats.synthesized + stats.coerced, 0);
        }
    }

    #[test]
    fn test_derivation_deterministic() {
        let reg = registry();
        let schema = reg.get("spyMLData").unwrap();
        let raw = json!({"strategy_name": "SPY SVM Model", "algorithm": "SVM", "features": 12, "total_trades": 180});
        let mut a = rec(raw.clone());
        let mut b = rec(raw);
        normalize_record(&mut a, 0, schema, &mut SeededSource::from_seed(1)).unwrap();
        normalize_record(&mut b, 0, schema, &mut SeededSource::from_seed(2)).unwrap();
        for field in ["model_name", "dimensions", "avg_trades_per_year"] {
            assert_eq!(a.get(field), b.get(field), "{field} differs");
        }
        assert_eq!(a.text("model_name"), Some("SVM Model"));
        assert_eq!(a.number("avg_trades_per_year"), Some(12.0));
    }

    #[test]
    fn test_holding_period_cycles_with_position() {
        let reg = registry();
        let schema = reg.get("spyMLData").unwrap();
        let records: Vec<_> = (0..10)
            .map(|i| rec(json!({"strategy_name": format!("Model {i}")})))
            .collect();
        let (out, _) = normalize(records, schema, &mut FixedSource(0.5)).unwrap();
        assert_eq!(out[0].text("holding_period"), Some("1D"));
        assert_eq!(out[7].text("holding_period"), Some("6M"));
        assert_eq!(out[8].text("holding_period"), Some("1D"));
    }

    #[test]
    fn test_spy_clustering_components_from_cluster() {
        let reg = registry();
        let schema = reg.get("spyClusteringData").unwrap();
        let mut r = rec(json!({"strategy_name": "SPY High Vol Cluster", "algorithm": "K-Means", "features": 5, "cluster": 1}));
        normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)).unwrap();
        assert_eq!(r.get("clusters_components"), Some(&json!(1)));
        assert_eq!(r.get("dimensions"), Some(&json!(5)));
        assert_eq!(r.text("method"), Some("K-Means"));

        let mut r = rec(json!({"strategy_name": "SPY Low Vol Cluster", "features": 3}));
        normalize_record(&mut r, 1, schema, &mut FixedSource(0.5)).unwrap();
        assert_eq!(r.get("clusters_components"), Some(&json!(3)));
    }

    #[test]
    fn test_orthogonal_fields_completed() {
        let reg = registry();
        let schema = reg.get("combinedOrthogonalData").unwrap();
        let mut r = rec(json!({"strategy_name": "Combined Factor 4", "sources": "PCA, K-Means"}));
        normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)).unwrap();
        assert_eq!(r.text("source_methods"), Some("PCA, K-Means"));
        assert_eq!(r.text("factor"), Some("Combined Factor 4"));
        assert_eq!(r.text("indicator"), Some("4"));
        assert_eq!(r.text("transform_type"), Some("orthogonal"));
        assert_eq!(r.text("category"), Some("orthogonal"));
        let loading = r.number("loading").unwrap();
        assert!((-0.8..=0.8).contains(&loading));
    }

    #[test]
    fn test_every_view_complete_after_normalize() {
        let reg = registry();
        let mut src = SeededSource::from_seed(99);
        for schema in reg.views() {
            let raw = rec(json!({
                "strategy_name": "SPY Item",
                "indicator": "DGS10",
                "indicators_used": "DGS10, DFF",
            }));
            let (out, _) = normalize(vec![raw], schema, &mut src).unwrap();
            for field in schema.fields.iter().filter(|f| f.required) {
                assert!(!out[0].is_absent(field.name), "{} missing {}", schema.view, field.name);
            }
        }
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let reg = registry();
        let schema = reg.get("individualData").unwrap();
        let cases = [
            ("terminal_value", json!(-25000.0)),
            ("terminal_value", json!(0)),
            ("win_rate", json!(1.7)),
            ("volatility", json!(-0.2)),
            ("avg_trades_per_year", json!(0.0)),
        ];
        for (field, value) in cases {
            let mut r = rec(json!({"indicator": "DFF"}));
            r.insert(field, value.clone());
            match normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)) {
                Err(PipelineError::SchemaViolation { field: f, reason, .. }) => {
                    assert_eq!(f, field);
                    assert!(reason.contains("must lie in"), "{reason}");
                }
                other => panic!("{field}={value} should be rejected, got {other:?}"),
            }
            // nothing rewritten in place
            assert_eq!(r.get(field), Some(&value));
        }
    }

    #[test]
    fn test_range_edges_accepted() {
        let reg = registry();
        let schema = reg.get("individualData").unwrap();
        let mut r = rec(json!({"indicator": "DFF", "win_rate": 1.0, "volatility": 0.0, "annual_return": -0.04}));
        normalize_record(&mut r, 0, schema, &mut FixedSource(0.5)).unwrap();
        assert_eq!(r.number("win_rate"), Some(1.0));
        assert_eq!(r.number("volatility"), Some(0.0));
        assert_eq!(r.number("annual_return"), Some(-0.04));
    }

    #[test]
    fn test_every_synthesized_default_within_bounds() {
        let reg = registry();
        let mut src = SeededSource::from_seed(17);
        for schema in reg.views() {
            for i in 0..100 {
                let raw = rec(json!({
                    "strategy_name": "SPY Factor 1",
                    "indicator": "DGS10",
                    "indicators_used": "DGS10, DFF",
                }));
                let (out, _) = normalize(vec![raw], schema, &mut src).unwrap();
                for field in &schema.fields {
                    let Some((lo, hi)) = field.default.and_then(|d| d.bounds()) else {
                        continue;
                    };
                    let x = out[0].number(field.name).unwrap();
                    assert!(
                        (lo..=hi).contains(&x),
                        "{} #{i}: {} = {x} outside [{lo}, {hi}]",
                        schema.view,
                        field.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_sortino_and_calmar_follow_sharpe() {
        let reg = registry();
        let schema = reg.get("spyOrthogonalData").unwrap();
        let mut src = SeededSource::from_seed(5);
        for i in 0..200 {
            let mut r = rec(json!({"strategy_name": "SPY Factor 2"}));
            normalize_record(&mut r, i, schema, &mut src).unwrap();
            let sharpe = r.number("sharpe_ratio").unwrap();
            let sortino = r.number("sortino_ratio").unwrap();
            let calmar = r.number("calmar_ratio").unwrap();
            assert!(sortino >= sharpe, "sortino {sortino} < sharpe {sharpe}");
            assert!(calmar <= sharpe.max(0.15), "calmar {calmar} > sharpe {sharpe}");
        }

        let mut r = rec(json!({"strategy_name": "SPY Factor 3", "sharpe_ratio": 0.5}));
        normalize_record(&mut r, 0, schema, &mut FixedSource(0.0)).unwrap();
        assert_eq!(r.number("sortino_ratio"), Some(0.5));
        assert_eq!(r.number("calmar_ratio"), Some(0.3));
    }
}
