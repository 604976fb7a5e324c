pub mod views;

use crate::errors::{PipelineError, PipelineResult};
use crate::normalize::source::ValueSource;
use crate::record::StrategyRecord;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// What a present value must look like after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Any finite real.
    Number,
    /// Finite and non-negative. Negative inputs are coerced to their magnitude.
    Magnitude,
    /// Positive integer. Integral floats are coerced.
    Count,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Number => write!(f, "number"),
            Self::Magnitude => write!(f, "magnitude"),
            Self::Count => write!(f, "count"),
        }
    }
}

/// Computes a missing field from other fields of the same record.
/// `rule` must be a pure function of the fields listed in `inputs`.
#[derive(Debug, Clone, Copy)]
pub struct Derivation {
    pub inputs: &'static [&'static str],
    pub rule: fn(&StrategyRecord) -> Option<Value>,
}

impl Derivation {
    #[inline]
    pub fn apply(&self, record: &StrategyRecord) -> Option<Value> {
        (self.rule)(record)
    }
}

/// Accepted values of a numeric field. The upper bound is always inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub min_inclusive: bool,
}

impl Range {
    pub const fn closed(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_inclusive: true,
        }
    }

    /// `(0, inf)`
    pub const fn positive() -> Self {
        Self {
            min: 0.0,
            max: f64::INFINITY,
            min_inclusive: false,
        }
    }

    /// `[0, inf)`
    pub const fn non_negative() -> Self {
        Self::closed(0.0, f64::INFINITY)
    }

    pub fn contains(&self, x: f64) -> bool {
        let above = if self.min_inclusive { x >= self.min } else { x > self.min };
        above && x <= self.max
    }

    fn is_valid(&self) -> bool {
        !self.min.is_nan() && !self.max.is_nan() && self.min <= self.max
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = if self.min_inclusive { '[' } else { '(' };
        if self.max.is_infinite() {
            write!(f, "{open}{}, inf)", self.min)
        } else {
            write!(f, "{open}{}, {}]", self.min, self.max)
        }
    }
}

/// How to synthesize a field nobody supplied.
#[derive(Debug, Clone, Copy)]
pub enum DefaultRule {
    /// Real value in the closed interval.
    Uniform { min: f64, max: f64 },
    /// Integer in the closed interval.
    IntRange { min: i64, max: i64 },
    Choice(&'static [&'static str]),
    IntChoice(&'static [i64]),
    /// `list[index % len]`, where `index` is the record's position in its view.
    Cycle(&'static [&'static str]),
    /// `from` times a factor drawn from `[min, max]`, clamped into `clamp`.
    Scaled {
        from: &'static str,
        min: f64,
        max: f64,
        clamp: Range,
    },
    /// Run the field's derivation again against the record as completed so far.
    Rederive,
}

impl DefaultRule {
    /// Draws a value for the record at `index`. `Rederive` is resolved by the caller.
    pub fn draw(
        &self,
        record: &StrategyRecord,
        source: &mut dyn ValueSource,
        index: usize,
    ) -> Option<Value> {
        match *self {
            Self::Uniform { min, max } => {
                serde_json::Number::from_f64(source.uniform(min, max)).map(Value::Number)
            }
            Self::IntRange { min, max } => Some(Value::from(source.int_between(min, max))),
            Self::Choice(list) => list
                .get(source.index(list.len()))
                .map(|s| Value::String((*s).to_string())),
            Self::IntChoice(list) => list.get(source.index(list.len())).map(|n| Value::from(*n)),
            Self::Cycle(list) => {
                if list.is_empty() {
                    None
                } else {
                    Some(Value::String(list[index % list.len()].to_string()))
                }
            }
            Self::Scaled {
                from,
                min,
                max,
                clamp,
            } => {
                let base = record.number(from)?;
                let x = (base * source.uniform(min, max)).clamp(clamp.min, clamp.max);
                serde_json::Number::from_f64(x).map(Value::Number)
            }
            Self::Rederive => None,
        }
    }

    /// Closed interval every drawn number falls in, when there is one.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match *self {
            Self::Uniform { min, max } => Some((min, max)),
            Self::IntRange { min, max } => Some((min as f64, max as f64)),
            Self::Scaled { clamp, .. } => Some((clamp.min, clamp.max)),
            _ => None,
        }
    }
}

impl std::fmt::Display for DefaultRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uniform { min, max } => write!(f, "uniform [{min}, {max}]"),
            Self::IntRange { min, max } => write!(f, "int [{min}, {max}]"),
            Self::Choice(list) => write!(f, "one of {}", list.join(" | ")),
            Self::IntChoice(list) => write!(f, "one of {list:?}"),
            Self::Cycle(list) => write!(f, "cycle {}", list.join(" > ")),
            Self::Scaled {
                from,
                min,
                max,
                clamp,
            } => write!(f, "{from} x [{min}, {max}] within {clamp}"),
            Self::Rederive => write!(f, "rederive"),
        }
    }
}

/// One declared field of a view.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Legacy names, highest priority first.
    pub aliases: &'static [&'static str],
    pub derive: Option<Derivation>,
    pub default: Option<DefaultRule>,
    /// Accepted values, checked after coercion.
    pub range: Option<Range>,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            aliases: &[],
            derive: None,
            default: None,
            range: None,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            aliases: &[],
            derive: None,
            default: None,
            range: None,
        }
    }

    pub fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn derive(
        mut self,
        inputs: &'static [&'static str],
        rule: fn(&StrategyRecord) -> Option<Value>,
    ) -> Self {
        self.derive = Some(Derivation { inputs, rule });
        self
    }

    pub fn default(mut self, rule: DefaultRule) -> Self {
        self.default = Some(rule);
        self
    }

    pub fn range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }
}

/// Declared shape of one view.
#[derive(Debug, Clone)]
pub struct Schema {
    pub view: String,
    /// Field used to name a record in errors.
    pub label_field: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Display label for error messages: the label field, else `#index`.
    pub fn record_label(&self, record: &StrategyRecord, index: usize) -> String {
        record
            .text(self.label_field)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{index}"))
    }

    /// Rejects declarations that would make normalization ambiguous or non-idempotent.
    pub fn check(&self) -> PipelineResult<()> {
        let invalid = |reason: String| PipelineError::InvalidSchema {
            view: self.view.clone(),
            reason,
        };

        let mut names = HashSet::new();
        for f in &self.fields {
            if !names.insert(f.name) {
                return Err(invalid(format!("field `{}` declared twice", f.name)));
            }
        }

        let derived: HashSet<&str> = self
            .fields
            .iter()
            .filter(|f| f.derive.is_some())
            .map(|f| f.name)
            .collect();

        let mut seen_aliases = HashSet::new();
        for (pos, f) in self.fields.iter().enumerate() {
            for alias in f.aliases {
                if names.contains(alias) {
                    return Err(invalid(format!(
                        "alias `{alias}` of `{}` is itself a declared field",
                        f.name
                    )));
                }
                if !seen_aliases.insert(*alias) {
                    return Err(invalid(format!("alias `{alias}` declared for two fields")));
                }
            }

            if let Some(d) = &f.derive {
                if let Some(input) = d.inputs.iter().find(|i| derived.contains(*i)) {
                    return Err(invalid(format!(
                        "`{}` derives from derived field `{input}`",
                        f.name
                    )));
                }
            }

            match f.default {
                Some(DefaultRule::Rederive) if f.derive.is_none() => {
                    return Err(invalid(format!("`{}` rederives without a derivation", f.name)));
                }
                Some(DefaultRule::Uniform { min, max })
                    if !(min.is_finite() && max.is_finite() && min <= max) =>
                {
                    return Err(invalid(format!("`{}` has empty range [{min}, {max}]", f.name)));
                }
                Some(DefaultRule::IntRange { min, max }) if min > max => {
                    return Err(invalid(format!("`{}` has empty range [{min}, {max}]", f.name)));
                }
                Some(DefaultRule::Choice(list)) | Some(DefaultRule::Cycle(list))
                    if list.is_empty() =>
                {
                    return Err(invalid(format!("`{}` has no choices", f.name)));
                }
                Some(DefaultRule::IntChoice(list)) if list.is_empty() => {
                    return Err(invalid(format!("`{}` has no choices", f.name)));
                }
                Some(DefaultRule::Scaled {
                    from,
                    min,
                    max,
                    clamp,
                }) => {
                    if !(min.is_finite() && max.is_finite() && min <= max) || !clamp.is_valid() {
                        return Err(invalid(format!("`{}` has an empty scale range", f.name)));
                    }
                    match self.field(from) {
                        Some(base)
                            if matches!(base.kind, FieldKind::Number | FieldKind::Magnitude)
                                && self.fields[..pos].iter().any(|x| x.name == from) => {}
                        _ => {
                            return Err(invalid(format!(
                                "`{}` scales from `{from}`, which is not a numeric field declared before it",
                                f.name
                            )))
                        }
                    }
                }
                _ => {}
            }

            if let Some(range) = f.range {
                if !range.is_valid() {
                    return Err(invalid(format!("`{}` has empty range {range}", f.name)));
                }
                if !matches!(f.kind, FieldKind::Number | FieldKind::Magnitude) {
                    return Err(invalid(format!("`{}` is {} and cannot carry a range", f.name, f.kind)));
                }
                if let Some((lo, hi)) = f.default.and_then(|d| d.bounds()) {
                    if !(range.contains(lo) && range.contains(hi)) {
                        return Err(invalid(format!(
                            "`{}` default [{lo}, {hi}] falls outside {range}",
                            f.name
                        )));
                    }
                }
            }
        }

        if !names.contains(self.label_field) {
            return Err(invalid(format!(
                "label field `{}` is not declared",
                self.label_field
            )));
        }

        Ok(())
    }
}

/// View name -> schema. Built once at startup, read-only afterwards.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new(schemas: Vec<Schema>) -> PipelineResult<Self> {
        let mut map = BTreeMap::new();
        for schema in schemas {
            schema.check()?;
            if map.contains_key(&schema.view) {
                return Err(PipelineError::InvalidSchema {
                    view: schema.view.clone(),
                    reason: "view registered twice".into(),
                });
            }
            map.insert(schema.view.clone(), schema);
        }
        Ok(Self { schemas: map })
    }

    /// Registry holding every view the dashboard renders.
    pub fn builtin() -> PipelineResult<Self> {
        Self::new(views::builtin_schemas())
    }

    pub fn get(&self, view: &str) -> PipelineResult<&Schema> {
        self.schemas
            .get(view)
            .ok_or_else(|| PipelineError::UnknownView(view.to_string()))
    }

    pub fn views(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }
}
