use crate::errors::{PipelineError, PipelineResult};
use crate::record::StrategyRecord;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level key of the reference strategy. Never a view, never normalized.
pub const BENCHMARK_KEY: &str = "spyBenchmark";

/// Named views plus the benchmark singleton, as one document.
/// Built once per run, serialized, then dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    views: BTreeMap<String, Vec<StrategyRecord>>,
    benchmark: Option<StrategyRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores (or replaces) a view.
    pub fn put(&mut self, view: &str, records: Vec<StrategyRecord>) -> PipelineResult<()> {
        if view == BENCHMARK_KEY {
            return Err(PipelineError::ReservedKey(view.to_string()));
        }
        self.views.insert(view.to_string(), records);
        Ok(())
    }

    pub fn get(&self, view: &str) -> PipelineResult<&[StrategyRecord]> {
        self.views
            .get(view)
            .map(Vec::as_slice)
            .ok_or_else(|| PipelineError::UnknownView(view.to_string()))
    }

    pub fn views(&self) -> impl Iterator<Item = (&str, &[StrategyRecord])> {
        self.views.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Hands the views over by value, for a pass that rebuilds them.
    pub fn into_parts(self) -> (BTreeMap<String, Vec<StrategyRecord>>, Option<StrategyRecord>) {
        (self.views, self.benchmark)
    }

    pub fn set_benchmark(&mut self, benchmark: StrategyRecord) {
        self.benchmark = Some(benchmark);
    }

    pub fn benchmark(&self) -> Option<&StrategyRecord> {
        self.benchmark.as_ref()
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn record_count(&self) -> usize {
        self.views.values().map(Vec::len).sum()
    }

    /// Compact JSON, the shape the dashboard fetches.
    pub fn serialize(&self) -> PipelineResult<Vec<u8>> {
        serde_json::to_vec(&Document(self)).map_err(|e| PipelineError::MalformedDocument(e.to_string()))
    }

    /// Inverse of [`Dataset::serialize`]. Rejects anything but an object of
    /// arrays of objects, plus an optional benchmark object. A key repeated
    /// inside any object is rejected rather than silently overwritten.
    pub fn deserialize(bytes: &[u8]) -> PipelineResult<Self> {
        let UniqueKeys(doc) = serde_json::from_slice(bytes)?;
        let Value::Object(top) = doc else {
            return Err(PipelineError::MalformedDocument(
                "top level is not an object".into(),
            ));
        };

        let mut dataset = Dataset::new();
        for (key, value) in top {
            if key == BENCHMARK_KEY {
                dataset.benchmark = Some(benchmark_from(value)?);
                continue;
            }
            let Value::Array(items) = value else {
                return Err(PipelineError::MalformedDocument(format!(
                    "view `{key}` is not an array"
                )));
            };
            let mut records = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(map) => records.push(StrategyRecord::from(map)),
                    _ => {
                        return Err(PipelineError::MalformedDocument(format!(
                            "view `{key}` item {i} is not an object"
                        )))
                    }
                }
            }
            dataset.views.insert(key, records);
        }

        Ok(dataset)
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::Io(format!("read {}: {e}", path.display())))?;
        Self::deserialize(&bytes)
    }

    /// Serializes first, then writes a sibling temp file and renames it over `path`.
    /// Readers see the old document or the new one, never a partial write.
    pub fn publish(&self, path: &Path) -> PipelineResult<()> {
        let bytes = self.serialize()?;
        let tmp = tmp_path(path);
        std::fs::write(&tmp, &bytes)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                PipelineError::Io(format!("publish {}: {e}", path.display()))
            })?;
        tracing::info!(
            path = %path.display(),
            views = self.view_count(),
            records = self.record_count(),
            bytes = bytes.len(),
            "document published"
        );
        Ok(())
    }
}

/// Wire view of a dataset: views and the benchmark flattened into one object.
struct Document<'a>(&'a Dataset);

impl Serialize for Document<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let d = self.0;
        let len = d.views.len() + usize::from(d.benchmark.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (view, records) in &d.views {
            map.serialize_entry(view, records)?;
        }
        if let Some(benchmark) = &d.benchmark {
            map.serialize_entry(BENCHMARK_KEY, benchmark)?;
        }
        map.end()
    }
}

/// Older documents wrapped the benchmark in a one-element array.
fn benchmark_from(value: Value) -> PipelineResult<StrategyRecord> {
    match value {
        Value::Object(map) => Ok(StrategyRecord::from(map)),
        Value::Array(mut items) if items.len() == 1 => match items.pop() {
            Some(Value::Object(map)) => Ok(StrategyRecord::from(map)),
            _ => Err(PipelineError::MalformedDocument(format!(
                "`{BENCHMARK_KEY}` is not an object"
            ))),
        },
        _ => Err(PipelineError::MalformedDocument(format!(
            "`{BENCHMARK_KEY}` is not an object"
        ))),
    }
}

/// A JSON value parsed without tolerating duplicate object keys.
struct UniqueKeys(Value);

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor).map(UniqueKeys)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom("non-finite number"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        UniqueKeys::deserialize(deserializer).map(|UniqueKeys(v)| v)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(UniqueKeys(v)) = seq.next_element()? {
            items.push(v);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut out = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            if out.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key `{key}`")));
            }
            let UniqueKeys(v) = map.next_value()?;
            out.insert(key, v);
        }
        Ok(Value::Object(out))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
