use std::collections::BTreeMap;
use std::collections::HashMap;

use serde_json::{json, Value as Json};

use crate::expr::Scalar;
use crate::step::FieldExpr;

///
/// AggTree
///
/// The aggregation tree (C8, spec.md §4.3): one entry per selection, each
/// a dimension-keyed tree terminating in a leaf of named scalar
/// aggregators. Built up shard-locally by the interpreter (C9) as it walks
/// objects, one shard's tree per worker (spec.md §5), then merged
/// associatively and commutatively across shards by the executor (C10).
///
/// A selection's subtree is keyed by `(name, dimensions)`
/// (spec.md §4.3 "Factorization"), so two anonymous selections sharing the
/// same dimension list merge into one node even though neither has a name.
///

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DimKey {
    Str(String),
    Int(i64),
    Bool(bool),
    /// The dimension expression evaluated to nothing for this event (the
    /// identifier was never set on the object yet); grouped as its own
    /// bucket rather than dropping the row (spec.md §8 scenario 2).
    Missing,
}

impl From<&Scalar> for DimKey {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Str(s) => Self::Str(s.clone()),
            Scalar::Int(i) => Self::Int(*i),
            Scalar::Float(f) => Self::Int(*f as i64),
            Scalar::Bool(b) => Self::Bool(*b),
        }
    }
}

impl std::fmt::Display for DimKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Missing => write!(f, ""),
        }
    }
}

/// Fixed bin count used to recompute `width` on rebin (spec.md §4.3:
/// "N fixed small, e.g. 3").
const HISTOGRAM_BIN_COUNT: i64 = 3;

/// Adaptive histogram (spec.md §4.3, §4.4): tracks count/min/max and a
/// sparse map of bin index → count over the observed range. Extending the
/// range (a new value, or a merge against another histogram) recomputes
/// `width = (max-min)/N` and rebins every existing count into the new
/// width, using each old bin's midpoint as its representative value (bin
/// counts, not individual observations, are retained).
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    pub bins: BTreeMap<i64, u64>,
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub width: f64,
}

impl Histogram {
    fn new() -> Self {
        Self { bins: BTreeMap::new(), count: 0, min: 0.0, max: 0.0, width: 1.0 }
    }

    fn bin_index(&self, value: f64) -> i64 {
        if self.width <= 0.0 {
            return 0;
        }
        (((value - self.min) / self.width).floor() as i64).clamp(0, HISTOGRAM_BIN_COUNT - 1)
    }

    /// Rebins every existing bin into a new `[min, max]` range, using each
    /// bin's midpoint under the *old* width as the value that gets
    /// reclassified.
    fn rebin(&mut self, new_min: f64, new_max: f64) {
        let old_width = self.width;
        let old_min = self.min;
        let old_bins = std::mem::take(&mut self.bins);

        self.min = new_min;
        self.max = new_max;
        self.width = if new_max > new_min { (new_max - new_min) / HISTOGRAM_BIN_COUNT as f64 } else { 1.0 };

        for (bucket, count) in old_bins {
            let midpoint = old_min + (bucket as f64 + 0.5) * old_width;
            let new_bucket = self.bin_index(midpoint);
            *self.bins.entry(new_bucket).or_insert(0) += count;
        }
    }

    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.width = 1.0;
        } else if value < self.min || value > self.max {
            let new_min = self.min.min(value);
            let new_max = self.max.max(value);
            self.rebin(new_min, new_max);
        }
        let bucket = self.bin_index(value);
        *self.bins.entry(bucket).or_insert(0) += 1;
        self.count += 1;
    }

    /// Merges `other` in: extends the range to cover both operands, then
    /// rebins both operands' bin sets into the merged range (spec.md §4.4).
    fn merge(&mut self, other: Histogram) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other;
            return;
        }

        let new_min = self.min.min(other.min);
        let new_max = self.max.max(other.max);
        self.rebin(new_min, new_max);

        let mut rhs = other;
        rhs.rebin(new_min, new_max);

        for (bucket, count) in rhs.bins {
            *self.bins.entry(bucket).or_insert(0) += count;
        }
        self.count += rhs.count;
    }

    fn to_json(&self) -> Json {
        let bins: serde_json::Map<String, Json> =
            self.bins.iter().map(|(bucket, count)| (bucket.to_string(), json!(count))).collect();
        json!({
            "__histogram__": true,
            "bins": bins,
            "count": self.count,
            "min": if self.count == 0 { Json::Null } else { json!(self.min) },
            "max": if self.count == 0 { Json::Null } else { json!(self.max) },
            "width": self.width,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AggValue {
    Count(u64),
    Sum(f64),
    Min(f64),
    Max(f64),
    Histogram(Histogram),
}

impl AggValue {
    fn empty(expr: &FieldExpr) -> Self {
        match expr {
            FieldExpr::Count => Self::Count(0),
            FieldExpr::Sum(_) => Self::Sum(0.0),
            FieldExpr::Min(_) => Self::Min(f64::INFINITY),
            FieldExpr::Max(_) => Self::Max(f64::NEG_INFINITY),
            FieldExpr::Histogram(_) => Self::Histogram(Histogram::new()),
        }
    }

    fn record(&mut self, value: Option<&Scalar>) {
        match self {
            Self::Count(n) => *n += 1,
            Self::Sum(s) => {
                if let Some(v) = value.and_then(Scalar::as_f64) {
                    *s += v;
                }
            }
            Self::Min(m) => {
                if let Some(v) = value.and_then(Scalar::as_f64) {
                    *m = m.min(v);
                }
            }
            Self::Max(m) => {
                if let Some(v) = value.and_then(Scalar::as_f64) {
                    *m = m.max(v);
                }
            }
            Self::Histogram(h) => {
                if let Some(v) = value.and_then(Scalar::as_f64) {
                    h.add(v);
                }
            }
        }
    }

    fn merge(self, other: AggValue) -> AggValue {
        match (self, other) {
            (Self::Count(a), Self::Count(b)) => Self::Count(a + b),
            (Self::Sum(a), Self::Sum(b)) => Self::Sum(a + b),
            (Self::Min(a), Self::Min(b)) => Self::Min(a.min(b)),
            (Self::Max(a), Self::Max(b)) => Self::Max(a.max(b)),
            (Self::Histogram(mut a), Self::Histogram(b)) => {
                a.merge(b);
                Self::Histogram(a)
            }
            (a, _) => a,
        }
    }

    fn to_json(&self) -> Json {
        match self {
            Self::Count(n) => json!(n),
            Self::Sum(s) => json!(s),
            Self::Min(m) => {
                if m.is_finite() {
                    json!(m)
                } else {
                    Json::Null
                }
            }
            Self::Max(m) => {
                if m.is_finite() {
                    json!(m)
                } else {
                    Json::Null
                }
            }
            Self::Histogram(h) => h.to_json(),
        }
    }
}

/// The field-name-ordered leaf that sits at the bottom of one dimension
/// path: one `AggValue` per field the selection declared.
type Leaf = Vec<(String, AggValue)>;

#[derive(Clone, Debug, PartialEq)]
enum SelectionNode {
    Leaf(Leaf),
    Branch(HashMap<DimKey, SelectionNode>),
}

impl SelectionNode {
    fn new_leaf(fields: &[(String, FieldExpr)]) -> Self {
        Self::Leaf(fields.iter().map(|(name, expr)| (name.clone(), AggValue::empty(expr))).collect())
    }

    fn record(&mut self, dims: &[DimKey], fields: &[(String, FieldExpr)], values: &[Option<Scalar>]) {
        match dims.split_first() {
            None => {
                let Self::Leaf(leaf) = self else {
                    unreachable!("dimension depth matches the path taken to reach this node")
                };
                for ((_, agg), value) in leaf.iter_mut().zip(values) {
                    agg.record(value.as_ref());
                }
            }
            Some((head, rest)) => {
                let branch = match self {
                    Self::Branch(map) => map,
                    Self::Leaf(_) => unreachable!("dimension depth matches the path taken to reach this node"),
                };
                branch
                    .entry(head.clone())
                    .or_insert_with(|| {
                        if rest.is_empty() {
                            Self::new_leaf(fields)
                        } else {
                            Self::Branch(HashMap::new())
                        }
                    })
                    .record(rest, fields, values);
            }
        }
    }

    fn merge(self, other: SelectionNode) -> SelectionNode {
        match (self, other) {
            (Self::Leaf(a), Self::Leaf(b)) => {
                Self::Leaf(a.into_iter().zip(b).map(|((name, av), (_, bv))| (name, av.merge(bv))).collect())
            }
            (Self::Branch(mut a), Self::Branch(b)) => {
                for (key, node) in b {
                    a.entry(key)
                        .and_modify(|existing| {
                            let taken = std::mem::replace(existing, Self::Leaf(Vec::new()));
                            *existing = taken.merge(node.clone());
                        })
                        .or_insert(node);
                }
                Self::Branch(a)
            }
            (a, _) => a,
        }
    }

    /// Serializes this node, pairing each remaining branch level with its
    /// dimension's property name (spec.md §4.6: "map-of-maps where
    /// dimensions nest in listed order"): a `Branch` becomes a single-key
    /// object `{dimName: {dimValue: <next level>}}`.
    fn to_json(&self, dim_names: &[String]) -> Json {
        match self {
            Self::Leaf(fields) => Json::Object(fields.iter().map(|(name, value)| (name.clone(), value.to_json())).collect()),
            Self::Branch(map) => {
                let (name, rest) = dim_names.split_first().expect("branch depth matches dim_names length");
                let values: serde_json::Map<String, Json> =
                    map.iter().map(|(key, node)| (key.to_string(), node.to_json(rest))).collect();
                let mut obj = serde_json::Map::new();
                obj.insert(name.clone(), Json::Object(values));
                Json::Object(obj)
            }
        }
    }
}

/// Identifies a selection for factorization/merge purposes: selections
/// sharing `(name, dimensions)` write into the same node (spec.md §4.3).
type SelectionKey = (Option<String>, Vec<String>);

struct SelectionEntry {
    fields: Vec<(String, FieldExpr)>,
    node: SelectionNode,
}

#[derive(Default)]
pub struct AggTree {
    selections: HashMap<SelectionKey, SelectionEntry>,
}

impl AggTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one event's worth of observations into the selection keyed
    /// by `(name, dim_names)`, grouped by `dims` and accumulated into
    /// `fields`. `values` has one entry per field, evaluated by the caller
    /// against the current event state.
    pub fn record(&mut self, name: Option<&str>, dim_names: &[String], dims: Vec<DimKey>, fields: &[(String, FieldExpr)], values: Vec<Option<Scalar>>) {
        let key = (name.map(str::to_string), dim_names.to_vec());
        let entry = self.selections.entry(key).or_insert_with(|| {
            let node = if dims.is_empty() { SelectionNode::new_leaf(fields) } else { SelectionNode::Branch(HashMap::new()) };
            SelectionEntry { fields: fields.to_vec(), node }
        });
        entry.node.record(&dims, &entry.fields.clone(), &values);
    }

    /// Associatively and commutatively merges `other` into `self` (spec.md
    /// §5: shard results merge in any order).
    pub fn merge(&mut self, other: AggTree) {
        for (key, entry) in other.selections {
            match self.selections.remove(&key) {
                Some(existing) => {
                    self.selections.insert(key, SelectionEntry { fields: existing.fields, node: existing.node.merge(entry.node) });
                }
                None => {
                    self.selections.insert(key, entry);
                }
            }
        }
    }

    /// Serializes the whole tree (spec.md §4.6, §6): a named selection's
    /// subtree sits under its name; an anonymous selection's subtree merges
    /// directly into the top-level result object.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let mut root = serde_json::Map::new();
        for ((name, dim_names), entry) in &self.selections {
            let subtree = entry.node.to_json(dim_names);
            match name {
                Some(n) => {
                    root.insert(n.clone(), subtree);
                }
                None => {
                    if let Json::Object(fields) = subtree {
                        root.extend(fields);
                    }
                }
            }
        }
        Json::Object(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_without_dimensions() {
        let mut tree = AggTree::new();
        let fields = vec![("count".to_string(), FieldExpr::Count)];
        for _ in 0..4 {
            tree.record(None, &[], vec![], &fields, vec![None]);
        }
        assert_eq!(tree.to_json(), json!({"count": 4}));
    }

    #[test]
    fn groups_by_dimension_and_merges_shards() {
        let fields = vec![("count".to_string(), FieldExpr::Count)];
        let dim_names = vec!["fruit".to_string()];
        let mut a = AggTree::new();
        a.record(None, &dim_names, vec![DimKey::Str("apple".into())], &fields, vec![None]);
        let mut b = AggTree::new();
        b.record(None, &dim_names, vec![DimKey::Str("apple".into())], &fields, vec![None]);
        b.record(None, &dim_names, vec![DimKey::Str("grape".into())], &fields, vec![None]);
        a.merge(b);
        assert_eq!(a.to_json(), json!({"fruit": {"apple": {"count": 2}, "grape": {"count": 1}}}));
    }

    #[test]
    fn named_selection_sits_under_its_name() {
        let fields = vec![("count".to_string(), FieldExpr::Count)];
        let mut tree = AggTree::new();
        tree.record(Some("all"), &[], vec![], &fields, vec![None]);
        assert_eq!(tree.to_json(), json!({"all": {"count": 1}}));
    }

    #[test]
    fn histogram_rebins_on_out_of_range_merge() {
        let mut a = Histogram::new();
        for v in [1.0, 2.0, 3.0] {
            a.add(v);
        }
        let mut b = Histogram::new();
        for v in [10.0, 11.0] {
            b.add(v);
        }
        a.merge(b);
        assert_eq!(a.count, 5);
        assert_eq!(a.min, 1.0);
        assert_eq!(a.max, 11.0);
        let total: u64 = a.bins.values().sum();
        assert_eq!(total, 5);
    }
}
