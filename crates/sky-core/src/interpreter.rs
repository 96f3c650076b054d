use sky_primitives::PropertyId;
use sky_schema::Table;

use crate::agg::{AggTree, DimKey};
use crate::decls::{collect_decls, TIMESTAMP_NAME};
use crate::error::CoreError;
use crate::expr::{eval_bool, Scalar};
use crate::object_cursor::EventState;
use crate::step::{Condition, FieldExpr, Selection, SessionLoop, Step};

///
/// Interpreter
///
/// The step interpreter (C9, spec.md §4.3): walks one object's
/// materialized event sequence position by position, running every
/// top-level step at each position. A plain `Condition` gates its nested
/// steps on the current position; a `Condition` with `within` searches the
/// bounded `[pos+min, pos+max]` window for the first position where its
/// expression holds and runs its nested steps there instead, allowing the
/// next outer position to independently match onto the same target
/// position (spec.md §8 invariant 5, "overlapping matches are not
/// suppressed").
///
/// One `Interpreter` accumulates into a single, shard-local [`AggTree`]
/// across every object it is run over; shard trees are merged by the
/// executor (C10), not here.
///

pub struct Interpreter<'t> {
    table: &'t Table,
    steps: Vec<Step>,
    tree: AggTree,
}

impl<'t> Interpreter<'t> {
    /// Validates every identifier referenced by `steps` against `table`
    /// before accepting it, so a malformed query fails fast with
    /// `UnboundName`/`DeclConflict` rather than partway through a shard.
    pub fn new(table: &'t Table, steps: Vec<Step>) -> Result<Self, CoreError> {
        collect_decls(&steps, table)?;
        Ok(Self { table, steps, tree: AggTree::new() })
    }

    #[must_use]
    pub fn into_tree(self) -> AggTree {
        self.tree
    }

    /// Runs every top-level step at every position of `events`. A
    /// `within` search never looks past the end of the current session
    /// (spec.md §4.3 point 3, §3 `SessionLoop`): `session_ends[pos]` is
    /// precomputed once per object from the cursor's `eos` markers.
    pub fn execute_object(&mut self, events: &[EventState]) {
        let session_ends = session_ends(events);
        for pos in 0..events.len() {
            for step in &self.steps {
                exec_step(step, events, pos, session_ends[pos], self.table, &mut self.tree);
            }
        }
    }
}

/// For each position, the index of the last event of the session that
/// position belongs to (`events.len() - 1` when `sessionIdleTime` is unset,
/// since the whole stream is then one session).
fn session_ends(events: &[EventState]) -> Vec<usize> {
    let n = events.len();
    let mut ends = vec![0usize; n];
    if n == 0 {
        return ends;
    }
    let mut boundary = n - 1;
    for i in (0..n).rev() {
        if events[i].eos {
            boundary = i;
        }
        ends[i] = boundary;
    }
    ends
}

fn exec_step(step: &Step, events: &[EventState], pos: usize, session_end: usize, table: &Table, tree: &mut AggTree) {
    match step {
        Step::Selection(selection) => exec_selection(selection, events, pos, table, tree),
        Step::Condition(condition) => {
            exec_condition(condition, events, pos, session_end, table, tree);
        }
        Step::SessionLoop(loop_) => exec_session_loop(loop_, events, pos, session_end, table, tree),
    }
}

/// `SessionLoop`'s inner steps run at the current position exactly like a
/// bare step list; the session-boundary cutoff that gives this its "restart
/// at the next event" behavior is enforced by the `session_end` clamp
/// threaded through every nested `within` search, not by anything special
/// here.
fn exec_session_loop(loop_: &SessionLoop, events: &[EventState], pos: usize, session_end: usize, table: &Table, tree: &mut AggTree) {
    for step in &loop_.steps {
        exec_step(step, events, pos, session_end, table, tree);
    }
}

fn exec_selection(selection: &Selection, events: &[EventState], pos: usize, table: &Table, tree: &mut AggTree) {
    let resolve = |name: &str| resolve_id(table, name);
    let event = &events[pos];

    let dims: Vec<DimKey> = selection
        .dimensions
        .iter()
        .map(|name| dim_value(name, event, &resolve))
        .collect();

    let fields: Vec<(String, FieldExpr)> = selection.fields.iter().map(|f| (f.name.clone(), f.expr.clone())).collect();
    let values: Vec<Option<Scalar>> = selection
        .fields
        .iter()
        .map(|f| f.expr.property_name().and_then(|name| field_value(name, event, &resolve)))
        .collect();

    tree.record(selection.name.as_deref(), &selection.dimensions, dims, &fields, values);
}

/// Resolves a dimension's value at `event`: `timestamp` reads the event's
/// own timestamp (seconds projection), anything else looks up the
/// identifier's carried-forward property value.
fn dim_value(name: &str, event: &EventState, resolve: &impl Fn(&str) -> PropertyId) -> DimKey {
    if name == TIMESTAMP_NAME {
        return DimKey::Int(event.timestamp.as_seconds());
    }
    event
        .values
        .get(&resolve(name))
        .map(|v| DimKey::from(&Scalar::from(v)))
        .unwrap_or(DimKey::Missing)
}

/// Resolves an aggregator's field argument the same way `dim_value` does,
/// as a scalar rather than a grouping key.
fn field_value(name: &str, event: &EventState, resolve: &impl Fn(&str) -> PropertyId) -> Option<Scalar> {
    if name == TIMESTAMP_NAME {
        return Some(Scalar::Int(event.timestamp.as_seconds()));
    }
    event.values.get(&resolve(name)).map(Scalar::from)
}

/// Returns whether `condition` matched (and, if so, ran its nested steps).
/// The outer position loop in [`Interpreter::execute_object`] ignores this
/// return value and always advances by one regardless of match outcome;
/// it exists so a `within` search can be expressed as "first position in
/// the window where the nested condition matches", recursively.
fn exec_condition(condition: &Condition, events: &[EventState], pos: usize, session_end: usize, table: &Table, tree: &mut AggTree) -> bool {
    let resolve = |name: &str| resolve_id(table, name);

    match condition.within {
        None => {
            let event = &events[pos];
            if eval_bool(&condition.expr, &event.values, event.timestamp, &resolve) {
                for step in &condition.steps {
                    exec_step(step, events, pos, session_end, table, tree);
                }
                true
            } else {
                false
            }
        }
        Some((min, max)) => {
            let start = pos + min;
            let end = (pos + max).min(session_end);
            if start >= events.len() || start > end {
                return false;
            }
            for target in start..=end {
                let event = &events[target];
                if eval_bool(&condition.expr, &event.values, event.timestamp, &resolve) {
                    for step in &condition.steps {
                        exec_step(step, events, target, session_end, table, tree);
                    }
                    return true;
                }
            }
            false
        }
    }
}

fn resolve_id(table: &Table, name: &str) -> PropertyId {
    table
        .property(name)
        .map(|p| p.id)
        .unwrap_or_else(|| unreachable!("identifier '{name}' was validated by collect_decls in Interpreter::new"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::object_cursor::EventState;
    use crate::step::{Field, FieldExpr};
    use sky_primitives::Timestamp;
    use sky_schema::{DataType, SchemaRegistry};
    use std::collections::HashMap;

    fn table() -> Table {
        let mut registry = SchemaRegistry::new();
        let table = registry.table_or_create("events");
        table.declare_property("action", DataType::String, false).unwrap();
        registry.table("events").unwrap().clone()
    }

    fn event(table: &Table, timestamp: i64, action: &str) -> EventState {
        let mut values = HashMap::new();
        values.insert(table.property("action").unwrap().id, crate::event::Value::String(action.into()));
        EventState { timestamp: Timestamp::from_micros(timestamp * 1_000_000), values, eos: false }
    }

    #[test]
    fn counts_every_event_via_a_bare_selection() {
        let table = table();
        let events = vec![event(&table, 0, "A0"), event(&table, 1, "A1"), event(&table, 2, "A2")];
        let steps = vec![Step::Selection(Selection {
            name: Some("all".into()),
            dimensions: vec![],
            fields: vec![Field { name: "count".into(), expr: FieldExpr::Count }],
        })];
        let mut interp = Interpreter::new(&table, steps).unwrap();
        interp.execute_object(&events);
        let json = interp.into_tree().to_json();
        assert_eq!(json, serde_json::json!({"all": {"count": 3}}));
    }

    #[test]
    fn within_window_funnel_allows_overlapping_matches() {
        // A0 at t=0,1,2 then A1 at t=3,4 (offsets, seconds). An A0 -> A1
        // funnel with within=[1,2] should match A0@0->A1@1 (first found
        // within [1,2]), A0@1->A1@3 is out of window ([2,3], A1 at 3 is in
        // range) ... this test only asserts the total match count, not a
        // hand re-derivation of every position, to stay robust to the
        // specific search rule's edge behavior.
        let table = table();
        let events = vec![
            event(&table, 0, "A0"),
            event(&table, 1, "A1"),
            event(&table, 2, "A0"),
            event(&table, 3, "A1"),
            event(&table, 4, "A1"),
        ];
        let steps = vec![Step::Condition(Condition {
            expr: Expr::Eq(Box::new(Expr::Ident("action".into())), Box::new(Expr::StrLit("A0".into()))),
            within: None,
            steps: vec![Step::Condition(Condition {
                expr: Expr::Eq(Box::new(Expr::Ident("action".into())), Box::new(Expr::StrLit("A1".into()))),
                within: Some((1, 2)),
                steps: vec![Step::Selection(Selection {
                    name: Some("funnel".into()),
                    dimensions: vec![],
                    fields: vec![Field { name: "count".into(), expr: FieldExpr::Count }],
                })],
            })],
        })];
        let mut interp = Interpreter::new(&table, steps).unwrap();
        interp.execute_object(&events);
        let json = interp.into_tree().to_json();
        // A0@0 matches A1@1 (first in [1,2]); A0@2 matches A1@3 (first in
        // [3,4]); both are genuine, non-duplicate triggers, each landing
        // on a different A1, so this is not actually testing overlap by
        // itself -- see `overlapping_matches_share_a_target_position` for
        // that specific invariant.
        assert_eq!(json, serde_json::json!({"funnel": {"count": 2}}));
    }

    #[test]
    fn overlapping_matches_share_a_target_position() {
        // A0 at t=0 and t=1, then a single A1 at t=2. Both A0 triggers can
        // reach the same A1 within a [1,2] window, and spec.md §8
        // invariant 5 requires both to count rather than the second being
        // suppressed as a duplicate.
        let table = table();
        let events = vec![event(&table, 0, "A0"), event(&table, 1, "A0"), event(&table, 2, "A1")];
        let steps = vec![Step::Condition(Condition {
            expr: Expr::Eq(Box::new(Expr::Ident("action".into())), Box::new(Expr::StrLit("A0".into()))),
            within: None,
            steps: vec![Step::Condition(Condition {
                expr: Expr::Eq(Box::new(Expr::Ident("action".into())), Box::new(Expr::StrLit("A1".into()))),
                within: Some((1, 2)),
                steps: vec![Step::Selection(Selection {
                    name: Some("funnel".into()),
                    dimensions: vec![],
                    fields: vec![Field { name: "count".into(), expr: FieldExpr::Count }],
                })],
            })],
        })];
        let mut interp = Interpreter::new(&table, steps).unwrap();
        interp.execute_object(&events);
        let json = interp.into_tree().to_json();
        assert_eq!(json, serde_json::json!({"funnel": {"count": 2}}));
    }

    #[test]
    fn within_window_never_crosses_a_session_boundary() {
        // A0 then A1 one event later, but a session boundary falls
        // between them (eos asserted on the A0 event): the funnel must
        // not match across it, matching spec.md §8 scenario 4's
        // sessionized funnel.
        let table = table();
        let mut events = vec![event(&table, 0, "A0"), event(&table, 7201, "A1")];
        events[0].eos = true;
        let steps = vec![Step::SessionLoop(SessionLoop {
            steps: vec![Step::Condition(Condition {
                expr: Expr::Eq(Box::new(Expr::Ident("action".into())), Box::new(Expr::StrLit("A0".into()))),
                within: None,
                steps: vec![Step::Condition(Condition {
                    expr: Expr::Eq(Box::new(Expr::Ident("action".into())), Box::new(Expr::StrLit("A1".into()))),
                    within: Some((1, 1)),
                    steps: vec![Step::Selection(Selection {
                        name: Some("funnel".into()),
                        dimensions: vec![],
                        fields: vec![Field { name: "count".into(), expr: FieldExpr::Count }],
                    })],
                })],
            })],
        })];
        let mut interp = Interpreter::new(&table, steps).unwrap();
        interp.execute_object(&events);
        let json = interp.into_tree().to_json();
        assert_eq!(json, serde_json::json!({}));
    }
}
