use serde_json::Value as Json;

use crate::error::CoreError;
use crate::parser::{parse_expr, parse_field_expr};
use crate::step::{Condition, Field, Selection, SessionLoop, Step};

///
/// Query
///
/// The decoded form of a query request (spec.md §4.3, §6). Steps carry
/// expression strings already parsed into [`crate::expr::Expr`]; the JSON
/// wire shape is deliberately close to the worked examples of spec.md §8.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// Not part of spec.md §3's literal `{prefix?, sessionIdleTime?, steps}`
    /// shape: a real multi-table engine needs some way to name the target
    /// table, and the worked scenarios describe it as surrounding context
    /// ("Table `foo`") rather than as a query field, so this is recorded
    /// as a deliberate extension (see DESIGN.md) rather than a silent
    /// divergence.
    pub table: String,
    pub prefix: Option<String>,
    pub session_idle_time: Option<i64>,
    pub steps: Vec<Step>,
}

impl Query {
    /// Parses a query from its JSON wire form. This is hand-written rather
    /// than `#[derive(Deserialize)]` because step expressions are strings
    /// in their own little language, not JSON structures.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let root: Json = serde_json::from_str(text).map_err(|e| CoreError::BadQuery(format!("invalid query json: {e}")))?;
        let obj = root
            .as_object()
            .ok_or_else(|| CoreError::BadQuery("query must be a json object".into()))?;

        let table = obj
            .get("table")
            .and_then(Json::as_str)
            .ok_or_else(|| CoreError::BadQuery("query is missing string field 'table'".into()))?
            .to_string();

        let prefix = match obj.get("prefix") {
            None | Some(Json::Null) => None,
            Some(v) => Some(
                v.as_str()
                    .ok_or_else(|| CoreError::BadQuery("'prefix' must be a string".into()))?
                    .to_string(),
            ),
        };

        let session_idle_time = match obj.get("sessionIdleTime") {
            None | Some(Json::Null) => None,
            Some(v) => Some(
                v.as_i64()
                    .ok_or_else(|| CoreError::BadQuery("'sessionIdleTime' must be an integer".into()))?,
            ),
        };

        let steps_json = obj
            .get("steps")
            .and_then(Json::as_array)
            .ok_or_else(|| CoreError::BadQuery("query is missing array field 'steps'".into()))?;
        let mut steps = steps_json.iter().map(parse_step).collect::<Result<Vec<_>, _>>()?;

        // `SessionLoop` is implicit whenever `sessionIdleTime` is set
        // (spec.md §3): the root step list runs session-scoped rather than
        // object-scoped.
        if session_idle_time.is_some() {
            steps = vec![Step::SessionLoop(SessionLoop { steps })];
        }

        Ok(Self { table, prefix, session_idle_time, steps })
    }
}

fn parse_step(json: &Json) -> Result<Step, CoreError> {
    let obj = json
        .as_object()
        .ok_or_else(|| CoreError::BadQuery("step must be a json object".into()))?;
    let kind = obj
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| CoreError::BadQuery("step is missing string field 'type'".into()))?;

    match kind {
        "selection" => Ok(Step::Selection(parse_selection(obj)?)),
        "condition" => Ok(Step::Condition(parse_condition(obj)?)),
        "sessionLoop" => Ok(Step::SessionLoop(parse_session_loop(obj)?)),
        other => Err(CoreError::BadQuery(format!("unknown step type '{other}'"))),
    }
}

fn parse_selection(obj: &serde_json::Map<String, Json>) -> Result<Selection, CoreError> {
    // `name` is optional (spec.md §3): an anonymous Selection's result
    // merges directly into the top-level result instead of sitting under
    // a name key.
    let name = match obj.get("name") {
        None | Some(Json::Null) => None,
        Some(v) => Some(
            v.as_str()
                .ok_or_else(|| CoreError::BadQuery("'name' must be a string".into()))?
                .to_string(),
        ),
    };

    let dimensions = match obj.get("dimensions") {
        None => Vec::new(),
        Some(v) => v
            .as_array()
            .ok_or_else(|| CoreError::BadQuery("'dimensions' must be an array of strings".into()))?
            .iter()
            .map(|d| {
                d.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| CoreError::BadQuery("'dimensions' must be an array of strings".into()))
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    let fields_json = obj
        .get("fields")
        .and_then(Json::as_array)
        .ok_or_else(|| CoreError::BadQuery("selection is missing array field 'fields'".into()))?;
    let mut fields = Vec::with_capacity(fields_json.len());
    for field_json in fields_json {
        let field_obj = field_json
            .as_object()
            .ok_or_else(|| CoreError::BadQuery("each field must be a json object".into()))?;
        let name = field_obj
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(|| CoreError::BadQuery("field is missing string field 'name'".into()))?;
        let expr_str = field_obj
            .get("expression")
            .and_then(Json::as_str)
            .ok_or_else(|| CoreError::BadQuery(format!("field '{name}' is missing string field 'expression'")))?;
        fields.push(Field {
            name: name.to_string(),
            expr: parse_field_expr(expr_str)?,
        });
    }

    Ok(Selection { name, dimensions, fields })
}

fn parse_condition(obj: &serde_json::Map<String, Json>) -> Result<Condition, CoreError> {
    let expr_str = obj
        .get("expression")
        .and_then(Json::as_str)
        .ok_or_else(|| CoreError::BadQuery("condition is missing string field 'expression'".into()))?;
    let expr = parse_expr(expr_str)?;

    let within = match obj.get("within") {
        None | Some(Json::Null) => None,
        Some(v) => {
            let arr = v
                .as_array()
                .ok_or_else(|| CoreError::BadQuery("'within' must be a two-element array [min, max]".into()))?;
            let (Some(min), Some(max)) = (arr.first().and_then(Json::as_u64), arr.get(1).and_then(Json::as_u64)) else {
                return Err(CoreError::BadQuery("'within' must be a two-element array [min, max]".into()));
            };
            Some((min as usize, max as usize))
        }
    };

    let steps_json = obj
        .get("steps")
        .and_then(Json::as_array)
        .ok_or_else(|| CoreError::BadQuery("condition is missing array field 'steps'".into()))?;
    let steps = steps_json.iter().map(parse_step).collect::<Result<Vec<_>, _>>()?;

    Ok(Condition { expr, within, steps })
}

fn parse_session_loop(obj: &serde_json::Map<String, Json>) -> Result<SessionLoop, CoreError> {
    let steps_json = obj
        .get("steps")
        .and_then(Json::as_array)
        .ok_or_else(|| CoreError::BadQuery("sessionLoop is missing array field 'steps'".into()))?;
    let steps = steps_json.iter().map(parse_step).collect::<Result<Vec<_>, _>>()?;
    Ok(SessionLoop { steps })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_count_query() {
        let query = Query::from_json(
            r#"{
                "table": "events",
                "steps": [
                    {"type": "selection", "name": "all", "fields": [{"name": "count", "expression": "count()"}]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(query.table, "events");
        assert_eq!(query.steps.len(), 1);
    }

    #[test]
    fn parses_a_funnel_condition_with_within() {
        let query = Query::from_json(
            r#"{
                "table": "events",
                "steps": [
                    {
                        "type": "condition",
                        "expression": "action == 'A0'",
                        "steps": [
                            {
                                "type": "condition",
                                "expression": "action == 'A1'",
                                "within": [1, 2],
                                "steps": [
                                    {"type": "selection", "name": "funnel", "fields": [{"name": "count", "expression": "count()"}]}
                                ]
                            }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();
        let Step::Condition(outer) = &query.steps[0] else {
            panic!("expected condition step");
        };
        assert!(outer.within.is_none());
        let Step::Condition(inner) = &outer.steps[0] else {
            panic!("expected nested condition step");
        };
        assert_eq!(inner.within, Some((1, 2)));
    }

    #[test]
    fn anonymous_selection_has_no_name() {
        let query = Query::from_json(
            r#"{
                "table": "events",
                "prefix": "001",
                "steps": [
                    {"type": "selection", "dimensions": [], "fields": [{"name": "count", "expression": "count()"}]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(query.prefix.as_deref(), Some("001"));
        let Step::Selection(selection) = &query.steps[0] else {
            panic!("expected selection step");
        };
        assert_eq!(selection.name, None);
    }

    #[test]
    fn session_idle_time_implicitly_wraps_steps_in_a_session_loop() {
        let query = Query::from_json(
            r#"{
                "table": "events",
                "sessionIdleTime": 7200,
                "steps": [
                    {"type": "selection", "name": "all", "fields": [{"name": "count", "expression": "count()"}]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(query.steps.len(), 1);
        assert!(matches!(query.steps[0], Step::SessionLoop(_)));
    }
}
