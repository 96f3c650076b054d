use crate::expr::Expr;

///
/// Step
///
/// A query's step tree (spec.md §4.3): a `Selection` records into the
/// aggregation tree every time it is reached; a `Condition` gates (or,
/// with `within`, searches for) execution of its nested steps.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    Selection(Selection),
    Condition(Condition),
    SessionLoop(SessionLoop),
}

/// A dimension-grouped, field-aggregated accumulation point. `name` is
/// optional (spec.md §3): an anonymous Selection's result merges directly
/// into the top-level result rather than sitting under a name key (spec.md
/// §4.6, §8 scenarios 1-2).
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub name: Option<String>,
    pub dimensions: Vec<String>,
    pub fields: Vec<Field>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub expr: FieldExpr,
}

/// An aggregator field expression (spec.md §4.3).
#[derive(Clone, Debug, PartialEq)]
pub enum FieldExpr {
    Count,
    Sum(String),
    Min(String),
    Max(String),
    Histogram(String),
}

impl FieldExpr {
    /// The property this aggregator reads, if any (`count()` reads none).
    #[must_use]
    pub fn property_name(&self) -> Option<&str> {
        match self {
            Self::Count => None,
            Self::Sum(p) | Self::Min(p) | Self::Max(p) | Self::Histogram(p) => Some(p),
        }
    }
}

///
/// Condition
///
/// Gates its nested `steps` on `expr`. With `within` set, searches the
/// bounded `[min, max]` event-index offset window from the triggering
/// position for the first position where `expr` holds, rather than
/// testing only the current position (spec.md §4.3, funnel semantics).
///

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub expr: Expr,
    pub within: Option<(usize, usize)>,
    pub steps: Vec<Step>,
}

///
/// SessionLoop
///
/// Implicit session-restart frame (spec.md §3, §4.3 point 3): on `eos`, any
/// active `SessionLoop` completes its inner steps at the current position
/// and restarts them fresh at the first event of the next session. Its
/// inner steps otherwise run exactly like a bare, unconditional step list.
///
#[derive(Clone, Debug, PartialEq)]
pub struct SessionLoop {
    pub steps: Vec<Step>,
}
