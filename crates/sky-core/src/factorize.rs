use crate::step::{Selection, Step};

///
/// factorize
///
/// Merges sibling `Selection` steps that share `(name, dimensions)` into a
/// single node with the union of their fields (spec.md §4.3). Only
/// siblings are merged: selections guarded by different conditions
/// accumulate along different execution paths and must stay distinct
/// nodes, so the merge recurses into each condition's nested steps
/// independently rather than flattening the whole tree.
///
pub fn factorize(steps: Vec<Step>) -> Vec<Step> {
    let mut merged: Vec<Step> = Vec::with_capacity(steps.len());
    for step in steps {
        match step {
            Step::Selection(selection) => merge_selection(&mut merged, selection),
            Step::Condition(mut condition) => {
                condition.steps = factorize(condition.steps);
                merged.push(Step::Condition(condition));
            }
            Step::SessionLoop(mut loop_) => {
                loop_.steps = factorize(loop_.steps);
                merged.push(Step::SessionLoop(loop_));
            }
        }
    }
    merged
}

fn merge_selection(merged: &mut Vec<Step>, selection: Selection) {
    let existing = merged.iter_mut().find_map(|step| match step {
        Step::Selection(existing) if existing.name == selection.name && existing.dimensions == selection.dimensions => {
            Some(existing)
        }
        _ => None,
    });

    match existing {
        Some(existing) => {
            for field in selection.fields {
                if !existing.fields.iter().any(|f| f.name == field.name) {
                    existing.fields.push(field);
                }
            }
        }
        None => merged.push(Step::Selection(selection)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{Field, FieldExpr};

    fn selection(name: &str, dims: &[&str], fields: &[&str]) -> Step {
        Step::Selection(Selection {
            name: Some(name.into()),
            dimensions: dims.iter().map(|d| d.to_string()).collect(),
            fields: fields
                .iter()
                .map(|f| Field { name: f.to_string(), expr: FieldExpr::Count })
                .collect(),
        })
    }

    #[test]
    fn merges_selections_sharing_name_and_dimensions() {
        let steps = vec![selection("all", &["action"], &["a"]), selection("all", &["action"], &["b"])];
        let result = factorize(steps);
        assert_eq!(result.len(), 1);
        let Step::Selection(s) = &result[0] else { panic!("expected selection") };
        assert_eq!(s.fields.len(), 2);
    }

    #[test]
    fn keeps_selections_with_different_dimensions_separate() {
        let steps = vec![selection("all", &["action"], &["a"]), selection("all", &["other"], &["b"])];
        let result = factorize(steps);
        assert_eq!(result.len(), 2);
    }
}
