//! Variable search used while authoring an action.

use crate::types::{Variable, VariableType};

/// Variables whose name contains `query` (case-insensitive), optionally
/// restricted to `required`. Store order is preserved; an empty query
/// matches every name.
pub fn filter_variables(
    variables: &[Variable],
    query: &str,
    required: Option<VariableType>,
) -> Vec<Variable> {
    let needle = query.to_lowercase();
    variables
        .iter()
        .filter(|v| required.map_or(true, |kind| v.kind() == kind))
        .filter(|v| v.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn vars() -> Vec<Variable> {
        vec![
            Variable::new("Kitchen_Temp", Value::Number(21.0)),
            Variable::new("kitchen_light", Value::Boolean(true)),
            Variable::new("hall_temp", Value::Number(18.0)),
            Variable::new("Doorbell", Value::Trigger(String::new())),
            Variable::new("temp_label", Value::String("warm".into())),
        ]
    }

    fn names(found: &[Variable]) -> Vec<&str> {
        found.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn typed_query_keeps_store_order() {
        let found = filter_variables(&vars(), "TEMP", Some(VariableType::Number));
        assert_eq!(names(&found), ["Kitchen_Temp", "hall_temp"]);
    }

    #[test]
    fn untyped_query_matches_all_types() {
        let found = filter_variables(&vars(), "temp", None);
        assert_eq!(names(&found), ["Kitchen_Temp", "hall_temp", "temp_label"]);
    }

    #[test]
    fn empty_query_lists_whole_type() {
        let found = filter_variables(&vars(), "", Some(VariableType::Trigger));
        assert_eq!(names(&found), ["Doorbell"]);
        assert_eq!(filter_variables(&vars(), "", None).len(), 5);
    }

    #[test]
    fn no_match_is_empty() {
        assert!(filter_variables(&vars(), "garage", None).is_empty());
        assert!(filter_variables(&vars(), "label", Some(VariableType::Number)).is_empty());
        assert!(filter_variables(&[], "x", None).is_empty());
    }
}
