//! Property-based tests for model types.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::model::{Object, Subject};

    /// Strategy to generate valid subjects in type:id format
    fn concrete_subject_strategy() -> impl Strategy<Value = String> {
        ("[a-z]{1,10}", "[a-z0-9]{1,20}").prop_map(|(t, id)| format!("{t}:{id}"))
    }

    /// Strategy to generate valid userset references in type:id#relation format
    fn userset_reference_strategy() -> impl Strategy<Value = String> {
        ("[a-z]{1,10}", "[a-z0-9]{1,10}", "[a-z]{1,10}")
            .prop_map(|(t, id, rel)| format!("{t}:{id}#{rel}"))
    }

    proptest! {
        #[test]
        fn test_concrete_subject_display_matches_input(subject in concrete_subject_strategy()) {
            let parsed = Subject::parse(&subject);
            prop_assert!(parsed.is_ok(), "Failed for subject: {}", subject);
            let parsed = parsed.unwrap();
            prop_assert!(parsed.relation.is_none());
            prop_assert_eq!(parsed.to_string(), subject);
        }

        #[test]
        fn test_userset_reference_keeps_relation(subject in userset_reference_strategy()) {
            let parsed = Subject::parse(&subject);
            prop_assert!(parsed.is_ok(), "Failed for userset: {}", subject);
            let parsed = parsed.unwrap();
            prop_assert!(parsed.relation.is_some());
            prop_assert!(!parsed.is_wildcard());
        }

        #[test]
        fn test_subject_without_colon_is_invalid(s in "[a-z]{1,20}") {
            prop_assert!(Subject::parse(&s).is_err(), "Should reject: {}", s);
        }

        #[test]
        fn test_object_parse_display(
            obj_type in "[a-z]{1,10}",
            obj_id in "[a-z0-9]{1,10}"
        ) {
            let input = format!("{obj_type}:{obj_id}");
            let parsed = Object::parse(&input);
            prop_assert!(parsed.is_ok());
            prop_assert_eq!(parsed.unwrap().to_string(), input);
        }
    }
}
