//! Property-based tests for membridge
//!
//! These tests verify invariants that must hold for all inputs:
//! - Argument validation never panics
//! - Bounded parameters accept exactly their declared range
//! - Enumerated parameters accept exactly their declared values
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;
use serde_json::json;

use membridge::mcp::{find_tool, validate_args};
use membridge::types::{TaskPriority, TaskStatus};

mod importance_bounds {
    use super::*;

    proptest! {
        /// Invariant: importance is accepted iff it lies in [1, 10], and when
        /// accepted it is passed through unchanged
        #[test]
        fn accepted_iff_in_range(importance in i64::MIN / 2..i64::MAX / 2) {
            let tool = find_tool("store_memory").unwrap();
            let result = validate_args(tool, &json!({
                "content": "x",
                "importance": importance,
            }));
            if (1..=10).contains(&importance) {
                let args = result.unwrap();
                prop_assert_eq!(args["importance"].as_i64(), Some(importance));
            } else {
                prop_assert!(result.is_err());
            }
        }

        /// Invariant: the same bounds hold for update_memory_importance
        #[test]
        fn update_bounds_match(importance in -100i64..120) {
            let tool = find_tool("update_memory_importance").unwrap();
            let result = validate_args(tool, &json!({
                "memoryId": "m1",
                "importance": importance,
            }));
            prop_assert_eq!(result.is_ok(), (1..=10).contains(&importance));
        }
    }
}

mod search_limits {
    use super::*;

    proptest! {
        /// Invariant: limit is accepted iff it lies in [1, 100]
        #[test]
        fn limit_bounds(limit in -10i64..200) {
            let tool = find_tool("search_memory").unwrap();
            let result = validate_args(tool, &json!({"query": "q", "limit": limit}));
            prop_assert_eq!(result.is_ok(), (1..=100).contains(&limit));
        }

        /// Invariant: any non-blank query validates and defaults limit to 10
        #[test]
        fn query_defaults(query in "\\PC{1,50}") {
            prop_assume!(!query.trim().is_empty());
            let tool = find_tool("search_memory").unwrap();
            let args = validate_args(tool, &json!({"query": query})).unwrap();
            prop_assert_eq!(args["limit"].as_i64(), Some(10));
        }
    }
}

mod enumerations {
    use super::*;

    proptest! {
        /// Invariant: update_task_status accepts exactly the four statuses,
        /// and never panics on arbitrary strings
        #[test]
        fn status_enum_is_closed(status in "\\PC{0,30}") {
            let tool = find_tool("update_task_status").unwrap();
            let result = validate_args(tool, &json!({
                "taskId": "t1",
                "status": status,
            }));
            let legal = ["pending", "in_progress", "completed", "cancelled"]
                .contains(&status.as_str());
            prop_assert_eq!(result.is_ok(), legal);
        }

        /// Invariant: a string validates as a status iff it parses as one
        #[test]
        fn status_parse_agrees_with_schema(status in "\\PC{0,30}") {
            let tool = find_tool("update_task_status").unwrap();
            let schema_ok = validate_args(tool, &json!({
                "taskId": "t1",
                "status": status,
            }))
            .is_ok();
            prop_assert_eq!(schema_ok, status.parse::<TaskStatus>().is_ok());
        }

        /// Invariant: same closure property for priorities on create_task
        #[test]
        fn priority_parse_agrees_with_schema(priority in "\\PC{0,30}") {
            let tool = find_tool("create_task").unwrap();
            let schema_ok = validate_args(tool, &json!({
                "title": "t",
                "priority": priority,
            }))
            .is_ok();
            prop_assert_eq!(schema_ok, priority.parse::<TaskPriority>().is_ok());
        }
    }
}

mod robustness {
    use super::*;

    proptest! {
        /// Invariant: validation never panics, whatever JSON scalar arrives
        /// in place of the argument object
        #[test]
        fn scalar_args_never_panic(n in any::<i64>()) {
            for tool in membridge::mcp::TOOLS {
                let _ = validate_args(tool, &json!(n));
                let _ = validate_args(tool, &json!(n.to_string()));
            }
        }

        /// Invariant: unknown keys are ignored, not errors
        #[test]
        fn unknown_keys_ignored(key in "[a-zA-Z_]{1,20}") {
            let tool = find_tool("list_projects").unwrap();
            let result = validate_args(tool, &json!({ key.clone(): "anything" }));
            prop_assert!(result.is_ok());
        }
    }
}
