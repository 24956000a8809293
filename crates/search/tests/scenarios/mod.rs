//! Search scenarios shared by every backend.
//!
//! Each scenario takes a seeded [`TestContext`] and is instantiated per
//! backend with [`scenario_tests!`].

use serde_json::json;
use uuid::Uuid;

use trawl_search::types::{
    DELETED_FALSE_CRITERIA_GROUP, FINAL_GROUP, LogicalOperator, SearchOperation, SearchRequest,
    SortDirection,
};
use trawl_search::{RequestScope, SearchConfig, SearchError};

use crate::common::*;

/// Generates one `#[test]` per scenario for `$backend`.
macro_rules! scenario_tests {
    ($backend:ty; $($name:ident),* $(,)?) => {
        $(
            #[test]
            fn $name() {
                let ctx = crate::common::TestContext::<$backend>::seeded();
                crate::scenarios::$name(&ctx);
            }
        )*
    };
}

fn strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn user(id: &str) -> Uuid {
    Uuid::parse_str(id).expect("fixture uuid")
}

// ============================================================================
// Request Model
// ============================================================================

pub fn empty_request_returns_everything<B: TestableBackend>(ctx: &TestContext<B>) {
    let response = ctx
        .search(&SearchRequest::new(), &ctx.service.options("Task"))
        .unwrap();

    assert_eq!(response.total_count, 6);
    assert_eq!(ids(&response), strings(&["t1", "t2", "t3", "t4", "t5", "t6"]));
}

pub fn standalone_group_is_anded_with_tree<B: TestableBackend>(ctx: &TestContext<B>) {
    let mut request = ctx.parse("status = 'OPEN' | status = 'DONE'", "Task");
    request.add_criterion(
        "CATEGORY",
        LogicalOperator::And,
        "Task",
        "details.category",
        SearchOperation::Equals,
        "eng",
    );

    let response = ctx.search(&request, &ctx.service.options("Task")).unwrap();
    assert_eq!(sorted_ids(&response), strings(&["t4", "t6"]));
}

pub fn comma_separated_in_value<B: TestableBackend>(ctx: &TestContext<B>) {
    let mut request = SearchRequest::new();
    request.add_criterion(
        "PRIORITY",
        LogicalOperator::And,
        "Task",
        "priority",
        SearchOperation::In,
        "1, 2,3",
    );

    let response = ctx.search(&request, &ctx.service.options("Task")).unwrap();
    assert_eq!(sorted_ids(&response), strings(&["t2", "t3", "t4", "t6"]));
}

pub fn merged_group_without_root_fails<B: TestableBackend>(ctx: &TestContext<B>) {
    let mut request = SearchRequest::new();
    request.add_criterion(
        "G1",
        LogicalOperator::And,
        "Task",
        "priority",
        SearchOperation::Equals,
        5,
    );
    request.merge_group("G2", LogicalOperator::Or, ["G1"]);

    let result = ctx.search(&request, &ctx.service.options("Task"));
    assert!(matches!(result, Err(SearchError::GroupResolution { .. })));
    assert_eq!(ctx.storage_calls(), 0);
}

pub fn find_by_id_returns_single_match<B: TestableBackend>(ctx: &TestContext<B>) {
    let record = ctx.service.find_by_id("Task", "t3").unwrap().unwrap();
    assert_eq!(record.data["title"], "Team offsite");

    assert!(ctx.service.find_by_id("Task", "missing").unwrap().is_none());
}

pub fn count_skips_row_fetch<B: TestableBackend>(ctx: &TestContext<B>) {
    let request = ctx.parse("status = 'OPEN'", "Task");
    let fetches = ctx.service.backend().fetches();

    assert_eq!(ctx.service.count(&request, "Task").unwrap(), 3);
    assert_eq!(ctx.service.backend().fetches(), fetches);
}

// ============================================================================
// Expression Parser
// ============================================================================

pub fn and_expression<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(
        ctx.query_ids("logLevel='ERROR' & methodName='translate'", "LogEntry"),
        strings(&["l1", "l2"])
    );
    assert_eq!(
        ctx.query_ids("status = 'OPEN' & priority >= 2", "Task"),
        strings(&["t1", "t6"])
    );
}

pub fn nested_expression<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(
        ctx.query_ids(
            "logLevel='ERROR' | (methodName='translate' & className!='Main')",
            "LogEntry"
        ),
        strings(&["l1", "l2", "l3", "l4"])
    );
    assert_eq!(
        ctx.query_ids(
            "(status = 'DONE' | priority > 4) & details.category = 'eng'",
            "Task"
        ),
        strings(&["t4"])
    );
}

pub fn mixed_operators_first_wins<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(
        ctx.query_ids(
            "status = 'DONE' | priority > 4 & details.category = 'eng'",
            "Task"
        ),
        strings(&["t1", "t2", "t4", "t5", "t6"])
    );
}

pub fn mixed_operators_rejected_when_configured<B: TestableBackend>(_ctx: &TestContext<B>) {
    let strict = TestContext::<B>::with_config(SearchConfig {
        reject_mixed_operators: true,
        ..SearchConfig::default()
    });

    let result = strict
        .service
        .parser()
        .parse("status = 'DONE' | priority > 4 & priority < 2", "Task");
    let err = result.unwrap_err();
    assert!(matches!(err, SearchError::Syntax(_)));
    assert!(err.to_string().contains("Mixed"));
}

pub fn in_and_not_in_lists<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(
        ctx.query_ids("status IN ('OPEN', 'DONE')", "Task"),
        strings(&["t1", "t3", "t4", "t5", "t6"])
    );
    assert_eq!(
        ctx.query_ids("priority NOT IN (2, 5)", "Task"),
        strings(&["t2", "t3", "t5"])
    );
}

// ============================================================================
// Attribute & Type Resolution
// ============================================================================

pub fn unknown_attribute_fails_before_storage<B: TestableBackend>(ctx: &TestContext<B>) {
    let request = ctx.parse("colour = 'red'", "Task");

    let result = ctx.search(&request, &ctx.service.options("Task"));
    assert!(matches!(result, Err(SearchError::AttributeResolution { .. })));
    assert_eq!(ctx.storage_calls(), 0);
}

pub fn coercion_failure_fails_before_storage<B: TestableBackend>(ctx: &TestContext<B>) {
    let request = ctx.parse("priority = 'high'", "Task");

    let result = ctx.search(&request, &ctx.service.options("Task"));
    match result {
        Err(SearchError::TypeCoercion { field, value, .. }) => {
            assert_eq!(field, "priority");
            assert_eq!(value, "high");
        }
        other => panic!("Expected TypeCoercion, got {:?}", other),
    }
    assert_eq!(ctx.storage_calls(), 0);
}

pub fn criterion_for_other_entity_is_rejected<B: TestableBackend>(ctx: &TestContext<B>) {
    let request = ctx.parse("logLevel = 'ERROR'", "LogEntry");

    let result = ctx.search(&request, &ctx.service.options("Task"));
    assert!(matches!(result, Err(SearchError::AttributeResolution { .. })));
}

pub fn unknown_enum_constant_matches_nothing<B: TestableBackend>(ctx: &TestContext<B>) {
    assert!(ctx.query_ids("status = 'ARCHIVED'", "Task").is_empty());
    assert!(ctx.query_ids("status != 'ARCHIVED'", "Task").is_empty());
}

pub fn embedded_paths<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(
        ctx.query_ids("details.points > 5", "Task"),
        strings(&["t1", "t4", "t6"])
    );
    assert_eq!(
        ctx.query_ids("Task.details.category = 'ops'", "Task"),
        strings(&["t1", "t3"])
    );
}

pub fn inherited_fields<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(ctx.query_ids("deleted = true", "Task"), strings(&["t4"]));
    assert_eq!(
        ctx.query_ids("deleted = false", "Task"),
        strings(&["t1", "t2", "t5", "t6"])
    );
}

pub fn to_many_relation<B: TestableBackend>(ctx: &TestContext<B>) {
    let query = format!("[owners].id = '{}'", ALICE.to_uppercase());
    assert_eq!(ctx.query_ids(&query, "Task"), strings(&["t1", "t2", "t4"]));

    assert_eq!(
        ctx.query_ids("[owners].name = 'Bob' & [owners].name = 'Alice'", "Task"),
        strings(&["t2"])
    );
    assert_eq!(
        ctx.query_ids("[owners].name IN ('Bob')", "Task"),
        strings(&["t2", "t3", "t6"])
    );
}

pub fn to_one_relation<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(
        ctx.query_ids("[assignee].name = 'Bob'", "Task"),
        strings(&["t2", "t5"])
    );
}

// ============================================================================
// Query Evaluation
// ============================================================================

pub fn like_is_case_insensitive<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(ctx.query_ids("title ~ 'REPORT'", "Task"), strings(&["t1", "t4"]));
    assert_eq!(ctx.query_ids("title ~ 'fix%'", "Task"), strings(&["t2"]));
    assert_eq!(
        ctx.query_ids("title !~ 'report'", "Task"),
        strings(&["t2", "t3", "t5", "t6"])
    );
}

pub fn null_checks<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(ctx.query_ids("dueDate IS NULL", "Task"), strings(&["t3"]));
    assert_eq!(
        ctx.query_ids("estimate IS NOT NULL", "Task"),
        strings(&["t1", "t2", "t3", "t4", "t5"])
    );
    // a missing value never satisfies a comparison
    assert_eq!(
        ctx.query_ids("deleted != true", "Task"),
        strings(&["t1", "t2", "t5", "t6"])
    );
}

pub fn numeric_comparisons<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(
        ctx.query_ids("estimate <= 2.0", "Task"),
        strings(&["t2", "t4", "t5"])
    );
    assert_eq!(ctx.query_ids("priority < 2", "Task"), strings(&["t3"]));
}

pub fn decimal_comparisons<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(ctx.query_ids("budget = '1200.50'", "Task"), strings(&["t1"]));
    assert_eq!(ctx.query_ids("budget < 100", "Task"), strings(&["t2", "t4"]));
    assert_eq!(
        ctx.query_ids("budget IN (250, 5000)", "Task"),
        strings(&["t3", "t5"])
    );

    let options = ctx
        .service
        .options("Task")
        .with_sort("budget", SortDirection::Desc);
    let response = ctx.search(&SearchRequest::new(), &options).unwrap();
    assert_eq!(ids(&response), strings(&["t5", "t1", "t3", "t2", "t4", "t6"]));
}

pub fn large_long_values_stay_exact<B: TestableBackend>(ctx: &TestContext<B>) {
    let below = BIG_POINTS - 1;
    assert_eq!(
        ctx.query_ids(&format!("details.points = {}", below), "Task"),
        strings(&["t4"])
    );
    assert_eq!(
        ctx.query_ids(&format!("details.points < {}", BIG_POINTS), "Task"),
        strings(&["t1", "t2", "t3", "t4", "t5"])
    );
    assert_eq!(
        ctx.query_ids(&format!("details.points IN ({}, 8)", BIG_POINTS), "Task"),
        strings(&["t1", "t6"])
    );

    let options = ctx
        .service
        .options("Task")
        .with_sort("details.points", SortDirection::Desc)
        .with_page_size(2);
    let response = ctx.search(&SearchRequest::new(), &options).unwrap();
    assert_eq!(ids(&response), strings(&["t6", "t4"]));
}

pub fn date_comparisons<B: TestableBackend>(ctx: &TestContext<B>) {
    assert_eq!(
        ctx.query_ids("dueDate < '2024-06-01'", "Task"),
        strings(&["t1", "t4"])
    );
    assert_eq!(
        ctx.query_ids("dueDate <= '2024-06-01'", "Task"),
        strings(&["t1", "t4", "t5"])
    );
    assert_eq!(
        ctx.query_ids("createdAt >= '2024-03-01'", "Task"),
        strings(&["t3", "t5", "t6"])
    );
    assert_eq!(
        ctx.query_ids("createdAt < '2024-01-05T09:00:00'", "Task"),
        strings(&["t4"])
    );
}

pub fn owner_scope<B: TestableBackend>(ctx: &TestContext<B>) {
    let options = ctx.service.options("Task");
    let query = "status = 'OPEN' | status = 'DONE'";

    let alice = ctx
        .service
        .search_scoped(ctx.parse(query, "Task"), &options, &RequestScope::for_user(user(ALICE)))
        .unwrap();
    assert_eq!(sorted_ids(&alice), strings(&["t1"]));

    let bob = ctx
        .service
        .search_scoped(ctx.parse(query, "Task"), &options, &RequestScope::for_user(user(BOB)))
        .unwrap();
    assert_eq!(sorted_ids(&bob), strings(&["t3", "t6"]));
}

pub fn owner_scope_can_be_disabled<B: TestableBackend>(ctx: &TestContext<B>) {
    let mut request = ctx.parse("status = 'OPEN' | status = 'DONE'", "Task");
    request.set_add_owner_criterion(false);

    let response = ctx
        .service
        .search_scoped(
            request,
            &ctx.service.options("Task"),
            &RequestScope::for_user(user(ALICE)),
        )
        .unwrap();
    assert_eq!(sorted_ids(&response), strings(&["t1", "t3", "t5", "t6"]));
}

pub fn scope_skips_entities_without_owners<B: TestableBackend>(ctx: &TestContext<B>) {
    let response = ctx
        .service
        .search_scoped(
            ctx.parse("logLevel = 'INFO'", "LogEntry"),
            &ctx.service.options("LogEntry"),
            &RequestScope::for_user(user(ALICE)),
        )
        .unwrap();
    assert_eq!(sorted_ids(&response), strings(&["l3", "l6"]));
}

pub fn reserved_group_reference_replaces_scope<B: TestableBackend>(ctx: &TestContext<B>) {
    let options = ctx.service.options("Task");
    let scope = RequestScope::unrestricted();

    let mut hidden = SearchRequest::new();
    hidden.add_criterion(
        "G",
        LogicalOperator::And,
        "Task",
        "deleted",
        SearchOperation::Equals,
        true,
    );
    let response = ctx.service.search_scoped(hidden.clone(), &options, &scope).unwrap();
    assert!(response.rows.is_empty());

    let mut widened = hidden;
    widened.merge_group(
        FINAL_GROUP,
        LogicalOperator::Or,
        [DELETED_FALSE_CRITERIA_GROUP, "G"],
    );
    let response = ctx.service.search_scoped(widened, &options, &scope).unwrap();
    assert_eq!(
        sorted_ids(&response),
        strings(&["t1", "t2", "t3", "t4", "t5", "t6"])
    );
}

pub fn sort_and_paginate<B: TestableBackend>(ctx: &TestContext<B>) {
    let request = SearchRequest::new();
    let options = ctx
        .service
        .options("Task")
        .with_sort("priority", SortDirection::Desc)
        .with_page_size(3);

    let first = ctx.search(&request, &options).unwrap();
    assert_eq!(ids(&first), strings(&["t1", "t5", "t2"]));
    assert_eq!(first.total_count, 6);
    assert_eq!(first.total_pages(), 2);
    assert!(first.has_next());

    // ties keep insertion order
    let second = ctx.search(&request, &options.clone().with_page(1)).unwrap();
    assert_eq!(ids(&second), strings(&["t4", "t6", "t3"]));
    assert!(!second.has_next());
}

pub fn missing_values_sort_first<B: TestableBackend>(ctx: &TestContext<B>) {
    let options = ctx
        .service
        .options("Task")
        .with_sort("estimate", SortDirection::Asc);

    let response = ctx.search(&SearchRequest::new(), &options).unwrap();
    assert_eq!(ids(&response), strings(&["t6", "t4", "t2", "t5", "t1", "t3"]));
}

pub fn pages_agree_with_count<B: TestableBackend>(ctx: &TestContext<B>) {
    let request = ctx.parse("priority >= 2", "Task");
    let mut seen = Vec::new();

    for page in 0..3 {
        let options = ctx.service.options("Task").with_page_size(2).with_page(page);
        let response = ctx.search(&request, &options).unwrap();
        assert_eq!(response.total_count, 5);
        assert_eq!(response.current_found(), if page < 2 { 2 } else { 1 });
        seen.extend(ids(&response));
    }

    seen.sort();
    assert_eq!(seen, strings(&["t1", "t2", "t4", "t5", "t6"]));
}

pub fn projection_returns_requested_fields<B: TestableBackend>(ctx: &TestContext<B>) {
    let request = ctx.parse("priority = 5", "Task");
    let options = ctx
        .service
        .options("Task")
        .with_projection(["title", "details.points"]);

    let response = ctx.search(&request, &options).unwrap();
    assert_eq!(response.rows.len(), 1);
    assert_eq!(
        response.rows[0].data,
        json!({"id": "t1", "title": "Quarterly report", "details": {"points": 8}})
    );
}

pub fn invalid_options_fail_before_storage<B: TestableBackend>(ctx: &TestContext<B>) {
    let request = SearchRequest::new();

    let zero_page = ctx.service.options("Task").with_page_size(0);
    assert!(matches!(
        ctx.search(&request, &zero_page),
        Err(SearchError::Configuration { .. })
    ));

    let relation_sort = ctx
        .service
        .options("Task")
        .with_sort("[owners].name", SortDirection::Asc);
    assert!(matches!(
        ctx.search(&request, &relation_sort),
        Err(SearchError::Configuration { .. })
    ));

    let unknown_sort = ctx
        .service
        .options("Task")
        .with_sort("colour", SortDirection::Asc);
    assert!(matches!(
        ctx.search(&request, &unknown_sort),
        Err(SearchError::AttributeResolution { .. })
    ));

    assert_eq!(ctx.storage_calls(), 0);
}
