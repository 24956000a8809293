//! Test fixtures: entity metadata and seed data.
//!
//! Tasks inherit `deleted` and `createdAt` from `Auditable`, embed a
//! `Details` object, and relate to users through the to-many `owners` and
//! to-one `assignee` relations.

use serde_json::{Value, json};

use trawl_search::metadata::{EntityDescriptor, FieldType, MetadataRegistry};
use trawl_search::types::EntityRecord;

/// Alice's user id.
pub const ALICE: &str = "0b6f8f4e-2d7a-4c1e-9a51-3f1d2a7c8e01";

/// Bob's user id.
pub const BOB: &str = "5c2e7a10-8b3d-4f6a-b1c9-7e4d9f2a6b02";

/// Story points of `t6`, just above 2^53; `t4` holds the integer below it.
pub const BIG_POINTS: i64 = 9_007_199_254_740_993;

/// Metadata for every fixture entity.
pub fn registry() -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    let entities = [
        EntityDescriptor::new("Auditable")
            .field("deleted", FieldType::Boolean)
            .field("createdAt", FieldType::DateTime),
        EntityDescriptor::new("User")
            .field("id", FieldType::Uuid)
            .field("name", FieldType::Text),
        EntityDescriptor::new("Details")
            .field("category", FieldType::Text)
            .field("points", FieldType::Long),
        EntityDescriptor::new("Task")
            .with_superclass("Auditable")
            .field("id", FieldType::Text)
            .field("title", FieldType::Text)
            .field("priority", FieldType::Integer)
            .field("estimate", FieldType::Double)
            .field("budget", FieldType::Decimal)
            .field(
                "status",
                FieldType::Enum {
                    constants: vec!["OPEN".into(), "IN_PROGRESS".into(), "DONE".into()],
                },
            )
            .field("dueDate", FieldType::Date)
            .field(
                "details",
                FieldType::Embedded {
                    type_name: "Details".into(),
                },
            )
            .field(
                "owners",
                FieldType::Relation {
                    target: "User".into(),
                    many: true,
                },
            )
            .field(
                "assignee",
                FieldType::Relation {
                    target: "User".into(),
                    many: false,
                },
            ),
        EntityDescriptor::new("LogEntry")
            .field("id", FieldType::Text)
            .field("logLevel", FieldType::Text)
            .field("methodName", FieldType::Text)
            .field("className", FieldType::Text),
    ];
    for entity in entities {
        registry.register(entity).expect("fixture metadata is valid");
    }
    registry
}

fn user(id: &str, name: &str) -> Value {
    json!({"id": id, "name": name})
}

/// Six tasks. `t3` has no `deleted` or `dueDate`, `t4` is deleted and `t6`
/// has no estimate, budget or assignee.
pub fn tasks() -> Vec<EntityRecord> {
    let documents = [
        json!({
            "id": "t1", "title": "Quarterly report", "priority": 5, "estimate": 3.5, "budget": 1200.5,
            "status": "OPEN", "dueDate": "2024-05-10", "createdAt": "2024-01-05T09:00:00",
            "deleted": false, "details": {"category": "ops", "points": 8},
            "owners": [user(ALICE, "Alice")], "assignee": user(ALICE, "Alice")
        }),
        json!({
            "id": "t2", "title": "Fix login bug", "priority": 3, "estimate": 1.0, "budget": 99.99,
            "status": "IN_PROGRESS", "dueDate": "2024-07-01", "createdAt": "2024-02-10T12:30:00",
            "deleted": false, "details": {"category": "eng", "points": 3},
            "owners": [user(ALICE, "Alice"), user(BOB, "Bob")], "assignee": user(BOB, "Bob")
        }),
        json!({
            "id": "t3", "title": "Team offsite", "priority": 1, "estimate": 8.0, "budget": 250,
            "status": "OPEN", "createdAt": "2024-03-01T08:00:00",
            "details": {"category": "ops", "points": 2},
            "owners": [user(BOB, "Bob")]
        }),
        json!({
            "id": "t4", "title": "Report archive cleanup", "priority": 2, "estimate": 0.5, "budget": 0.1,
            "status": "DONE", "dueDate": "2024-04-15", "createdAt": "2023-12-20T17:45:00",
            "deleted": true, "details": {"category": "eng", "points": BIG_POINTS - 1},
            "owners": [user(ALICE, "Alice")], "assignee": user(ALICE, "Alice")
        }),
        json!({
            "id": "t5", "title": "Budget review", "priority": 4, "estimate": 2.0, "budget": 5000,
            "status": "DONE", "dueDate": "2024-06-01", "createdAt": "2024-04-01T10:00:00",
            "deleted": false, "details": {"category": "finance", "points": 1},
            "owners": [], "assignee": user(BOB, "Bob")
        }),
        json!({
            "id": "t6", "title": "Hire contractor", "priority": 2,
            "status": "OPEN", "dueDate": "2024-08-20", "createdAt": "2024-05-15T14:00:00",
            "deleted": false, "details": {"category": "eng", "points": BIG_POINTS},
            "owners": [user(BOB, "Bob")]
        }),
    ];
    documents
        .into_iter()
        .map(|doc| EntityRecord::from_document("Task", doc).expect("fixture has an id"))
        .collect()
}

/// Six log entries; four match
/// `logLevel='ERROR' | (methodName='translate' & className!='Main')`.
pub fn log_entries() -> Vec<EntityRecord> {
    [
        ("l1", "ERROR", "translate", "Main"),
        ("l2", "ERROR", "translate", "Parser"),
        ("l3", "INFO", "translate", "Parser"),
        ("l4", "ERROR", "compile", "Main"),
        ("l5", "WARN", "compile", "Lexer"),
        ("l6", "INFO", "translate", "Main"),
    ]
    .into_iter()
    .map(|(id, level, method, class)| {
        EntityRecord::new(
            "LogEntry",
            id,
            json!({"id": id, "logLevel": level, "methodName": method, "className": class}),
        )
    })
    .collect()
}
