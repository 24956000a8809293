//! Text filter expressions.
//!
//! # Syntax
//!
//! ```text
//! status = 'OPEN' & (priority >= 3 | [owners].id = 'f1c0...')
//! title ~ report
//! closedAt IS NULL
//! kind NOT IN ('BUG', 'CHORE')
//! ```
//!
//! Conditions are joined with `&` and `|`; parentheses group them. At each
//! nesting level the first operator applies to every term, so mixing `&`
//! and `|` without parentheses does not give `&` precedence.
//!
//! # Request layout
//!
//! [`ExpressionParser::parse`] numbers conditions `C1, C2, ...` depth first.
//! Each condition becomes its own AND group `Gn`, and every parenthesized
//! level becomes a merged group taking the next `Gn` id. When the query has
//! more than one condition the outermost merged group is renamed to
//! [`FINAL_GROUP`].

mod expression;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::error::{QuerySyntaxError, SearchResult};
use crate::metadata::{FieldDescriptor, MetadataProvider};
use crate::types::{Criterion, FINAL_GROUP, LogicalOperator, SearchRequest};

pub use expression::{Condition, Expression};

/// Compiles filter expressions into [`SearchRequest`]s.
#[derive(Debug, Clone, Default)]
pub struct ExpressionParser {
    reject_mixed_operators: bool,
}

/// Outcome of [`ExpressionParser::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryValidation {
    /// False when the query does not parse.
    pub valid: bool,
    /// Non-fatal findings such as unknown fields.
    pub warnings: Vec<String>,
    /// The syntax error, when `valid` is false.
    pub error: Option<String>,
}

/// One row of an operator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperatorInfo {
    /// Operator as written in a query.
    pub symbol: &'static str,
    /// What it does.
    pub description: &'static str,
    /// A query using it.
    pub example: &'static str,
}

const COMPARISON_OPERATORS: &[OperatorInfo] = &[
    OperatorInfo {
        symbol: "=",
        description: "Equals",
        example: "status = 'OPEN'",
    },
    OperatorInfo {
        symbol: "!=",
        description: "Not equals",
        example: "status != 'CLOSED'",
    },
    OperatorInfo {
        symbol: "~",
        description: "Contains (LIKE)",
        example: "title ~ 'report'",
    },
    OperatorInfo {
        symbol: "!~",
        description: "Does not contain (NOT LIKE)",
        example: "title !~ 'draft'",
    },
    OperatorInfo {
        symbol: ">",
        description: "Greater than",
        example: "priority > 2",
    },
    OperatorInfo {
        symbol: ">=",
        description: "Greater than or equal",
        example: "priority >= 2",
    },
    OperatorInfo {
        symbol: "<",
        description: "Less than",
        example: "priority < 5",
    },
    OperatorInfo {
        symbol: "<=",
        description: "Less than or equal",
        example: "priority <= 5",
    },
    OperatorInfo {
        symbol: "IS NULL",
        description: "Has no value",
        example: "closedAt IS NULL",
    },
    OperatorInfo {
        symbol: "IS NOT NULL",
        description: "Has a value",
        example: "closedAt IS NOT NULL",
    },
    OperatorInfo {
        symbol: "IN",
        description: "Matches one of the listed values",
        example: "status IN ('OPEN', 'BLOCKED')",
    },
    OperatorInfo {
        symbol: "NOT IN",
        description: "Matches none of the listed values",
        example: "status NOT IN ('CLOSED')",
    },
];

const LOGICAL_OPERATORS: &[OperatorInfo] = &[
    OperatorInfo {
        symbol: "&",
        description: "Both conditions must hold",
        example: "status = 'OPEN' & priority > 2",
    },
    OperatorInfo {
        symbol: "|",
        description: "Either condition may hold",
        example: "status = 'OPEN' | status = 'BLOCKED'",
    },
    OperatorInfo {
        symbol: "()",
        description: "Groups conditions",
        example: "(status = 'OPEN' | status = 'BLOCKED') & priority > 2",
    },
];

impl ExpressionParser {
    /// Creates a parser that lets the first operator win at mixed levels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser following `config`.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new().reject_mixed_operators(config.reject_mixed_operators)
    }

    /// Rejects `&` and `|` mixed at one level without parentheses.
    pub fn reject_mixed_operators(mut self, reject: bool) -> Self {
        self.reject_mixed_operators = reject;
        self
    }

    /// Parses `query` into an expression tree.
    pub fn parse_expression(&self, query: &str) -> Result<Expression, QuerySyntaxError> {
        if query.trim().is_empty() {
            return Err(QuerySyntaxError::new("Query must not be empty"));
        }
        expression::parse_expression(query, self.reject_mixed_operators)
    }

    /// Parses `query` into a request whose criteria target `entity_type`.
    pub fn parse(&self, query: &str, entity_type: &str) -> SearchResult<SearchRequest> {
        let expression = self.parse_expression(query)?;

        let mut builder = RequestBuilder {
            request: SearchRequest::new(),
            entity_type,
            conditions: 0,
            groups: 0,
        };
        let root = builder.build(&expression);
        let mut request = builder.request;
        if matches!(expression, Expression::Group { .. }) {
            request.rename_merge_group(&root, FINAL_GROUP)?;
        }

        debug!(
            entity_type,
            criteria = request.criteria().len(),
            groups = request.groups().len(),
            merged_groups = request.merged_groups().len(),
            "Parsed query"
        );
        Ok(request)
    }

    /// Checks `query` without building a request.
    ///
    /// An empty query is valid. Fields the entity does not declare produce
    /// warnings, not errors.
    pub fn validate(
        &self,
        query: &str,
        entity_type: &str,
        metadata: &dyn MetadataProvider,
    ) -> QueryValidation {
        if query.trim().is_empty() {
            return QueryValidation {
                valid: true,
                ..Default::default()
            };
        }

        let expression = match expression::parse_expression(query, self.reject_mixed_operators) {
            Ok(expression) => expression,
            Err(err) => {
                return QueryValidation {
                    valid: false,
                    warnings: Vec::new(),
                    error: Some(err.message),
                };
            }
        };

        let mut warnings = Vec::new();
        if metadata.entity(entity_type).is_none() {
            warnings.push(format!("Unknown entity type '{}'", entity_type));
        } else {
            let mut attributes = Vec::new();
            collect_attributes(&expression, &mut attributes);
            for attribute in attributes {
                let field = base_field(attribute, entity_type);
                if metadata.find_field(entity_type, field).is_none() {
                    warn!(entity_type, field, "Query references an unknown field");
                    warnings.push(format!(
                        "Field '{}' may not exist in entity {}",
                        field, entity_type
                    ));
                }
            }
        }

        QueryValidation {
            valid: true,
            warnings,
            error: None,
        }
    }

    /// Every field `entity_type` exposes, including inherited ones.
    pub fn available_fields<'m>(
        &self,
        entity_type: &str,
        metadata: &'m dyn MetadataProvider,
    ) -> Vec<&'m FieldDescriptor> {
        metadata.all_fields(entity_type)
    }

    /// The comparison operators the parser understands.
    pub fn supported_operators() -> &'static [OperatorInfo] {
        COMPARISON_OPERATORS
    }

    /// The operators combining conditions.
    pub fn logical_operators() -> &'static [OperatorInfo] {
        LOGICAL_OPERATORS
    }
}

struct RequestBuilder<'a> {
    request: SearchRequest,
    entity_type: &'a str,
    conditions: usize,
    groups: usize,
}

impl RequestBuilder<'_> {
    /// Adds `expression` and returns the id of the group representing it.
    fn build(&mut self, expression: &Expression) -> String {
        match expression {
            Expression::Condition(condition) => {
                self.conditions += 1;
                let criterion = Criterion::new(
                    format!("C{}", self.conditions),
                    self.entity_type,
                    condition.attribute.as_str(),
                    condition.operation,
                    condition.value.clone(),
                );
                let group_id = self.next_group_id();
                self.request.add_prepared_criterion(
                    group_id.as_str(),
                    Some(LogicalOperator::And),
                    criterion,
                );
                group_id
            }
            Expression::Group { operator, children } => {
                let members: Vec<String> = children.iter().map(|c| self.build(c)).collect();
                let group_id = self.next_group_id();
                self.request.merge_group(group_id.as_str(), *operator, members);
                group_id
            }
        }
    }

    fn next_group_id(&mut self) -> String {
        self.groups += 1;
        format!("G{}", self.groups)
    }
}

fn collect_attributes<'e>(expression: &'e Expression, out: &mut Vec<&'e str>) {
    match expression {
        Expression::Condition(condition) => out.push(&condition.attribute),
        Expression::Group { children, .. } => {
            for child in children {
                collect_attributes(child, out);
            }
        }
    }
}

/// The first path segment without brackets, skipping a leading entity name.
fn base_field<'p>(attribute: &'p str, entity_type: &str) -> &'p str {
    let mut segments = attribute.split('.');
    let first = segments.next().unwrap_or_default();
    let base = match segments.next() {
        Some(second) if first.eq_ignore_ascii_case(entity_type) => second,
        _ => first,
    };
    base.trim_start_matches('[').trim_end_matches(']')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::metadata::{EntityDescriptor, FieldType, MetadataRegistry};
    use crate::types::{Literal, SearchOperation};

    fn parser() -> ExpressionParser {
        ExpressionParser::new()
    }

    fn group_ids(request: &SearchRequest) -> Vec<&str> {
        request.groups().iter().map(|g| g.id.as_str()).collect()
    }

    #[test]
    fn test_two_conditions_number_in_order() {
        let request = parser()
            .parse("logLevel='ERROR' & methodName='translate'", "LogEntry")
            .unwrap();

        let criteria: Vec<_> = request.criteria().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(criteria, vec!["C1", "C2"]);
        assert_eq!(group_ids(&request), vec!["G1", "G2"]);
        for group in request.groups() {
            assert_eq!(group.operator, Some(LogicalOperator::And));
            assert_eq!(group.criteria_ids.len(), 1);
        }
        for criterion in request.criteria() {
            assert_eq!(criterion.operation, SearchOperation::Equals);
            assert_eq!(criterion.entity_type, "LogEntry");
        }
        assert_eq!(request.criterion("C2").unwrap().value, Literal::from("translate"));

        let root = &request.merged_groups()[FINAL_GROUP];
        assert_eq!(root.operator, LogicalOperator::And);
        assert_eq!(root.group_ids, vec!["G1", "G2"]);
        assert_eq!(request.merged_groups().len(), 1);
    }

    #[test]
    fn test_nested_expression_builds_final_group() {
        let request = parser()
            .parse(
                "logLevel='ERROR' | (methodName='translate' & className!='Main')",
                "LogEntry",
            )
            .unwrap();

        assert_eq!(request.criteria().len(), 3);
        assert_eq!(group_ids(&request), vec!["G1", "G2", "G3"]);
        assert_eq!(request.group("G1").unwrap().criteria_ids, vec!["C1"]);
        assert_eq!(request.group("G2").unwrap().criteria_ids, vec!["C2"]);
        assert_eq!(request.group("G3").unwrap().criteria_ids, vec!["C3"]);
        assert_eq!(
            request.criterion("C3").unwrap().operation,
            SearchOperation::NotEquals
        );

        let inner = &request.merged_groups()["G4"];
        assert_eq!(inner.operator, LogicalOperator::And);
        assert_eq!(inner.group_ids, vec!["G2", "G3"]);

        let root = &request.merged_groups()[FINAL_GROUP];
        assert_eq!(root.operator, LogicalOperator::Or);
        assert_eq!(root.group_ids, vec!["G1", "G4"]);
    }

    #[test]
    fn test_single_condition_stays_standalone() {
        let request = parser().parse("(priority > 3)", "Task").unwrap();
        assert_eq!(group_ids(&request), vec!["G1"]);
        assert!(request.merged_groups().is_empty());
        assert_eq!(request.criterion("C1").unwrap().value, Literal::Integer(3));
    }

    #[test]
    fn test_parse_errors_are_syntax_errors() {
        for query in ["", "   ", "a = 1 &", "(a = 1", "a"] {
            let err = parser().parse(query, "Task").unwrap_err();
            assert!(matches!(err, SearchError::Syntax(_)), "{:?}: {:?}", query, err);
        }
    }

    #[test]
    fn test_from_config_rejects_mixed_operators() {
        let config = SearchConfig {
            reject_mixed_operators: true,
            ..Default::default()
        };
        let parser = ExpressionParser::from_config(&config);
        assert!(parser.parse("a = 1 & b = 2 | c = 3", "Task").is_err());
        assert!(parser.parse("a = 1 & (b = 2 | c = 3)", "Task").is_ok());
    }

    fn registry() -> MetadataRegistry {
        let mut registry = MetadataRegistry::new();
        registry
            .register(EntityDescriptor::new("Base").field("deleted", FieldType::Boolean))
            .unwrap();
        registry
            .register(
                EntityDescriptor::new("Task")
                    .with_superclass("Base")
                    .field("id", FieldType::Text)
                    .field("title", FieldType::Text)
                    .field(
                        "owners",
                        FieldType::Relation {
                            target: "Base".into(),
                            many: true,
                        },
                    ),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_validate_reports_unknown_fields_as_warnings() {
        let registry = registry();
        let result = parser().validate(
            "title ~ 'x' & Task.deleted = false & [owners].id = '1' & colour = 'red'",
            "Task",
            &registry,
        );
        assert!(result.valid);
        assert_eq!(result.error, None);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("'colour'"));
    }

    #[test]
    fn test_validate_empty_and_invalid_queries() {
        let registry = registry();
        assert!(parser().validate("  ", "Task", &registry).valid);

        let result = parser().validate("title = 'x", "Task", &registry);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("Unclosed quote"));

        let result = parser().validate("title = 'x'", "Ghost", &registry);
        assert!(result.valid);
        assert_eq!(result.warnings, vec!["Unknown entity type 'Ghost'"]);
    }

    #[test]
    fn test_available_fields_include_inherited() {
        let registry = registry();
        let names: Vec<_> = parser()
            .available_fields("Task", &registry)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "title", "owners", "deleted"]);
    }

    #[test]
    fn test_operator_tables() {
        let symbols: Vec<_> = ExpressionParser::supported_operators()
            .iter()
            .map(|o| o.symbol)
            .collect();
        assert_eq!(symbols.len(), 12);
        assert!(symbols.contains(&"NOT IN"));
        assert!(
            ExpressionParser::logical_operators()
                .iter()
                .any(|o| o.symbol == "|")
        );
    }
}
