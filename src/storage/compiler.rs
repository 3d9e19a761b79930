//! Compiles filters, sorts and projections into SQL fragments.
//!
//! Output uses `?` placeholders; the active dialect renders them into its native
//! style right before execution. Values never appear in the SQL text.

use crate::domain::filter::{CompositeFilter, Filter, FilterOperator, PropertyFilter};
use crate::domain::query::Sort;
use crate::domain::schema::ensure_identifier;
use crate::error::{RepositoryError, RepositoryResult};
use serde_json::Value as JsonValue;

/// Predicate that matches nothing; stands in for `IN ()`.
pub const UNSATISFIABLE: &str = "1 != 1";

/// SQL text plus its bind parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<JsonValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<JsonValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

fn operator_symbol(operator: FilterOperator) -> RepositoryResult<&'static str> {
    Ok(match operator {
        FilterOperator::Equal => "=",
        FilterOperator::NotEqual => "!=",
        FilterOperator::GreaterThan => ">",
        FilterOperator::GreaterThanOrEqual => ">=",
        FilterOperator::LessThan => "<",
        FilterOperator::LessThanOrEqual => "<=",
        FilterOperator::Like => "LIKE",
        FilterOperator::NotLike => "NOT LIKE",
        // IN is expanded separately.
        FilterOperator::In => return Err(RepositoryError::UnsupportedOperator("IN".into())),
    })
}

/// Compiles a filter tree into a WHERE clause body and its parameters.
pub fn compile_filter(filter: &Filter) -> RepositoryResult<Statement> {
    let mut out = Statement::default();
    compile_into(filter, &mut out)?;
    Ok(out)
}

fn compile_into(filter: &Filter, out: &mut Statement) -> RepositoryResult<()> {
    match filter {
        Filter::Property(p) => compile_property(p, out),
        Filter::Composite(c) => compile_composite(c, out),
    }
}

fn compile_property(filter: &PropertyFilter, out: &mut Statement) -> RepositoryResult<()> {
    ensure_identifier(&filter.field)?;

    if filter.operator == FilterOperator::In {
        let values = filter.value.as_array().ok_or_else(|| {
            RepositoryError::malformed_filter(format!(
                "IN on '{}' expects an array value",
                filter.field
            ))
        })?;
        if values.is_empty() {
            out.sql.push_str(UNSATISFIABLE);
            return Ok(());
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        out.sql
            .push_str(&format!("{} IN ({})", filter.field, placeholders));
        out.params.extend(values.iter().cloned());
        return Ok(());
    }

    let symbol = operator_symbol(filter.operator)?;
    out.sql.push_str(&format!("{} {} ?", filter.field, symbol));
    out.params.push(filter.value.clone());
    Ok(())
}

fn compile_composite(filter: &CompositeFilter, out: &mut Statement) -> RepositoryResult<()> {
    if filter.children.len() < 2 {
        return Err(RepositoryError::malformed_filter(format!(
            "{} filter needs at least 2 children, got {}",
            filter.combinator.keyword(),
            filter.children.len()
        )));
    }

    let joiner = format!(" {} ", filter.combinator.keyword());
    out.sql.push('(');
    for (i, child) in filter.children.iter().enumerate() {
        if i > 0 {
            out.sql.push_str(&joiner);
        }
        compile_into(child, out)?;
    }
    out.sql.push(')');
    Ok(())
}

/// `a ASC, b DESC`; empty when there are no sorts.
pub fn compile_order_by(sorts: &[Sort]) -> RepositoryResult<String> {
    let mut parts = Vec::with_capacity(sorts.len());
    for sort in sorts {
        ensure_identifier(&sort.field)?;
        parts.push(format!("{} {}", sort.field, sort.direction.keyword()));
    }
    Ok(parts.join(", "))
}

/// Select list: `*` without projections, otherwise the projected fields with the
/// key field first when the caller left it out.
pub fn compile_projection(projections: &[String], key_field: &str) -> RepositoryResult<String> {
    if projections.is_empty() {
        return Ok("*".to_string());
    }
    let mut fields: Vec<&str> = Vec::with_capacity(projections.len() + 1);
    if !projections.iter().any(|p| p == key_field) {
        fields.push(key_field);
    }
    for p in projections {
        ensure_identifier(p)?;
        if !fields.contains(&p.as_str()) {
            fields.push(p.as_str());
        }
    }
    Ok(fields.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::SortDirection;
    use serde_json::json;

    #[test]
    fn test_equality_has_one_placeholder() {
        for value in [json!("a"), json!(42), json!(null), json!(true), json!(1.25)] {
            let stmt = compile_filter(&Filter::eq("title", value.clone())).unwrap();
            assert_eq!(stmt.sql, "title = ?");
            assert_eq!(stmt.sql.matches('?').count(), 1);
            assert_eq!(stmt.params, vec![value]);
        }
    }

    #[test]
    fn test_operator_symbols() {
        let cases = [
            (Filter::ne("a", 1), "a != ?"),
            (Filter::gt("a", 1), "a > ?"),
            (Filter::gte("a", 1), "a >= ?"),
            (Filter::lt("a", 1), "a < ?"),
            (Filter::lte("a", 1), "a <= ?"),
            (Filter::like("a", "%x%"), "a LIKE ?"),
            (Filter::not_like("a", "%x%"), "a NOT LIKE ?"),
        ];
        for (filter, expected) in cases {
            assert_eq!(compile_filter(&filter).unwrap().sql, expected);
        }
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        for field in ["oId", "tagTitle", "_x"] {
            let stmt = compile_filter(&Filter::in_values(field, Vec::<JsonValue>::new())).unwrap();
            assert_eq!(stmt.sql, UNSATISFIABLE);
            assert!(stmt.params.is_empty());
        }
    }

    #[test]
    fn test_in_expands_placeholders_in_order() {
        let stmt = compile_filter(&Filter::in_values("oId", ["3", "1", "2"])).unwrap();
        assert_eq!(stmt.sql, "oId IN (?, ?, ?)");
        assert_eq!(stmt.params, vec![json!("3"), json!("1"), json!("2")]);
    }

    #[test]
    fn test_in_requires_array() {
        let err = compile_filter(&Filter::property("oId", FilterOperator::In, "3")).unwrap_err();
        assert!(err.is_malformed_filter());
    }

    #[test]
    fn test_composite_arity() {
        let single = Filter::and(vec![Filter::eq("a", 1)]);
        let err = compile_filter(&single).unwrap_err();
        assert!(matches!(err, RepositoryError::MalformedFilter(_)));

        let empty = Filter::or(vec![]);
        assert!(compile_filter(&empty).unwrap_err().is_malformed_filter());

        let pair = Filter::and(vec![Filter::eq("a", 1), Filter::gt("b", 2)]);
        let stmt = compile_filter(&pair).unwrap();
        assert_eq!(stmt.sql, "(a = ? AND b > ?)");
        assert_eq!(stmt.params, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_nested_composite() {
        let filter = Filter::or(vec![
            Filter::eq("status", "draft"),
            Filter::and(vec![
                Filter::in_values("tag", ["rust", "sql"]),
                Filter::lt("views", 10),
            ]),
        ]);
        let stmt = compile_filter(&filter).unwrap();
        assert_eq!(stmt.sql, "(status = ? OR (tag IN (?, ?) AND views < ?))");
        assert_eq!(
            stmt.params,
            vec![json!("draft"), json!("rust"), json!("sql"), json!(10)]
        );
    }

    #[test]
    fn test_malformed_child_fails_whole_tree() {
        let filter = Filter::or(vec![Filter::eq("a", 1), Filter::and(vec![Filter::eq("b", 2)])]);
        assert!(compile_filter(&filter).unwrap_err().is_malformed_filter());
    }

    #[test]
    fn test_value_is_never_interpolated() {
        let hostile = "x' OR '1'='1";
        let stmt = compile_filter(&Filter::eq("title", hostile)).unwrap();
        assert!(!stmt.sql.contains(hostile));
        assert_eq!(stmt.params, vec![json!(hostile)]);
    }

    #[test]
    fn test_field_names_are_validated() {
        let err = compile_filter(&Filter::eq("title = title OR 1", 1)).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_order_by() {
        assert_eq!(compile_order_by(&[]).unwrap(), "");
        let sorts = vec![
            Sort {
                field: "putTop".into(),
                direction: SortDirection::Desc,
            },
            Sort {
                field: "created".into(),
                direction: SortDirection::Asc,
            },
        ];
        assert_eq!(compile_order_by(&sorts).unwrap(), "putTop DESC, created ASC");
    }

    #[test]
    fn test_projection() {
        assert_eq!(compile_projection(&[], "id").unwrap(), "*");
        assert_eq!(
            compile_projection(&["title".into(), "views".into()], "id").unwrap(),
            "id, title, views"
        );
        assert_eq!(
            compile_projection(&["title".into(), "id".into()], "id").unwrap(),
            "title, id"
        );
    }
}
