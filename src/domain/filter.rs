//! Filter expressions over record fields.
//!
//! A filter is a tree: leaves are [`PropertyFilter`]s comparing one field with a
//! value, inner nodes are [`CompositeFilter`]s combining two or more children with
//! AND/OR. Compilation into SQL lives in `storage::compiler`.

use crate::error::{RepositoryError, RepositoryResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Deserialized through [`FromStr`], so symbols and lower-case names are accepted
/// and an unknown name keeps its text in the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum FilterOperator {
    #[serde(rename = "EQ")]
    Equal,
    #[serde(rename = "NEQ")]
    NotEqual,
    #[serde(rename = "GT")]
    GreaterThan,
    #[serde(rename = "GTE")]
    GreaterThanOrEqual,
    #[serde(rename = "LT")]
    LessThan,
    #[serde(rename = "LTE")]
    LessThanOrEqual,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "NOT_LIKE")]
    NotLike,
}

impl FilterOperator {
    pub fn name(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "EQ",
            FilterOperator::NotEqual => "NEQ",
            FilterOperator::GreaterThan => "GT",
            FilterOperator::GreaterThanOrEqual => "GTE",
            FilterOperator::LessThan => "LT",
            FilterOperator::LessThanOrEqual => "LTE",
            FilterOperator::In => "IN",
            FilterOperator::Like => "LIKE",
            FilterOperator::NotLike => "NOT_LIKE",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterOperator {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EQ" | "=" => Ok(FilterOperator::Equal),
            "NEQ" | "!=" | "<>" => Ok(FilterOperator::NotEqual),
            "GT" | ">" => Ok(FilterOperator::GreaterThan),
            "GTE" | ">=" => Ok(FilterOperator::GreaterThanOrEqual),
            "LT" | "<" => Ok(FilterOperator::LessThan),
            "LTE" | "<=" => Ok(FilterOperator::LessThanOrEqual),
            "IN" => Ok(FilterOperator::In),
            "LIKE" => Ok(FilterOperator::Like),
            "NOT_LIKE" | "NOT LIKE" => Ok(FilterOperator::NotLike),
            _ => Err(RepositoryError::UnsupportedOperator(s.to_string())),
        }
    }
}

impl TryFrom<String> for FilterOperator {
    type Error = RepositoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompositeOperator {
    And,
    Or,
}

impl FromStr for CompositeOperator {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(CompositeOperator::And),
            "OR" => Ok(CompositeOperator::Or),
            _ => Err(RepositoryError::malformed_filter(format!(
                "unknown combinator '{s}'"
            ))),
        }
    }
}

impl CompositeOperator {
    pub fn keyword(&self) -> &'static str {
        match self {
            CompositeOperator::And => "AND",
            CompositeOperator::Or => "OR",
        }
    }
}

/// `field <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: JsonValue,
}

impl PropertyFilter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<JsonValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Boolean combination of two or more filters.
///
/// The arity invariant is checked when the filter is compiled, not here, so a
/// malformed tree deserialized from a request surfaces as `MalformedFilter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeFilter {
    pub combinator: CompositeOperator,
    pub children: Vec<Filter>,
}

impl CompositeFilter {
    pub fn new(combinator: CompositeOperator, children: Vec<Filter>) -> Self {
        Self {
            combinator,
            children,
        }
    }
}

/// JSON form: `{"field", "operator", "value"}` for a property filter,
/// `{"combinator", "children"}` for a composite. See [`Filter::from_json`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Filter {
    Property(PropertyFilter),
    Composite(CompositeFilter),
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Filter::from_json(&value).map_err(serde::de::Error::custom)
    }
}

impl Filter {
    /// Parses the JSON form of a filter tree.
    ///
    /// Shape errors are `MalformedFilter` and unknown operators are
    /// `UnsupportedOperator`, at any depth. Composite arity is left to the
    /// compiler.
    pub fn from_json(value: &JsonValue) -> RepositoryResult<Filter> {
        let JsonValue::Object(map) = value else {
            return Err(RepositoryError::malformed_filter(format!(
                "expected an object, got {value}"
            )));
        };

        if map.contains_key("combinator") || map.contains_key("children") {
            let combinator = match map.get("combinator") {
                Some(JsonValue::String(s)) => s.parse::<CompositeOperator>()?,
                _ => {
                    return Err(RepositoryError::malformed_filter(
                        "composite filter needs a string 'combinator'",
                    ))
                }
            };
            let children = match map.get("children") {
                Some(JsonValue::Array(items)) => items
                    .iter()
                    .map(Filter::from_json)
                    .collect::<RepositoryResult<Vec<_>>>()?,
                _ => {
                    return Err(RepositoryError::malformed_filter(
                        "composite filter needs a 'children' array",
                    ))
                }
            };
            return Ok(Filter::Composite(CompositeFilter::new(combinator, children)));
        }

        let field = match map.get("field") {
            Some(JsonValue::String(s)) => s.clone(),
            _ => {
                return Err(RepositoryError::malformed_filter(
                    "property filter needs a string 'field'",
                ))
            }
        };
        let operator = match map.get("operator") {
            Some(JsonValue::String(s)) => s.parse::<FilterOperator>()?,
            _ => {
                return Err(RepositoryError::malformed_filter(
                    "property filter needs a string 'operator'",
                ))
            }
        };
        let value = map.get("value").cloned().unwrap_or(JsonValue::Null);
        Ok(Filter::property(field, operator, value))
    }

    pub fn property(field: impl Into<String>, operator: FilterOperator, value: impl Into<JsonValue>) -> Self {
        Filter::Property(PropertyFilter::new(field, operator, value))
    }

    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::property(field, FilterOperator::Equal, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::property(field, FilterOperator::NotEqual, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::property(field, FilterOperator::GreaterThan, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::property(field, FilterOperator::GreaterThanOrEqual, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::property(field, FilterOperator::LessThan, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::property(field, FilterOperator::LessThanOrEqual, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::property(field, FilterOperator::Like, pattern.into())
    }

    pub fn not_like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::property(field, FilterOperator::NotLike, pattern.into())
    }

    pub fn in_values<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let values: Vec<JsonValue> = values.into_iter().map(Into::into).collect();
        Self::property(field, FilterOperator::In, JsonValue::Array(values))
    }

    pub fn and(children: Vec<Filter>) -> Self {
        Filter::Composite(CompositeFilter::new(CompositeOperator::And, children))
    }

    pub fn or(children: Vec<Filter>) -> Self {
        Filter::Composite(CompositeFilter::new(CompositeOperator::Or, children))
    }
}

impl From<PropertyFilter> for Filter {
    fn from(value: PropertyFilter) -> Self {
        Filter::Property(value)
    }
}

impl From<CompositeFilter> for Filter {
    fn from(value: CompositeFilter) -> Self {
        Filter::Composite(value)
    }
}
