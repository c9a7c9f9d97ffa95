use crate::{
    error::{RequestError, Result},
    schema::Schema,
    serializer::{self, SerializeOptions},
};

use aws_sdk_dynamodb::types;
use serde::Serialize;

/// Comparison applied to a single attribute.
///
/// ```rust
/// use dynamodb_mapper::common::condition;
///
/// let eq = condition::Condition::Equals("value".to_string());
/// let gt = condition::Condition::GreaterThan(100);
/// let null: condition::Condition<String> = condition::Condition::Null;
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition<T> {
    /// Checks if an attribute begins with a specified prefix.
    BeginsWith(T),
    /// Checks if an attribute value is between two values (inclusive).
    Between(T, T),
    /// Checks if an attribute contains a specified value.
    Contains(T),
    /// Checks if an attribute value equals a specified value.
    Equals(T),
    /// Checks if an attribute value is greater than a specified value.
    GreaterThan(T),
    /// Checks if an attribute value is greater than or equal to a specified value.
    GreaterThanOrEqual(T),
    /// Checks if an attribute value is in a list of specified values.
    In(Vec<T>),
    /// Checks if an attribute value is less than a specified value.
    LessThan(T),
    /// Checks if an attribute value is less than or equal to a specified value.
    LessThanOrEqual(T),
    /// Checks if an attribute does not contain a specified value.
    NotContains(T),
    /// Checks if an attribute value does not equal a specified value.
    NotEqual(T),
    /// Checks if an attribute exists (is not null).
    NotNull,
    /// Checks if an attribute does not exist (is null).
    Null,
}

impl<T> Condition<T> {
    /// Wire comparison operator of the condition.
    pub fn comparison_operator(&self) -> types::ComparisonOperator {
        match self {
            Self::BeginsWith(_) => types::ComparisonOperator::BeginsWith,
            Self::Between(_, _) => types::ComparisonOperator::Between,
            Self::Contains(_) => types::ComparisonOperator::Contains,
            Self::Equals(_) => types::ComparisonOperator::Eq,
            Self::GreaterThan(_) => types::ComparisonOperator::Gt,
            Self::GreaterThanOrEqual(_) => types::ComparisonOperator::Ge,
            Self::In(_) => types::ComparisonOperator::In,
            Self::LessThan(_) => types::ComparisonOperator::Lt,
            Self::LessThanOrEqual(_) => types::ComparisonOperator::Le,
            Self::NotContains(_) => types::ComparisonOperator::NotContains,
            Self::NotEqual(_) => types::ComparisonOperator::Ne,
            Self::NotNull => types::ComparisonOperator::NotNull,
            Self::Null => types::ComparisonOperator::Null,
        }
    }

    /// Whether the condition may restrict a range key.
    pub fn is_key_condition(&self) -> bool {
        matches!(
            self,
            Self::BeginsWith(_)
                | Self::Between(_, _)
                | Self::Equals(_)
                | Self::GreaterThan(_)
                | Self::GreaterThanOrEqual(_)
                | Self::LessThan(_)
                | Self::LessThanOrEqual(_)
        )
    }

    fn into_operands(self) -> Vec<T> {
        match self {
            Self::Between(low, high) => vec![low, high],
            Self::In(values) => values,
            Self::NotNull | Self::Null => Vec::new(),
            Self::BeginsWith(value)
            | Self::Contains(value)
            | Self::Equals(value)
            | Self::GreaterThan(value)
            | Self::GreaterThanOrEqual(value)
            | Self::LessThan(value)
            | Self::LessThanOrEqual(value)
            | Self::NotContains(value)
            | Self::NotEqual(value) => vec![value],
        }
    }

    /// Convert every operand, keeping the comparator.
    pub fn try_map<U, E>(self, mut f: impl FnMut(T) -> Result<U, E>) -> Result<Condition<U>, E> {
        let condition = match self {
            Self::BeginsWith(value) => Condition::BeginsWith(f(value)?),
            Self::Between(low, high) => Condition::Between(f(low)?, f(high)?),
            Self::Contains(value) => Condition::Contains(f(value)?),
            Self::Equals(value) => Condition::Equals(f(value)?),
            Self::GreaterThan(value) => Condition::GreaterThan(f(value)?),
            Self::GreaterThanOrEqual(value) => Condition::GreaterThanOrEqual(f(value)?),
            Self::In(values) => {
                Condition::In(values.into_iter().map(&mut f).collect::<Result<_, _>>()?)
            }
            Self::LessThan(value) => Condition::LessThan(f(value)?),
            Self::LessThanOrEqual(value) => Condition::LessThanOrEqual(f(value)?),
            Self::NotContains(value) => Condition::NotContains(f(value)?),
            Self::NotEqual(value) => Condition::NotEqual(f(value)?),
            Self::NotNull => Condition::NotNull,
            Self::Null => Condition::Null,
        };
        Ok(condition)
    }
}

/// Condition applied to a named attribute, with operands already typed for the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition {
    /// The condition to apply to the attribute.
    pub condition: Condition<types::AttributeValue>,
    /// The name of the attribute to apply the condition to.
    pub name: String,
}

impl KeyCondition {
    /// Type the operands of `condition` by the declared type of `name`.
    ///
    /// Set attributes take plain operands, so `contains(2)` on a number set
    /// compares against `{N: "2"}`.
    pub fn new<T: Serialize>(
        schema: &Schema,
        name: impl Into<String>,
        condition: Condition<T>,
    ) -> Result<Self> {
        let name = name.into();
        let attribute = schema
            .attribute(&name)
            .ok_or_else(|| RequestError::UnknownAttribute(name.clone()))?;
        if matches!(&condition, Condition::In(values) if values.is_empty()) {
            return Err(RequestError::Arity {
                operator: types::ComparisonOperator::In,
                expected: "at least 1",
                actual: 0,
            }
            .into());
        }
        let options = SerializeOptions {
            convert_sets: true,
            return_nulls: true,
        };
        let condition = condition.try_map(|operand| {
            let value = serde_json::to_value(operand)?;
            let value = serializer::serialize_attribute(attribute, &value, options)?
                .unwrap_or(types::AttributeValue::Null(true));
            Ok::<_, crate::Error>(value)
        })?;
        Ok(Self { condition, name })
    }

    /// Render the wire clause; `NOT_NULL` and `NULL` carry no value list.
    pub fn format(self) -> Result<types::Condition> {
        let comparison_operator = self.condition.comparison_operator();
        let values = self.condition.into_operands();
        let condition = types::Condition::builder()
            .set_attribute_value_list((!values.is_empty()).then_some(values))
            .comparison_operator(comparison_operator)
            .build()?;
        Ok(condition)
    }
}

/// Where a condition lands in a request.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConditionScope {
    /// Key condition, restricting which records are read.
    Key,
    /// Filter, restricting which records are returned.
    Filter,
}

/// A request that accepts conditions from a [`ConditionBuilder`].
pub trait ConditionTarget: Sized {
    /// Schema used to type the operands.
    fn schema(&self) -> &Schema;

    /// Record `condition` in `scope`, validating it against the request.
    fn add_condition(self, scope: ConditionScope, condition: KeyCondition) -> Result<Self>;
}

/// Comparator step of a fluent condition: pick an operator, get the request back.
///
/// ```rust
/// use dynamodb_mapper::{schema::{Attribute, Schema}, table::Table};
///
/// let schema = Schema::builder()
///     .attribute(Attribute::string("name").hash_key())
///     .attribute(Attribute::number("age"))
///     .build()
///     .unwrap();
/// let table = Table::new("users", schema);
/// let scan = table.scan().filter("age").gte(18).unwrap();
/// assert!(scan.build_request().unwrap().scan_filter.is_some());
/// ```
#[derive(Debug)]
#[must_use]
pub struct ConditionBuilder<B> {
    name: String,
    scope: ConditionScope,
    target: B,
}

impl<B: ConditionTarget> ConditionBuilder<B> {
    pub(crate) fn new(target: B, scope: ConditionScope, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope,
            target,
        }
    }

    fn apply<T: Serialize>(self, condition: Condition<T>) -> Result<B> {
        let condition = KeyCondition::new(self.target.schema(), self.name, condition)?;
        self.target.add_condition(self.scope, condition)
    }

    /// `EQ`.
    pub fn equals(self, value: impl Serialize) -> Result<B> {
        self.apply(Condition::Equals(value))
    }

    /// `NE`.
    pub fn ne(self, value: impl Serialize) -> Result<B> {
        self.apply(Condition::NotEqual(value))
    }

    /// `LE`.
    pub fn lte(self, value: impl Serialize) -> Result<B> {
        self.apply(Condition::LessThanOrEqual(value))
    }

    /// `LT`.
    pub fn lt(self, value: impl Serialize) -> Result<B> {
        self.apply(Condition::LessThan(value))
    }

    /// `GE`.
    pub fn gte(self, value: impl Serialize) -> Result<B> {
        self.apply(Condition::GreaterThanOrEqual(value))
    }

    /// `GT`.
    pub fn gt(self, value: impl Serialize) -> Result<B> {
        self.apply(Condition::GreaterThan(value))
    }

    /// `BEGINS_WITH`.
    pub fn begins_with(self, value: impl Serialize) -> Result<B> {
        self.apply(Condition::BeginsWith(value))
    }

    /// `BETWEEN`, inclusive on both ends.
    pub fn between<T: Serialize>(self, low: T, high: T) -> Result<B> {
        self.apply(Condition::Between(low, high))
    }

    /// `CONTAINS`.
    pub fn contains(self, value: impl Serialize) -> Result<B> {
        self.apply(Condition::Contains(value))
    }

    /// `NOT_CONTAINS`.
    pub fn not_contains(self, value: impl Serialize) -> Result<B> {
        self.apply(Condition::NotContains(value))
    }

    /// `NOT_NULL`.
    pub fn not_null(self) -> Result<B> {
        self.apply(Condition::<()>::NotNull)
    }

    /// `NULL`.
    pub fn null(self) -> Result<B> {
        self.apply(Condition::<()>::Null)
    }

    /// `NOT_NULL` when `exists`, `NULL` otherwise.
    pub fn exists(self, exists: bool) -> Result<B> {
        if exists { self.not_null() } else { self.null() }
    }

    /// `IN`. Fails when `values` is empty.
    pub fn is_in<T: Serialize>(self, values: impl IntoIterator<Item = T>) -> Result<B> {
        self.apply(Condition::In(values.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;

    use rstest::rstest;
    use serde_json::{Value, json};

    fn schema() -> Schema {
        Schema::builder()
            .attribute(Attribute::string("email").hash_key())
            .attribute(Attribute::number("age"))
            .attribute(Attribute::date("created"))
            .attribute(Attribute::number_set("scores"))
            .attribute(Attribute::string_set("names"))
            .build()
            .unwrap()
    }

    fn s(value: &str) -> types::AttributeValue {
        types::AttributeValue::S(value.to_string())
    }

    fn n(value: &str) -> types::AttributeValue {
        types::AttributeValue::N(value.to_string())
    }

    fn clause(
        operator: types::ComparisonOperator,
        values: Option<Vec<types::AttributeValue>>,
    ) -> types::Condition {
        types::Condition::builder()
            .set_attribute_value_list(values)
            .comparison_operator(operator)
            .build()
            .unwrap()
    }

    #[rstest]
    #[case::equals_number(
        "age",
        Condition::Equals(json!(18)),
        clause(types::ComparisonOperator::Eq, Some(vec![n("18")]))
    )]
    #[case::equals_numeric_string(
        "age",
        Condition::Equals(json!("18")),
        clause(types::ComparisonOperator::Eq, Some(vec![n("18")]))
    )]
    #[case::between(
        "email",
        Condition::Between(json!("bob@bob.com"), json!("foo@foo.com")),
        clause(types::ComparisonOperator::Between, Some(vec![s("bob@bob.com"), s("foo@foo.com")]))
    )]
    #[case::begins_with(
        "email",
        Condition::BeginsWith(json!("foo")),
        clause(types::ComparisonOperator::BeginsWith, Some(vec![s("foo")]))
    )]
    #[case::date(
        "created",
        Condition::GreaterThan(json!("2013-01-01")),
        clause(types::ComparisonOperator::Gt, Some(vec![s("2013-01-01T00:00:00.000Z")]))
    )]
    #[case::contains_number_set(
        "scores",
        Condition::Contains(json!(2)),
        clause(types::ComparisonOperator::Contains, Some(vec![n("2")]))
    )]
    #[case::not_contains_string_set(
        "names",
        Condition::NotContains(json!("foo")),
        clause(types::ComparisonOperator::NotContains, Some(vec![s("foo")]))
    )]
    #[case::not_equal(
        "age",
        Condition::NotEqual(json!(0)),
        clause(types::ComparisonOperator::Ne, Some(vec![n("0")]))
    )]
    #[case::is_in(
        "age",
        Condition::In(vec![json!(1), json!(2)]),
        clause(types::ComparisonOperator::In, Some(vec![n("1"), n("2")]))
    )]
    #[case::not_null("age", Condition::NotNull, clause(types::ComparisonOperator::NotNull, None))]
    #[case::null("age", Condition::Null, clause(types::ComparisonOperator::Null, None))]
    fn test_format(
        #[case] name: &str,
        #[case] condition: Condition<Value>,
        #[case] expected: types::Condition,
    ) {
        let actual = KeyCondition::new(&schema(), name, condition)
            .unwrap()
            .format()
            .unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_unknown_attribute() {
        let actual = KeyCondition::new(&schema(), "missing", Condition::Equals(1)).unwrap_err();
        assert!(matches!(
            actual,
            crate::Error::Request(RequestError::UnknownAttribute(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_empty_in() {
        let actual = KeyCondition::new(&schema(), "age", Condition::<i32>::In(Vec::new())).unwrap_err();
        assert!(matches!(
            actual,
            crate::Error::Request(RequestError::Arity { actual: 0, .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let actual = KeyCondition::new(&schema(), "email", Condition::Equals(5));
        assert!(matches!(actual, Err(crate::Error::Serialization(_))));
    }

    #[derive(Debug)]
    struct Recorder {
        schema: Schema,
        conditions: Vec<(ConditionScope, KeyCondition)>,
    }

    impl ConditionTarget for Recorder {
        fn schema(&self) -> &Schema {
            &self.schema
        }

        fn add_condition(mut self, scope: ConditionScope, condition: KeyCondition) -> Result<Self> {
            self.conditions.push((scope, condition));
            Ok(self)
        }
    }

    fn record(
        f: impl FnOnce(ConditionBuilder<Recorder>) -> Result<Recorder>,
    ) -> (types::ComparisonOperator, usize) {
        let recorder = Recorder {
            schema: schema(),
            conditions: Vec::new(),
        };
        let recorder = f(ConditionBuilder::new(recorder, ConditionScope::Filter, "age")).unwrap();
        let (scope, condition) = recorder.conditions.into_iter().next().unwrap();
        assert_eq!(scope, ConditionScope::Filter);
        assert_eq!(condition.name, "age");
        let operator = condition.condition.comparison_operator();
        let operands = condition.condition.into_operands().len();
        (operator, operands)
    }

    #[rstest]
    #[case::equals(record(|b| b.equals(1)), (types::ComparisonOperator::Eq, 1))]
    #[case::ne(record(|b| b.ne(1)), (types::ComparisonOperator::Ne, 1))]
    #[case::lte(record(|b| b.lte(1)), (types::ComparisonOperator::Le, 1))]
    #[case::lt(record(|b| b.lt(1)), (types::ComparisonOperator::Lt, 1))]
    #[case::gte(record(|b| b.gte(1)), (types::ComparisonOperator::Ge, 1))]
    #[case::gt(record(|b| b.gt(1)), (types::ComparisonOperator::Gt, 1))]
    #[case::begins_with(record(|b| b.begins_with("1")), (types::ComparisonOperator::BeginsWith, 1))]
    #[case::between(record(|b| b.between(1, 5)), (types::ComparisonOperator::Between, 2))]
    #[case::contains(record(|b| b.contains(1)), (types::ComparisonOperator::Contains, 1))]
    #[case::not_contains(record(|b| b.not_contains(1)), (types::ComparisonOperator::NotContains, 1))]
    #[case::not_null(record(|b| b.not_null()), (types::ComparisonOperator::NotNull, 0))]
    #[case::null(record(|b| b.null()), (types::ComparisonOperator::Null, 0))]
    #[case::exists(record(|b| b.exists(true)), (types::ComparisonOperator::NotNull, 0))]
    #[case::not_exists(record(|b| b.exists(false)), (types::ComparisonOperator::Null, 0))]
    #[case::is_in(record(|b| b.is_in([1, 2, 3])), (types::ComparisonOperator::In, 3))]
    fn test_builder(
        #[case] actual: (types::ComparisonOperator, usize),
        #[case] expected: (types::ComparisonOperator, usize),
    ) {
        assert_eq!(actual, expected);
    }
}
