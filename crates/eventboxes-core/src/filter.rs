//! Filters over the abstract event shape.
//!
//! Callers describe which events a processor should pick up with a
//! [`Predicate`] over [`OutgoingEventField`] or [`IncomingEventField`]. These
//! field enums expose only the abstract record shape; persistence-only
//! columns (such as the inbox's processed flag) are not reachable from a
//! filter.
//!
//! A store turns the abstract predicate into one over its own schema with
//! [`Predicate::transform`], driven by a [`FieldMapping`]. The mapping is an
//! exhaustive `match`, so a store that lacks a counterpart for an abstract
//! field does not compile. In-memory stores skip the rewrite and evaluate
//! predicates directly through [`FieldAccess`].
//!
//! Every field except an extra property has one value type. [`Predicate::validate`]
//! rejects a literal of another type, since a SQL store cannot compare them.
//!
//! Evaluation follows SQL three-valued logic: comparing against a missing
//! value (an absent extra property) is unknown, and unknown never matches,
//! even under `NOT`.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::FilterError;
use crate::event::{IncomingEventInfo, OutgoingEventInfo};

/// Filterable fields of an outgoing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingEventField {
    /// The event id.
    Id,
    /// The event name.
    EventName,
    /// The creation time.
    CreationTime,
    /// A key in the extra property bag; compared textually.
    ExtraProperty(String),
}

/// Filterable fields of an incoming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingEventField {
    /// The event id.
    Id,
    /// The external delivery identity.
    MessageId,
    /// The event name.
    EventName,
    /// The creation time.
    CreationTime,
    /// A key in the extra property bag; compared textually.
    ExtraProperty(String),
}

/// Type of a field or literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// A string.
    Text,
    /// A UUID.
    Uuid,
    /// A point in time.
    Timestamp,
    /// A boolean.
    Bool,
    /// A signed integer.
    Integer,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Uuid => "uuid",
            Self::Timestamp => "timestamp",
            Self::Bool => "bool",
            Self::Integer => "integer",
        };
        f.write_str(name)
    }
}

/// A field with a declared value type.
pub trait TypedField: fmt::Debug {
    /// Type of the field's values, or `None` if the field compares any
    /// literal textually.
    fn value_kind(&self) -> Option<ValueKind>;
}

impl TypedField for OutgoingEventField {
    fn value_kind(&self) -> Option<ValueKind> {
        match self {
            Self::Id => Some(ValueKind::Uuid),
            Self::EventName => Some(ValueKind::Text),
            Self::CreationTime => Some(ValueKind::Timestamp),
            Self::ExtraProperty(_) => None,
        }
    }
}

impl TypedField for IncomingEventField {
    fn value_kind(&self) -> Option<ValueKind> {
        match self {
            Self::Id => Some(ValueKind::Uuid),
            Self::MessageId | Self::EventName => Some(ValueKind::Text),
            Self::CreationTime => Some(ValueKind::Timestamp),
            Self::ExtraProperty(_) => None,
        }
    }
}

/// A literal a field is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// A string.
    Text(String),
    /// A UUID.
    Uuid(Uuid),
    /// A point in time.
    Timestamp(DateTime<Utc>),
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
}

impl FilterValue {
    /// Type of the literal.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Uuid(_) => ValueKind::Uuid,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Bool(_) => ValueKind::Bool,
            Self::Integer(_) => ValueKind::Integer,
        }
    }

    /// Renders the value the way `PostgreSQL`'s `->>` operator renders JSON
    /// scalars. Used for extra property comparisons.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Uuid(id) => id.to_string(),
            Self::Timestamp(ts) => ts.to_rfc3339(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(n) => n.to_string(),
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.partial_cmp(b),
            (Self::Uuid(a), Self::Uuid(b)) => a.partial_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.partial_cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.partial_cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.partial_cmp(b),
            (a, b) => a.as_text().partial_cmp(&b.as_text()),
        }
    }

    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            other => Some(Self::Text(other.to_string())),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparison {
    /// SQL spelling of the operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// A boolean condition over fields of type `F`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<F> {
    /// `field <op> value`
    Compare {
        /// The compared field.
        field: F,
        /// The operator.
        op: Comparison,
        /// The literal on the right-hand side.
        value: FilterValue,
    },
    /// `field IN (values...)`; an empty list matches nothing.
    In {
        /// The compared field.
        field: F,
        /// The accepted values.
        values: Vec<FilterValue>,
    },
    /// All of the inner predicates hold; an empty list always holds.
    And(Vec<Predicate<F>>),
    /// Any of the inner predicates holds; an empty list never holds.
    Or(Vec<Predicate<F>>),
    /// The inner predicate does not hold.
    Not(Box<Predicate<F>>),
}

/// Builder step returned by [`Predicate::field`].
#[derive(Debug, Clone)]
pub struct FieldRef<F>(F);

impl<F> FieldRef<F> {
    fn compare(self, op: Comparison, value: impl Into<FilterValue>) -> Predicate<F> {
        Predicate::Compare {
            field: self.0,
            op,
            value: value.into(),
        }
    }

    /// `field = value`
    pub fn eq(self, value: impl Into<FilterValue>) -> Predicate<F> {
        self.compare(Comparison::Eq, value)
    }

    /// `field <> value`
    pub fn ne(self, value: impl Into<FilterValue>) -> Predicate<F> {
        self.compare(Comparison::Ne, value)
    }

    /// `field < value`
    pub fn lt(self, value: impl Into<FilterValue>) -> Predicate<F> {
        self.compare(Comparison::Lt, value)
    }

    /// `field <= value`
    pub fn le(self, value: impl Into<FilterValue>) -> Predicate<F> {
        self.compare(Comparison::Le, value)
    }

    /// `field > value`
    pub fn gt(self, value: impl Into<FilterValue>) -> Predicate<F> {
        self.compare(Comparison::Gt, value)
    }

    /// `field >= value`
    pub fn ge(self, value: impl Into<FilterValue>) -> Predicate<F> {
        self.compare(Comparison::Ge, value)
    }

    /// `field IN (values...)`
    pub fn is_in<V: Into<FilterValue>>(self, values: impl IntoIterator<Item = V>) -> Predicate<F> {
        Predicate::In {
            field: self.0,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Maps abstract fields of type `F` onto a store's concrete targets.
pub trait FieldMapping<F> {
    /// The concrete field representation (for example a column).
    type Target;

    /// Returns the concrete counterpart of `field`.
    fn map_field(field: &F) -> Self::Target;
}

/// Read access to the value of a field on a record, for in-memory evaluation.
pub trait FieldAccess<F> {
    /// Returns the value of `field`, or `None` if the record has no value.
    fn field_value(&self, field: &F) -> Option<FilterValue>;
}

impl<F> Predicate<F> {
    /// Starts a comparison on `field`.
    pub fn field(field: F) -> FieldRef<F> {
        FieldRef(field)
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), right) => {
                left.push(right);
                Self::And(left)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }

    /// Disjunction of `self` and `other`, flattening nested `Or`s.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), right) => {
                left.push(right);
                Self::Or(left)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }

    /// Negation of `self`.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Rewrites the predicate onto the concrete targets of mapping `M`.
    ///
    /// The structure of the predicate is preserved; only the fields change.
    #[must_use]
    pub fn transform<M: FieldMapping<F>>(&self) -> Predicate<M::Target> {
        match self {
            Self::Compare { field, op, value } => Predicate::Compare {
                field: M::map_field(field),
                op: *op,
                value: value.clone(),
            },
            Self::In { field, values } => Predicate::In {
                field: M::map_field(field),
                values: values.clone(),
            },
            Self::And(inner) => Predicate::And(inner.iter().map(Self::transform::<M>).collect()),
            Self::Or(inner) => Predicate::Or(inner.iter().map(Self::transform::<M>).collect()),
            Self::Not(inner) => Predicate::Not(Box::new(inner.transform::<M>())),
        }
    }

    /// Returns `true` if `record` satisfies the predicate.
    pub fn matches<R: FieldAccess<F>>(&self, record: &R) -> bool {
        self.evaluate(record) == Some(true)
    }

    fn evaluate<R: FieldAccess<F>>(&self, record: &R) -> Option<bool> {
        match self {
            Self::Compare { field, op, value } => {
                let actual = record.field_value(field)?;
                actual.compare(value).map(|ordering| op.holds(ordering))
            }
            Self::In { field, values } => {
                let actual = record.field_value(field)?;
                Some(
                    values
                        .iter()
                        .any(|candidate| actual.compare(candidate) == Some(Ordering::Equal)),
                )
            }
            Self::And(inner) => {
                let mut result = Some(true);
                for predicate in inner {
                    match predicate.evaluate(record) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Self::Or(inner) => {
                let mut result = Some(false);
                for predicate in inner {
                    match predicate.evaluate(record) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Self::Not(inner) => inner.evaluate(record).map(|b| !b),
        }
    }
}

impl<F: TypedField> Predicate<F> {
    /// Checks that every literal has the type of the field it is compared
    /// with.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::TypeMismatch` for the first literal that does not
    /// fit its field.
    pub fn validate(&self) -> Result<(), FilterError> {
        match self {
            Self::Compare { field, value, .. } => check_kind(field, value),
            Self::In { field, values } => values.iter().try_for_each(|v| check_kind(field, v)),
            Self::And(inner) | Self::Or(inner) => inner.iter().try_for_each(Self::validate),
            Self::Not(inner) => inner.validate(),
        }
    }
}

fn check_kind<F: TypedField>(field: &F, value: &FilterValue) -> Result<(), FilterError> {
    match field.value_kind() {
        Some(expected) if expected != value.kind() => Err(FilterError::TypeMismatch {
            field: format!("{field:?}"),
            expected,
            found: value.kind(),
        }),
        _ => Ok(()),
    }
}

impl FieldAccess<OutgoingEventField> for OutgoingEventInfo {
    fn field_value(&self, field: &OutgoingEventField) -> Option<FilterValue> {
        match field {
            OutgoingEventField::Id => Some(FilterValue::Uuid(self.id)),
            OutgoingEventField::EventName => Some(FilterValue::Text(self.event_name.clone())),
            OutgoingEventField::CreationTime => Some(FilterValue::Timestamp(self.creation_time)),
            OutgoingEventField::ExtraProperty(key) => {
                self.extra_properties.get(key).and_then(FilterValue::from_json)
            }
        }
    }
}

impl FieldAccess<IncomingEventField> for IncomingEventInfo {
    fn field_value(&self, field: &IncomingEventField) -> Option<FilterValue> {
        match field {
            IncomingEventField::Id => Some(FilterValue::Uuid(self.id)),
            IncomingEventField::MessageId => Some(FilterValue::Text(self.message_id.clone())),
            IncomingEventField::EventName => Some(FilterValue::Text(self.event_name.clone())),
            IncomingEventField::CreationTime => Some(FilterValue::Timestamp(self.creation_time)),
            IncomingEventField::ExtraProperty(key) => {
                self.extra_properties.get(key).and_then(FilterValue::from_json)
            }
        }
    }
}
