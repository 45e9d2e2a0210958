//! Rendering of event filters as SQL conditions.

use eventboxes_core::filter::{
    FieldMapping, FilterValue, IncomingEventField, OutgoingEventField, Predicate,
};
use sqlx::{Postgres, QueryBuilder};

/// Columns of the event tables that filters can reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// `id`
    Id,
    /// `message_id` (incoming events only)
    MessageId,
    /// `event_name`
    EventName,
    /// `creation_time`
    CreationTime,
    /// `extra_properties ->> key`
    ExtraProperty(String),
}

/// Maps outgoing event fields onto `outgoing_events` columns.
#[derive(Debug)]
pub struct OutgoingColumns;

impl FieldMapping<OutgoingEventField> for OutgoingColumns {
    type Target = Column;

    fn map_field(field: &OutgoingEventField) -> Column {
        match field {
            OutgoingEventField::Id => Column::Id,
            OutgoingEventField::EventName => Column::EventName,
            OutgoingEventField::CreationTime => Column::CreationTime,
            OutgoingEventField::ExtraProperty(key) => Column::ExtraProperty(key.clone()),
        }
    }
}

/// Maps incoming event fields onto `incoming_events` columns.
#[derive(Debug)]
pub struct IncomingColumns;

impl FieldMapping<IncomingEventField> for IncomingColumns {
    type Target = Column;

    fn map_field(field: &IncomingEventField) -> Column {
        match field {
            IncomingEventField::Id => Column::Id,
            IncomingEventField::MessageId => Column::MessageId,
            IncomingEventField::EventName => Column::EventName,
            IncomingEventField::CreationTime => Column::CreationTime,
            IncomingEventField::ExtraProperty(key) => Column::ExtraProperty(key.clone()),
        }
    }
}

/// Appends `predicate` to `qb` as a parenthesised boolean expression. Every
/// literal, property keys included, is sent as a bind parameter.
pub fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate<Column>) {
    match predicate {
        Predicate::Compare { field, op, value } => {
            qb.push("(");
            push_column(qb, field);
            qb.push(" ").push(op.as_sql()).push(" ");
            push_value(qb, field, value);
            qb.push(")");
        }
        Predicate::In { field, values } => {
            if values.is_empty() {
                qb.push("FALSE");
                return;
            }
            qb.push("(");
            push_column(qb, field);
            qb.push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, field, value);
            }
            qb.push("))");
        }
        Predicate::And(inner) => push_junction(qb, inner, " AND ", "TRUE"),
        Predicate::Or(inner) => push_junction(qb, inner, " OR ", "FALSE"),
        Predicate::Not(inner) => {
            qb.push("(NOT ");
            push_predicate(qb, inner);
            qb.push(")");
        }
    }
}

fn push_junction(
    qb: &mut QueryBuilder<'_, Postgres>,
    inner: &[Predicate<Column>],
    separator: &str,
    empty: &str,
) {
    if inner.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, predicate) in inner.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        push_predicate(qb, predicate);
    }
    qb.push(")");
}

fn push_column(qb: &mut QueryBuilder<'_, Postgres>, column: &Column) {
    match column {
        Column::Id => {
            qb.push("id");
        }
        Column::MessageId => {
            qb.push("message_id");
        }
        Column::EventName => {
            qb.push("event_name");
        }
        Column::CreationTime => {
            qb.push("creation_time");
        }
        Column::ExtraProperty(key) => {
            qb.push("(extra_properties ->> ").push_bind(key.clone()).push(")");
        }
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, column: &Column, value: &FilterValue) {
    if matches!(column, Column::ExtraProperty(_)) {
        qb.push_bind(value.as_text());
        return;
    }
    match value {
        FilterValue::Text(s) => qb.push_bind(s.clone()),
        FilterValue::Uuid(id) => qb.push_bind(*id),
        FilterValue::Timestamp(ts) => qb.push_bind(*ts),
        FilterValue::Bool(b) => qb.push_bind(*b),
        FilterValue::Integer(n) => qb.push_bind(*n),
    };
}
