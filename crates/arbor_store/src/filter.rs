use std::collections::BTreeMap;

use sea_orm::sea_query::{Condition, Expr, ExprTrait};

use arbor_core::{
    ArborError, ArborResult, ArchiveScope, COL_ARCHIVAL_REASON, COL_ARCHIVED, ColumnKind,
    EntitySchema, FieldValue, FilterSpec,
};

use crate::db::{col, value_to_sea};

/// Compile a `column → filter-spec` mapping into predicates against one
/// table. Unknown columns and kind-mismatched values are rejected here, at
/// composition time, before anything reaches the backend.
pub(crate) fn compile_filters(
    schema: &EntitySchema,
    filters: &BTreeMap<String, FilterSpec>,
) -> ArborResult<Condition> {
    let mut condition = Condition::all();
    for (name, filter) in filters {
        let (kind, _) = schema.column_kind(name).ok_or_else(|| {
            ArborError::invalid(format!(
                "unknown filter column `{name}` on `{}`",
                schema.table_name
            ))
        })?;
        condition = condition.add(compile_filter(name, kind, filter)?);
    }
    Ok(condition)
}

fn compile_filter(name: &str, kind: ColumnKind, filter: &FilterSpec) -> ArborResult<Condition> {
    let mut condition = Condition::all();
    match filter {
        FilterSpec::Equals(value) => {
            condition = condition.add(Expr::col(col(name)).eq(checked(name, kind, value)?));
        }
        FilterSpec::OneOf(values) => {
            let mut bindings = Vec::with_capacity(values.len());
            for value in values {
                bindings.push(checked(name, kind, value)?);
            }
            condition = condition.add(Expr::col(col(name)).is_in(bindings));
        }
        FilterSpec::Range { lower, upper } => {
            if lower.is_none() && upper.is_none() {
                return Err(ArborError::invalid(format!(
                    "range filter on `{name}` has no bounds"
                )));
            }
            if let Some(bound) = lower {
                let value = checked(name, kind, &bound.value)?;
                let expr = if bound.inclusive {
                    Expr::col(col(name)).gte(value)
                } else {
                    Expr::col(col(name)).gt(value)
                };
                condition = condition.add(expr);
            }
            if let Some(bound) = upper {
                let value = checked(name, kind, &bound.value)?;
                let expr = if bound.inclusive {
                    Expr::col(col(name)).lte(value)
                } else {
                    Expr::col(col(name)).lt(value)
                };
                condition = condition.add(expr);
            }
        }
        FilterSpec::IsNull => {
            condition = condition.add(Expr::col(col(name)).is_null());
        }
        FilterSpec::IsNotNull => {
            condition = condition.add(Expr::col(col(name)).is_not_null());
        }
    }
    Ok(condition)
}

fn checked(
    name: &str,
    kind: ColumnKind,
    value: &FieldValue,
) -> ArborResult<sea_orm::sea_query::Value> {
    if value.is_null() {
        return Err(ArborError::invalid(format!(
            "filter on `{name}` carries a null value, use IsNull instead"
        )));
    }
    if !kind.accepts(value) {
        return Err(ArborError::invalid(format!(
            "filter value type mismatch on `{name}`"
        )));
    }
    value_to_sea(kind, value)
}

/// Archive-scope predicate for list reads. `All` needs no predicate; the
/// reason-bearing scopes admit live rows plus archived rows whose recorded
/// reason matches, which leaves a null-reason row visible only under `All`.
pub(crate) fn archive_condition(
    schema: &EntitySchema,
    scope: &ArchiveScope,
) -> ArborResult<Option<Condition>> {
    ensure_scope_supported(schema, scope)?;
    let archived = Expr::col(col(COL_ARCHIVED));
    match scope {
        ArchiveScope::All => Ok(None),
        ArchiveScope::Live => Ok(Some(Condition::all().add(archived.eq(false)))),
        ArchiveScope::Reason(reason) => Ok(Some(
            Condition::any()
                .add(archived.eq(false))
                .add(Expr::col(col(COL_ARCHIVAL_REASON)).eq(reason.clone())),
        )),
        ArchiveScope::Reasons(reasons) => Ok(Some(
            Condition::any()
                .add(archived.eq(false))
                .add(Expr::col(col(COL_ARCHIVAL_REASON)).is_in(reasons.clone())),
        )),
    }
}

pub(crate) fn ensure_scope_supported(
    schema: &EntitySchema,
    scope: &ArchiveScope,
) -> ArborResult<()> {
    if scope.names_reasons() && !schema.has_archival_reason() {
        return Err(ArborError::invalid(format!(
            "entity `{}` has no archival_reason column",
            schema.entity_name
        )));
    }
    Ok(())
}
