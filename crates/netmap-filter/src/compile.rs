// SPDX-License-Identifier: Apache-2.0
//! Filter compilation.
//!
//! Each filter contributes one conjunct to the compiled predicate, so
//! filter order never matters. The four field shapes get distinct
//! logic/comparator/negation treatment; the array cases are the subtle
//! ones and are spelled out at their branches.

use crate::predicate::{Cmp, Predicate};
use crate::FilterError;
use netmap_model::{FilterParams, Operator, QueryFilter};
use netmap_schema::{ClassifiedSchema, FieldKind};

fn outer_cmp(operator: Operator) -> Cmp {
    match operator {
        Operator::Equal => Cmp::Eq,
        Operator::NotEqual => Cmp::Ne,
        Operator::Like => Cmp::Like,
        Operator::NotLike => Cmp::NotLike,
    }
}

/// OR across values by default ("matches any of these"); AND when the
/// operator negates ("differs from every one of these").
fn join(negating: bool, predicates: Vec<Predicate>) -> Predicate {
    if negating {
        Predicate::all(predicates)
    } else {
        Predicate::any(predicates)
    }
}

/// Compile a filter list against a classified schema into one
/// predicate.
///
/// Templated filters resolve their values from `params` when
/// `apply_templated` is set and are skipped entirely otherwise. Filters
/// with no values are always skipped, so an empty or all-empty filter
/// list compiles to [`Predicate::True`].
pub fn compile(
    filters: &[QueryFilter],
    schema: &ClassifiedSchema,
    params: &FilterParams,
    apply_templated: bool,
) -> Result<Predicate, FilterError> {
    let mut compiled = Predicate::True;

    for filter in filters {
        let values: Vec<String> = if filter.templated {
            if !apply_templated {
                continue;
            }
            params
                .get(&filter.field)
                .ok_or_else(|| FilterError::MissingTemplatedParam(filter.field.clone()))?
                .to_vec()
        } else {
            filter.value.clone()
        };
        if values.is_empty() {
            continue;
        }

        let operator = filter.operator();
        let negating = operator.is_negating();
        let cmp = outer_cmp(operator);
        let class = schema.resolve(&filter.field, operator);

        let predicate = match (class.kind, class.child) {
            (FieldKind::NestedObjectArray, Some(child)) => {
                // The inner test is always a positive membership check;
                // negation applies to the whole existential. In the
                // positive case every requested value must appear on
                // some element (AND of per-value EXISTS); negated, any
                // single match disqualifies the row (NOT over an OR).
                let inner_cmp = if operator.is_like() { Cmp::Like } else { Cmp::Eq };
                let per_value: Vec<Predicate> = values
                    .iter()
                    .map(|value| Predicate::Exists {
                        path: vec![class.parent.clone()],
                        inner: Box::new(Predicate::Compare {
                            path: vec![child.clone()],
                            cmp: inner_cmp,
                            value: value.clone(),
                        }),
                    })
                    .collect();
                let quantified = if negating {
                    Predicate::any(per_value)
                } else {
                    Predicate::all(per_value)
                };
                if negating {
                    Predicate::Not(Box::new(quantified))
                } else {
                    quantified
                }
            }
            (FieldKind::NestedObject, Some(child)) => {
                // Exactly one nested object, so a plain comparison on
                // `parent.child` suffices.
                let per_value = values
                    .iter()
                    .map(|value| Predicate::Compare {
                        path: vec![class.parent.clone(), child.clone()],
                        cmp,
                        value: value.clone(),
                    })
                    .collect();
                join(negating, per_value)
            }
            (FieldKind::StringArray, _) => {
                let per_value = values
                    .iter()
                    .map(|value| Predicate::Compare {
                        path: vec![],
                        cmp,
                        value: value.clone(),
                    })
                    .collect();
                Predicate::Exists {
                    path: vec![class.parent.clone()],
                    inner: Box::new(join(negating, per_value)),
                }
            }
            _ => {
                let per_value = values
                    .iter()
                    .map(|value| Predicate::Compare {
                        path: vec![class.parent.clone()],
                        cmp,
                        value: value.clone(),
                    })
                    .collect();
                join(negating, per_value)
            }
        };

        compiled = compiled.and(predicate);
    }

    tracing::debug!(predicate = ?compiled, "compiled filter list");
    Ok(compiled)
}
