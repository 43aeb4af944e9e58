//! Send table flattening.
//!
//! Each server class's nested table graph is resolved into one ordered list
//! of leaf props. Entity deltas address props by their index in this list,
//! so the order must match the engine exactly: nested non-collapsible tables
//! are emitted before the props of the table that contains them, and the
//! final list is reordered so frequently-changing props come first.

use std::collections::HashSet;

use protocol::{PropFlags, PropKind};

use crate::error::{SchemaError, SchemaResult};
use crate::table::{DataTables, SendProp, SendTable, ServerClass};

/// Maximum table nesting depth.
pub const MAX_TABLE_DEPTH: usize = 64;

/// Priority bucket that also collects `CHANGES_OFTEN` props.
pub const CHANGES_OFTEN_PRIORITY: u8 = 64;

/// A leaf prop in its class's flattened order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlattenedProp {
    /// Dotted path from the class's root table.
    pub name: String,
    pub prop: SendProp,
    /// Element descriptor of an array prop.
    pub array_element: Option<SendProp>,
}

/// Flattening output for one server class.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlattenedClass {
    pub props: Vec<FlattenedProp>,
    /// Tables reached through `baseclass` props, nearest first.
    pub base_classes: Vec<String>,
}

/// How step four orders the flattened list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reorder {
    /// One pass moving `CHANGES_OFTEN` props to the front.
    ChangesOften,
    /// Buckets by ascending priority, with `CHANGES_OFTEN` joining bucket 64.
    Priority,
}

impl Reorder {
    /// The rule used by a protocol generation.
    #[must_use]
    pub const fn for_priority(has_prop_priority: bool) -> Self {
        if has_prop_priority {
            Self::Priority
        } else {
            Self::ChangesOften
        }
    }
}

/// `(table, prop)` pairs removed by exclude props.
type Excludes = HashSet<(String, String)>;

/// Flattens every class of `tables`, in class order.
pub fn flatten_all(tables: &DataTables, reorder: Reorder) -> SchemaResult<Vec<FlattenedClass>> {
    tables
        .classes
        .iter()
        .map(|class| flatten_class(tables, class, reorder))
        .collect()
}

/// Flattens one class.
pub fn flatten_class(
    tables: &DataTables,
    class: &ServerClass,
    reorder: Reorder,
) -> SchemaResult<FlattenedClass> {
    let root = lookup(tables, &class.data_table_name)?;

    let mut excludes = Excludes::new();
    let mut base_classes = Vec::new();
    collect_excludes(tables, root, true, &mut excludes, &mut base_classes, 0)?;

    let mut props = Vec::new();
    gather(tables, root, "", &excludes, &mut props, 0)?;

    match reorder {
        Reorder::ChangesOften => sort_changes_often(&mut props),
        Reorder::Priority => sort_by_priority(&mut props),
    }

    Ok(FlattenedClass {
        props,
        base_classes,
    })
}

fn lookup<'a>(tables: &'a DataTables, name: &str) -> SchemaResult<&'a SendTable> {
    tables.table(name).ok_or_else(|| SchemaError::MissingTable {
        name: name.to_string(),
    })
}

fn check_depth(table: &SendTable, depth: usize) -> SchemaResult<()> {
    if depth > MAX_TABLE_DEPTH {
        return Err(SchemaError::TooDeep {
            table: table.name.clone(),
            limit: MAX_TABLE_DEPTH,
        });
    }
    Ok(())
}

fn collect_excludes(
    tables: &DataTables,
    table: &SendTable,
    follow_base: bool,
    excludes: &mut Excludes,
    base_classes: &mut Vec<String>,
    depth: usize,
) -> SchemaResult<()> {
    check_depth(table, depth)?;
    for prop in &table.props {
        if prop.has_flag(PropFlags::EXCLUDE) {
            let from = prop.table_name.clone().unwrap_or_default();
            excludes.insert((from, prop.name.clone()));
        } else if prop.kind == PropKind::DataTable {
            let target = prop.table_name.as_deref().unwrap_or_default();
            let sub = lookup(tables, target)?;
            let is_base = follow_base && prop.name == "baseclass";
            if is_base {
                base_classes.push(sub.name.clone());
            }
            collect_excludes(tables, sub, is_base, excludes, base_classes, depth + 1)?;
        }
    }
    Ok(())
}

/// Emits `table`'s props into a fresh list appended to `out` after any
/// nested non-collapsible tables have been emitted.
fn gather(
    tables: &DataTables,
    table: &SendTable,
    prefix: &str,
    excludes: &Excludes,
    out: &mut Vec<FlattenedProp>,
    depth: usize,
) -> SchemaResult<()> {
    let mut local = Vec::new();
    gather_into(tables, table, prefix, excludes, &mut local, out, depth)?;
    out.append(&mut local);
    Ok(())
}

fn gather_into(
    tables: &DataTables,
    table: &SendTable,
    prefix: &str,
    excludes: &Excludes,
    local: &mut Vec<FlattenedProp>,
    out: &mut Vec<FlattenedProp>,
    depth: usize,
) -> SchemaResult<()> {
    check_depth(table, depth)?;
    for (i, prop) in table.props.iter().enumerate() {
        if prop.has_flag(PropFlags::INSIDE_ARRAY)
            || prop.has_flag(PropFlags::EXCLUDE)
            || excludes.contains(&(table.name.clone(), prop.name.clone()))
        {
            continue;
        }
        if prop.kind == PropKind::DataTable {
            let target = prop.table_name.as_deref().unwrap_or_default();
            let sub = lookup(tables, target)?;
            if prop.has_flag(PropFlags::COLLAPSIBLE) {
                gather_into(tables, sub, prefix, excludes, local, out, depth + 1)?;
            } else {
                let nested = if prop.name.is_empty() {
                    prefix.to_string()
                } else {
                    format!("{prefix}{}.", prop.name)
                };
                gather(tables, sub, &nested, excludes, out, depth + 1)?;
            }
            continue;
        }
        let array_element = if prop.kind == PropKind::Array {
            let element = i
                .checked_sub(1)
                .and_then(|j| table.props.get(j))
                .ok_or_else(|| SchemaError::MissingArrayElement {
                    table: table.name.clone(),
                    prop: prop.name.clone(),
                })?;
            Some(element.clone())
        } else {
            None
        };
        local.push(FlattenedProp {
            name: format!("{prefix}{}", prop.name),
            prop: prop.clone(),
            array_element,
        });
    }
    Ok(())
}

/// Single forward pass: each `CHANGES_OFTEN` prop is swapped to the front.
fn sort_changes_often(props: &mut [FlattenedProp]) {
    let mut start = 0;
    for i in 0..props.len() {
        if props[i].prop.has_flag(PropFlags::CHANGES_OFTEN) {
            if i != start {
                props.swap(i, start);
            }
            start += 1;
        }
    }
}

/// Per ascending priority bucket, repeatedly scans forward from the bucket
/// start and swaps the first member found into place.
fn sort_by_priority(props: &mut [FlattenedProp]) {
    let mut priorities: Vec<u8> = props.iter().map(|p| p.prop.priority).collect();
    priorities.push(CHANGES_OFTEN_PRIORITY);
    priorities.sort_unstable();
    priorities.dedup();

    let mut start = 0;
    for priority in priorities {
        loop {
            let found = (start..props.len()).find(|&i| {
                let prop = &props[i].prop;
                prop.priority == priority
                    || (priority == CHANGES_OFTEN_PRIORITY
                        && prop.has_flag(PropFlags::CHANGES_OFTEN))
            });
            let Some(i) = found else { break };
            if i != start {
                props.swap(i, start);
            }
            start += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(name: &str, flags: u32) -> SendProp {
        SendProp::new(PropKind::Int, name, flags, 8)
    }

    fn names(class: &FlattenedClass) -> Vec<&str> {
        class.props.iter().map(|p| p.name.as_str()).collect()
    }

    fn single_class(tables: Vec<SendTable>, root: &str) -> DataTables {
        DataTables::new(tables, vec![ServerClass::new(0, "CTest", root)])
    }

    #[test]
    fn nested_tables_come_before_parent_props() {
        let data = single_class(
            vec![
                SendTable::new("DT_Inner", vec![int("a", 0), int("b", 0)]),
                SendTable::new(
                    "DT_Root",
                    vec![int("x", 0), SendProp::data_table("inner", "DT_Inner", 0), int("y", 0)],
                ),
            ],
            "DT_Root",
        );
        let flat = flatten_class(&data, &data.classes[0], Reorder::ChangesOften).unwrap();
        assert_eq!(names(&flat), ["inner.a", "inner.b", "x", "y"]);
    }

    #[test]
    fn collapsible_tables_inline_without_prefix() {
        let data = single_class(
            vec![
                SendTable::new("DT_Inner", vec![int("a", 0)]),
                SendTable::new(
                    "DT_Root",
                    vec![
                        int("x", 0),
                        SendProp::data_table("inner", "DT_Inner", PropFlags::COLLAPSIBLE),
                        int("y", 0),
                    ],
                ),
            ],
            "DT_Root",
        );
        let flat = flatten_class(&data, &data.classes[0], Reorder::ChangesOften).unwrap();
        assert_eq!(names(&flat), ["x", "a", "y"]);
    }

    #[test]
    fn excludes_and_inside_array_are_skipped() {
        let data = single_class(
            vec![
                SendTable::new("DT_Base", vec![int("keep", 0), int("drop", 0)]),
                SendTable::new(
                    "DT_Root",
                    vec![
                        SendProp::data_table("baseclass", "DT_Base", 0),
                        SendProp::exclude("drop", "DT_Base"),
                        int("elem", PropFlags::INSIDE_ARRAY),
                        SendProp::array("list", 4),
                    ],
                ),
            ],
            "DT_Root",
        );
        let flat = flatten_class(&data, &data.classes[0], Reorder::ChangesOften).unwrap();
        assert_eq!(names(&flat), ["baseclass.keep", "list"]);
        assert_eq!(flat.base_classes, ["DT_Base"]);
        let element = flat.props[1].array_element.as_ref().unwrap();
        assert_eq!(element.name, "elem");
    }

    #[test]
    fn changes_often_swaps_to_front() {
        let data = single_class(
            vec![SendTable::new(
                "DT_Root",
                vec![
                    int("a", 0),
                    int("b", PropFlags::CHANGES_OFTEN),
                    int("c", 0),
                    int("d", PropFlags::CHANGES_OFTEN),
                ],
            )],
            "DT_Root",
        );
        let flat = flatten_class(&data, &data.classes[0], Reorder::ChangesOften).unwrap();
        assert_eq!(names(&flat), ["b", "d", "c", "a"]);
    }

    #[test]
    fn priority_buckets_fold_changes_often_into_64() {
        let data = single_class(
            vec![SendTable::new(
                "DT_Root",
                vec![
                    int("p128", 0).with_priority(128),
                    int("often", PropFlags::CHANGES_OFTEN).with_priority(128),
                    int("p0", 0).with_priority(0),
                    int("p64", 0).with_priority(64),
                ],
            )],
            "DT_Root",
        );
        let flat = flatten_class(&data, &data.classes[0], Reorder::Priority).unwrap();
        assert_eq!(names(&flat), ["p0", "often", "p64", "p128"]);
    }

    #[test]
    fn missing_table_is_an_error() {
        let data = single_class(
            vec![SendTable::new(
                "DT_Root",
                vec![SendProp::data_table("sub", "DT_Nope", 0)],
            )],
            "DT_Root",
        );
        let err = flatten_class(&data, &data.classes[0], Reorder::ChangesOften).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingTable {
                name: "DT_Nope".to_string()
            }
        );
    }

    #[test]
    fn self_referencing_table_is_bounded() {
        let data = single_class(
            vec![SendTable::new(
                "DT_Loop",
                vec![SendProp::data_table("again", "DT_Loop", 0)],
            )],
            "DT_Loop",
        );
        let err = flatten_class(&data, &data.classes[0], Reorder::ChangesOften).unwrap_err();
        assert!(matches!(err, SchemaError::TooDeep { .. }));
    }

    #[test]
    fn array_without_element_is_an_error() {
        let data = single_class(
            vec![SendTable::new("DT_Root", vec![SendProp::array("list", 2)])],
            "DT_Root",
        );
        let err = flatten_class(&data, &data.classes[0], Reorder::ChangesOften).unwrap_err();
        assert!(matches!(err, SchemaError::MissingArrayElement { .. }));
    }
}
