//! Deterministic flattened-order fingerprints.

use blake3::Hasher;
use protocol::PropKind;

use crate::flatten::FlattenedClass;
use crate::table::SendProp;

/// Digests the flattened order of every class.
///
/// Two flattenings produce the same fingerprint exactly when every class
/// lists the same props, with the same encodings, in the same order.
#[must_use]
pub fn flattened_fingerprint(classes: &[FlattenedClass]) -> u64 {
    let mut hasher = Hasher::new();
    write_u32(&mut hasher, classes.len() as u32);

    for class in classes {
        write_u32(&mut hasher, class.props.len() as u32);
        for flat in &class.props {
            write_str(&mut hasher, &flat.name);
            write_prop(&mut hasher, &flat.prop);
            match &flat.array_element {
                Some(element) => {
                    write_u8(&mut hasher, 1);
                    write_prop(&mut hasher, element);
                }
                None => write_u8(&mut hasher, 0),
            }
        }
    }

    let hash = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(out)
}

fn write_prop(hasher: &mut Hasher, prop: &SendProp) {
    write_u8(hasher, kind_tag(prop.kind));
    write_u32(hasher, prop.flags.bits());
    write_u8(hasher, prop.priority);
    write_u32(hasher, prop.num_bits);
    write_u32(hasher, prop.num_elements);
    write_u32(hasher, prop.low_value.to_bits());
    write_u32(hasher, prop.high_value.to_bits());
}

const fn kind_tag(kind: PropKind) -> u8 {
    match kind {
        PropKind::Unknown => 0,
        PropKind::Invalid => 1,
        PropKind::Int => 2,
        PropKind::Float => 3,
        PropKind::Vector3 => 4,
        PropKind::Vector2 => 5,
        PropKind::String => 6,
        PropKind::Array => 7,
        PropKind::DataTable => 8,
    }
}

fn write_str(hasher: &mut Hasher, value: &str) {
    write_u32(hasher, value.len() as u32);
    hasher.update(value.as_bytes());
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}

fn write_u32(hasher: &mut Hasher, value: u32) {
    hasher.update(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::FlattenedProp;

    fn class(names: &[&str]) -> FlattenedClass {
        FlattenedClass {
            props: names
                .iter()
                .map(|name| FlattenedProp {
                    name: (*name).to_string(),
                    prop: SendProp::new(PropKind::Int, *name, 0, 8),
                    array_element: None,
                })
                .collect(),
            base_classes: Vec::new(),
        }
    }

    #[test]
    fn fingerprint_is_stable() {
        let classes = vec![class(&["a", "b"])];
        assert_eq!(
            flattened_fingerprint(&classes),
            flattened_fingerprint(&classes.clone())
        );
    }

    #[test]
    fn fingerprint_changes_with_prop_order() {
        let a = vec![class(&["a", "b"])];
        let b = vec![class(&["b", "a"])];
        assert_ne!(flattened_fingerprint(&a), flattened_fingerprint(&b));
    }

    #[test]
    fn fingerprint_changes_with_class_boundaries() {
        let a = vec![class(&["a"]), class(&["b"])];
        let b = vec![class(&["a", "b"])];
        assert_ne!(flattened_fingerprint(&a), flattened_fingerprint(&b));
    }

    #[test]
    fn fingerprint_ignores_base_class_list() {
        let mut with_base = class(&["a"]);
        with_base.base_classes.push("DT_Base".to_string());
        assert_eq!(
            flattened_fingerprint(&[with_base]),
            flattened_fingerprint(&[class(&["a"])])
        );
    }
}
