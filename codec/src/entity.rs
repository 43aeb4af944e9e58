//! Entity delta decoding.
//!
//! Props are addressed by their index in the class's flattened list. A prop
//! that fails to decode becomes [`PropValue::Unparsed`]; the rest of that
//! entity's list cannot be located, so the pass stops there.

use bitstream::{index_bits, BitReader, BitResult, Vector2, Vector3};
use protocol::{PropFlags, PropKind, ENTITY_SERIAL_BITS, MAX_EDICT_BITS};
use schema::{FlattenedClass, FlattenedProp, SendProp};
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::snapshot::{Baselines, EntitySnapshot};

/// Width of a string prop's byte length.
pub const PROP_STRING_LENGTH_BITS: u32 = 9;
/// Field index that ends a prop list.
pub const FIELD_INDEX_SENTINEL: u32 = 0xFFF;

/// A decoded prop value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Int(i64),
    Float(f32),
    Vector3(Vector3),
    Vector2(Vector2),
    String(String),
    Array(Vec<PropValue>),
    /// The value could not be decoded.
    Unparsed,
}

/// Props read for one entity, in wire order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropDelta {
    pub changes: Vec<(usize, PropValue)>,
    /// Set when decoding stopped early.
    pub error: Option<CodecError>,
}

/// What one entry of a `SvcPacketEntities` payload did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Enter {
        server_class: u32,
        serial: u32,
        recreated: bool,
    },
    Delta,
    Leave,
    Delete,
}

/// One applied entity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityUpdate {
    pub index: u32,
    pub kind: UpdateKind,
    pub changed_props: usize,
}

/// Result of applying a `SvcPacketEntities` payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityPass {
    pub updates: Vec<EntityUpdate>,
    pub error: Option<CodecError>,
}

/// Shape of a `SvcPacketEntities` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketEntitiesShape {
    pub updated_entries: u32,
    pub is_delta: bool,
    pub update_baseline: bool,
}

/// Decodes entity props against flattened classes.
#[derive(Debug, Clone, Copy)]
pub struct EntityDecoder<'a> {
    classes: &'a [FlattenedClass],
    delta_new_way: bool,
}

impl<'a> EntityDecoder<'a> {
    #[must_use]
    pub const fn new(classes: &'a [FlattenedClass], delta_new_way: bool) -> Self {
        Self {
            classes,
            delta_new_way,
        }
    }

    fn class(&self, server_class: u32) -> CodecResult<&'a FlattenedClass> {
        self.classes
            .get(server_class as usize)
            .ok_or(CodecError::UnknownServerClass {
                id: server_class,
                count: self.classes.len(),
            })
    }

    /// Reads one entity's changed props.
    pub fn read_props(&self, reader: &mut BitReader<'_>, server_class: u32) -> PropDelta {
        let mut delta = PropDelta::default();
        let class = match self.class(server_class) {
            Ok(class) => class,
            Err(err) => {
                delta.error = Some(err);
                return delta;
            }
        };
        if let Err(err) = self.read_props_into(reader, class, &mut delta.changes) {
            delta.error = Some(err);
        }
        delta
    }

    fn read_props_into(
        &self,
        reader: &mut BitReader<'_>,
        class: &FlattenedClass,
        changes: &mut Vec<(usize, PropValue)>,
    ) -> CodecResult<()> {
        let count = class.props.len();
        let new_way = self.delta_new_way && reader.read_bool()?;
        let mut last: i64 = -1;
        while let Some(index) = self.read_field_index(reader, last, new_way, count)? {
            let prop = class
                .props
                .get(index)
                .ok_or(CodecError::PropIndexOutOfRange { index, count })?;
            match decode_prop(reader, prop) {
                Ok(value) => changes.push((index, value)),
                Err(err) => {
                    changes.push((index, PropValue::Unparsed));
                    return Err(err);
                }
            }
            last = index as i64;
        }
        Ok(())
    }

    /// Next field index, or `None` at the end of the list.
    fn read_field_index(
        &self,
        reader: &mut BitReader<'_>,
        last: i64,
        new_way: bool,
        prop_count: usize,
    ) -> CodecResult<Option<usize>> {
        if !self.delta_new_way {
            if !reader.read_bool()? {
                return Ok(None);
            }
            let index = reader.read_bits(index_bits(prop_count as u32))?;
            return Ok(Some(index as usize));
        }

        if new_way && reader.read_bool()? {
            return Ok(Some((last + 1) as usize));
        }
        let offset = if new_way && reader.read_bool()? {
            reader.read_bits(3)?
        } else {
            let ret = reader.read_bits(7)?;
            match ret & (32 | 64) {
                32 => (ret & !96) | (reader.read_bits(2)? << 5),
                64 => (ret & !96) | (reader.read_bits(4)? << 5),
                96 => (ret & !96) | (reader.read_bits(7)? << 5),
                _ => ret,
            }
        };
        if offset == FIELD_INDEX_SENTINEL {
            return Ok(None);
        }
        Ok(Some((last + 1 + i64::from(offset)) as usize))
    }

    /// Applies a `SvcPacketEntities` payload to `snapshot`.
    pub fn apply_packet_entities(
        &self,
        reader: &mut BitReader<'_>,
        shape: PacketEntitiesShape,
        snapshot: &mut EntitySnapshot,
        baselines: &mut Baselines,
    ) -> EntityPass {
        let mut pass = EntityPass::default();
        if let Err(err) = self.apply_entries(reader, shape, snapshot, baselines, &mut pass.updates) {
            pass.error = Some(err);
        }
        debug!(
            updates = pass.updates.len(),
            failed = pass.error.is_some(),
            "applied packet entities"
        );
        pass
    }

    fn apply_entries(
        &self,
        reader: &mut BitReader<'_>,
        shape: PacketEntitiesShape,
        snapshot: &mut EntitySnapshot,
        baselines: &mut Baselines,
        updates: &mut Vec<EntityUpdate>,
    ) -> CodecResult<()> {
        let class_bits = index_bits(self.classes.len() as u32);
        let mut index: i64 = -1;

        for _ in 0..shape.updated_entries {
            index += 1 + i64::from(reader.read_ubit_int()?);
            let slot = index as usize;
            let leave = reader.read_bool()?;
            let second = reader.read_bool()?;

            let update = match (leave, second) {
                (false, true) => {
                    let server_class = reader.read_bits(class_bits)?;
                    let serial = reader.read_bits(ENTITY_SERIAL_BITS)?;
                    let recreated = snapshot.get(slot).map_or(true, |entity| {
                        entity.server_class != server_class || entity.serial != serial
                    });
                    let delta = self.read_props(reader, server_class);
                    let entity = snapshot.enter_pvs(
                        slot,
                        server_class,
                        serial,
                        recreated,
                        baselines.get(server_class),
                    )?;
                    crate::snapshot::write_props(&mut entity.props, &delta.changes);
                    if shape.update_baseline {
                        baselines.set(server_class, entity.props.clone());
                    }
                    let update = EntityUpdate {
                        index: slot as u32,
                        kind: UpdateKind::Enter {
                            server_class,
                            serial,
                            recreated,
                        },
                        changed_props: delta.changes.len(),
                    };
                    if let Some(err) = delta.error {
                        updates.push(update);
                        return Err(err);
                    }
                    update
                }
                (false, false) => {
                    let server_class = snapshot
                        .get(slot)
                        .map(|entity| entity.server_class)
                        .ok_or(CodecError::EntityNotFound { index: slot as u32 })?;
                    let delta = self.read_props(reader, server_class);
                    snapshot.apply_delta(slot, &delta.changes)?;
                    let update = EntityUpdate {
                        index: slot as u32,
                        kind: UpdateKind::Delta,
                        changed_props: delta.changes.len(),
                    };
                    if let Some(err) = delta.error {
                        updates.push(update);
                        return Err(err);
                    }
                    update
                }
                (true, delete) => {
                    snapshot.leave_pvs(slot, delete)?;
                    EntityUpdate {
                        index: slot as u32,
                        kind: if delete {
                            UpdateKind::Delete
                        } else {
                            UpdateKind::Leave
                        },
                        changed_props: 0,
                    }
                }
            };
            updates.push(update);
        }

        if shape.is_delta {
            while reader.read_bool()? {
                let slot = reader.read_bits(MAX_EDICT_BITS)?;
                snapshot.leave_pvs(slot as usize, true)?;
                updates.push(EntityUpdate {
                    index: slot,
                    kind: UpdateKind::Delete,
                    changed_props: 0,
                });
            }
        }
        Ok(())
    }

    /// Decodes a baseline blob into a full prop array for `server_class`.
    pub fn decode_baseline(
        &self,
        reader: &mut BitReader<'_>,
        server_class: u32,
    ) -> CodecResult<crate::snapshot::PropArray> {
        let class = self.class(server_class)?;
        let delta = self.read_props(reader, server_class);
        if let Some(err) = delta.error {
            return Err(err);
        }
        let mut props = vec![None; class.props.len()];
        crate::snapshot::write_props(&mut props, &delta.changes);
        Ok(props)
    }
}

/// Decodes one prop with its flattened descriptor.
pub fn decode_prop(reader: &mut BitReader<'_>, prop: &FlattenedProp) -> CodecResult<PropValue> {
    let desc = &prop.prop;
    let value = match desc.kind {
        PropKind::Array => {
            let element = prop
                .array_element
                .as_ref()
                .ok_or_else(|| CodecError::UnsupportedPropKind {
                    prop: prop.name.clone(),
                    kind: desc.kind,
                })?;
            let count = reader.read_bits(index_bits(desc.num_elements))?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(decode_scalar(reader, element, &prop.name)?);
            }
            PropValue::Array(items)
        }
        _ => decode_scalar(reader, desc, &prop.name)?,
    };
    Ok(value)
}

fn decode_scalar(reader: &mut BitReader<'_>, desc: &SendProp, name: &str) -> CodecResult<PropValue> {
    let value = match desc.kind {
        PropKind::Int => {
            if desc.has_flag(PropFlags::UNSIGNED) {
                PropValue::Int(i64::from(reader.read_bits(desc.num_bits)?))
            } else {
                PropValue::Int(i64::from(reader.read_sbits(desc.num_bits)?))
            }
        }
        PropKind::Float => PropValue::Float(read_float(reader, desc)?),
        PropKind::Vector3 => PropValue::Vector3(read_vector3(reader, desc)?),
        PropKind::Vector2 => PropValue::Vector2(Vector2 {
            x: read_float(reader, desc)?,
            y: read_float(reader, desc)?,
        }),
        PropKind::String => {
            let len = reader.read_bits(PROP_STRING_LENGTH_BITS)?;
            let bytes = reader.read_bytes(len as usize)?;
            PropValue::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        kind => {
            return Err(CodecError::UnsupportedPropKind {
                prop: name.to_string(),
                kind,
            })
        }
    };
    Ok(value)
}

fn read_float(reader: &mut BitReader<'_>, desc: &SendProp) -> BitResult<f32> {
    let flags = desc.flags;
    if flags.contains(PropFlags::COORD) {
        reader.read_bit_coord()
    } else if flags.contains(PropFlags::COORD_MP) {
        reader.read_bit_coord_mp(false, false)
    } else if flags.contains(PropFlags::COORD_MP_LOWPRECISION) {
        reader.read_bit_coord_mp(false, true)
    } else if flags.contains(PropFlags::COORD_MP_INTEGRAL) {
        reader.read_bit_coord_mp(true, false)
    } else if flags.contains(PropFlags::NOSCALE) {
        reader.read_f32()
    } else if flags.contains(PropFlags::NORMAL) {
        reader.read_bit_normal()
    } else if flags.contains(PropFlags::CELL_COORD) {
        reader.read_bit_cell_coord(desc.num_bits, false, false)
    } else if flags.contains(PropFlags::CELL_COORD_LOWPRECISION) {
        reader.read_bit_cell_coord(desc.num_bits, false, true)
    } else if flags.contains(PropFlags::CELL_COORD_INTEGRAL) {
        reader.read_bit_cell_coord(desc.num_bits, true, false)
    } else {
        let raw = reader.read_bits(desc.num_bits)?;
        if desc.num_bits == 0 {
            return Ok(desc.low_value);
        }
        let max = ((1u64 << desc.num_bits) - 1) as f32;
        Ok(desc.low_value + (desc.high_value - desc.low_value) * (raw as f32 / max))
    }
}

fn read_vector3(reader: &mut BitReader<'_>, desc: &SendProp) -> BitResult<Vector3> {
    let x = read_float(reader, desc)?;
    let y = read_float(reader, desc)?;
    let z = if desc.has_flag(PropFlags::NORMAL) {
        let negative = reader.read_bool()?;
        let sq = 1.0 - x * x - y * y;
        let z = if sq > 0.0 { sq.sqrt() } else { 0.0 };
        if negative {
            -z
        } else {
            z
        }
    } else {
        read_float(reader, desc)?
    };
    Ok(Vector3::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitstream::BitWriter;

    fn flat(prop: SendProp) -> FlattenedProp {
        FlattenedProp {
            name: prop.name.clone(),
            prop,
            array_element: None,
        }
    }

    fn class() -> FlattenedClass {
        FlattenedClass {
            props: vec![
                flat(SendProp::new(PropKind::Int, "m_iHealth", PropFlags::UNSIGNED, 10)),
                flat(SendProp::new(PropKind::Float, "m_flSpeed", 0, 8).with_range(0.0, 255.0)),
                flat(SendProp::new(PropKind::String, "m_szName", 0, 0)),
                flat(SendProp::new(PropKind::Int, "m_iDelta", 0, 6)),
            ],
            base_classes: Vec::new(),
        }
    }

    /// New-way field index: +1 shortcut or 3-bit offset.
    fn write_next(writer: &mut BitWriter, offset: u32) {
        if offset == 0 {
            writer.write_bool(true);
        } else {
            writer.write_bool(false);
            writer.write_bool(true);
            writer.write_bits(offset, 3).unwrap();
        }
    }

    fn write_end(writer: &mut BitWriter) {
        writer.write_bool(false);
        writer.write_bool(false);
        writer.write_bits(FIELD_INDEX_SENTINEL & 31 | 96, 7).unwrap();
        writer.write_bits(FIELD_INDEX_SENTINEL >> 5, 7).unwrap();
    }

    #[test]
    fn new_way_indices_and_kinds() {
        let classes = vec![class()];
        let decoder = EntityDecoder::new(&classes, true);
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        write_next(&mut writer, 0);
        writer.write_bits(250, 10).unwrap();
        write_next(&mut writer, 0);
        writer.write_bits(255, 8).unwrap();
        write_next(&mut writer, 1);
        writer.write_sbits(-3, 6).unwrap();
        write_end(&mut writer);
        let bytes = writer.finish();

        let delta = decoder.read_props(&mut BitReader::new(&bytes), 0);
        assert!(delta.error.is_none());
        assert_eq!(
            delta.changes,
            vec![
                (0, PropValue::Int(250)),
                (1, PropValue::Float(255.0)),
                (3, PropValue::Int(-3)),
            ]
        );
    }

    #[test]
    fn old_way_uses_seven_bit_offsets() {
        let classes = vec![class()];
        let decoder = EntityDecoder::new(&classes, true);
        let mut writer = BitWriter::new();
        writer.write_bool(false);
        writer.write_bits(2, 7).unwrap();
        writer.write_bits(3, PROP_STRING_LENGTH_BITS).unwrap();
        writer.write_bytes(b"bob");
        writer.write_bits(FIELD_INDEX_SENTINEL & 31 | 96, 7).unwrap();
        writer.write_bits(FIELD_INDEX_SENTINEL >> 5, 7).unwrap();
        let bytes = writer.finish();

        let delta = decoder.read_props(&mut BitReader::new(&bytes), 0);
        assert_eq!(delta.changes, vec![(2, PropValue::String("bob".into()))]);
        assert!(delta.error.is_none());
    }

    #[test]
    fn legacy_absolute_indices() {
        let classes = vec![class()];
        let decoder = EntityDecoder::new(&classes, false);
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        writer.write_bits(3, index_bits(4)).unwrap();
        writer.write_sbits(5, 6).unwrap();
        writer.write_bool(false);
        let bytes = writer.finish();

        let delta = decoder.read_props(&mut BitReader::new(&bytes), 0);
        assert_eq!(delta.changes, vec![(3, PropValue::Int(5))]);
    }

    #[test]
    fn truncated_prop_becomes_unparsed() {
        let classes = vec![class()];
        let decoder = EntityDecoder::new(&classes, true);
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        write_next(&mut writer, 0);
        writer.write_bits(3, 4).unwrap();
        let bytes = writer.finish();
        let mut reader = BitReader::at(&bytes, bitstream::BitSpan::new(0, 6)).unwrap();

        let delta = decoder.read_props(&mut reader, 0);
        assert_eq!(delta.changes, vec![(0, PropValue::Unparsed)]);
        assert!(delta.error.unwrap().is_out_of_range());
    }

    #[test]
    fn unknown_class_is_reported() {
        let classes = vec![class()];
        let decoder = EntityDecoder::new(&classes, true);
        let delta = decoder.read_props(&mut BitReader::new(&[0]), 4);
        assert!(matches!(
            delta.error,
            Some(CodecError::UnknownServerClass { id: 4, count: 1 })
        ));
    }

    #[test]
    fn array_prop_reads_count_then_elements() {
        let element = SendProp::new(PropKind::Int, "000", PropFlags::UNSIGNED, 4);
        let prop = FlattenedProp {
            name: "m_iAmmo".into(),
            prop: SendProp::array("m_iAmmo", 3),
            array_element: Some(element),
        };
        let mut writer = BitWriter::new();
        writer.write_bits(2, index_bits(3)).unwrap();
        writer.write_bits(9, 4).unwrap();
        writer.write_bits(1, 4).unwrap();
        let bytes = writer.finish();

        let value = decode_prop(&mut BitReader::new(&bytes), &prop).unwrap();
        assert_eq!(
            value,
            PropValue::Array(vec![PropValue::Int(9), PropValue::Int(1)])
        );
    }

    #[test]
    fn normal_vector_derives_z() {
        let prop = flat(SendProp::new(PropKind::Vector3, "m_vecNormal", PropFlags::NORMAL, 0));
        let mut writer = BitWriter::new();
        for _ in 0..2 {
            writer.write_bool(false);
            writer.write_bits(0, 11).unwrap();
        }
        writer.write_bool(true);
        let bytes = writer.finish();

        let value = decode_prop(&mut BitReader::new(&bytes), &prop).unwrap();
        assert_eq!(value, PropValue::Vector3(Vector3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn packet_entities_enter_delta_and_delete() {
        let classes = vec![class()];
        let decoder = EntityDecoder::new(&classes, true);
        let mut snapshot = EntitySnapshot::new();
        let mut baselines = Baselines::new();
        baselines.set(0, vec![Some(PropValue::Int(100)), None, None, None]);

        let mut writer = BitWriter::new();
        // enter slot 2
        writer.write_ubit_int(2).unwrap();
        writer.write_bool(false);
        writer.write_bool(true);
        writer.write_bits(0, index_bits(1)).unwrap();
        writer.write_bits(33, ENTITY_SERIAL_BITS).unwrap();
        writer.write_bool(true);
        write_next(&mut writer, 1);
        writer.write_bits(128, 8).unwrap();
        write_end(&mut writer);
        // delta slot 5
        writer.write_ubit_int(2).unwrap();
        writer.write_bool(false);
        writer.write_bool(false);
        writer.write_bool(true);
        write_next(&mut writer, 0);
        writer.write_bits(90, 10).unwrap();
        write_end(&mut writer);
        // explicit deletion of slot 7
        writer.write_bool(true);
        writer.write_bits(7, MAX_EDICT_BITS).unwrap();
        writer.write_bool(false);
        let bytes = writer.finish();

        snapshot.enter_pvs(5, 0, 1, true, None).unwrap();
        snapshot.enter_pvs(7, 0, 1, true, None).unwrap();
        let shape = PacketEntitiesShape {
            updated_entries: 2,
            is_delta: true,
            update_baseline: false,
        };
        let pass = decoder.apply_packet_entities(
            &mut BitReader::new(&bytes),
            shape,
            &mut snapshot,
            &mut baselines,
        );
        assert!(pass.error.is_none(), "{:?}", pass.error);
        assert_eq!(pass.updates.len(), 3);
        assert_eq!(pass.updates[2].kind, UpdateKind::Delete);

        let entered = snapshot.get(2).unwrap();
        assert_eq!(entered.serial, 33);
        assert_eq!(entered.props[0], Some(PropValue::Int(100)));
        assert!(matches!(entered.props[1], Some(PropValue::Float(_))));
        assert_eq!(snapshot.get(5).unwrap().props[0], Some(PropValue::Int(90)));
        assert!(snapshot.get(7).is_none());
        assert_eq!(baselines.get(0).unwrap()[0], Some(PropValue::Int(100)));
    }

    #[test]
    fn baseline_blob_decodes_to_full_array() {
        let classes = vec![class()];
        let decoder = EntityDecoder::new(&classes, true);
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        write_next(&mut writer, 0);
        writer.write_bits(50, 10).unwrap();
        write_end(&mut writer);
        let bytes = writer.finish();

        let props = decoder
            .decode_baseline(&mut BitReader::new(&bytes), 0)
            .unwrap();
        assert_eq!(props.len(), 4);
        assert_eq!(props[0], Some(PropValue::Int(50)));
        assert!(props[1].is_none());
    }
}
