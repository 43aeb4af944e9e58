//! Send tables, send props and server classes.

use std::collections::HashMap;

use bitstream::{BitReader, BitWriter};
use protocol::{PropFlags, PropKind, ProtocolFacts};

use crate::error::{SchemaError, SchemaResult};

/// Width of a send prop's type field.
pub const PROP_TYPE_BITS: u32 = 5;
/// Width of an array prop's element count.
pub const PROP_NUM_ELEMENTS_BITS: u32 = 10;
/// Width of a numeric prop's bit count.
pub const PROP_NUM_BITS_BITS: u32 = 7;
/// Width of a send table's prop count.
pub const TABLE_NUM_PROPS_BITS: u32 = 10;

/// One field of a send table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SendProp {
    pub kind: PropKind,
    pub name: String,
    pub flags: PropFlags,
    /// Per-prop ordering priority; zero when the protocol has none.
    pub priority: u8,
    /// Target of a data table prop, or the table an exclude prop removes
    /// `name` from.
    pub table_name: Option<String>,
    /// Element count of an array prop.
    pub num_elements: u32,
    pub low_value: f32,
    pub high_value: f32,
    /// Encoded width of a numeric prop.
    pub num_bits: u32,
}

impl SendProp {
    /// A numeric prop with no range.
    #[must_use]
    pub fn new(kind: PropKind, name: impl Into<String>, flags: u32, num_bits: u32) -> Self {
        Self {
            kind,
            name: name.into(),
            flags: PropFlags::from_bits(flags),
            priority: 0,
            table_name: None,
            num_elements: 0,
            low_value: 0.0,
            high_value: 0.0,
            num_bits,
        }
    }

    /// A prop that nests `table`.
    #[must_use]
    pub fn data_table(name: impl Into<String>, table: impl Into<String>, flags: u32) -> Self {
        Self {
            table_name: Some(table.into()),
            ..Self::new(PropKind::DataTable, name, flags, 0)
        }
    }

    /// A prop that removes `name` from `table` during flattening.
    #[must_use]
    pub fn exclude(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            table_name: Some(table.into()),
            ..Self::new(PropKind::Int, name, PropFlags::EXCLUDE, 0)
        }
    }

    /// An array prop; the element prop must precede it in its table.
    #[must_use]
    pub fn array(name: impl Into<String>, num_elements: u32) -> Self {
        Self {
            num_elements,
            ..Self::new(PropKind::Array, name, 0, 0)
        }
    }

    /// Sets the quantization range.
    #[must_use]
    pub const fn with_range(mut self, low: f32, high: f32) -> Self {
        self.low_value = low;
        self.high_value = high;
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn has_flag(&self, flag: u32) -> bool {
        self.flags.contains(flag)
    }

    /// Reads one prop.
    pub fn read(reader: &mut BitReader<'_>, facts: &ProtocolFacts) -> SchemaResult<Self> {
        let type_byte = reader.read_bits(PROP_TYPE_BITS)? as u8;
        let name = reader.read_cstring()?;
        let kind = facts.prop_kind(type_byte);
        if matches!(kind, PropKind::Unknown | PropKind::Invalid) {
            return Err(SchemaError::UnknownPropType {
                byte: type_byte,
                prop: name,
            });
        }
        let layout = facts.prop_flag_layout;
        let flags = PropFlags::from_raw(reader.read_bits(layout.bits())?, layout);
        let priority = if facts.has_prop_priority {
            reader.read_u8()?
        } else {
            0
        };
        let mut prop = Self {
            flags,
            priority,
            ..Self::new(kind, name, 0, 0)
        };
        if kind == PropKind::DataTable || flags.contains(PropFlags::EXCLUDE) {
            prop.table_name = Some(reader.read_cstring()?);
        } else if kind == PropKind::Array {
            prop.num_elements = reader.read_bits(PROP_NUM_ELEMENTS_BITS)?;
        } else {
            prop.low_value = reader.read_f32()?;
            prop.high_value = reader.read_f32()?;
            prop.num_bits = reader.read_bits(PROP_NUM_BITS_BITS)?;
        }
        Ok(prop)
    }

    /// Encodes the prop in `facts`' layout.
    pub fn write(&self, writer: &mut BitWriter, facts: &ProtocolFacts) -> SchemaResult<()> {
        let type_byte = facts
            .prop_kind_byte(self.kind)
            .map_err(|_| SchemaError::UnknownPropType {
                byte: u8::MAX,
                prop: self.name.clone(),
            })?;
        writer.write_bits(u32::from(type_byte), PROP_TYPE_BITS)?;
        writer.write_cstring(&self.name);
        let layout = facts.prop_flag_layout;
        writer.write_bits(self.flags.to_raw(layout), layout.bits())?;
        if facts.has_prop_priority {
            writer.write_u8(self.priority);
        }
        if self.kind == PropKind::DataTable || self.has_flag(PropFlags::EXCLUDE) {
            writer.write_cstring(self.table_name.as_deref().unwrap_or(""));
        } else if self.kind == PropKind::Array {
            writer.write_bits(self.num_elements, PROP_NUM_ELEMENTS_BITS)?;
        } else {
            writer.write_f32(self.low_value);
            writer.write_f32(self.high_value);
            writer.write_bits(self.num_bits, PROP_NUM_BITS_BITS)?;
        }
        Ok(())
    }
}

/// A named, ordered list of send props.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SendTable {
    pub name: String,
    pub needs_decoder: bool,
    pub props: Vec<SendProp>,
}

impl SendTable {
    #[must_use]
    pub fn new(name: impl Into<String>, props: Vec<SendProp>) -> Self {
        Self {
            name: name.into(),
            needs_decoder: false,
            props,
        }
    }

    /// Reads a table body (after its presence bit).
    pub fn read(reader: &mut BitReader<'_>, facts: &ProtocolFacts) -> SchemaResult<Self> {
        let needs_decoder = reader.read_bool()?;
        let name = reader.read_cstring()?;
        let count = reader.read_bits(TABLE_NUM_PROPS_BITS)?;
        let mut props = Vec::with_capacity(count as usize);
        for _ in 0..count {
            props.push(SendProp::read(reader, facts)?);
        }
        Ok(Self {
            name,
            needs_decoder,
            props,
        })
    }

    pub fn write(&self, writer: &mut BitWriter, facts: &ProtocolFacts) -> SchemaResult<()> {
        writer.write_bool(self.needs_decoder);
        writer.write_cstring(&self.name);
        writer.write_bits(self.props.len() as u32, TABLE_NUM_PROPS_BITS)?;
        for prop in &self.props {
            prop.write(writer, facts)?;
        }
        Ok(())
    }
}

/// A networked entity class and its root send table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerClass {
    pub data_table_id: u16,
    pub class_name: String,
    pub data_table_name: String,
}

impl ServerClass {
    #[must_use]
    pub fn new(
        data_table_id: u16,
        class_name: impl Into<String>,
        data_table_name: impl Into<String>,
    ) -> Self {
        Self {
            data_table_id,
            class_name: class_name.into(),
            data_table_name: data_table_name.into(),
        }
    }

    pub fn read(reader: &mut BitReader<'_>) -> SchemaResult<Self> {
        Ok(Self {
            data_table_id: reader.read_u16()?,
            class_name: reader.read_cstring()?,
            data_table_name: reader.read_cstring()?,
        })
    }

    pub fn write(&self, writer: &mut BitWriter) {
        writer.write_u16(self.data_table_id);
        writer.write_cstring(&self.class_name);
        writer.write_cstring(&self.data_table_name);
    }
}

/// The contents of a `DataTables` frame: every send table, then the class
/// catalog.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataTables {
    pub tables: Vec<SendTable>,
    pub classes: Vec<ServerClass>,
    by_name: HashMap<String, usize>,
}

impl DataTables {
    #[must_use]
    pub fn new(tables: Vec<SendTable>, classes: Vec<ServerClass>) -> Self {
        let mut by_name = HashMap::with_capacity(tables.len());
        for (i, table) in tables.iter().enumerate() {
            by_name.entry(table.name.clone()).or_insert(i);
        }
        Self {
            tables,
            classes,
            by_name,
        }
    }

    /// Looks a table up by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&SendTable> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    /// Reads a `DataTables` payload.
    pub fn read(reader: &mut BitReader<'_>, facts: &ProtocolFacts) -> SchemaResult<Self> {
        let mut tables = Vec::new();
        while reader.read_bool()? {
            tables.push(SendTable::read(reader, facts)?);
        }
        let count = reader.read_u16()?;
        let mut classes = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            classes.push(ServerClass::read(reader)?);
        }
        tracing::debug!(
            tables = tables.len(),
            classes = classes.len(),
            "read data tables"
        );
        Ok(Self::new(tables, classes))
    }

    pub fn write(&self, writer: &mut BitWriter, facts: &ProtocolFacts) -> SchemaResult<()> {
        for table in &self.tables {
            writer.write_bool(true);
            table.write(writer, facts)?;
        }
        writer.write_bool(false);
        writer.write_u16(self.classes.len() as u16);
        for class in &self.classes {
            class.write(writer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tables() -> DataTables {
        let base = SendTable::new(
            "DT_Base",
            vec![
                SendProp::new(PropKind::Int, "m_iHealth", 0, 10),
                SendProp::new(PropKind::Float, "m_flSpeed", PropFlags::NOSCALE, 32)
                    .with_range(0.0, 1.0),
            ],
        );
        let derived = SendTable::new(
            "DT_Derived",
            vec![
                SendProp::data_table("baseclass", "DT_Base", 0),
                SendProp::exclude("m_flSpeed", "DT_Base"),
                SendProp::new(PropKind::Int, "elem", PropFlags::INSIDE_ARRAY, 4),
                SendProp::array("m_list", 3),
            ],
        );
        DataTables::new(
            vec![base, derived],
            vec![ServerClass::new(0, "CDerived", "DT_Derived")],
        )
    }

    #[test]
    fn data_tables_roundtrip_per_generation() {
        for (demo, net) in [(2, 7), (3, 24), (4, 2001)] {
            let facts = ProtocolFacts::new(demo, net);
            let tables = sample_tables();
            let mut w = BitWriter::new();
            tables.write(&mut w, &facts).unwrap();
            let bytes = w.finish();
            let decoded = DataTables::read(&mut BitReader::new(&bytes), &facts).unwrap();
            assert_eq!(decoded, tables, "protocol {demo}/{net}");
        }
    }

    #[test]
    fn priority_only_on_new_engine() {
        let prop = SendProp::new(PropKind::Int, "x", 0, 1).with_priority(3);
        let old = ProtocolFacts::new(3, 24);
        let new = ProtocolFacts::new(4, 2001);
        let mut a = BitWriter::new();
        prop.write(&mut a, &old).unwrap();
        let mut b = BitWriter::new();
        prop.write(&mut b, &new).unwrap();
        // 8 priority bits plus the wider flag field.
        assert_eq!(b.bits_written() - a.bits_written(), 8 + 3);

        let bytes = a.finish();
        let decoded = SendProp::read(&mut BitReader::new(&bytes), &old).unwrap();
        assert_eq!(decoded.priority, 0);
    }

    #[test]
    fn vector2_is_rejected_on_original_engine() {
        let facts = ProtocolFacts::new(2, 7);
        let mut w = BitWriter::new();
        w.write_bits(6, PROP_TYPE_BITS).unwrap();
        w.write_cstring("m_vecXY");
        let bytes = w.finish();
        let err = SendProp::read(&mut BitReader::new(&bytes), &facts).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownPropType { byte: 6, .. }));
    }

    #[test]
    fn table_lookup_by_name() {
        let tables = sample_tables();
        assert_eq!(tables.table("DT_Base").unwrap().props.len(), 2);
        assert!(tables.table("DT_Missing").is_none());
    }

    #[test]
    fn server_class_equality_is_structural() {
        assert_eq!(
            ServerClass::new(1, "CWorld", "DT_World"),
            ServerClass::new(1, "CWorld", "DT_World")
        );
        assert_ne!(
            ServerClass::new(1, "CWorld", "DT_World"),
            ServerClass::new(2, "CWorld", "DT_World")
        );
    }
}
