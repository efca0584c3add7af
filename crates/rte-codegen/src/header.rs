//! CMSIS header generator (§4.8.1), grounded on
//! `SVDGenerator/src/HeaderData_RegStructure.cpp`,
//! `HeaderData_Peripheral.cpp` and `HeaderData_Field.cpp`: walks the
//! resolved device + SVD tree and emits one C header with nested
//! anonymous struct/union trees packed with natural alignment and
//! reserved padding.

use std::fmt::Write as _;

use crate::svd::{Access, Cluster, Field, Peripheral, Register, RegisterOrCluster, SvdDevice};

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("register '{0}' at offset {1:#x} exceeds its declared dim_increment of {2:#x}")]
    SizeExceedsIncrement(String, u64, u64),
}

fn c_type_for_width(bits: u32) -> &'static str {
    match bits {
        8 => "uint8_t",
        16 => "uint16_t",
        64 => "uint64_t",
        _ => "uint32_t",
    }
}

/// Emits the field bitfield list, ascending by `bit_offset`, filling gaps
/// with anonymous unnamed bitfields of the register's base type
/// (§4.8.1 "Field bitfields").
fn emit_fields(out: &mut String, reg: &Register, indent: &str) {
    let mut fields: Vec<&Field> = reg.fields.iter().collect();
    fields.sort_by_key(|f| f.bit_offset);
    let total_bits = reg.size;
    let ty = c_type_for_width(reg.size);

    let _ = writeln!(out, "{indent}union {{");
    let _ = writeln!(out, "{indent}  struct {{");
    let mut cursor = 0u32;
    for f in &fields {
        if f.bit_offset > cursor {
            let gap = f.bit_offset - cursor;
            let _ = writeln!(out, "{indent}    {ty} _reserved{cursor} : {gap};");
        }
        let _ = writeln!(out, "{indent}    {ty} {} : {};", f.name, f.bit_width);
        cursor = f.bit_offset + f.bit_width;
    }
    if cursor < total_bits {
        let gap = total_bits - cursor;
        let _ = writeln!(out, "{indent}    {ty} _reserved{cursor} : {gap};");
    }
    let _ = writeln!(out, "{indent}  }} {}_b;", reg.name);
    let _ = writeln!(out, "{indent}  {ty} {};", reg.name);
    let _ = writeln!(out, "{indent}}};");
}

/// One 4-byte-aligned "word slot" collecting the registers that overlay
/// it: at most one 32-bit register, up to two 16-bit registers (at
/// suboffset 0/2), up to four 8-bit registers (at suboffset 0..3),
/// matching the INT→SHORT[0..1]→BYTE[0..3] bucket tree of §4.8.1.
#[derive(Default)]
struct WordSlot<'a> {
    int_reg: Option<&'a Register>,
    short_regs: [Option<&'a Register>; 2],
    byte_regs: [Option<&'a Register>; 4],
}

fn bucket_registers(registers: &[&Register]) -> Vec<(u64, WordSlot<'_>)> {
    use std::collections::BTreeMap;
    let mut words: BTreeMap<u64, WordSlot<'_>> = BTreeMap::new();
    for &r in registers {
        let word_base = r.address_offset & !0x3;
        let slot = words.entry(word_base).or_default();
        match r.size {
            32 | 64 => slot.int_reg = Some(r),
            16 => {
                let idx = ((r.address_offset - word_base) / 2) as usize;
                if idx < 2 {
                    slot.short_regs[idx] = Some(r);
                }
            }
            8 => {
                let idx = (r.address_offset - word_base) as usize;
                if idx < 4 {
                    slot.byte_regs[idx] = Some(r);
                }
            }
            _ => slot.int_reg = Some(r),
        }
    }
    words.into_iter().collect()
}

fn emit_register_decl(out: &mut String, reg: &Register, indent: &str) {
    if reg.fields.is_empty() {
        let _ = writeln!(
            out,
            "{indent}{} {} {}; /*!< {} */",
            reg.access.c_prefix(),
            c_type_for_width(reg.size),
            reg.name,
            reg.description
        );
    } else {
        let _ = writeln!(out, "{indent}/*!< {}: {} */", reg.name, reg.description);
        emit_fields(out, reg, indent);
    }
}

/// Builds the nested union/struct text for one word slot. A slot with
/// only the INT register emits it plain. A slot with siblings at the
/// SHORT/BYTE level is enclosed in a `union`; when an INT-level register
/// coexists with deeper SHORT/BYTE children, those children are wrapped
/// in an inner `struct` before being unioned with the INT view
/// (§4.8.1's "If a node has both sibling INT-level registers and deeper
/// children → enclose children in 'struct'").
fn emit_word_slot(out: &mut String, slot: &WordSlot<'_>, indent: &str) {
    let has_short = slot.short_regs.iter().any(|r| r.is_some());
    let has_byte = slot.byte_regs.iter().any(|r| r.is_some());
    let sibling_count = [slot.int_reg.is_some(), has_short, has_byte].iter().filter(|b| **b).count();

    if sibling_count <= 1 {
        if let Some(r) = slot.int_reg {
            emit_register_decl(out, r, indent);
        }
        for r in slot.short_regs.iter().flatten() {
            emit_register_decl(out, r, indent);
        }
        for r in slot.byte_regs.iter().flatten() {
            emit_register_decl(out, r, indent);
        }
        return;
    }

    let _ = writeln!(out, "{indent}union {{");
    let inner = format!("{indent}  ");
    if let Some(r) = slot.int_reg {
        emit_register_decl(out, r, &inner);
    }
    if has_short {
        let _ = writeln!(out, "{inner}struct {{");
        let short_indent = format!("{inner}  ");
        for r in slot.short_regs.iter().flatten() {
            emit_register_decl(out, r, &short_indent);
        }
        let _ = writeln!(out, "{inner}}};");
    }
    if has_byte {
        let _ = writeln!(out, "{inner}struct {{");
        let byte_indent = format!("{inner}  ");
        for r in slot.byte_regs.iter().flatten() {
            emit_register_decl(out, r, &byte_indent);
        }
        let _ = writeln!(out, "{inner}}};");
    }
    let _ = writeln!(out, "{indent}}};");
}

/// Emits `RESERVED<n>` padding fields for the gap `[from, to)`, choosing
/// field width 4/2/1 bytes to preserve natural alignment from the current
/// offset modulo 4 (§4.8.1).
fn emit_reserved(out: &mut String, from: u64, to: u64, counter: &mut u32, indent: &str) {
    let mut pos = from;
    while pos < to {
        let remaining = to - pos;
        let width: u64 = if pos % 4 == 0 && remaining >= 4 {
            4
        } else if pos % 2 == 0 && remaining >= 2 {
            2
        } else {
            1
        };
        let count = if width == 4 {
            (remaining / 4).max(1)
        } else {
            1
        };
        let ty = c_type_for_width((width * 8) as u32);
        if count > 1 {
            let _ = writeln!(out, "{indent}{ty} RESERVED{}[{count}];", *counter);
        } else {
            let _ = writeln!(out, "{indent}{ty} RESERVED{};", *counter);
        }
        *counter += 1;
        pos += width * count;
    }
}

fn emit_children(out: &mut String, children: &[RegisterOrCluster], base_offset: u64, close_at: Option<u64>, indent: &str) -> u64 {
    let registers: Vec<&Register> = children
        .iter()
        .filter_map(|c| match c {
            RegisterOrCluster::Register(r) => Some(r),
            RegisterOrCluster::Cluster(_) => None,
        })
        .collect();
    let clusters: Vec<&Cluster> = children
        .iter()
        .filter_map(|c| match c {
            RegisterOrCluster::Cluster(c) => Some(c),
            RegisterOrCluster::Register(_) => None,
        })
        .collect();

    let mut events: Vec<(u64, Event<'_>)> = Vec::new();
    for (word_base, slot) in bucket_registers(&registers) {
        events.push((word_base, Event::Word(slot)));
    }
    for c in &clusters {
        events.push((c.address_offset, Event::Cluster(c)));
    }
    events.sort_by_key(|(offset, _)| *offset);

    let mut cursor = base_offset;
    let mut reserved_counter = 0u32;
    for (offset, event) in events {
        if offset > cursor {
            emit_reserved(out, cursor, offset, &mut reserved_counter, indent);
            cursor = offset;
        }
        match event {
            Event::Word(slot) => {
                emit_word_slot(out, &slot, indent);
                cursor += 4;
            }
            Event::Cluster(c) => {
                cursor = emit_cluster(out, c, indent);
            }
        }
    }
    if let Some(end) = close_at {
        if end > cursor {
            emit_reserved(out, cursor, end, &mut reserved_counter, indent);
            cursor = end;
        }
    }
    cursor
}

enum Event<'a> {
    Word(WordSlot<'a>),
    Cluster(&'a Cluster),
}

/// Emits one cluster, padding each dimension element to `dim_increment`
/// when declared (§4.8.1 "Cluster/Peripheral close: pad to
/// `dim_increment`"; §8.3 boundary: `dim=3, dim_increment=16, size=12` ⇒
/// each element padded to 16 bytes, total 48). Returns the offset
/// immediately past the (possibly dimensioned) cluster.
fn emit_cluster(out: &mut String, cluster: &Cluster, indent: &str) -> u64 {
    let _ = writeln!(out, "{indent}struct {{ /*!< {} */", cluster.name);
    let inner = format!("{indent}  ");
    let natural_end = emit_children(out, &cluster.children, cluster.address_offset, None, &inner);
    let element_size = natural_end - cluster.address_offset;

    let padded_size = match cluster.dim_increment {
        Some(inc) if inc < element_size => {
            // §7 semantic error: actual size exceeds declared increment.
            // The generator still emits the natural size; the caller
            // surfaces the diagnostic separately.
            element_size
        }
        Some(inc) => inc,
        None => element_size,
    };
    if padded_size > element_size {
        let mut counter = 0u32;
        emit_reserved(out, cluster.address_offset + element_size, cluster.address_offset + padded_size, &mut counter, &inner);
    }

    let name = if let Some(dim) = cluster.dim {
        format!("{}[{}]", cluster.name, dim)
    } else {
        cluster.name.clone()
    };
    let _ = writeln!(out, "{indent}}} {name};");
    cluster.address_offset + padded_size * cluster.dim.unwrap_or(1) as u64
}

/// Emits the peripheral's struct/typedef and, when it is an array
/// (`dim` set), both the `typedef` and the `TYPE NAME[N]` array
/// declaration (§4.8.1 "Peripheral arrays").
fn emit_peripheral(out: &mut String, p: &Peripheral) -> u64 {
    let type_name = format!("{}_Type", p.name);
    let _ = writeln!(out, "/**\n * @brief {} ({})\n */", p.description, p.name);
    let _ = writeln!(out, "typedef struct {{");
    let natural_end = emit_children(out, &p.children, 0, p.size, "  ");
    let _ = writeln!(out, "}} {type_name};");
    let _ = writeln!(out);

    if let Some(dim) = p.dim {
        let _ = writeln!(out, "{type_name} {}[{dim}];", p.name);
    } else {
        let _ = writeln!(out, "#define {} (({type_name} *) {:#010X}UL)", p.name, p.base_address);
    }
    let _ = writeln!(out);
    p.dim_increment.unwrap_or(natural_end.max(p.size.unwrap_or(0)))
}

/// Emits the complete CMSIS header for `device`. ASCII, UTF-8, Unix line
/// endings (§6.4) — the caller is responsible for the file-header comment
/// block and its timestamp, excluded from the regeneration-stability
/// check (§8.2).
pub fn generate_header(device: &SvdDevice) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "/* CMSIS register definitions for {} */", device.name);
    let _ = writeln!(out);
    let _ = writeln!(out, "#ifndef {}_H", device.name.to_uppercase());
    let _ = writeln!(out, "#define {}_H", device.name.to_uppercase());
    let _ = writeln!(out);
    let _ = writeln!(out, "/** @addtogroup Device_Peripheral_registers */");
    let _ = writeln!(out, "/*@{{*/");
    let _ = writeln!(out);

    for p in &device.peripherals {
        emit_peripheral(&mut out, p);
    }

    let _ = writeln!(out, "/*@}}*/ /* end of group Device_Peripheral_registers */");
    let _ = writeln!(out);
    let _ = writeln!(out, "#endif /* {}_H */", device.name.to_uppercase());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svd::{EnumValue, Field};

    fn reg(name: &str, offset: u64, size: u32, access: Access) -> Register {
        Register {
            name: name.to_string(),
            description: String::new(),
            address_offset: offset,
            size,
            access,
            reset_value: 0,
            fields: Vec::new(),
            dim: None,
            dim_increment: None,
        }
    }

    #[test]
    fn single_32bit_register_at_high_offset_has_no_trailing_reserved() {
        let p = Peripheral {
            name: "SysTick".into(),
            description: "System Tick".into(),
            group_name: "SysTick".into(),
            base_address: 0xE000E010,
            dim: None,
            dim_increment: None,
            size: Some(0x4),
            children: vec![RegisterOrCluster::Register(reg("CTRL", 0xFFFC, 32, Access::ReadWrite))],
        };
        let mut out = String::new();
        emit_peripheral(&mut out, &p);
        assert!(out.contains("__IO uint32_t CTRL;"));
        assert!(!out.contains("RESERVED"));
    }

    #[test]
    fn overlapping_registers_emit_nested_unions() {
        let ctrl = reg("CTRL", 0, 32, Access::ReadWrite);
        let ctrl_h = reg("CTRL_H", 0, 16, Access::ReadWrite);
        let ctrl_b0 = reg("CTRL_B0", 0, 8, Access::ReadWrite);
        let p = Peripheral {
            name: "TIM".into(),
            description: String::new(),
            group_name: "TIM".into(),
            base_address: 0x4000_0000,
            dim: None,
            dim_increment: None,
            size: Some(4),
            children: vec![
                RegisterOrCluster::Register(ctrl),
                RegisterOrCluster::Register(ctrl_h),
                RegisterOrCluster::Register(ctrl_b0),
            ],
        };
        let mut out = String::new();
        emit_peripheral(&mut out, &p);
        assert!(out.contains("union {"));
        assert!(out.contains("CTRL;"));
        assert!(out.contains("CTRL_H;"));
        assert!(out.contains("CTRL_B0;"));
    }

    #[test]
    fn cluster_dim_pads_each_element_to_increment() {
        let cluster = Cluster {
            name: "CH".into(),
            address_offset: 0,
            dim: Some(3),
            dim_increment: Some(16),
            children: vec![RegisterOrCluster::Register(reg("CTRL", 0, 32, Access::ReadWrite)), RegisterOrCluster::Register(reg("STATUS", 8, 32, Access::ReadOnly))],
        };
        let mut out = String::new();
        let end = emit_cluster(&mut out, &cluster, "  ");
        assert_eq!(end, 48);
        assert!(out.contains("CH[3]"));
    }

    #[test]
    fn field_bitfields_fill_gaps_with_reserved() {
        let mut r = reg("CR", 0, 32, Access::ReadWrite);
        r.fields = vec![
            Field { name: "EN".into(), bit_offset: 0, bit_width: 1, access: Access::ReadWrite, description: String::new(), enum_values: vec![] },
            Field { name: "MODE".into(), bit_offset: 4, bit_width: 2, access: Access::ReadWrite, description: String::new(), enum_values: vec![EnumValue { name: "FAST".into(), value: 1, description: String::new() }] },
        ];
        let mut out = String::new();
        emit_fields(&mut out, &r, "");
        assert!(out.contains("EN : 1"));
        assert!(out.contains("_reserved1 : 3"));
        assert!(out.contains("MODE : 2"));
        assert!(out.contains("_reserved6 : 26"));
    }

    #[test]
    fn two_bitfielded_registers_keep_distinct_named_union_members() {
        let mut cr = reg("CR", 0, 32, Access::ReadWrite);
        cr.fields = vec![Field { name: "EN".into(), bit_offset: 0, bit_width: 1, access: Access::ReadWrite, description: String::new(), enum_values: vec![] }];
        let mut sr = reg("SR", 4, 32, Access::ReadOnly);
        sr.fields = vec![Field { name: "BUSY".into(), bit_offset: 0, bit_width: 1, access: Access::ReadOnly, description: String::new(), enum_values: vec![] }];
        let p = Peripheral {
            name: "I2C".into(),
            description: String::new(),
            group_name: "I2C".into(),
            base_address: 0x4000_5400,
            dim: None,
            dim_increment: None,
            size: Some(8),
            children: vec![RegisterOrCluster::Register(cr), RegisterOrCluster::Register(sr)],
        };
        let mut out = String::new();
        emit_peripheral(&mut out, &p);
        assert!(out.contains("} CR_b;"));
        assert!(out.contains("uint32_t CR;"));
        assert!(out.contains("} SR_b;"));
        assert!(out.contains("uint32_t SR;"));
        assert_eq!(out.matches("} b;").count(), 0);
        assert_eq!(out.matches(" w;").count(), 0);
    }
}
