//! Memory-map listing generator (§4.8.4), grounded on
//! `SVDGenerator/include/MemoryMap.h`: three increasingly detailed plain
//! text listings of the same peripheral tree, used as a human-readable
//! cross-check against the header/SFD output.

use std::fmt::Write as _;

use crate::svd::{Cluster, Peripheral, Register, RegisterOrCluster, SvdDevice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryMapDetail {
    PeripheralsOnly,
    WithRegisters,
    WithFields,
}

fn emit_register(out: &mut String, base: u64, reg: &Register, detail: MemoryMapDetail, indent: &str) {
    if detail < MemoryMapDetail::WithRegisters {
        return;
    }
    let addr = base + reg.address_offset;
    let _ = writeln!(out, "{indent}{:#010X}  {:<20} {}", addr, reg.name, reg.description);
    if detail == MemoryMapDetail::WithFields {
        for field in &reg.fields {
            let hi = field.bit_offset + field.bit_width - 1;
            let _ = writeln!(
                out,
                "{indent}             .{:<18} [{}:{}] {}",
                field.name, hi, field.bit_offset, field.description
            );
        }
    }
}

fn emit_children(out: &mut String, base: u64, children: &[RegisterOrCluster], detail: MemoryMapDetail, indent: &str) {
    for child in children {
        match child {
            RegisterOrCluster::Register(r) => emit_register(out, base, r, detail, indent),
            RegisterOrCluster::Cluster(c) => emit_cluster(out, base, c, detail, indent),
        }
    }
}

fn emit_cluster(out: &mut String, base: u64, cluster: &Cluster, detail: MemoryMapDetail, indent: &str) {
    if detail >= MemoryMapDetail::WithRegisters {
        let _ = writeln!(out, "{indent}{:#010X}  [{}]", base + cluster.address_offset, cluster.name);
    }
    let nested_indent = format!("{indent}  ");
    emit_children(out, base + cluster.address_offset, &cluster.children, detail, &nested_indent);
}

fn emit_peripheral(out: &mut String, p: &Peripheral, detail: MemoryMapDetail) {
    let size = p.size.unwrap_or(0);
    let _ = writeln!(out, "{:#010X}-{:#010X}  {:<20} {}", p.base_address, p.base_address + size.saturating_sub(1), p.name, p.description);
    if detail >= MemoryMapDetail::WithRegisters {
        emit_children(out, p.base_address, &p.children, detail, "  ");
    }
}

/// Renders the memory map at the requested `detail` level (§4.8.4):
/// peripherals-only / + registers / + fields, sorted by base address.
pub fn generate_memory_map(device: &SvdDevice, detail: MemoryMapDetail) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Memory map for {}", device.name);
    let _ = writeln!(out);

    let mut peripherals: Vec<&Peripheral> = device.peripherals.iter().collect();
    peripherals.sort_by_key(|p| p.base_address);
    for p in peripherals {
        emit_peripheral(&mut out, p, detail);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svd::Access;

    fn sample_device() -> SvdDevice {
        let reg = Register {
            name: "CTRL".into(),
            description: "Control".into(),
            address_offset: 0,
            size: 32,
            access: Access::ReadWrite,
            reset_value: 0,
            fields: vec![crate::svd::Field {
                name: "EN".into(),
                bit_offset: 0,
                bit_width: 1,
                access: Access::ReadWrite,
                description: "Enable".into(),
                enum_values: vec![],
            }],
            dim: None,
            dim_increment: None,
        };
        let peripheral = Peripheral {
            name: "TIM0".into(),
            description: "Timer 0".into(),
            group_name: "Timers".into(),
            base_address: 0x4000_0000,
            dim: None,
            dim_increment: None,
            size: Some(4),
            children: vec![RegisterOrCluster::Register(reg)],
        };
        SvdDevice {
            name: "ARMCM3".into(),
            peripherals: vec![peripheral],
            interrupts: vec![],
            cpu: Default::default(),
        }
    }

    #[test]
    fn peripherals_only_omits_register_lines() {
        let out = generate_memory_map(&sample_device(), MemoryMapDetail::PeripheralsOnly);
        assert!(out.contains("TIM0"));
        assert!(!out.contains("CTRL"));
    }

    #[test]
    fn with_registers_includes_register_but_not_field_lines() {
        let out = generate_memory_map(&sample_device(), MemoryMapDetail::WithRegisters);
        assert!(out.contains("CTRL"));
        assert!(!out.contains(".EN"));
    }

    #[test]
    fn with_fields_includes_field_bit_ranges() {
        let out = generate_memory_map(&sample_device(), MemoryMapDetail::WithFields);
        assert!(out.contains(".EN"));
        assert!(out.contains("[0:0]"));
    }

    #[test]
    fn peripherals_are_listed_by_ascending_base_address() {
        let mut device = sample_device();
        device.peripherals.push(Peripheral {
            name: "TIM1".into(),
            description: String::new(),
            group_name: "Timers".into(),
            base_address: 0x3000_0000,
            dim: None,
            dim_increment: None,
            size: Some(4),
            children: vec![],
        });
        let out = generate_memory_map(&device, MemoryMapDetail::PeripheralsOnly);
        let tim1_pos = out.find("TIM1").unwrap();
        let tim0_pos = out.find("TIM0").unwrap();
        assert!(tim1_pos < tim0_pos);
    }
}
