//! System-viewer description (SFD) generator (§4.8.3), grounded on
//! `SVDGenerator/src/SfdGenerator.cpp`: a stream of nested tagged text
//! elements describing the interrupt table, peripheral menu and
//! per-peripheral register/field/enum trees.

use std::fmt::Write as _;

use crate::svd::{Access, Cluster, Field, Peripheral, Register, RegisterOrCluster, SvdDevice};

struct Writer {
    out: String,
    depth: usize,
}

impl Writer {
    fn new() -> Self {
        Self { out: String::new(), depth: 0 }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, String)]) {
        let mut s = format!("<{tag}");
        for (k, v) in attrs {
            let _ = write!(s, " {k}=\"{v}\"");
        }
        s.push('>');
        self.line(s);
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth -= 1;
        self.line(format!("</{tag}>"));
    }
}

/// `(cast)((REG >> pos) & mask)` read expression and masked write
/// expression for a field occupying `[bit_offset, bit_offset+bit_width)`
/// of a register with C type `reg_ty` (§4.8.3).
fn field_read_expr(reg_name: &str, reg_ty: &str, field: &Field) -> String {
    let mask = if field.bit_width >= 32 { u32::MAX } else { (1u32 << field.bit_width) - 1 };
    if field.bit_offset == 0 {
        format!("(({reg_ty})({reg_name} & {mask:#X}))")
    } else {
        format!("(({reg_ty})(({reg_name} >> {}) & {mask:#X}))", field.bit_offset)
    }
}

fn field_write_expr(reg_name: &str, field: &Field) -> String {
    let mask = if field.bit_width >= 32 { u32::MAX } else { (1u32 << field.bit_width) - 1 };
    let shifted_mask = mask << field.bit_offset;
    format!(
        "{reg_name} = ({reg_name} & ~{shifted_mask:#X}) | ((value & {mask:#X}) << {})",
        field.bit_offset
    )
}

fn emit_field(w: &mut Writer, reg_name: &str, reg_ty: &str, field: &Field, access: Access) {
    w.open(
        "item",
        &[("name", field.name.clone()), ("info", field.description.clone())],
    );
    w.line(format!("<loc>{}.{}</loc>", field.bit_offset, field.bit_offset + field.bit_width - 1));
    if matches!(access, Access::ReadOnly | Access::ReadWrite) {
        w.line(format!("<edit access=\"r\">{}</edit>", field_read_expr(reg_name, reg_ty, field)));
    }
    if matches!(access, Access::WriteOnly | Access::ReadWrite) {
        w.line(format!("<edit access=\"w\">{}</edit>", field_write_expr(reg_name, field)));
    }
    if !field.enum_values.is_empty() {
        w.open("combo", &[]);
        for ev in &field.enum_values {
            w.line(format!("<i value=\"{}\">{}</i>", ev.value, ev.name));
        }
        w.close("combo");
    }
    w.close("item");
}

fn c_type_for_width(bits: u32) -> &'static str {
    match bits {
        8 => "uint8_t",
        16 => "uint16_t",
        64 => "uint64_t",
        _ => "uint32_t",
    }
}

fn emit_register(w: &mut Writer, peripheral_name: &str, reg: &Register) {
    let reg_name = format!("{peripheral_name}->{}", reg.name);
    w.open(
        "item",
        &[("name", reg.name.clone()), ("info", reg.description.clone())],
    );
    w.line(format!("<loc>{:#010X}</loc>", reg.address_offset));
    if reg.fields.is_empty() {
        let ty = c_type_for_width(reg.size);
        if matches!(reg.access, Access::ReadOnly | Access::ReadWrite) {
            w.line(format!("<edit access=\"r\">(({ty}){reg_name})</edit>"));
        }
        if matches!(reg.access, Access::WriteOnly | Access::ReadWrite) {
            w.line(format!("<edit access=\"w\">{reg_name} = value</edit>"));
        }
    } else {
        w.open("itree", &[]);
        let ty = c_type_for_width(reg.size);
        for field in &reg.fields {
            emit_field(w, &reg_name, ty, field, reg.access);
        }
        w.close("itree");
    }
    w.close("item");
}

fn emit_cluster(w: &mut Writer, peripheral_name: &str, cluster: &Cluster) {
    w.open("item", &[("name", cluster.name.clone()), ("info", String::new())]);
    w.open("itree", &[]);
    for child in &cluster.children {
        match child {
            RegisterOrCluster::Register(r) => emit_register(w, peripheral_name, r),
            RegisterOrCluster::Cluster(c) => emit_cluster(w, peripheral_name, c),
        }
    }
    w.close("itree");
    w.close("item");
}

fn emit_peripheral(w: &mut Writer, p: &Peripheral) {
    w.open("g", &[("name", p.group_name.clone()), ("info", p.description.clone())]);
    w.open("b", &[("name", p.name.clone())]);
    w.open("itree", &[]);
    for child in &p.children {
        match child {
            RegisterOrCluster::Register(r) => emit_register(w, &p.name, r),
            RegisterOrCluster::Cluster(c) => emit_cluster(w, &p.name, c),
        }
    }
    w.close("itree");
    w.close("b");
    w.close("g");
}

fn emit_interrupt_table(w: &mut Writer, device: &SvdDevice) {
    w.open("m", &[("name", "Interrupts".to_string())]);
    w.open("itree", &[]);
    for irq in &device.interrupts {
        w.line(format!(
            "<item name=\"{}\" info=\"{}\"><i>{}</i></item>",
            irq.name, irq.description, irq.value
        ));
    }
    w.close("itree");
    w.close("m");
}

/// Emits the complete SFD text stream for `device`: interrupt table, then
/// a peripheral menu recursing register/cluster → field → enum
/// (§4.8.3).
pub fn generate_sfd(device: &SvdDevice) -> String {
    let mut w = Writer::new();
    w.open("view", &[("device", device.name.clone())]);
    emit_interrupt_table(&mut w, device);
    w.open("m", &[("name", "Peripherals".to_string())]);
    for p in &device.peripherals {
        emit_peripheral(&mut w, p);
    }
    w.close("m");
    w.close("view");
    w.out
}
