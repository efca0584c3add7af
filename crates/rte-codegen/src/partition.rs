//! Partition file generator (§4.8.2), grounded on
//! `SVDGenerator/include/PartitionData.h`: emits `partition_<device>.h`
//! as three CMSIS-Configuration-Wizard blocks (SAU regions, sleep and
//! exception handling, NVIC_ITNS interrupt-target assignment).

use std::fmt::Write as _;

use crate::svd::SvdDevice;

const WIZARD_BEGIN: &str = "// <<< Use Configuration Wizard in Context Menu >>>";
const WIZARD_END: &str = "// <<< end of configuration section >>>";

fn emit_sau_regions(out: &mut String, device: &SvdDevice) {
    let _ = writeln!(out, "{WIZARD_BEGIN}");
    let _ = writeln!(out, "// <h> SAU Region Configuration");
    let _ = writeln!(out, "//   <o.0> Enable SAU");
    let _ = writeln!(out, "#define SAU_INIT_CTRL  {}", device.cpu.sau_init as u32);
    let _ = writeln!(out);

    for (i, region) in device.cpu.sau_regions.iter().enumerate() {
        let _ = writeln!(out, "//   <e.{i}> Initialize SAU Region {i}");
        let _ = writeln!(out, "//     <i> {}", region.name);
        let _ = writeln!(out, "//     <o{i}.0> Start Address <0-0xFFFFFFFF>");
        let _ = writeln!(out, "#define SAU_INIT_REGION{i}  1");
        let _ = writeln!(out, "#define SAU_INIT_START{i}   {:#010X}", region.base);
        let _ = writeln!(out, "#define SAU_INIT_END{i}     {:#010X}", region.limit);
        let _ = writeln!(
            out,
            "#define SAU_INIT_NSC{i}     {}",
            region.non_secure_callable as u32
        );
        let _ = writeln!(out, "//   </e>");
    }
    let _ = writeln!(out, "// </h>");
    let _ = writeln!(out, "{WIZARD_END}");
    let _ = writeln!(out);
}

fn emit_sleep_and_exception_handling(out: &mut String, device: &SvdDevice) {
    let _ = writeln!(out, "{WIZARD_BEGIN}");
    let _ = writeln!(out, "// <h> Sleep and Exception Handling");
    let max_priority = (1u32 << device.cpu.num_priority_bits).saturating_sub(1);
    let _ = writeln!(out, "//   <o> Priority bits <0-{max_priority}>");
    let _ = writeln!(out, "#define SCB_CPACR_INIT   0xFFFFFFFF");
    let _ = writeln!(out, "#define SCB_AIRCR_INIT   0xFFFF0000");
    let _ = writeln!(out, "//   <o.0> Non-secure SysTick exclusive access");
    let _ = writeln!(out, "#define SYSTICK_S        0");
    let _ = writeln!(out, "// </h>");
    let _ = writeln!(out, "{WIZARD_END}");
    let _ = writeln!(out);
}

/// NVIC_ITNS words cover `[0, max_irq_n)`, one bit per external interrupt
/// (§4.8.2): `ceil(max_irq / 32)` 32-bit words.
fn emit_interrupt_target_assignment(out: &mut String, device: &SvdDevice) {
    let word_count = device.cpu.max_irq_n.div_ceil(32).max(1);

    let _ = writeln!(out, "{WIZARD_BEGIN}");
    let _ = writeln!(out, "// <h> Interrupt Target Assignment (NVIC_ITNS)");
    for w in 0..word_count {
        let _ = writeln!(out, "//   <h> NVIC_ITNS{w}");
        let mut bits = 0u32;
        for bit in 0..32 {
            let irq = w * 32 + bit;
            if irq >= device.cpu.max_irq_n {
                break;
            }
            let name = device
                .interrupts
                .iter()
                .find(|i| i.value as u32 == irq)
                .map(|i| i.name.as_str())
                .unwrap_or("Reserved");
            let _ = writeln!(out, "//     <o.{bit}> {name} non-secure");
            if device
                .interrupts
                .iter()
                .any(|i| i.value as u32 == irq && i.name.ends_with("_NS"))
            {
                bits |= 1 << bit;
            }
        }
        let _ = writeln!(out, "//   </h>");
        let _ = writeln!(out, "#define NVIC_INIT_ITNS{w}  {bits:#010X}");
    }
    let _ = writeln!(out, "// </h>");
    let _ = writeln!(out, "{WIZARD_END}");
}

/// Emits the complete `partition_<device>.h` body for `device`.
pub fn generate_partition_file(device: &SvdDevice) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "/* Partition configuration for {} */", device.name);
    let _ = writeln!(out);
    let _ = writeln!(out, "#ifndef PARTITION_{}_H", device.name.to_uppercase());
    let _ = writeln!(out, "#define PARTITION_{}_H", device.name.to_uppercase());
    let _ = writeln!(out);

    emit_sau_regions(&mut out, device);
    emit_sleep_and_exception_handling(&mut out, device);
    emit_interrupt_target_assignment(&mut out, device);

    let _ = writeln!(out);
    let _ = writeln!(out, "#endif /* PARTITION_{}_H */", device.name.to_uppercase());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svd::{CpuInfo, SauRegion};

    fn device_with_cpu(cpu: CpuInfo) -> SvdDevice {
        SvdDevice {
            name: "ARMCM33".into(),
            cpu,
            ..Default::default()
        }
    }

    #[test]
    fn emits_one_block_per_sau_region() {
        let device = device_with_cpu(CpuInfo {
            sau_regions: vec![SauRegion {
                name: "Flash NS".into(),
                base: 0x0010_0000,
                limit: 0x001F_FFFF,
                non_secure_callable: false,
            }],
            sau_init: true,
            num_priority_bits: 3,
            max_irq_n: 32,
        });
        let out = generate_partition_file(&device);
        assert!(out.contains("SAU_INIT_START0"));
        assert!(out.contains("0x00100000"));
        assert!(out.contains("SAU_INIT_CTRL  1"));
    }

    #[test]
    fn interrupt_target_words_cover_ceil_division() {
        let device = device_with_cpu(CpuInfo {
            sau_regions: vec![],
            sau_init: false,
            num_priority_bits: 3,
            max_irq_n: 33,
        });
        let out = generate_partition_file(&device);
        assert!(out.contains("NVIC_INIT_ITNS0"));
        assert!(out.contains("NVIC_INIT_ITNS1"));
        assert!(!out.contains("NVIC_INIT_ITNS2"));
    }

    #[test]
    fn all_blocks_are_delimited_by_wizard_markers() {
        let device = device_with_cpu(CpuInfo::default());
        let out = generate_partition_file(&device);
        let begins = out.matches(WIZARD_BEGIN).count();
        let ends = out.matches(WIZARD_END).count();
        assert_eq!(begins, ends);
        assert_eq!(begins, 3);
    }
}
