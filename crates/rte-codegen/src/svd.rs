//! The structural SVD tree the generators walk (§4.8): a resolved device's
//! peripherals, registers, clusters, fields and interrupts. This is the
//! core's own typed view — the XML `TreeElement` the SVD collaborator
//! hands over is converted into this shape once, upstream of every
//! generator.

/// Register/field access mode, driving the `__I`/`__O`/`__IO` prefix and
/// the SFD read/write expressions (§4.8.1, §4.8.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn c_prefix(self) -> &'static str {
        match self {
            Access::ReadOnly => "__I",
            Access::WriteOnly => "__O",
            Access::ReadWrite => "__IO",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub name: String,
    pub value: u64,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub bit_offset: u32,
    pub bit_width: u32,
    pub access: Access,
    pub description: String,
    pub enum_values: Vec<EnumValue>,
}

#[derive(Debug, Clone)]
pub struct Register {
    pub name: String,
    pub description: String,
    pub address_offset: u64,
    /// Register width in bits: 8, 16, 32 or 64.
    pub size: u32,
    pub access: Access,
    pub reset_value: u64,
    pub fields: Vec<Field>,
    pub dim: Option<u32>,
    pub dim_increment: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub name: String,
    pub address_offset: u64,
    pub dim: Option<u32>,
    pub dim_increment: Option<u64>,
    pub children: Vec<RegisterOrCluster>,
}

#[derive(Debug, Clone)]
pub enum RegisterOrCluster {
    Register(Register),
    Cluster(Cluster),
}

impl RegisterOrCluster {
    pub fn address_offset(&self) -> u64 {
        match self {
            RegisterOrCluster::Register(r) => r.address_offset,
            RegisterOrCluster::Cluster(c) => c.address_offset,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Peripheral {
    pub name: String,
    pub description: String,
    pub group_name: String,
    pub base_address: u64,
    pub dim: Option<u32>,
    pub dim_increment: Option<u64>,
    pub size: Option<u64>,
    pub children: Vec<RegisterOrCluster>,
}

#[derive(Debug, Clone)]
pub struct Interrupt {
    pub name: String,
    pub description: String,
    pub value: i32,
}

/// One `<sauRegionsConfig><region>` entry (§4.8.2 "SAU regions
/// configuration").
#[derive(Debug, Clone)]
pub struct SauRegion {
    pub name: String,
    pub base: u64,
    pub limit: u64,
    pub non_secure_callable: bool,
}

/// The CPU properties a partition file needs (§3.4 device properties,
/// §4.8.2): SAU region list, exception priority bits, and interrupt
/// target-assignable range.
#[derive(Debug, Clone, Default)]
pub struct CpuInfo {
    pub sau_regions: Vec<SauRegion>,
    pub sau_init: bool,
    pub num_priority_bits: u32,
    pub max_irq_n: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SvdDevice {
    pub name: String,
    pub peripherals: Vec<Peripheral>,
    pub interrupts: Vec<Interrupt>,
    pub cpu: CpuInfo,
}
