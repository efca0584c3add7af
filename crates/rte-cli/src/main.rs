//! Thin demonstrator binary (§6.5, SPEC_FULL §1.4): wires
//! `create_project` → `resolve` → `apply_and_generate` over a small
//! built-in sample pack, printing diagnostics through `tracing-subscriber`'s
//! fmt layer the way cargo's own CLI wires up its `Shell`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cmsis_rte::item::{ItemStore, TreeElement};
use cmsis_rte::model::{GlobalModel, PackageFilter};
use cmsis_rte::target::Target;
use rte_codegen::memmap::MemoryMapDetail;
use rte_codegen::svd::{Access, Field, Peripheral, Register, RegisterOrCluster, SvdDevice};

#[derive(Parser)]
#[command(name = "rte-cli", about = "Demonstrates the cmsis-rte resolver and generators over a sample pack")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the sample project's components and report the outcome.
    Resolve {
        #[arg(long, default_value = "ARMCM3")]
        device: String,
        #[arg(long, default_value = "GCC")]
        toolchain: String,
    },
    /// Generate the header/partition/SFD/memory-map artifacts for a sample device.
    Generate {
        #[arg(long, value_enum, default_value = "header")]
        artifact: Artifact,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum Artifact {
    Header,
    Partition,
    Sfd,
    Memmap,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();
}

/// Builds a single-pack `GlobalModel` with one component, standing in
/// for `create_project`'s XML-loading step (§6.1 consumes a
/// `TreeElement` tree the filesystem/XML collaborator produces).
fn sample_global_model() -> GlobalModel {
    let tree = TreeElement::new("package")
        .with_attr("vendor", "ARM")
        .with_attr("name", "CMSIS")
        .with_child(
            TreeElement::new("releases").with_child(TreeElement::new("release").with_attr("version", "5.9.0")),
        )
        .with_child(
            TreeElement::new("components").with_child(
                TreeElement::new("component")
                    .with_attr("Cvendor", "ARM")
                    .with_attr("Cclass", "Device")
                    .with_attr("Cgroup", "Startup")
                    .with_attr("Cversion", "1.0.0"),
            ),
        );

    let mut store = ItemStore::new();
    let pkg = store.construct_from(None, &tree);

    let mut global = GlobalModel::new();
    global.add_package(store, pkg);
    global
}

fn run_resolve(device: &str, toolchain: &str) -> Result<()> {
    let global = sample_global_model();
    let mut target = Target::new(device, toolchain, PackageFilter { use_all_packs: true, ..Default::default() });
    target.update_filter_model(&global);

    tracing::info!(aggregates = target.solver.aggregates.len(), "filtered model built");
    for (id, agg) in &target.solver.aggregates {
        println!(
            "{id}: {} variant(s), selected={:?}",
            agg.variants.len(),
            agg.selected_variant
        );
    }
    Ok(())
}

fn sample_device() -> SvdDevice {
    let field = Field {
        name: "EN".into(),
        bit_offset: 0,
        bit_width: 1,
        access: Access::ReadWrite,
        description: "Enable".into(),
        enum_values: vec![],
    };
    let reg = Register {
        name: "CTRL".into(),
        description: "Control register".into(),
        address_offset: 0,
        size: 32,
        access: Access::ReadWrite,
        reset_value: 0,
        fields: vec![field],
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

fn run_generate(artifact: Artifact) -> Result<()> {
    let device = sample_device();
    let out = match artifact {
        Artifact::Header => rte_codegen::generate_header(&device),
        Artifact::Partition => rte_codegen::generate_partition_file(&device),
        Artifact::Sfd => rte_codegen::generate_sfd(&device),
        Artifact::Memmap => rte_codegen::generate_memory_map(&device, MemoryMapDetail::WithFields),
    };
    print!("{out}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Resolve { device, toolchain } => run_resolve(&device, &toolchain).context("resolving sample project"),
        Command::Generate { artifact } => run_generate(artifact).context("generating artifact"),
    }
}
