//! Code generators over a resolved device + SVD peripheral tree (§4.8,
//! L4): header, partition, SFD and memory-map, grounded on
//! `tools/svdconv/SVDGenerator` and `PartitionData.h`.

pub mod header;
pub mod memmap;
pub mod partition;
pub mod sfd;
pub mod svd;

pub use header::{generate_header, CodegenError};
pub use memmap::{generate_memory_map, MemoryMapDetail};
pub use partition::generate_partition_file;
pub use sfd::generate_sfd;
pub use svd::SvdDevice;
