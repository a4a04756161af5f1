//! BA2/BTDX archive scanning.
//!
//! Bethesda archives open with a fixed 12-byte header: the ASCII magic
//! `BTDX`, a little-endian `u32` version, and a four-byte format tag
//! (`GNRL` for general archives, `DX10` for texture archives). The scanner
//! discovers archives under a directory, validates each header, and runs
//! any registered content analyzers over the files.

pub mod header;
pub mod scan;

pub use header::{read_header, Ba2Format, Ba2HeaderInfo, BA2_HEADER_LEN};
pub use scan::{
    find_ba2_files, ArchiveContentAnalyzer, ArchiveIssue, ArchiveIssueKind, Ba2ScanOptions,
    Ba2ScanResult, Ba2Scanner,
};
