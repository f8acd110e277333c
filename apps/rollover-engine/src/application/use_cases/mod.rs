//! Application Use Cases
//!
//! Each use case drives domain stages through the ports:
//! - [`LoadArchiveUseCase`]: read raw snapshots, isolating bad days
//! - [`BuildExpiryIndexUseCase`]: reuse or rebuild the expiry history
//! - [`RunPassUseCase`]: a full selection, reconciliation and adjustment pass
//! - [`GapFillPersistedUseCase`]: repair persisted series in place
//! - [`WindowedPassUseCase`]: rebuild fixed-offset series from expiry windows

mod build_index;
mod gap_fill_persisted;
mod load_archive;
mod run_pass;
mod windowed_pass;

pub use build_index::{BuildExpiryIndexUseCase, IndexArtifacts};
pub use gap_fill_persisted::{GapFillPersistedUseCase, GapFillReport};
pub use load_archive::{LoadArchiveUseCase, LoadStats, LoadedArchive};
pub use run_pass::{AdjustmentOptions, PassError, PassOptions, PassReport, RunPassUseCase};
pub use windowed_pass::{WindowedPassUseCase, WindowedReport};
