//! Build Expiry Index Use Case
//!
//! Reuses a persisted expiry history when it covers the archive; otherwise
//! rebuilds and persists it.

use tracing::{info, warn};

use crate::application::ports::{SeriesSink, SinkError};
use crate::domain::expiry::{ExpiryHistory, TradingDayIndex, index_archive};
use crate::domain::record::SnapshotArchive;

/// Expiry history and ordinals for a pass.
#[derive(Debug, Clone)]
pub struct IndexArtifacts {
    /// Expiry history.
    pub history: ExpiryHistory,
    /// Trading-day ordinals.
    pub index: TradingDayIndex,
    /// Whether the history was rebuilt (and persisted) by this call.
    pub rebuilt: bool,
}

/// Use case for obtaining an up-to-date expiry index.
pub struct BuildExpiryIndexUseCase<'a, K>
where
    K: SeriesSink + ?Sized,
{
    sink: &'a mut K,
}

impl<'a, K> BuildExpiryIndexUseCase<'a, K>
where
    K: SeriesSink + ?Sized,
{
    /// Create a new BuildExpiryIndexUseCase.
    pub const fn new(sink: &'a mut K) -> Self {
        Self { sink }
    }

    /// Produce the index for `archive`.
    ///
    /// # Errors
    ///
    /// Returns an error when a rebuilt history cannot be persisted.
    pub fn execute(
        &mut self,
        archive: &SnapshotArchive,
        reuse_persisted: bool,
    ) -> Result<IndexArtifacts, SinkError> {
        if reuse_persisted {
            match self.sink.read_expiry_history() {
                Ok(Some(history)) if !history.is_stale(archive.last_date()) => {
                    info!(
                        sink = self.sink.name(),
                        built_through = ?history.built_through(),
                        "Reusing persisted expiry history"
                    );
                    return Ok(IndexArtifacts {
                        history,
                        index: TradingDayIndex::from_dates(archive.dates()),
                        rebuilt: false,
                    });
                }
                Ok(_) => {}
                Err(e) => warn!(sink = self.sink.name(), error = %e, "Persisted expiry history unreadable, rebuilding"),
            }
        }

        let (history, index) = index_archive(archive);
        self.sink.persist_expiry_history(&history)?;
        info!(
            sink = self.sink.name(),
            symbols = history.len(),
            trading_days = index.len(),
            "Rebuilt expiry history"
        );

        Ok(IndexArtifacts {
            history,
            index,
            rebuilt: true,
        })
    }
}
