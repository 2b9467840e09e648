//! Strict load strategy.

use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, error, warn};

use super::{BulkLoader, LoadReport};
use crate::errors::PipelineError;
use media_indexer_repository::BulkItem;
use media_indexer_shared::CanonicalDocument;

impl BulkLoader {
    /// Index, refresh and reindex one document at a time.
    ///
    /// Any input or write error aborts the rest of the run. Refresh and
    /// reindex failures are only logged.
    pub(super) async fn load_strict(
        &self,
        mut documents: BoxStream<'_, Result<CanonicalDocument, PipelineError>>,
    ) -> LoadReport {
        let retry = self.retry_policy();
        let mut report = LoadReport::default();

        while let Some(next) = documents.next().await {
            let doc = match next {
                Ok(doc) => doc,
                Err(e) => {
                    error!(error = %e, inserted = report.inserted, "Input failed; aborting strict load");
                    report.abort(e);
                    break;
                }
            };

            let item = match BulkItem::try_from(&doc) {
                Ok(item) => item,
                Err(e) => {
                    error!(doc_id = %doc.id, error = %e, "Invalid document; aborting strict load");
                    report.abort(e.into());
                    break;
                }
            };

            if let Err(e) = retry.index_document(self.store.as_ref(), &self.index, &item).await {
                error!(doc_id = %item.id, error = %e, "Index write failed; aborting strict load");
                report.abort(e.into());
                break;
            }
            report.inserted += 1;
            debug!(doc_id = %item.id, inserted = report.inserted, "Indexed document");

            if let Err(e) = self.store.refresh(&self.index).await {
                let e = PipelineError::RefreshError(e);
                warn!(doc_id = %item.id, error = %e, "Refresh failed; continuing");
            }

            if let Err(e) = self.reindexer.reindex_after(&item.id).await {
                warn!(doc_id = %item.id, error = %e, "Reindex failed; continuing");
            }
        }

        report
    }
}
