//! Dump variant of the normalizer.

use tracing::debug;

use crate::errors::PipelineError;
use crate::processor::normalizer::{parse_timestamp, Normalizer};
use media_indexer_shared::{CanonicalDocument, DumpRecord};

impl Normalizer {
    /// Normalize a dataset dump record.
    ///
    /// The raw image field is consumed to build the thumbnail and never
    /// reaches the document.
    pub fn normalize_dump(&self, record: DumpRecord) -> Result<CanonicalDocument, PipelineError> {
        if record.id.trim().is_empty() {
            return Err(PipelineError::normalization("dump record without _id"));
        }

        let image_thumb =
            self.ensure_thumbnail(&record.id, record.img_data.as_deref(), record.image_thumb)?;

        let created_date = record
            .date_created
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| PipelineError::normalization(format!("{}: {e}", record.id)))?;

        debug!(doc_id = %record.id, "Normalized dump record");

        Ok(CanonicalDocument {
            title: record.title,
            artist: record.artist,
            collection_name: record.collection_name,
            caption: record.caption,
            editorial_source: record.editorial_source,
            keywords: record.keywords.map(|k| k.joined()),
            created_date,
            image_thumb,
            ..CanonicalDocument::new(record.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::PipelineError;
    use crate::processor::{Normalizer, NormalizerConfig, ThumbnailPolicy};
    use crate::test_support::{dump_record, png_data_url};
    use chrono::{TimeZone, Utc};
    use media_indexer_shared::{Keywords, SourceRecord};

    #[test]
    fn test_dump_record_is_normalized() {
        let mut record = dump_record("getty_1", Some(png_data_url(300, 300)));
        record.keywords = Some(Keywords::List(vec!["Vertical".into(), "Walking".into()]));
        record.date_created = Some("2015-03-04T05:06:07".into());

        let doc = Normalizer::default().normalize_dump(record).unwrap();

        assert_eq!(doc.id, "getty_1");
        assert_eq!(doc.title.as_deref(), Some("Title getty_1"));
        assert_eq!(doc.keywords.as_deref(), Some("Vertical Walking"));
        assert_eq!(
            doc.created_date,
            Some(Utc.with_ymd_and_hms(2015, 3, 4, 5, 6, 7).unwrap())
        );
        assert!(doc.image_thumb.unwrap().starts_with("data:image/jpeg;base64,"));
        assert!(doc.latest_ref.is_none());
        assert!(doc.source_id.is_none());
    }

    #[test]
    fn test_raw_image_never_reaches_the_body() {
        let record = dump_record("getty_1", Some(png_data_url(20, 20)));
        let doc = Normalizer::default()
            .normalize(SourceRecord::Dump(record))
            .unwrap()
            .unwrap();

        let body = doc.to_body().unwrap();
        assert!(body.get("img_data").is_none());
        assert!(body.get("image_thumb").is_some());
    }

    #[test]
    fn test_missing_image_data_is_fatal_to_the_record() {
        let record = dump_record("getty_2", None);
        let result = Normalizer::default().normalize_dump(record);
        assert!(matches!(result, Err(PipelineError::ThumbnailUnavailable(id)) if id == "getty_2"));
    }

    #[test]
    fn test_ignore_policy_passes_records_without_images() {
        let normalizer = Normalizer::new(NormalizerConfig {
            policy: ThumbnailPolicy::Ignore,
            ..Default::default()
        });
        let doc = normalizer.normalize_dump(dump_record("getty_3", None)).unwrap();
        assert!(doc.image_thumb.is_none());
    }

    #[test]
    fn test_bad_date_is_a_normalization_error() {
        let mut record = dump_record("getty_4", Some(png_data_url(20, 20)));
        record.date_created = Some("yesterday".into());

        let result = Normalizer::default().normalize_dump(record);
        assert!(matches!(result, Err(PipelineError::NormalizationError(_))));
    }
}
