//! Size prediction.
//!
//! Prediction is only attempted when every entry stores its payload
//! verbatim and reports a size without being read. Anything else returns
//! `None`: a missing prediction is always preferred over a wrong one.

use crate::error::ErrorKind;
use crate::source::FileSource;
use crate::writer::{Layout, Mode, traverse};
use zipstream_codec::{Method, ZIP64_ENTRY_THRESHOLD, ZIP64_SIZE_THRESHOLD};

/// An exact archive size and the Zip64 decision it was computed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prediction {
    pub size: u64,
    pub zip64: bool,
}

/// The predictability gate.
pub(crate) async fn can_predict(entries: &[FileSource], method: Method, enabled: bool) -> bool {
    if !enabled {
        return false;
    }
    for entry in entries {
        if !entry.method().unwrap_or(method).is_size_preserving() {
            tracing::debug!(locator = %entry.locator(), "compressed entry, size not predictable");
            return false;
        }
        if !entry.is_size_predictable().await {
            tracing::debug!(locator = %entry.locator(), "unknown entry size, size not predictable");
            return false;
        }
    }
    true
}

/// Whether what is known up front already rules out classic ZIP fields.
pub(crate) async fn zip64_needed(entries: &[FileSource]) -> bool {
    if entries.len() as u64 >= ZIP64_ENTRY_THRESHOLD {
        return true;
    }
    let mut total: u64 = 0;
    for entry in entries {
        if let Some(size) = entry.resolve_size().await {
            total = total.saturating_add(size);
        }
    }
    total >= ZIP64_SIZE_THRESHOLD
}

/// Zip64 decision for a write pass that runs without a prediction.
///
/// When every size is known and stored verbatim, the calculate pass settles
/// it exactly, headers included. Otherwise only the known payload sizes count.
pub(crate) async fn stream_zip64(entries: &[FileSource], layout: Layout<'_>) -> bool {
    if layout.zip64 {
        return true;
    }
    if can_predict(entries, layout.method, true).await
        && let Some(prediction) = predict(entries, layout).await
    {
        return prediction.zip64;
    }
    zip64_needed(entries).await
}

/// Run the calculate pass, switching Zip64 on once if the classic layout
/// cannot hold the result.
pub(crate) async fn predict(entries: &[FileSource], layout: Layout<'_>) -> Option<Prediction> {
    let zip64 = layout.zip64 || zip64_needed(entries).await;
    match traverse(entries, Layout { zip64, ..layout }, Mode::Calculate).await {
        Ok(size) if zip64 || size < ZIP64_SIZE_THRESHOLD => Some(Prediction { size, zip64 }),
        Ok(_) => calculate_zip64(entries, layout).await,
        Err(e) if !zip64 && matches!(&*e, ErrorKind::Zip64Required) => calculate_zip64(entries, layout).await,
        Err(e) => {
            tracing::warn!(error = ?e, "size prediction failed");
            None
        },
    }
}

async fn calculate_zip64(entries: &[FileSource], layout: Layout<'_>) -> Option<Prediction> {
    tracing::debug!("classic layout overflows, recalculating with Zip64");
    match traverse(entries, Layout { zip64: true, ..layout }, Mode::Calculate).await {
        Ok(size) => Some(Prediction { size, zip64: true }),
        Err(e) => {
            tracing::warn!(error = ?e, "size prediction failed");
            None
        },
    }
}
