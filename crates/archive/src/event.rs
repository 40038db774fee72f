use derive_more::Display;

/// Lifecycle notifications for one archive run.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ArchiveEvent {
    /// The write pass is about to start.
    #[display("streaming (predicted: {predicted:?})")]
    Streaming { predicted: Option<u64> },
    /// Every byte has been handed to the output.
    #[display("streamed {size} bytes")]
    Streamed { size: u64 },
    /// The write pass disagreed with the prediction. Diagnostic only: the
    /// archive itself is still complete.
    #[display("predicted {predicted} bytes but wrote {actual}")]
    PredictionMismatch { predicted: u64, actual: u64 },
}

pub(crate) type Listener = Box<dyn Fn(&ArchiveEvent) + Send + Sync>;

/// Fan an event out to listeners and the log.
pub(crate) fn dispatch(listeners: &[Listener], name: &str, event: ArchiveEvent) {
    match event {
        ArchiveEvent::PredictionMismatch { predicted, actual } => {
            tracing::error!(archive = %name, predicted, actual, "archive size prediction was wrong");
        },
        _ => tracing::info!(archive = %name, %event, "archive event"),
    }
    for listener in listeners {
        listener(&event);
    }
}
