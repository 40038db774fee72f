//! The archive builder.

use crate::error::{ErrorKind, Result};
use crate::event::{ArchiveEvent, Listener, dispatch};
use crate::factory::{LocatorKind, Origins};
use crate::headers::headers;
use crate::predict::{self, Prediction};
use crate::queue::{ArchiveQueue, Insertion, QueueOptions};
use crate::sink::{ChannelSink, TeeSink};
use crate::source::{FileSource, hash_field};
use crate::writer::{self, Layout, Mode};
use exn::ResultExt;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::instrument;
use zipstream_asyncutils::{ChunkStream, channel};
use zipstream_codec::Method;
use zipstream_config::Config;
use zipstream_storage::origin::MemoryOrigin;
use zipstream_storage::{BoxSink, Sink};

pub const DEFAULT_NAME: &str = "download.zip";

/// Output name with a guaranteed `.zip` suffix.
pub fn output_name(name: Option<&str>) -> String {
    let name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or(DEFAULT_NAME);
    match name.to_ascii_lowercase().ends_with(".zip") {
        true => name.to_string(),
        false => format!("{name}.zip"),
    }
}

/// Entry point: shared configuration and origin factory.
///
/// # Examples
///
/// ```
/// use zipstream_archive::ZipStream;
/// use zipstream_config::Config;
/// use zipstream_storage::MemorySink;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let zipstream = ZipStream::new(Config::default())?;
/// let mut archive = zipstream.create(Some("letters"));
/// archive.add_raw("Dear Sir or Madam", "letter.txt")?;
///
/// let predicted = archive.predict_size().await;
/// let output = MemorySink::new();
/// let streamed = archive.write_to(Box::new(output.clone())).await?;
/// assert_eq!(predicted, Some(streamed.size));
/// assert_eq!(output.contents().len() as u64, streamed.size);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ZipStream {
    config: Arc<Config>,
    origins: Arc<Origins>,
}

impl ZipStream {
    pub fn new(config: Config) -> Result<Self> {
        let origins = Origins::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            origins: Arc::new(origins),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn origins(&self) -> &Origins {
        &self.origins
    }

    pub fn create(&self, name: Option<&str>) -> Archive {
        let options = QueueOptions {
            strategy: self.config.conflict_strategy,
            case_insensitive: self.config.case_insensitive_conflicts,
            ascii: self.config.ascii_filenames,
        };
        Archive {
            config: Arc::clone(&self.config),
            origins: Arc::clone(&self.origins),
            name: output_name(name),
            comment: String::new(),
            meta: BTreeMap::new(),
            method: self.config.compression_method,
            queue: ArchiveQueue::new(options),
            cache: None,
            listeners: Vec::new(),
            prediction: None,
        }
    }
}

/// Result of a completed write pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Streamed {
    /// Bytes handed to the output; authoritative.
    pub size: u64,
    pub predicted: Option<u64>,
}

/// A pull-based archive body produced by a background task.
///
/// The body ends with an `Err` item if assembly fails, so a truncated
/// archive is never mistaken for a complete one.
#[derive(Debug)]
pub struct ArchiveStream {
    pub name: String,
    pub content_length: Option<u64>,
    pub headers: Vec<(&'static str, String)>,
    pub body: ChunkStream,
    pub task: JoinHandle<Result<Streamed>>,
}

/// One archive being planned, then written exactly once.
pub struct Archive {
    config: Arc<Config>,
    origins: Arc<Origins>,
    name: String,
    comment: String,
    meta: BTreeMap<String, String>,
    method: Method,
    queue: ArchiveQueue,
    cache: Option<BoxSink>,
    listeners: Vec<Listener>,
    /// Outer `None` means "not computed since the last change".
    prediction: Option<Option<Prediction>>,
}

impl Archive {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = output_name(Some(name));
    }

    /// Queue a source, resolving path conflicts with the configured strategy.
    pub fn add(&mut self, source: FileSource) -> Result<Insertion> {
        if source.archive_path(self.queue.options().ascii).is_empty() {
            exn::bail!(ErrorKind::InvalidEntry(format!(
                "{} has an empty archive path",
                source.raw_archive_path()
            )));
        }
        self.prediction = None;
        Ok(self.queue.add(source))
    }

    /// Queue whatever `locator` points at; see [`Origins::make`].
    pub fn add_locator(&mut self, locator: &str, path: Option<&str>) -> Result<Insertion> {
        let origin = self.origins.make(locator)?;
        self.add(FileSource::new(origin, path)?)
    }

    pub fn add_raw(&mut self, content: impl Into<Vec<u8>>, path: &str) -> Result<Insertion> {
        let origin = Arc::new(MemoryOrigin::new(content));
        self.add(FileSource::new(origin, Some(path))?)
    }

    pub fn add_from_disk(&mut self, disk: &str, path: &str, zip_path: Option<&str>) -> Result<Insertion> {
        let origin = self.origins.from_disk(disk, path)?;
        self.add(FileSource::new(origin, zip_path)?)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.queue.contains(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<FileSource> {
        let removed = self.queue.remove(path)?;
        self.prediction = None;
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn entries(&self) -> &ArchiveQueue {
        &self.queue
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
        self.prediction = None;
    }

    pub fn meta(&self) -> &BTreeMap<String, String> {
        &self.meta
    }

    /// Free-form metadata; only affects the fingerprint.
    pub fn set_meta(&mut self, meta: BTreeMap<String, String>) {
        self.meta = meta;
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
        self.prediction = None;
    }

    /// Switching re-keys the queue, which may drop or rename entries that
    /// now collide.
    pub fn set_ascii_filenames(&mut self, ascii: bool) {
        let options = QueueOptions { ascii, ..self.queue.options() };
        self.queue.set_options(options);
        self.prediction = None;
    }

    /// Mirror the output into `sink`. Returns the previously configured
    /// cache sink, which the caller now owns (and must close).
    pub fn cache_to(&mut self, sink: BoxSink) -> Option<BoxSink> {
        self.cache.replace(sink)
    }

    pub async fn cache_to_locator(&mut self, locator: &str) -> Result<Option<BoxSink>> {
        let origin = self.origins.make_writable(locator)?;
        let sink = origin
            .writer()
            .await
            .or_raise(|| ErrorKind::NotWritable(locator.to_string()))?;
        Ok(self.cache_to(sink))
    }

    /// Mirror the output to `path` on a configured disk.
    pub async fn cache_to_disk(&mut self, disk: &str, path: &str) -> Result<Option<BoxSink>> {
        let origin = self.origins.writable_from_disk(disk, path)?;
        let sink = origin
            .writer()
            .await
            .or_raise(|| ErrorKind::NotWritable(format!("{disk}:{path}")))?;
        Ok(self.cache_to(sink))
    }

    pub fn on_event(&mut self, listener: impl Fn(&ArchiveEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn layout(&self, zip64: bool) -> Layout<'_> {
        Layout {
            comment: &self.comment,
            method: self.method,
            ascii: self.queue.options().ascii,
            zip64,
            chunk_size: self.config.chunk_size,
        }
    }

    pub async fn can_predict_size(&self) -> bool {
        predict::can_predict(self.queue.as_slice(), self.method, self.config.predict_size).await
    }

    /// Memoized until the plan changes.
    pub async fn prediction(&mut self) -> Option<Prediction> {
        if let Some(memo) = self.prediction {
            return memo;
        }
        // Field borrows only: the future must stay `Send` for `into_stream`.
        let entries = self.queue.as_slice();
        let prediction = match predict::can_predict(entries, self.method, self.config.predict_size).await {
            true => {
                let layout = self.layout(self.config.zip64);
                predict::predict(entries, layout).await
            },
            false => None,
        };
        tracing::debug!(archive = %self.name, size = ?prediction.map(|p| p.size), "predicted archive size");
        self.prediction = Some(prediction);
        prediction
    }

    /// Exact final size, or `None` when it cannot be known up front.
    pub async fn predict_size(&mut self) -> Option<u64> {
        self.prediction().await.map(|p| p.size)
    }

    /// Identical fingerprints mean byte-identical archives.
    pub async fn fingerprint(&self) -> String {
        let ascii = self.queue.options().ascii;
        let mut hasher = blake3::Hasher::new();
        for entry in &self.queue {
            hash_field(&mut hasher, entry.fingerprint(ascii).await.as_bytes());
            hash_field(&mut hasher, entry.method().unwrap_or(self.method).as_str().as_bytes());
        }
        hash_field(&mut hasher, self.name.as_bytes());
        hash_field(&mut hasher, self.comment.as_bytes());
        for (key, value) in &self.meta {
            hash_field(&mut hasher, key.as_bytes());
            hash_field(&mut hasher, value.as_bytes());
        }
        hash_field(&mut hasher, self.method.as_str().as_bytes());
        hash_field(&mut hasher, &[u8::from(self.config.zip64)]);
        hasher.finalize().to_hex().to_string()
    }

    pub async fn headers(&mut self) -> Vec<(&'static str, String)> {
        let length = self.predict_size().await;
        headers(&self.name, length)
    }

    /// Run the write pass into `sink` (and the cache sink, if any).
    ///
    /// Both sinks are closed whether or not the pass succeeds.
    #[instrument(skip_all, fields(archive = %self.name, entries = self.queue.len()))]
    pub async fn write_to(mut self, sink: BoxSink) -> Result<Streamed> {
        let prediction = self.prediction().await;
        let zip64 = match prediction {
            Some(prediction) => prediction.zip64,
            None => {
                let layout = self.layout(self.config.zip64);
                predict::stream_zip64(self.queue.as_slice(), layout).await
            },
        };
        let predicted = prediction.map(|p| p.size);
        dispatch(&self.listeners, &self.name, ArchiveEvent::Streaming { predicted });

        let mut tee = TeeSink::new(sink, self.cache.take());
        let layout = self.layout(zip64);
        let written = writer::traverse(self.queue.as_slice(), layout, Mode::Stream(&mut tee)).await;
        let closed = tee.close().await;
        let size = written?;
        closed.or_raise(|| ErrorKind::SinkWrite)?;

        if let Some(predicted) = predicted
            && predicted != size
        {
            dispatch(&self.listeners, &self.name, ArchiveEvent::PredictionMismatch { predicted, actual: size });
        }
        dispatch(&self.listeners, &self.name, ArchiveEvent::Streamed { size });
        Ok(Streamed { size, predicted })
    }

    /// Write to `{dir}/{name}` through a writable origin.
    pub async fn save_to(self, dir: &str) -> Result<Streamed> {
        let target = match LocatorKind::of(dir) {
            LocatorKind::S3 | LocatorKind::Ftp => format!("{}/{}", dir.trim_end_matches('/'), self.name),
            _ => Path::new(dir).join(&self.name).to_string_lossy().into_owned(),
        };
        let origin = self.origins.make_writable(&target)?;
        let sink = origin
            .writer()
            .await
            .or_raise(|| ErrorKind::NotWritable(target.clone()))?;
        self.write_to(sink).await
    }

    /// Write to `{dir}/{name}` on a configured disk.
    pub async fn save_to_disk(self, disk: &str, dir: &str) -> Result<Streamed> {
        let dir = dir.trim_matches('/');
        let path = match dir.is_empty() {
            true => self.name.clone(),
            false => format!("{dir}/{}", self.name),
        };
        let origin = self.origins.writable_from_disk(disk, &path)?;
        let sink = origin
            .writer()
            .await
            .or_raise(|| ErrorKind::NotWritable(format!("{disk}:{path}")))?;
        self.write_to(sink).await
    }

    /// Spawn the write pass onto the Tokio runtime and hand back the body.
    pub async fn into_stream(mut self) -> ArchiveStream {
        let content_length = self.predict_size().await;
        let name = self.name.clone();
        let headers = headers(&name, content_length);
        let (sender, body) = channel(self.config.channel_capacity);
        let aborter = sender.clone();
        let task = tokio::spawn(async move {
            let result = self.write_to(Box::new(ChannelSink::new(sender))).await;
            if let Err(e) = &result {
                aborter.abort(std::io::Error::other(e.to_string())).await;
            }
            result
        });
        ArchiveStream { name, content_length, headers, body, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rstest::rstest;
    use std::io::{Cursor, Read};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use zipstream_config::{ConflictStrategy, DiskConfig};
    use zipstream_storage::MemorySink;
    use zipstream_storage::origin::MockOrigin;

    fn zipstream(config: Config) -> ZipStream {
        ZipStream::new(config).unwrap()
    }

    fn archive() -> Archive {
        zipstream(Config::default()).create(None)
    }

    fn read_zip(bytes: Vec<u8>) -> zip::ZipArchive<Cursor<Vec<u8>>> {
        zip::ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    fn entry_contents(zip: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut contents = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut contents).unwrap();
        contents
    }

    fn mock(locator: &str, data: &str) -> Arc<MockOrigin> {
        Arc::new(MockOrigin::new(locator, data))
    }

    fn record_events(archive: &mut Archive) -> Arc<Mutex<Vec<ArchiveEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        archive.on_event(move |event| sink.lock().unwrap().push(*event));
        events
    }

    #[rstest]
    #[case(None, "download.zip")]
    #[case(Some(""), "download.zip")]
    #[case(Some("report"), "report.zip")]
    #[case(Some("report.zip"), "report.zip")]
    #[case(Some("REPORT.ZIP"), "REPORT.ZIP")]
    #[case(Some("backup.tar"), "backup.tar.zip")]
    fn test_output_name(#[case] name: Option<&str>, #[case] expected: &str) {
        assert_eq!(output_name(name), expected);
        assert_eq!(zipstream(Config::default()).create(name).name(), expected);
    }

    #[tokio::test]
    async fn test_store_archive_round_trips_with_exact_prediction() {
        let mut archive = archive();
        archive.add_raw("hello", "a.txt").unwrap();
        archive.add_raw("world, again", "dir/b.txt").unwrap();
        archive.set_comment("built by a test");
        assert!(archive.can_predict_size().await);
        let predicted = archive.predict_size().await.unwrap();

        let output = MemorySink::new();
        let streamed = archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(streamed, Streamed { size: predicted, predicted: Some(predicted) });
        assert_eq!(output.contents().len() as u64, predicted);
        assert!(output.is_closed());

        let mut zip = read_zip(output.contents());
        assert_eq!(zip.len(), 2);
        assert_eq!(zip.comment(), b"built by a test");
        assert_eq!(entry_contents(&mut zip, "a.txt"), "hello");
        assert_eq!(entry_contents(&mut zip, "dir/b.txt"), "world, again");
        assert_eq!(zip.by_index(0).unwrap().name(), "a.txt");
        assert_eq!(zip.by_index(0).unwrap().compression(), zip::CompressionMethod::Stored);
    }

    #[tokio::test]
    async fn test_empty_archive() {
        let mut archive = archive();
        assert_eq!(archive.predict_size().await, Some(22));
        let output = MemorySink::new();
        let streamed = archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(streamed.size, 22);
        assert_eq!(read_zip(output.contents()).len(), 0);
    }

    #[tokio::test]
    async fn test_deflate_round_trips_and_is_unpredictable() {
        let config = Config { compression_method: Method::Deflate, ..Config::default() };
        let mut archive = zipstream(config).create(Some("compressed"));
        let text = "all work and no play makes jack a dull boy. ".repeat(200);
        archive.add_raw(text.clone(), "jack.txt").unwrap();
        assert!(!archive.can_predict_size().await);
        assert_eq!(archive.predict_size().await, None);

        let output = MemorySink::new();
        let streamed = archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(streamed.predicted, None);
        assert!(streamed.size < text.len() as u64);

        let mut zip = read_zip(output.contents());
        assert_eq!(zip.by_index(0).unwrap().compression(), zip::CompressionMethod::Deflated);
        assert_eq!(entry_contents(&mut zip, "jack.txt"), text);
    }

    #[tokio::test]
    async fn test_local_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "local notes").unwrap();

        let mut archive = archive();
        let insertion = archive.add_locator(&path.to_string_lossy(), None).unwrap();
        assert_eq!(insertion, Insertion::Inserted("notes.txt".to_string()));
        let predicted = archive.predict_size().await;

        let output = MemorySink::new();
        let streamed = archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(predicted, Some(streamed.size));
        assert_eq!(entry_contents(&mut read_zip(output.contents()), "notes.txt"), "local notes");
    }

    #[tokio::test]
    async fn test_forced_zip64_round_trips() {
        let config = Config { zip64: true, ..Config::default() };
        let mut archive = zipstream(config).create(None);
        archive.add_raw("tiny", "tiny.txt").unwrap();
        archive.add_raw("", "empty.txt").unwrap();
        let prediction = archive.prediction().await.unwrap();
        assert!(prediction.zip64);

        let output = MemorySink::new();
        let streamed = archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(streamed.size, prediction.size);
        let mut zip = read_zip(output.contents());
        assert_eq!(entry_contents(&mut zip, "tiny.txt"), "tiny");
        assert_eq!(entry_contents(&mut zip, "empty.txt"), "");
    }

    #[tokio::test]
    async fn test_ascii_filenames() {
        let mut archive = archive();
        archive.add_raw("x", "ϩtrÂͶğƎ♡.txt").unwrap();
        assert!(archive.contains("trAg.txt"));
        let output = MemorySink::new();
        archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(read_zip(output.contents()).by_index(0).unwrap().name(), "trAg.txt");

        let mut archive = self::archive();
        archive.set_ascii_filenames(false);
        archive.add_raw("x", "café.txt").unwrap();
        let output = MemorySink::new();
        archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(read_zip(output.contents()).by_index(0).unwrap().name(), "café.txt");
    }

    #[tokio::test]
    async fn test_conflict_strategy_from_config() {
        let config = Config { conflict_strategy: ConflictStrategy::Rename, ..Config::default() };
        let mut archive = zipstream(config).create(None);
        archive.add_raw("1", "file.txt").unwrap();
        let renamed = archive.add_raw("2", "FILE.txt").unwrap();
        assert_eq!(renamed.path(), Some("FILE_1.txt"));
        assert_eq!(archive.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_receives_identical_bytes() {
        let mut archive = archive();
        archive.add_raw("cached", "c.txt").unwrap();
        let cache = MemorySink::new();
        assert!(archive.cache_to(Box::new(cache.clone())).is_none());

        let output = MemorySink::new();
        archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(output.contents(), cache.contents());
        assert_eq!(cache.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_to_read_only_locator() {
        let mut archive = archive();
        let err = archive.cache_to_locator("https://example.com/cache.zip").await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotWritable(_)));
    }

    #[tokio::test]
    async fn test_events() {
        let mut archive = archive();
        archive.add_raw("hello", "a.txt").unwrap();
        let events = record_events(&mut archive);
        let streamed = archive.write_to(Box::new(MemorySink::new())).await.unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            [
                ArchiveEvent::Streaming { predicted: Some(streamed.size) },
                ArchiveEvent::Streamed { size: streamed.size },
            ]
        );
    }

    #[tokio::test]
    async fn test_prediction_mismatch_is_reported_not_fatal() {
        let mut archive = archive();
        let origin = Arc::new(MockOrigin::new("mock://liar.txt", "hello").with_reported_size(Some(10)));
        archive.add(FileSource::new(origin, None).unwrap()).unwrap();
        let events = record_events(&mut archive);

        let output = MemorySink::new();
        let streamed = archive.write_to(Box::new(output.clone())).await.unwrap();
        let predicted = streamed.predicted.unwrap();
        assert_eq!(predicted, streamed.size + 5);
        assert!(events.lock().unwrap().contains(&ArchiveEvent::PredictionMismatch { predicted, actual: streamed.size }));
        assert_eq!(entry_contents(&mut read_zip(output.contents()), "liar.txt"), "hello");
    }

    #[tokio::test]
    async fn test_unknown_size_streams_without_prediction() {
        let mut archive = archive();
        let origin = Arc::new(MockOrigin::new("mock://stream.bin", "streamed payload").with_reported_size(None));
        archive.add(FileSource::new(origin, None).unwrap()).unwrap();
        archive.add_raw("known", "known.txt").unwrap();
        assert!(!archive.can_predict_size().await);

        let output = MemorySink::new();
        let streamed = archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(streamed.predicted, None);
        assert_eq!(entry_contents(&mut read_zip(output.contents()), "stream.bin"), "streamed payload");
    }

    #[tokio::test]
    async fn test_manual_size_restores_predictability() {
        let mut archive = archive();
        let origin = Arc::new(MockOrigin::new("mock://stream.bin", "payload").with_reported_size(None));
        archive.add(FileSource::new(origin, None).unwrap().with_size(7)).unwrap();
        let predicted = archive.predict_size().await.unwrap();
        let streamed = archive.write_to(Box::new(MemorySink::new())).await.unwrap();
        assert_eq!(streamed.size, predicted);
    }

    #[tokio::test]
    async fn test_source_failure_still_closes_sinks() {
        let mut archive = archive();
        archive.add_raw("fine", "fine.txt").unwrap();
        let origin = Arc::new(MockOrigin::new("mock://broken.txt", "never").failing_reads());
        archive.add(FileSource::new(origin, None).unwrap()).unwrap();
        let cache = MemorySink::new();
        archive.cache_to(Box::new(cache.clone()));

        let output = MemorySink::new();
        let err = archive.write_to(Box::new(output.clone())).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::SourceRead(path) if path == "broken.txt"));
        assert!(output.is_closed());
        assert!(cache.is_closed());
    }

    #[tokio::test]
    async fn test_prediction_is_memoized_until_plan_changes() {
        let mut archive = archive();
        let origin = mock("mock://a.txt", "hello");
        archive.add(FileSource::new(origin.clone(), None).unwrap()).unwrap();
        let first = archive.predict_size().await.unwrap();
        assert_eq!(archive.predict_size().await, Some(first));
        assert_eq!(origin.stat_calls(), 1);

        archive.set_comment("abc");
        assert_eq!(archive.predict_size().await, Some(first + 3));
        archive.add_raw("more", "b.txt").unwrap();
        assert!(archive.predict_size().await.unwrap() > first + 3);
        assert!(archive.remove("b.txt").is_some());
        assert_eq!(archive.predict_size().await, Some(first + 3));
        // Sources remember their own probe.
        assert_eq!(origin.stat_calls(), 1);
    }

    #[tokio::test]
    async fn test_source_is_read_once() {
        let mut archive = archive();
        let origin = mock("mock://a.txt", "hello");
        archive.add(FileSource::new(origin.clone(), None).unwrap()).unwrap();
        archive.write_to(Box::new(MemorySink::new())).await.unwrap();
        assert_eq!(origin.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_predict_disabled() {
        let config = Config { predict_size: false, ..Config::default() };
        let mut archive = zipstream(config).create(None);
        archive.add_raw("hello", "a.txt").unwrap();
        assert_eq!(archive.predict_size().await, None);
        assert!(!archive.headers().await.iter().any(|(name, _)| *name == "Content-Length"));
    }

    #[tokio::test]
    async fn test_missing_archive_path() {
        let mut archive = archive();
        let err = archive.add_locator("inline text content", None).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingArchivePath(_)));
        assert!(archive.add_locator("inline text content", Some("inline.txt")).is_ok());
    }

    #[tokio::test]
    async fn test_empty_ascii_path_is_rejected() {
        let mut archive = archive();
        let err = archive.add_raw("x", "♡").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidEntry(_)));
        assert!(archive.is_empty());
    }

    #[tokio::test]
    async fn test_fingerprint() {
        async fn plan(comment: &str, order: [&str; 2]) -> String {
            let mut archive = archive();
            for path in order {
                archive.add_raw(path.to_uppercase(), path).unwrap();
            }
            archive.set_comment(comment);
            archive.fingerprint().await
        }
        let base = plan("", ["a.txt", "b.txt"]).await;
        assert_eq!(base, plan("", ["a.txt", "b.txt"]).await);
        assert_ne!(base, plan("note", ["a.txt", "b.txt"]).await);
        assert_ne!(base, plan("", ["b.txt", "a.txt"]).await);

        let mut archive = archive();
        let before = archive.fingerprint().await;
        archive.set_meta(BTreeMap::from([("user".to_string(), "42".to_string())]));
        assert_ne!(before, archive.fingerprint().await);
    }

    #[tokio::test]
    async fn test_fingerprint_covers_entry_method() {
        async fn plan(method: Option<Method>) -> (String, Vec<u8>) {
            let mut archive = archive();
            let text = "compressible ".repeat(80);
            let mut source = FileSource::new(Arc::new(MemoryOrigin::new(text)), Some("x.txt")).unwrap();
            if let Some(method) = method {
                source = source.with_method(method);
            }
            archive.add(source).unwrap();
            let fingerprint = archive.fingerprint().await;
            let output = MemorySink::new();
            archive.write_to(Box::new(output.clone())).await.unwrap();
            (fingerprint, output.contents())
        }
        let (stored, stored_bytes) = plan(None).await;
        let (deflated, deflated_bytes) = plan(Some(Method::Deflate)).await;
        assert_ne!(stored_bytes, deflated_bytes);
        assert_ne!(stored, deflated);
        // An override matching the archive method changes nothing.
        assert_eq!(plan(Some(Method::Store)).await.0, stored);
    }

    #[tokio::test]
    async fn test_stream_only_zip64_from_known_sizes() {
        let config = Config { predict_size: false, ..Config::default() };
        let mut archive = zipstream(config).create(None);
        let origin = MockOrigin::new("mock://almost.bin", "hello").with_reported_size(Some(0xFFFF_FFF0));
        archive.add(FileSource::new(Arc::new(origin), None).unwrap()).unwrap();
        assert_eq!(archive.predict_size().await, None);

        let output = MemorySink::new();
        let streamed = archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(streamed.predicted, None);
        let bytes = output.contents();
        assert!(bytes.windows(4).any(|w| w == b"PK\x06\x06"));
        assert_eq!(entry_contents(&mut read_zip(bytes), "almost.bin"), "hello");
    }

    #[tokio::test]
    async fn test_entry_count_zip64_round_trips() {
        let mut archive = archive();
        for i in 0..0xFFFF {
            archive.add_raw("", &format!("{i}.txt")).unwrap();
        }
        let prediction = archive.prediction().await.unwrap();
        assert!(prediction.zip64);

        let output = MemorySink::new();
        let streamed = archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(streamed.size, prediction.size);
        assert_eq!(read_zip(output.contents()).len(), 0xFFFF);
    }

    #[rstest]
    #[case(ConflictStrategy::Skip, &[("subdir/test1.txt", "first")])]
    #[case(ConflictStrategy::Replace, &[("subdir/test1.txt", "second")])]
    #[case(ConflictStrategy::Rename, &[("subdir/test1.txt", "first"), ("subdir/test1_1.txt", "second")])]
    #[tokio::test]
    async fn test_conflict_strategies_on_contents(
        #[case] strategy: ConflictStrategy,
        #[case] expected: &[(&str, &str)],
    ) {
        let config = Config { conflict_strategy: strategy, ..Config::default() };
        let mut archive = zipstream(config).create(None);
        archive.add_raw("first", "subdir/test1.txt").unwrap();
        archive.add_raw("second", "subdir/test1.txt").unwrap();

        let output = MemorySink::new();
        archive.write_to(Box::new(output.clone())).await.unwrap();
        let mut zip = read_zip(output.contents());
        assert_eq!(zip.len(), expected.len());
        for (index, (path, contents)) in expected.iter().enumerate() {
            assert_eq!(zip.by_index(index).unwrap().name(), *path);
            assert_eq!(entry_contents(&mut zip, path), *contents);
        }
    }

    fn with_local_disk(root: &std::path::Path) -> ZipStream {
        let mut config = Config::default();
        config
            .disks
            .insert("exports".to_string(), DiskConfig::Local { root: root.to_path_buf() });
        zipstream(config)
    }

    #[tokio::test]
    async fn test_save_to_disk() {
        let dir = TempDir::new().unwrap();
        let mut archive = with_local_disk(dir.path()).create(Some("report"));
        archive.add_raw("saved", "s.txt").unwrap();
        let streamed = archive.save_to_disk("exports", "/monthly/").await.unwrap();

        let bytes = std::fs::read(dir.path().join("monthly/report.zip")).unwrap();
        assert_eq!(bytes.len() as u64, streamed.size);
        assert_eq!(entry_contents(&mut read_zip(bytes), "s.txt"), "saved");
    }

    #[tokio::test]
    async fn test_cache_to_disk() {
        let dir = TempDir::new().unwrap();
        let mut archive = with_local_disk(dir.path()).create(None);
        archive.add_raw("cached", "c.txt").unwrap();
        assert!(archive.cache_to_disk("exports", "cache/copy.zip").await.unwrap().is_none());

        let output = MemorySink::new();
        archive.write_to(Box::new(output.clone())).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("cache/copy.zip")).unwrap(), output.contents());
    }

    #[tokio::test]
    async fn test_unknown_disk() {
        let dir = TempDir::new().unwrap();
        let mut archive = with_local_disk(dir.path()).create(None);
        let err = archive.cache_to_disk("missing", "copy.zip").await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::UnsupportedOrigin(_)));
        let err = archive.save_to_disk("missing", "out").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedOrigin(_)));
    }

    #[tokio::test]
    async fn test_save_to() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested");
        let mut archive = zipstream(Config::default()).create(Some("report"));
        archive.add_raw("saved", "s.txt").unwrap();
        let streamed = archive.save_to(&target.to_string_lossy()).await.unwrap();

        let bytes = std::fs::read(target.join("report.zip")).unwrap();
        assert_eq!(bytes.len() as u64, streamed.size);
        assert_eq!(entry_contents(&mut read_zip(bytes), "s.txt"), "saved");
    }

    #[tokio::test]
    async fn test_into_stream_yields_content_length() {
        let config = Config { chunk_size: 3, channel_capacity: 2, ..Config::default() };
        let mut archive = zipstream(config).create(Some("streamed"));
        archive.add_raw("streaming body", "body.txt").unwrap();
        let stream = archive.into_stream().await;
        assert_eq!(stream.name, "streamed.zip");
        let content_length = stream.content_length.unwrap();
        assert!(stream.headers.contains(&("Content-Length", content_length.to_string())));

        let mut body = stream.body;
        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            bytes.extend(chunk.unwrap());
        }
        assert_eq!(bytes.len() as u64, content_length);
        assert_eq!(body.received(), content_length);
        assert_eq!(stream.task.await.unwrap().unwrap().size, content_length);
        assert_eq!(entry_contents(&mut read_zip(bytes), "body.txt"), "streaming body");
    }

    #[tokio::test]
    async fn test_into_stream_consumer_gone() {
        let mut archive = archive();
        archive.add_raw("nobody listens", "a.txt").unwrap();
        let stream = archive.into_stream().await;
        drop(stream.body);
        let err = stream.task.await.unwrap().unwrap_err();
        assert!(matches!(&*err, ErrorKind::SinkWrite));
    }

    #[tokio::test]
    async fn test_into_stream_failure_ends_with_error() {
        let mut archive = archive();
        let origin = Arc::new(MockOrigin::new("mock://broken.txt", "never").failing_reads());
        archive.add(FileSource::new(origin, None).unwrap()).unwrap();
        let mut stream = archive.into_stream().await;

        let mut last = None;
        while let Some(item) = stream.body.next().await {
            last = Some(item);
        }
        assert!(last.unwrap().is_err());
        assert!(stream.task.await.unwrap().is_err());
    }
}
