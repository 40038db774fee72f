//! Archive path normalization.

use unicode_normalization::UnicodeNormalization;

/// Normalize an archive path.
///
/// With `ascii`, the path is decomposed (NFKD) and every non-ASCII code point
/// dropped, so accented letters keep their base letter and everything else
/// disappears. Runs of `/` then collapse to one and a leading `/` is removed.
///
/// ```
/// use zipstream_archive::path::normalize;
///
/// assert_eq!(normalize("//docs///a.txt", false), "docs/a.txt");
/// assert_eq!(normalize("ϩtrÂͶğƎ♡.txt", true), "trAg.txt");
/// ```
pub fn normalize(path: &str, ascii: bool) -> String {
    let transliterated: String = match ascii {
        true => path.nfkd().filter(char::is_ascii).collect(),
        false => path.to_string(),
    };
    let mut normalized = String::with_capacity(transliterated.len());
    for c in transliterated.chars() {
        if c == '/' && (normalized.is_empty() || normalized.ends_with('/')) {
            continue;
        }
        normalized.push(c);
    }
    normalized
}

/// Key used to detect conflicting entries.
pub fn dedup_key(path: &str, case_insensitive: bool) -> String {
    match case_insensitive {
        true => path.to_lowercase(),
        false => path.to_string(),
    }
}

/// `{dirname}/{filename}_{n}{ext}`, splitting on the last dot of the final
/// segment.
pub(crate) fn rename_candidate(path: &str, n: usize) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let renamed = match file.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{n}.{ext}"),
        None => format!("{file}_{n}"),
    };
    match dir {
        Some(dir) => format!("{dir}/{renamed}"),
        None => renamed,
    }
}
