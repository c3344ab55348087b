use std::collections::HashMap;
use std::path::{Path, PathBuf};

////////////////////////////////////////////////////////////////////////////////////////////////

/// The three fixed search directories, probed in this order (§4.1). Later
/// directories supplement but never override an identical name — a
/// duplicate anywhere in the sweep is fatal (§6, §9).
pub const SEARCH_DIRS: [&str; 3] = [
    "META-INF/dubbo/internal/",
    "META-INF/dubbo/",
    "META-INF/services/",
];

/// One parsed, non-comment, non-blank line of a resource file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Names bound to `key` by this line. Empty only transiently; a bare
    /// `FQCN` line is resolved to a single derived name by the caller, who
    /// knows the interface's short name.
    pub names: Vec<String>,
    pub key: String,
}

/// A line that failed to parse, or a derivation failure. Recorded by
/// offending line text so it can be folded into a `NoSuchExtension`
/// diagnostic later (§4.1 "does not abort the sweep").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceError {
    pub line: String,
    pub reason: String,
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// Parses the `name=FQCN` / bare-`FQCN` grammar of §4.1/§6 out of one
/// resource file's text. Does not perform name derivation for bare lines —
/// that depends on the interface's short name, supplied by the caller via
/// [`resolve_bare_name`].
pub fn read_records(text: &str) -> Vec<Result<Record, ResourceError>> {
    let mut out = Vec::new();
    for raw_line in text.lines() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        out.push(parse_line(line));
    }
    out
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_line(line: &str) -> Result<Record, ResourceError> {
    match line.split_once('=') {
        Some((names, key)) => {
            let key = key.trim();
            if key.is_empty() {
                return Err(ResourceError {
                    line: line.to_owned(),
                    reason: "missing implementation key after '='".to_owned(),
                });
            }
            let names: Vec<String> = names
                .split(|c: char| c == ',' || c.is_whitespace())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
            if names.is_empty() {
                return Err(ResourceError {
                    line: line.to_owned(),
                    reason: "empty name list before '='".to_owned(),
                });
            }
            Ok(Record {
                names,
                key: key.to_owned(),
            })
        }
        None => Ok(Record {
            names: Vec::new(),
            key: line.to_owned(),
        }),
    }
}

/// Derives a name from an implementation key when no explicit `name=` was
/// given (§4.1): if the key's short name ends with the interface's short
/// name, strip that suffix, then lower-case the remainder.
pub fn derive_name(key: &str, iface_short_name: &str) -> String {
    let short = key.rsplit("::").next().unwrap_or(key);
    let stripped = short.strip_suffix(iface_short_name).unwrap_or(short);
    stripped.to_lowercase()
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// Reads every resource matching `<dir>/<resource_name>` under each of
/// `roots`, across the three fixed directories in order, merging parse
/// errors into a map keyed by the offending line rather than aborting
/// (§4.1, §5 "Resource enumeration errors are logged and skipped").
pub fn scan_search_path(
    roots: &[PathBuf],
    resource_name: &str,
) -> (Vec<(PathBuf, Record)>, HashMap<String, String>) {
    let mut records = Vec::new();
    let mut errors = HashMap::new();

    for dir in SEARCH_DIRS {
        for root in roots {
            let candidate = root.join(dir).join(resource_name);
            if let Some(text) = read_file_lossy(&candidate) {
                for parsed in read_records(&text) {
                    match parsed {
                        Ok(record) => records.push((candidate.clone(), record)),
                        Err(err) => {
                            tracing::warn!(
                                path = %candidate.display(),
                                line = %err.line,
                                reason = %err.reason,
                                "failed to parse extension resource line"
                            );
                            errors.insert(err.line, err.reason);
                        }
                    }
                }
            }
        }
    }

    (records, errors)
}

fn read_file_lossy(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(_) => None,
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_and_blanks() {
        let text = "\n# a full comment\n  \na=impl::A # trailing comment\n";
        let records: Vec<_> = read_records(text).into_iter().map(Result::unwrap).collect();
        assert_eq!(
            records,
            vec![Record {
                names: vec!["a".to_owned()],
                key: "impl::A".to_owned(),
            }]
        );
    }

    #[test]
    fn parses_bare_line() {
        let records: Vec<_> = read_records("impl::NoNameImpl")
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(records[0].key, "impl::NoNameImpl");
        assert!(records[0].names.is_empty());
    }

    #[test]
    fn parses_comma_and_whitespace_separated_names() {
        let records: Vec<_> = read_records("a, b c=impl::Multi")
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            records[0].names,
            vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]
        );
    }

    #[test]
    fn rejects_empty_key() {
        let results = read_records("a=");
        assert!(results[0].is_err());
    }

    #[test]
    fn derives_name_by_stripping_interface_suffix() {
        assert_eq!(derive_name("my::pkg::FooGreeter", "Greeter"), "foo");
        assert_eq!(derive_name("my::pkg::Unrelated", "Greeter"), "unrelated");
    }
}
