//! Pending-work detection between two storage folders.
//!
//! Folders have no index: a source item is "done" when the derived folder
//! holds a blob whose base name matches. Base names are zero-padded UTC
//! timestamps (`YYYYMMDD_HHMMSS`), so lexicographic order is chronological
//! order and every "oldest"/"latest" decision here is a plain string sort.

/// File name without its folder path.
pub fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Base name without the extension: `"fichaum/20250101_000000.json"` -> `"20250101_000000"`.
pub fn stem(name: &str) -> &str {
    let base = basename(name);
    match base.rfind('.') {
        Some(i) if i > 0 => &base[..i],
        _ => base,
    }
}

/// Case-insensitive extension check (`ext` without the dot).
pub fn has_extension(name: &str, ext: &str) -> bool {
    let base = basename(name);
    match base.rfind('.') {
        Some(i) => base[i + 1..].eq_ignore_ascii_case(ext),
        None => false,
    }
}

/// Keeps only names with the given extension.
pub fn with_extension(names: Vec<String>, ext: &str) -> Vec<String> {
    names.into_iter().filter(|n| has_extension(n, ext)).collect()
}

/// How a derived name is matched back to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKey<'a> {
    /// Derived stem equals source stem (ficha -> rascunho).
    Exact,
    /// Derived stem is `<source stem>-<lang>`; other languages do not count
    /// (rascunho -> html).
    LanguageSuffix(&'a str),
}

impl JoinKey<'_> {
    /// The source stem a derived name satisfies, if any.
    fn source_key<'n>(&self, derived: &'n str) -> Option<&'n str> {
        let s = stem(derived);
        match self {
            JoinKey::Exact => Some(s),
            JoinKey::LanguageSuffix(lang) => s
                .strip_suffix(lang)
                .and_then(|rest| rest.strip_suffix('-')),
        }
    }
}

/// Result of a pending-work query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every source item already has its derived counterpart.
    NothingToDo,
    /// `next` is the oldest pending item; `pending` lists all of them, oldest first.
    Next { next: String, pending: Vec<String> },
}

/// Source names with no derived counterpart, oldest first.
pub fn pending(source: &[String], derived: &[String], join: JoinKey<'_>) -> Vec<String> {
    let done: std::collections::HashSet<&str> =
        derived.iter().filter_map(|d| join.source_key(d)).collect();

    let mut items: Vec<String> = source
        .iter()
        .filter(|s| !done.contains(stem(s)))
        .cloned()
        .collect();
    items.sort_by(|a, b| basename(a).cmp(basename(b)));
    items
}

/// Picks the oldest pending source item.
pub fn resolve(source: &[String], derived: &[String], join: JoinKey<'_>) -> Resolution {
    let items = pending(source, derived, join);
    match items.first() {
        None => Resolution::NothingToDo,
        Some(first) => Resolution::Next {
            next: first.clone(),
            pending: items,
        },
    }
}

/// The lexicographically last name by base name, assumed to be the newest.
pub fn latest(names: &[String]) -> Option<&String> {
    names.iter().max_by(|a, b| basename(a).cmp(basename(b)))
}

/// The `n` newest names, returned oldest first.
pub fn most_recent(names: &[String], n: usize) -> Vec<String> {
    let mut sorted = names.to_vec();
    sorted.sort_by(|a, b| basename(a).cmp(basename(b)));
    let skip = sorted.len().saturating_sub(n);
    sorted.split_off(skip)
}
