//! # Namespace Resolver
//!
//! Bidirectional mapping between expanded URIs and curies.
//!
//! A URI's stem is everything up to and including its last `#` or `/`; the
//! rest is the local name. `compact` swaps a registered stem for its prefix,
//! `expand` does the reverse. Both read the persisted namespace tables through
//! the caller's snapshot.

use crate::keys::{NAMESPACE_STEMS, NAMESPACES};
use crate::{EntigraphError, Namespace};
use redb::{ReadOnlyTable, ReadTransaction, ReadableTable};

/// Split a curie into `(prefix, local)`.
///
/// Returns `None` unless both parts are non-empty and the prefix contains no
/// `/` (which would make it a URI scheme-like string instead).
#[must_use]
pub fn split_curie(curie: &str) -> Option<(&str, &str)> {
    let (prefix, local) = curie.split_once(':')?;
    if prefix.is_empty() || local.is_empty() || prefix.contains('/') || local.starts_with("//") {
        return None;
    }
    Some((prefix, local))
}

/// Split an expanded URI into `(stem, local)` at its last `#` or `/`.
#[must_use]
pub fn split_uri(uri: &str) -> Option<(&str, &str)> {
    let cut = uri.rfind(['#', '/'])?;
    let (stem, local) = uri.split_at(cut + 1);
    if local.is_empty() {
        return None;
    }
    Some((stem, local))
}

/// Whether `id` is an expanded URI rather than a curie.
#[must_use]
pub fn is_expanded(id: &str) -> bool {
    id.contains("://")
}

/// Namespace lookups bound to one read snapshot.
pub struct NamespaceResolver {
    by_prefix: ReadOnlyTable<&'static str, &'static [u8]>,
    by_stem: ReadOnlyTable<&'static str, &'static str>,
}

impl NamespaceResolver {
    /// Open the namespace tables in `txn`.
    pub fn open(txn: &ReadTransaction) -> Result<Self, EntigraphError> {
        Ok(Self {
            by_prefix: txn.open_table(NAMESPACES)?,
            by_stem: txn.open_table(NAMESPACE_STEMS)?,
        })
    }

    /// The namespace registered under `prefix`, if any.
    pub fn namespace(&self, prefix: &str) -> Result<Option<Namespace>, EntigraphError> {
        match self.by_prefix.get(prefix)? {
            Some(data) => Ok(Some(postcard::from_bytes(data.value()).map_err(|e| {
                EntigraphError::Corrupt {
                    key: format!("namespace:{}", prefix),
                    reason: e.to_string(),
                }
            })?)),
            None => Ok(None),
        }
    }

    /// Every registered namespace, ordered by prefix.
    pub fn namespaces(&self) -> Result<Vec<Namespace>, EntigraphError> {
        let mut result = Vec::new();
        for entry in self.by_prefix.iter()? {
            let (key, data) = entry?;
            let ns: Namespace =
                postcard::from_bytes(data.value()).map_err(|e| EntigraphError::Corrupt {
                    key: format!("namespace:{}", key.value()),
                    reason: e.to_string(),
                })?;
            result.push(ns);
        }
        Ok(result)
    }

    /// The prefix bound to a URI stem, if any.
    pub fn prefix_for_stem(&self, stem: &str) -> Result<Option<String>, EntigraphError> {
        Ok(self.by_stem.get(stem)?.map(|p| p.value().to_string()))
    }

    /// `prefix:local` to the full URI.
    pub fn expand(&self, curie: &str) -> Result<String, EntigraphError> {
        let (prefix, local) = split_curie(curie)
            .ok_or_else(|| EntigraphError::InvalidIdentifier(curie.to_string()))?;
        let ns = self
            .namespace(prefix)?
            .ok_or_else(|| EntigraphError::UnknownNamespace(prefix.to_string()))?;
        Ok(format!("{}{}", ns.expansion, local))
    }

    /// Full URI to `prefix:local`.
    pub fn compact(&self, uri: &str) -> Result<String, EntigraphError> {
        let (stem, local) =
            split_uri(uri).ok_or_else(|| EntigraphError::InvalidIdentifier(uri.to_string()))?;
        let prefix = self
            .prefix_for_stem(stem)?
            .ok_or_else(|| EntigraphError::UnknownNamespace(stem.to_string()))?;
        Ok(format!("{}:{}", prefix, local))
    }

    /// Normalise a caller-facing identifier to curie form.
    ///
    /// Expanded URIs are compacted; anything else must already be a
    /// well-formed curie and is returned unchanged, whether or not its prefix
    /// is registered. Every failure is reported as `InvalidIdentifier`.
    pub fn as_curie(&self, id: &str) -> Result<String, EntigraphError> {
        if is_expanded(id) {
            return self.compact(id).map_err(|e| match e {
                EntigraphError::UnknownNamespace(_) | EntigraphError::InvalidIdentifier(_) => {
                    EntigraphError::InvalidIdentifier(id.to_string())
                }
                other => other,
            });
        }
        if split_curie(id).is_none() {
            return Err(EntigraphError::InvalidIdentifier(id.to_string()));
        }
        Ok(id.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{FixtureWriter, Store};

    fn store_with_namespaces() -> Store {
        let store = Store::in_memory().expect("open store");
        let mut writer = FixtureWriter::new(&store).expect("writer");
        writer
            .register_namespace("ex", "http://example.com/")
            .expect("register");
        writer
            .register_namespace("foaf", "http://xmlns.com/foaf/0.1/")
            .expect("register");
        writer
            .register_namespace("owl", "http://www.w3.org/2002/07/owl#")
            .expect("register");
        writer.commit().expect("commit");
        store
    }

    #[test]
    fn split_uri_cuts_at_last_separator() {
        assert_eq!(
            split_uri("http://example.com/people/3"),
            Some(("http://example.com/people/", "3"))
        );
        assert_eq!(
            split_uri("http://www.w3.org/2002/07/owl#sameAs"),
            Some(("http://www.w3.org/2002/07/owl#", "sameAs"))
        );
        assert_eq!(split_uri("http://example.com/"), None);
    }

    #[test]
    fn split_curie_rejects_uris_and_empty_parts() {
        assert_eq!(split_curie("ex:3"), Some(("ex", "3")));
        assert_eq!(split_curie(":3"), None);
        assert_eq!(split_curie("ex:"), None);
        assert_eq!(split_curie("plain"), None);
        assert_eq!(split_curie("http://example.com/3"), None);
    }

    #[test]
    fn compact_and_expand_are_inverse() {
        let store = store_with_namespaces();
        let txn = store.begin_read().expect("read");
        let resolver = NamespaceResolver::open(&txn).expect("resolver");

        let curie = resolver.compact("http://example.com/3").expect("compact");
        assert_eq!(curie, "ex:3");
        assert_eq!(resolver.expand(&curie).expect("expand"), "http://example.com/3");

        let same_as = resolver
            .compact("http://www.w3.org/2002/07/owl#sameAs")
            .expect("compact");
        assert_eq!(same_as, "owl:sameAs");
    }

    #[test]
    fn compact_unknown_stem_fails() {
        let store = store_with_namespaces();
        let txn = store.begin_read().expect("read");
        let resolver = NamespaceResolver::open(&txn).expect("resolver");

        let result = resolver.compact("http://unknown.org/thing");
        assert!(matches!(result, Err(EntigraphError::UnknownNamespace(_))));
    }

    #[test]
    fn expand_unknown_prefix_fails() {
        let store = store_with_namespaces();
        let txn = store.begin_read().expect("read");
        let resolver = NamespaceResolver::open(&txn).expect("resolver");

        assert!(matches!(
            resolver.expand("nope:1"),
            Err(EntigraphError::UnknownNamespace(_))
        ));
        assert!(matches!(
            resolver.expand("nocolon"),
            Err(EntigraphError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn as_curie_passes_curies_through() {
        let store = store_with_namespaces();
        let txn = store.begin_read().expect("read");
        let resolver = NamespaceResolver::open(&txn).expect("resolver");

        assert_eq!(resolver.as_curie("ex:3").expect("curie"), "ex:3");
        assert_eq!(
            resolver.as_curie("unregistered:9").expect("curie"),
            "unregistered:9"
        );
        assert_eq!(
            resolver.as_curie("http://example.com/3").expect("curie"),
            "ex:3"
        );
    }

    #[test]
    fn as_curie_reports_invalid_identifier() {
        let store = store_with_namespaces();
        let txn = store.begin_read().expect("read");
        let resolver = NamespaceResolver::open(&txn).expect("resolver");

        assert!(matches!(
            resolver.as_curie("http://unknown.org/x"),
            Err(EntigraphError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            resolver.as_curie("no-colon"),
            Err(EntigraphError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn namespaces_listed_by_prefix() {
        let store = store_with_namespaces();
        let txn = store.begin_read().expect("read");
        let resolver = NamespaceResolver::open(&txn).expect("resolver");

        let prefixes: Vec<String> = resolver
            .namespaces()
            .expect("list")
            .into_iter()
            .map(|ns| ns.prefix)
            .collect();
        assert_eq!(prefixes, vec!["ex", "foaf", "owl"]);
    }
}
