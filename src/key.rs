//! # Reconcile keys, object kinds and the watched-object contract.
//!
//! - [`ReconcileKey`] names one primary object to reconcile (`namespace/name`).
//! - [`ObjectKind`] identifies a watched type (group + version + kind); it is
//!   only ever used as a registry lookup key.
//! - [`Object`] is the minimal view the runtime needs of a watched object:
//!   its kind and its own identity. Everything else is opaque and handed
//!   to transforms untouched.
//!
//! ## Key format
//! ```text
//! "default/rs1"  → ReconcileKey { namespace: "default", name: "rs1" }
//! "node-1"       → ReconcileKey { namespace: "",        name: "node-1" }   (cluster-scoped)
//! "a/b/c", "", "ns/" → invalid (no key)
//! ```

use std::fmt;
use std::sync::Arc;

/// Identifier of one primary object to be reconciled.
///
/// Equality and hashing are structural. Cloning is cheap (shared strings).
/// A key with an empty `name` is the "no reconciliation" sentinel and is
/// never enqueued.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReconcileKey {
    namespace: Arc<str>,
    name: Arc<str>,
}

impl ReconcileKey {
    /// Creates a key from a namespace and a name.
    pub fn new(namespace: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Creates a key for a cluster-scoped object.
    pub fn cluster(name: impl Into<Arc<str>>) -> Self {
        Self::new("", name)
    }

    /// Parses a `namespace/name` (or bare `name`) string.
    ///
    /// Returns `None` for the empty string, more than one `/`, or an empty name.
    ///
    /// ```
    /// use keyvisor::ReconcileKey;
    ///
    /// assert_eq!(ReconcileKey::parse("default/rs1"), Some(ReconcileKey::new("default", "rs1")));
    /// assert_eq!(ReconcileKey::parse("node-1"), Some(ReconcileKey::cluster("node-1")));
    /// assert_eq!(ReconcileKey::parse("a/b/c"), None);
    /// assert_eq!(ReconcileKey::parse(""), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('/');
        let key = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => Self::cluster(name),
            (Some(ns), Some(name), None) => Self::new(ns, name),
            _ => return None,
        };
        (!key.is_empty()).then_some(key)
    }

    /// Namespace (empty for cluster-scoped objects).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Object name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for the sentinel key (empty name).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for ReconcileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Stable descriptor of a watched object type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKind {
    /// API group (empty for the core group).
    pub group: &'static str,
    /// API version.
    pub version: &'static str,
    /// Kind name.
    pub kind: &'static str,
}

impl ObjectKind {
    /// Creates a kind descriptor.
    pub const fn new(group: &'static str, version: &'static str, kind: &'static str) -> Self {
        Self {
            group,
            version,
            kind,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
    }
}

/// A watched object as seen by the runtime.
///
/// ```
/// use keyvisor::{Object, ObjectKind, ReconcileKey};
///
/// struct Pod { namespace: String, name: String }
///
/// impl Object for Pod {
///     const KIND: ObjectKind = ObjectKind::new("", "v1", "Pod");
///     fn namespace(&self) -> &str { &self.namespace }
///     fn name(&self) -> &str { &self.name }
/// }
///
/// let pod = Pod { namespace: "default".into(), name: "rs1-abc".into() };
/// assert_eq!(pod.key(), ReconcileKey::new("default", "rs1-abc"));
/// ```
pub trait Object: Send + Sync + 'static {
    /// Kind this type is registered under.
    const KIND: ObjectKind;

    /// Namespace of this object (empty when cluster-scoped).
    fn namespace(&self) -> &str;

    /// Name of this object.
    fn name(&self) -> &str;

    /// The object's own identity as a reconcile key.
    fn key(&self) -> ReconcileKey {
        ReconcileKey::new(self.namespace(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_namespaced_and_cluster_scoped() {
        assert_eq!(ReconcileKey::new("default", "rs1").to_string(), "default/rs1");
        assert_eq!(ReconcileKey::cluster("node-1").to_string(), "node-1");
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        assert_eq!(ReconcileKey::parse("ns/"), None);
        assert_eq!(ReconcileKey::parse("/"), None);
        assert_eq!(ReconcileKey::parse("a/b/c"), None);
        assert_eq!(
            ReconcileKey::parse("/name"),
            Some(ReconcileKey::cluster("name"))
        );
    }

    #[test]
    fn default_key_is_the_sentinel() {
        assert!(ReconcileKey::default().is_empty());
        assert!(ReconcileKey::new("default", "").is_empty());
        assert!(!ReconcileKey::cluster("x").is_empty());
    }

    #[test]
    fn kind_display() {
        let kind = ObjectKind::new("apps", "v1", "ReplicaSet");
        assert_eq!(kind.to_string(), "apps/v1, Kind=ReplicaSet");
    }
}
