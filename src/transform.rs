//! # Object → reconcile key transforms.
//!
//! A [`Transform`] decides which primary objects must be reconciled when a
//! watched object changes. There are five variants, one per cardinality:
//!
//! | Variant     | Function                          | Empty result        |
//! |-------------|-----------------------------------|---------------------|
//! | `Identity`  | the object's own key              | never empty         |
//! | `Single`    | `Fn(&K) -> String` (`ns/name`)    | `""` or unparsable  |
//! | `Multi`     | `Fn(&K) -> Vec<String>`           | `vec![]`            |
//! | `SingleKey` | `Fn(&K) -> ReconcileKey`          | `ReconcileKey::default()` |
//! | `MultiKey`  | `Fn(&K) -> Vec<ReconcileKey>`     | `vec![]`            |
//!
//! ## Rules
//! - Sentinel keys (empty name) and unparsable strings are dropped.
//! - Duplicates within one result are collapsed, first occurrence wins.
//! - A transform that panics yields no keys; the panic is logged and never
//!   reaches the informer's delivery loop.

use std::collections::HashSet;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::warn;

use crate::key::{Object, ReconcileKey};

type SingleFn<K> = Arc<dyn Fn(&K) -> String + Send + Sync>;
type MultiFn<K> = Arc<dyn Fn(&K) -> Vec<String> + Send + Sync>;
type SingleKeyFn<K> = Arc<dyn Fn(&K) -> ReconcileKey + Send + Sync>;
type MultiKeyFn<K> = Arc<dyn Fn(&K) -> Vec<ReconcileKey> + Send + Sync>;

/// Mapping from an observed object to the keys that must be reconciled.
pub enum Transform<K> {
    /// The object's own identity.
    Identity,
    /// One `namespace/name` string.
    Single(SingleFn<K>),
    /// Several `namespace/name` strings.
    Multi(MultiFn<K>),
    /// One pre-built key.
    SingleKey(SingleKeyFn<K>),
    /// Several pre-built keys.
    MultiKey(MultiKeyFn<K>),
}

impl<K> Clone for Transform<K> {
    fn clone(&self) -> Self {
        match self {
            Transform::Identity => Transform::Identity,
            Transform::Single(f) => Transform::Single(Arc::clone(f)),
            Transform::Multi(f) => Transform::Multi(Arc::clone(f)),
            Transform::SingleKey(f) => Transform::SingleKey(Arc::clone(f)),
            Transform::MultiKey(f) => Transform::MultiKey(Arc::clone(f)),
        }
    }
}

impl<K> fmt::Debug for Transform<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl<K> Transform<K> {
    /// Builds a [`Transform::Single`].
    pub fn single(f: impl Fn(&K) -> String + Send + Sync + 'static) -> Self {
        Transform::Single(Arc::new(f))
    }

    /// Builds a [`Transform::Multi`].
    pub fn multi(f: impl Fn(&K) -> Vec<String> + Send + Sync + 'static) -> Self {
        Transform::Multi(Arc::new(f))
    }

    /// Builds a [`Transform::SingleKey`].
    pub fn single_key(f: impl Fn(&K) -> ReconcileKey + Send + Sync + 'static) -> Self {
        Transform::SingleKey(Arc::new(f))
    }

    /// Builds a [`Transform::MultiKey`].
    pub fn multi_key(f: impl Fn(&K) -> Vec<ReconcileKey> + Send + Sync + 'static) -> Self {
        Transform::MultiKey(Arc::new(f))
    }

    /// Short stable name of the variant, for logs and watch diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Transform::Identity => "identity",
            Transform::Single(_) => "single",
            Transform::Multi(_) => "multi",
            Transform::SingleKey(_) => "single_key",
            Transform::MultiKey(_) => "multi_key",
        }
    }
}

impl<K: Object> Transform<K> {
    /// Keys to reconcile for `obj`: sentinels dropped, duplicates collapsed,
    /// panics contained.
    ///
    /// ```
    /// use keyvisor::{Object, ObjectKind, ReconcileKey, Transform};
    ///
    /// struct Pod { ns: String, name: String }
    /// impl Object for Pod {
    ///     const KIND: ObjectKind = ObjectKind::new("", "v1", "Pod");
    ///     fn namespace(&self) -> &str { &self.ns }
    ///     fn name(&self) -> &str { &self.name }
    /// }
    ///
    /// let owner = Transform::single(|p: &Pod| {
    ///     format!("{}/{}", p.ns, p.name.split('-').next().unwrap_or_default())
    /// });
    /// let pod = Pod { ns: "default".into(), name: "rs1-abc".into() };
    /// assert_eq!(owner.keys(&pod), vec![ReconcileKey::new("default", "rs1")]);
    /// ```
    pub fn keys(&self, obj: &K) -> Vec<ReconcileKey> {
        let raw = catch_unwind(AssertUnwindSafe(|| self.raw_keys(obj)));
        match raw {
            Ok(keys) => dedup(keys),
            Err(panic) => {
                warn!(
                    kind = %K::KIND,
                    object = %obj.key(),
                    transform = self.label(),
                    panic = %crate::panic_message(panic.as_ref()),
                    "transform panicked; no keys enqueued"
                );
                Vec::new()
            }
        }
    }

    fn raw_keys(&self, obj: &K) -> Vec<ReconcileKey> {
        match self {
            Transform::Identity => vec![obj.key()],
            Transform::Single(f) => ReconcileKey::parse(&f(obj)).into_iter().collect(),
            Transform::Multi(f) => f(obj)
                .iter()
                .filter_map(|s| ReconcileKey::parse(s))
                .collect(),
            Transform::SingleKey(f) => vec![f(obj)],
            Transform::MultiKey(f) => f(obj),
        }
    }
}

fn dedup(keys: Vec<ReconcileKey>) -> Vec<ReconcileKey> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.into_iter()
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ObjectKind;

    struct Pod {
        namespace: String,
        name: String,
    }

    impl Object for Pod {
        const KIND: ObjectKind = ObjectKind::new("", "v1", "Pod");
        fn namespace(&self) -> &str {
            &self.namespace
        }
        fn name(&self) -> &str {
            &self.name
        }
    }

    fn pod(name: &str) -> Pod {
        Pod {
            namespace: "default".into(),
            name: name.into(),
        }
    }

    fn owner(p: &Pod) -> String {
        let base = p.name.split('-').next().unwrap_or_default();
        format!("{}/{}", p.namespace, base)
    }

    #[test]
    fn identity_uses_object_key() {
        let t = Transform::<Pod>::Identity;
        assert_eq!(t.keys(&pod("rs1-abc")), vec![ReconcileKey::new("default", "rs1-abc")]);
    }

    #[test]
    fn single_maps_to_parent() {
        let t = Transform::single(owner);
        assert_eq!(t.keys(&pod("rs1-abc")), vec![ReconcileKey::new("default", "rs1")]);
    }

    #[test]
    fn single_sentinel_and_garbage_yield_nothing() {
        assert!(Transform::single(|_: &Pod| String::new()).keys(&pod("x")).is_empty());
        assert!(Transform::single(|_: &Pod| "a/b/c".into()).keys(&pod("x")).is_empty());
        assert!(
            Transform::single_key(|_: &Pod| ReconcileKey::default())
                .keys(&pod("x"))
                .is_empty()
        );
    }

    #[test]
    fn multi_collapses_duplicates_in_order() {
        let t = Transform::multi(|p: &Pod| {
            vec![
                format!("{}/a", p.namespace),
                format!("{}/a", p.namespace),
                format!("{}/b", p.namespace),
                String::new(),
            ]
        });
        assert_eq!(
            t.keys(&pod("x")),
            vec![ReconcileKey::new("default", "a"), ReconcileKey::new("default", "b")]
        );
    }

    #[test]
    fn multi_key_collapses_duplicates() {
        let t = Transform::multi_key(|p: &Pod| {
            let parent = p.name.split('-').next().unwrap_or_default().to_string();
            vec![
                ReconcileKey::new(p.namespace.clone(), format!("{parent}-parent-1")),
                ReconcileKey::new(p.namespace.clone(), format!("{parent}-parent-2")),
                ReconcileKey::new(p.namespace.clone(), format!("{parent}-parent-1")),
            ]
        });
        let keys = t.keys(&pod("rs1-abc"));
        assert_eq!(
            keys,
            vec![
                ReconcileKey::new("default", "rs1-parent-1"),
                ReconcileKey::new("default", "rs1-parent-2"),
            ]
        );
    }

    #[test]
    fn panicking_transform_yields_nothing() {
        let t = Transform::single(|p: &Pod| -> String {
            if p.name.is_empty() {
                panic!("unexpected shape");
            }
            p.name.clone()
        });
        assert!(t.keys(&pod("")).is_empty());
        assert_eq!(t.keys(&pod("ok")), vec![ReconcileKey::cluster("ok")]);
    }

    #[test]
    fn labels() {
        assert_eq!(Transform::<Pod>::Identity.label(), "identity");
        assert_eq!(Transform::multi_key(|_: &Pod| vec![]).label(), "multi_key");
    }
}
