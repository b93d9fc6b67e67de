//! Key extraction.
//!
//! Keys have the form `namespace/name`, or just `name` for cluster-scoped
//! objects. A key is stable across adds and updates and survives deletion
//! through the tombstone carried by [`DeletedObject`].

use crate::DeletedObject;
use crate::KeyError;
use crate::Object;

/// Derives the `namespace/name` key of a live object.
pub fn meta_namespace_key<T: Object>(obj: &T) -> Result<String, KeyError> {
    let meta = obj.meta();
    if meta.name.is_empty() {
        return Err(KeyError::MissingName);
    }

    if meta.namespace.is_empty() {
        Ok(meta.name.clone())
    } else {
        Ok(format!("{}/{}", meta.namespace, meta.name))
    }
}

/// Derives the key of a delete notification.
///
/// Tombstones already know their key (the final state was missed, so the
/// last-known object may be stale); final-state deletes are keyed like a
/// live object.
pub fn deletion_handling_key<T: Object>(deleted: &DeletedObject<T>) -> Result<String, KeyError> {
    match deleted {
        DeletedObject::Final(obj) => meta_namespace_key(obj),
        DeletedObject::Tombstone { key, .. } => {
            if key.is_empty() {
                return Err(KeyError::InvalidKey(key.clone()));
            }
            Ok(key.clone())
        }
    }
}

/// Splits a key back into its optional namespace and name.
pub fn split_meta_namespace_key(key: &str) -> Result<(Option<&str>, &str), KeyError> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok((None, *name)),
        [namespace, name] if !namespace.is_empty() && !name.is_empty() => {
            Ok((Some(*namespace), *name))
        }
        _ => Err(KeyError::InvalidKey(key.to_string())),
    }
}
