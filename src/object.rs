//! Watched object model.
//!
//! The core never looks inside an object's payload except to compare two
//! versions of it when deciding whether an update is worth reconciling.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::Deserialize;
use serde::Serialize;

/// Identity and versioning metadata shared by every watched object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Empty for cluster-scoped objects
    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub name: String,

    /// Opaque version stamp owned by the event source
    #[serde(default)]
    pub resource_version: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_resource_version(
        mut self,
        resource_version: impl Into<String>,
    ) -> Self {
        self.resource_version = resource_version.into();
        self
    }
}

/// An object the controller can cache and key.
pub trait Object: Debug + Clone + Send + Sync + 'static {
    /// The part of the object whose changes must trigger a reconcile.
    type Payload: PartialEq + Debug;

    fn meta(&self) -> &ObjectMeta;

    fn payload(&self) -> &Self::Payload;

    fn resource_version(&self) -> &str {
        &self.meta().resource_version
    }
}

/// Namespaced string-to-string configuration record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMap {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_resource_version(
        mut self,
        resource_version: impl Into<String>,
    ) -> Self {
        self.metadata.resource_version = resource_version.into();
        self
    }

    pub fn with_label(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }
}

impl Object for ConfigMap {
    type Payload = BTreeMap<String, String>;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn payload(&self) -> &Self::Payload {
        &self.data
    }
}
