//! Resource model - the unit of identity in the grid network model.
//!
//! A [`Resource`] is (kind, id, variant number) plus a typed attributes
//! payload. Variants are versioned branches of the network model; variant 0
//! is the immutable initial variant. [`VariantLineage`] tracks, per variant,
//! the nearest ancestor holding a complete (non-delta) copy of the model.

pub mod attributes;
pub mod extensions;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use attributes::AttributeSet;

/// The protected initial variant. It always holds a full copy of the model
/// and can never be the target of a clone.
pub const INITIAL_VARIANT_NUM: i32 = 0;

/// Sentinel `full_variant_num` meaning "this variant is itself full".
pub const SELF_FULL_VARIANT_NUM: i32 = -1;

/// Closed set of resource kinds handled by the client stack.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ResourceType {
    Network,
    Substation,
    VoltageLevel,
    Switch,
    BusbarSection,
    Load,
    Generator,
    Line,
    TwoWindingsTransformer,
}

impl ResourceType {
    /// All kinds, in a stable order.
    pub fn all() -> &'static [ResourceType] {
        &[
            ResourceType::Network,
            ResourceType::Substation,
            ResourceType::VoltageLevel,
            ResourceType::Switch,
            ResourceType::BusbarSection,
            ResourceType::Load,
            ResourceType::Generator,
            ResourceType::Line,
            ResourceType::TwoWindingsTransformer,
        ]
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Network => "network",
            ResourceType::Substation => "substation",
            ResourceType::VoltageLevel => "voltage level",
            ResourceType::Switch => "switch",
            ResourceType::BusbarSection => "busbar section",
            ResourceType::Load => "load",
            ResourceType::Generator => "generator",
            ResourceType::Line => "line",
            ResourceType::TwoWindingsTransformer => "two windings transformer",
        };
        write!(f, "{}", name)
    }
}

/// Lookup key routing batched sub-attribute operations (temporary limits,
/// tap-changer steps, extension payloads) to their parent resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerInfo {
    pub equipment_id: String,
    pub kind: ResourceType,
    pub network_uuid: Uuid,
    pub variant_num: i32,
}

impl OwnerInfo {
    pub fn new(
        equipment_id: impl Into<String>,
        kind: ResourceType,
        network_uuid: Uuid,
        variant_num: i32,
    ) -> Self {
        OwnerInfo {
            equipment_id: equipment_id.into(),
            kind,
            network_uuid,
            variant_num,
        }
    }
}

/// Back-channel notified when a resource's attributes are mutated through
/// [`Resource::update_attributes`].
///
/// Nothing inside this crate attaches a listener: the hook is the seam for
/// a domain layer above to route change notifications into its own
/// bookkeeping. The resource owns its attributes; the listener is a
/// non-owning dispatch handle.
pub trait UpdateListener: Send + Sync {
    fn notify_updated(&self, kind: ResourceType, id: &str, variant_num: i32);
}

/// A grid-model resource: kind tag, id, variant number and attributes.
#[derive(Clone, Serialize, Deserialize)]
pub struct Resource<T> {
    kind: ResourceType,
    id: String,
    variant_num: i32,
    attributes: T,
    #[serde(skip)]
    listener: Option<Arc<dyn UpdateListener>>,
}

impl<T: AttributeSet> Resource<T> {
    /// Start building a resource of this attribute set's kind.
    pub fn builder() -> ResourceBuilder<T> {
        ResourceBuilder {
            id: None,
            variant_num: INITIAL_VARIANT_NUM,
            attributes: None,
        }
    }
}

impl<T> Resource<T> {
    pub fn kind(&self) -> ResourceType {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn variant_num(&self) -> i32 {
        self.variant_num
    }

    pub fn attributes(&self) -> &T {
        &self.attributes
    }

    /// Direct mutable access. Does not notify the update listener; prefer
    /// [`Resource::update_attributes`] when a listener is attached.
    pub fn attributes_mut(&mut self) -> &mut T {
        &mut self.attributes
    }

    /// Apply a mutation and notify the attached listener, if any.
    pub fn update_attributes(&mut self, f: impl FnOnce(&mut T)) {
        f(&mut self.attributes);
        if let Some(listener) = &self.listener {
            listener.notify_updated(self.kind, &self.id, self.variant_num);
        }
    }

    /// Attach an update listener. Any previous listener is replaced.
    pub fn set_listener(&mut self, listener: Arc<dyn UpdateListener>) {
        self.listener = Some(listener);
    }

    pub(crate) fn set_variant_num(&mut self, variant_num: i32) {
        self.variant_num = variant_num;
    }
}

impl<T: fmt::Debug> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("variant_num", &self.variant_num)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Builder for [`Resource`]. Fails fast when a required field is missing,
/// before the resource can ever reach the cache or buffer layers.
pub struct ResourceBuilder<T> {
    id: Option<String>,
    variant_num: i32,
    attributes: Option<T>,
}

impl<T: AttributeSet> ResourceBuilder<T> {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn variant_num(mut self, variant_num: i32) -> Self {
        self.variant_num = variant_num;
        self
    }

    pub fn attributes(mut self, attributes: T) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn build(self) -> Result<Resource<T>, StoreError> {
        let id = self.id.ok_or(StoreError::MissingAttribute {
            kind: T::KIND,
            attribute: "id",
        })?;
        let attributes = self.attributes.ok_or(StoreError::MissingAttribute {
            kind: T::KIND,
            attribute: "attributes",
        })?;
        Ok(Resource {
            kind: T::KIND,
            id,
            variant_num: self.variant_num,
            attributes,
            listener: None,
        })
    }
}

/// Per-network bookkeeping of each variant's nearest "full" ancestor.
///
/// Partial clones only copy delta state; a resource read through an
/// unmodified partial clone is owned by the ancestor variant that holds the
/// complete copy. A variant with no recorded ancestor is itself full
/// (variant 0 always is).
#[derive(Debug, Default)]
pub struct VariantLineage {
    full: HashMap<(Uuid, i32), i32>,
}

impl VariantLineage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a clone: the target's full ancestor is the source's resolved
    /// full ancestor, or the source itself when the source is full.
    pub fn record_clone(&mut self, network: Uuid, source: i32, target: i32) {
        let full = self.resolve(network, source);
        self.full.insert((network, target), full);
    }

    /// The nearest full ancestor of the given variant.
    pub fn resolve(&self, network: Uuid, variant: i32) -> i32 {
        self.full.get(&(network, variant)).copied().unwrap_or(variant)
    }
}
