//! Attribute payloads, one struct per resource kind.
//!
//! [`AttributeSet`] carries the kind tag and a handful of default-empty
//! hooks (container indexing, operational limits groups, extensions, variant
//! clone bookkeeping) that the cache and buffer layers rely on without
//! knowing concrete types.

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::extensions::RawExtensionAttributes;
use super::{ResourceType, SELF_FULL_VARIANT_NUM};

/// Side of a branch-like equipment (line, transformer).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LimitsSide {
    One,
    Two,
}

/// Trait for attribute payloads stored behind a resource kind.
pub trait AttributeSet:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    /// The resource kind this attribute set belongs to.
    const KIND: ResourceType;

    /// Container ids (e.g. owning voltage levels) this resource is indexed
    /// under for scoped loading. Empty for uncontained kinds.
    fn container_ids(&self) -> Vec<String> {
        Vec::new()
    }

    /// Ids of the operational limits groups present on the given side.
    fn limits_group_ids(&self, _side: LimitsSide) -> Vec<String> {
        Vec::new()
    }

    /// Drop the operational limits group with the given id from a side.
    fn remove_limits_group(&mut self, _side: LimitsSide, _group_id: &str) {}

    /// Names of the extension payloads attached to this resource.
    fn extension_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Drop the extension payload with the given name.
    fn remove_extension(&mut self, _name: &str) {}

    /// Variant-clone bookkeeping hook, applied to the cloned copy.
    fn on_variant_clone(&mut self, _target_variant_id: &str, _full_variant_num: i32) {}
}

/// A temporary (time-limited) loading limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryLimitAttributes {
    pub name: String,
    pub value: f64,
    pub acceptable_duration: i32,
}

/// Current limits: one permanent threshold plus temporary overrides keyed
/// by acceptable duration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitsAttributes {
    pub permanent_limit: f64,
    #[serde(default)]
    pub temporary_limits: BTreeMap<i32, TemporaryLimitAttributes>,
}

/// A named bundle of limit thresholds attached to one side of a branch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationalLimitsGroupAttributes {
    pub id: String,
    #[serde(default)]
    pub current_limits: Option<LimitsAttributes>,
}

/// One step of a transformer tap changer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapChangerStepAttributes {
    pub rho: f64,
    pub r: f64,
    pub x: f64,
}

/// Root attributes of a network variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAttributes {
    pub uuid: Uuid,
    pub variant_id: String,
    /// Nearest ancestor variant holding a full copy of the model, or
    /// [`SELF_FULL_VARIANT_NUM`] when this variant is itself full.
    pub full_variant_num: i32,
    pub case_date: String,
    pub forecast_distance: i32,
}

impl Default for NetworkAttributes {
    fn default() -> Self {
        NetworkAttributes {
            uuid: Uuid::nil(),
            variant_id: String::new(),
            full_variant_num: SELF_FULL_VARIANT_NUM,
            case_date: String::new(),
            forecast_distance: 0,
        }
    }
}

impl AttributeSet for NetworkAttributes {
    const KIND: ResourceType = ResourceType::Network;

    fn on_variant_clone(&mut self, target_variant_id: &str, full_variant_num: i32) {
        self.variant_id = target_variant_id.to_string();
        self.full_variant_num = full_variant_num;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubstationAttributes {
    pub name: String,
    pub country: String,
    pub tso: String,
}

impl AttributeSet for SubstationAttributes {
    const KIND: ResourceType = ResourceType::Substation;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoltageLevelAttributes {
    pub name: String,
    pub substation_id: String,
    pub nominal_v: f64,
}

impl AttributeSet for VoltageLevelAttributes {
    const KIND: ResourceType = ResourceType::VoltageLevel;

    fn container_ids(&self) -> Vec<String> {
        vec![self.substation_id.clone()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchAttributes {
    pub name: String,
    pub voltage_level_id: String,
    pub kind: String,
    pub open: bool,
    pub retained: bool,
}

impl AttributeSet for SwitchAttributes {
    const KIND: ResourceType = ResourceType::Switch;

    fn container_ids(&self) -> Vec<String> {
        vec![self.voltage_level_id.clone()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusbarSectionAttributes {
    pub name: String,
    pub voltage_level_id: String,
}

impl AttributeSet for BusbarSectionAttributes {
    const KIND: ResourceType = ResourceType::BusbarSection;

    fn container_ids(&self) -> Vec<String> {
        vec![self.voltage_level_id.clone()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadAttributes {
    pub name: String,
    pub voltage_level_id: String,
    pub p0: f64,
    pub q0: f64,
}

impl AttributeSet for LoadAttributes {
    const KIND: ResourceType = ResourceType::Load;

    fn container_ids(&self) -> Vec<String> {
        vec![self.voltage_level_id.clone()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorAttributes {
    pub name: String,
    pub voltage_level_id: String,
    pub target_p: f64,
    pub target_q: f64,
    pub voltage_regulator_on: bool,
    #[serde(default)]
    pub extensions: BTreeMap<String, RawExtensionAttributes>,
}

impl AttributeSet for GeneratorAttributes {
    const KIND: ResourceType = ResourceType::Generator;

    fn container_ids(&self) -> Vec<String> {
        vec![self.voltage_level_id.clone()]
    }

    fn extension_names(&self) -> Vec<String> {
        self.extensions.keys().cloned().collect()
    }

    fn remove_extension(&mut self, name: &str) {
        self.extensions.remove(name);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineAttributes {
    pub name: String,
    pub voltage_level_id1: String,
    pub voltage_level_id2: String,
    pub r: f64,
    pub x: f64,
    #[serde(default)]
    pub operational_limits_groups1: BTreeMap<String, OperationalLimitsGroupAttributes>,
    #[serde(default)]
    pub operational_limits_groups2: BTreeMap<String, OperationalLimitsGroupAttributes>,
    #[serde(default)]
    pub extensions: BTreeMap<String, RawExtensionAttributes>,
}

impl AttributeSet for LineAttributes {
    const KIND: ResourceType = ResourceType::Line;

    fn container_ids(&self) -> Vec<String> {
        vec![
            self.voltage_level_id1.clone(),
            self.voltage_level_id2.clone(),
        ]
    }

    fn limits_group_ids(&self, side: LimitsSide) -> Vec<String> {
        let groups = match side {
            LimitsSide::One => &self.operational_limits_groups1,
            LimitsSide::Two => &self.operational_limits_groups2,
        };
        groups.keys().cloned().collect()
    }

    fn remove_limits_group(&mut self, side: LimitsSide, group_id: &str) {
        let groups = match side {
            LimitsSide::One => &mut self.operational_limits_groups1,
            LimitsSide::Two => &mut self.operational_limits_groups2,
        };
        groups.remove(group_id);
    }

    fn extension_names(&self) -> Vec<String> {
        self.extensions.keys().cloned().collect()
    }

    fn remove_extension(&mut self, name: &str) {
        self.extensions.remove(name);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwoWindingsTransformerAttributes {
    pub name: String,
    pub voltage_level_id1: String,
    pub voltage_level_id2: String,
    pub r: f64,
    pub x: f64,
    pub rated_u1: f64,
    pub rated_u2: f64,
    #[serde(default)]
    pub tap_changer_steps: Vec<TapChangerStepAttributes>,
    #[serde(default)]
    pub operational_limits_groups1: BTreeMap<String, OperationalLimitsGroupAttributes>,
    #[serde(default)]
    pub operational_limits_groups2: BTreeMap<String, OperationalLimitsGroupAttributes>,
    #[serde(default)]
    pub extensions: BTreeMap<String, RawExtensionAttributes>,
}

impl AttributeSet for TwoWindingsTransformerAttributes {
    const KIND: ResourceType = ResourceType::TwoWindingsTransformer;

    fn container_ids(&self) -> Vec<String> {
        vec![
            self.voltage_level_id1.clone(),
            self.voltage_level_id2.clone(),
        ]
    }

    fn limits_group_ids(&self, side: LimitsSide) -> Vec<String> {
        let groups = match side {
            LimitsSide::One => &self.operational_limits_groups1,
            LimitsSide::Two => &self.operational_limits_groups2,
        };
        groups.keys().cloned().collect()
    }

    fn remove_limits_group(&mut self, side: LimitsSide, group_id: &str) {
        let groups = match side {
            LimitsSide::One => &mut self.operational_limits_groups1,
            LimitsSide::Two => &mut self.operational_limits_groups2,
        };
        groups.remove(group_id);
    }

    fn extension_names(&self) -> Vec<String> {
        self.extensions.keys().cloned().collect()
    }

    fn remove_extension(&mut self, name: &str) {
        self.extensions.remove(name);
    }
}

/// Dispatch a generic method call on a runtime [`ResourceType`] tag.
///
/// Expands to a match selecting the concrete attribute type for each kind,
/// so per-kind collections can be driven from a kind value.
macro_rules! dispatch_kind {
    ($kind:expr, $self:ident . $method:ident ( $($arg:expr),* $(,)? )) => {
        match $kind {
            $crate::resource::ResourceType::Network => {
                $self.$method::<$crate::resource::attributes::NetworkAttributes>($($arg),*)
            }
            $crate::resource::ResourceType::Substation => {
                $self.$method::<$crate::resource::attributes::SubstationAttributes>($($arg),*)
            }
            $crate::resource::ResourceType::VoltageLevel => {
                $self.$method::<$crate::resource::attributes::VoltageLevelAttributes>($($arg),*)
            }
            $crate::resource::ResourceType::Switch => {
                $self.$method::<$crate::resource::attributes::SwitchAttributes>($($arg),*)
            }
            $crate::resource::ResourceType::BusbarSection => {
                $self.$method::<$crate::resource::attributes::BusbarSectionAttributes>($($arg),*)
            }
            $crate::resource::ResourceType::Load => {
                $self.$method::<$crate::resource::attributes::LoadAttributes>($($arg),*)
            }
            $crate::resource::ResourceType::Generator => {
                $self.$method::<$crate::resource::attributes::GeneratorAttributes>($($arg),*)
            }
            $crate::resource::ResourceType::Line => {
                $self.$method::<$crate::resource::attributes::LineAttributes>($($arg),*)
            }
            $crate::resource::ResourceType::TwoWindingsTransformer => {
                $self.$method::<$crate::resource::attributes::TwoWindingsTransformerAttributes>($($arg),*)
            }
        }
    };
}

pub(crate) use dispatch_kind;
