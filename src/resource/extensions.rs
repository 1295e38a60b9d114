//! Extension attributes and their decoding registry.
//!
//! Extension payloads travel as opaque JSON values attached to a parent
//! resource. Typed access goes through an [`ExtensionRegistry`] built
//! explicitly at startup and passed by reference; there is no process-wide
//! discovery.

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::StoreError;

/// An undecoded extension payload as stored on a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExtensionAttributes(pub serde_json::Value);

impl RawExtensionAttributes {
    pub fn of<E: ExtensionAttributes>(extension: &E) -> Result<Self, StoreError> {
        let value =
            serde_json::to_value(extension).map_err(|e| StoreError::Serde(e.to_string()))?;
        Ok(RawExtensionAttributes(value))
    }
}

/// A typed extension payload with a stable registered name.
pub trait ExtensionAttributes:
    Serialize + DeserializeOwned + Send + Sync + 'static
{
    const NAME: &'static str;
}

type Validator = Box<dyn Fn(&RawExtensionAttributes) -> Result<(), StoreError> + Send + Sync>;

/// Registry of known extension payload types.
#[derive(Default)]
pub struct ExtensionRegistry {
    validators: HashMap<&'static str, Validator>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension type under its stable name.
    pub fn register<E: ExtensionAttributes>(&mut self) {
        self.validators.insert(
            E::NAME,
            Box::new(|raw| {
                serde_json::from_value::<E>(raw.0.clone())
                    .map(|_| ())
                    .map_err(|e| StoreError::Serde(e.to_string()))
            }),
        );
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Check that a raw payload parses as the registered type of that name.
    pub fn validate(&self, name: &str, raw: &RawExtensionAttributes) -> Result<(), StoreError> {
        let validator = self
            .validators
            .get(name)
            .ok_or_else(|| StoreError::UnknownExtension(name.to_string()))?;
        validator(raw)
    }

    /// Decode a raw payload into its registered typed form.
    pub fn decode<E: ExtensionAttributes>(
        &self,
        raw: &RawExtensionAttributes,
    ) -> Result<E, StoreError> {
        if !self.is_registered(E::NAME) {
            return Err(StoreError::UnknownExtension(E::NAME.to_string()));
        }
        serde_json::from_value(raw.0.clone()).map_err(|e| StoreError::Serde(e.to_string()))
    }
}
