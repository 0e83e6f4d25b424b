//! Constructed node instances and the parameters they were built from

use crate::node::{InitParam, Node};
use crate::registry::NodeDescriptor;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use wikiqa_core::{
    integrity_error, missing_argument_error, validation_error, ErrorContext, WikiqaError,
    WikiqaResult,
};

/// A construction argument: plain data or another, already built component
#[derive(Clone)]
pub enum ParamValue {
    Value(Value),
    Component(Arc<Component>),
}

impl ParamValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ParamValue::Value(value) => Some(value),
            ParamValue::Component(_) => None,
        }
    }

    pub fn as_component(&self) -> Option<&Arc<Component>> {
        match self {
            ParamValue::Component(component) => Some(component),
            ParamValue::Value(_) => None,
        }
    }

    /// Form used in exported configs: nested components by name
    pub fn to_export_value(&self) -> Value {
        match self {
            ParamValue::Value(value) => value.clone(),
            ParamValue::Component(component) => Value::String(component.label().to_string()),
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Value(a), ParamValue::Value(b)) => a == b,
            (ParamValue::Component(a), ParamValue::Component(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Value(value) => write!(f, "{}", value),
            ParamValue::Component(component) => write!(f, "<component {}>", component.label()),
        }
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        ParamValue::Value(value)
    }
}

impl From<Arc<Component>> for ParamValue {
    fn from(component: Arc<Component>) -> Self {
        ParamValue::Component(component)
    }
}

/// Construction arguments keyed by parameter name
pub type ComponentParams = BTreeMap<String, ParamValue>;

/// Wrap plain JSON construction arguments
pub fn params_from_json(map: Map<String, Value>) -> ComponentParams {
    map.into_iter()
        .map(|(key, value)| (key, ParamValue::Value(value)))
        .collect()
}

/// Read access to construction arguments, falling back to declared defaults
pub struct InitArgs<'a> {
    type_name: &'a str,
    params: &'a ComponentParams,
    declared: &'a [InitParam],
}

impl<'a> InitArgs<'a> {
    pub fn new(type_name: &'a str, params: &'a ComponentParams, declared: &'a [InitParam]) -> Self {
        Self {
            type_name,
            params,
            declared,
        }
    }

    pub fn type_name(&self) -> &str {
        self.type_name
    }

    pub fn params(&self) -> &ComponentParams {
        self.params
    }

    fn default_of(&self, name: &str) -> Option<&Value> {
        self.declared
            .iter()
            .find(|param| param.name == name)
            .and_then(|param| param.default.as_ref())
    }

    fn decode<T: DeserializeOwned>(&self, name: &str, value: &Value) -> WikiqaResult<T> {
        serde_json::from_value(value.clone()).map_err(|e| {
            validation_error!(
                format!(
                    "parameter '{}' of '{}' has the wrong shape: {}",
                    name, self.type_name, e
                ),
                name,
                "init_args"
            )
        })
    }

    /// Typed value of a plain parameter, or its declared default
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> WikiqaResult<T> {
        match self.params.get(name) {
            Some(ParamValue::Value(value)) => self.decode(name, value),
            Some(ParamValue::Component(_)) => Err(validation_error!(
                format!(
                    "parameter '{}' of '{}' expects a value, got a component",
                    name, self.type_name
                ),
                name,
                "init_args"
            )),
            None => match self.default_of(name) {
                Some(default) => self.decode(name, default),
                None => Err(missing_argument_error!(name, self.type_name, "init_args")),
            },
        }
    }

    /// Like [`InitArgs::get`], treating `null` as absent
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> WikiqaResult<Option<T>> {
        match self.params.get(name) {
            Some(ParamValue::Value(Value::Null)) => Ok(None),
            Some(_) => self.get(name).map(Some),
            None => match self.default_of(name) {
                None | Some(Value::Null) => Ok(None),
                Some(default) => self.decode(name, default).map(Some),
            },
        }
    }

    /// A parameter that holds another component
    pub fn component(&self, name: &str) -> WikiqaResult<Option<Arc<Component>>> {
        match self.params.get(name) {
            Some(ParamValue::Component(component)) => Ok(Some(Arc::clone(component))),
            None | Some(ParamValue::Value(Value::Null)) => Ok(None),
            Some(ParamValue::Value(Value::String(reference))) => Err(integrity_error!(
                format!(
                    "parameter '{}' of '{}' references unknown component '{}'",
                    name, self.type_name, reference
                ),
                "init_args"
            )),
            Some(ParamValue::Value(other)) => Err(validation_error!(
                format!(
                    "parameter '{}' of '{}' expects a component, got {}",
                    name, self.type_name, other
                ),
                name,
                "init_args"
            )),
        }
    }
}

/// Construction record captured for every instance
#[derive(Debug, Clone)]
pub struct ComponentConfig {
    pub component_type: String,
    pub params: ComponentParams,
}

/// A constructed node with its captured construction record
pub struct Component {
    node: Box<dyn Node>,
    descriptor: Arc<NodeDescriptor>,
    config: ComponentConfig,
    name: OnceLock<String>,
    debug: AtomicBool,
}

impl Component {
    pub(crate) fn new(
        node: Box<dyn Node>,
        descriptor: Arc<NodeDescriptor>,
        params: ComponentParams,
    ) -> Self {
        let config = ComponentConfig {
            component_type: descriptor.type_name.to_string(),
            params,
        };
        Self {
            node,
            descriptor,
            config,
            name: OnceLock::new(),
            debug: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Assign the instance name. Setting the name it already has is a no-op,
    /// renaming fails.
    pub fn set_name(&self, name: impl Into<String>) -> WikiqaResult<()> {
        let name = name.into();
        match self.name.get() {
            Some(existing) if *existing == name => Ok(()),
            Some(existing) => Err(WikiqaError::Validation {
                message: format!(
                    "component '{}' is already named and cannot be renamed to '{}'",
                    existing, name
                ),
                field: Some("name".to_string()),
                context: ErrorContext::new("component").with_operation("set_name"),
            }),
            None => {
                // A concurrent setter may win the race; re-check its value.
                let stored = self.name.get_or_init(|| name.clone());
                if *stored == name {
                    Ok(())
                } else {
                    self.set_name(name)
                }
            }
        }
    }

    /// Name if set, otherwise the type name
    pub fn label(&self) -> &str {
        self.name().unwrap_or(self.descriptor.type_name)
    }

    pub fn component_type(&self) -> &str {
        &self.config.component_type
    }

    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    pub fn node(&self) -> &dyn Node {
        self.node.as_ref()
    }

    pub fn outgoing_edges(&self) -> usize {
        self.descriptor.outgoing_edges
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    /// Captured construction arguments. Without `return_defaults`, values
    /// equal to their declared default are left out; with it, declared
    /// defaults that were never passed are filled in.
    pub fn get_params(&self, return_defaults: bool) -> ComponentParams {
        let mut params = ComponentParams::new();
        for (key, value) in &self.config.params {
            let default = self
                .descriptor
                .init_param(key)
                .and_then(|param| param.default.as_ref());
            let is_default = matches!((value, default), (ParamValue::Value(v), Some(d)) if v == d);
            if return_defaults || !is_default {
                params.insert(key.clone(), value.clone());
            }
        }

        if return_defaults {
            for param in &self.descriptor.init_params {
                if let Some(default) = &param.default {
                    params
                        .entry(param.name.to_string())
                        .or_insert_with(|| ParamValue::Value(default.clone()));
                }
            }
        }
        params
    }

    /// Components passed directly as construction arguments
    pub fn utilized_components(&self) -> Vec<Arc<Component>> {
        self.config
            .params
            .values()
            .filter_map(|value| value.as_component().cloned())
            .collect()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name())
            .field("type", &self.config.component_type)
            .field("params", &self.config.params)
            .field("debug", &self.debug())
            .finish()
    }
}
