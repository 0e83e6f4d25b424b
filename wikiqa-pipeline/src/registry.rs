//! Node type registry
//!
//! Node types are registered explicitly, either one by one with
//! [`NodeRegistry::register`] or in bulk by a crate's `register_nodes`
//! function. Lookup is by type name. Construction goes through the registry so
//! every instance carries the record of the arguments it was built from.

use crate::component::{Component, ComponentParams, InitArgs, ParamValue};
use crate::config::PipelineConfig;
use crate::node::{InitParam, Node, NodeType, RunMode};
use crate::state::DEBUG_TRACE;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use wikiqa_core::{
    integrity_error, invalid_parameter_error, schema_error, WikiqaResult,
};

/// Builds a boxed node from resolved construction arguments
pub type NodeFactory = fn(&InitArgs<'_>) -> WikiqaResult<Box<dyn Node>>;

/// Everything the registry knows about one node type
#[derive(Clone)]
pub struct NodeDescriptor {
    pub type_name: &'static str,
    pub init_params: Vec<InitParam>,
    pub run_params: &'static [&'static str],
    pub run_batch_params: &'static [&'static str],
    pub outgoing_edges: usize,
    factory: NodeFactory,
}

fn build_boxed<N: NodeType>(args: &InitArgs<'_>) -> WikiqaResult<Box<dyn Node>> {
    Ok(Box::new(N::from_args(args)?))
}

impl NodeDescriptor {
    pub fn of<N: NodeType>() -> Self {
        Self {
            type_name: N::TYPE_NAME,
            init_params: N::init_params(),
            run_params: N::RUN_PARAMS,
            run_batch_params: N::RUN_BATCH_PARAMS,
            outgoing_edges: N::OUTGOING_EDGES,
            factory: build_boxed::<N>,
        }
    }

    /// Parameters the entry point for `mode` accepts
    pub fn signature(&self, mode: RunMode) -> &'static [&'static str] {
        match mode {
            RunMode::Single => self.run_params,
            RunMode::Batch => self.run_batch_params,
        }
    }

    pub fn accepts(&self, mode: RunMode, name: &str) -> bool {
        self.signature(mode).contains(&name)
    }

    pub fn init_param(&self, name: &str) -> Option<&InitParam> {
        self.init_params.iter().find(|param| param.name == name)
    }

    /// Replace the defaults of declared construction parameters.
    ///
    /// Used to seed node types from a loaded configuration file. Naming a
    /// parameter the type does not declare is an error.
    pub fn with_defaults(mut self, defaults: &Map<String, Value>) -> WikiqaResult<Self> {
        let type_name = self.type_name;
        for (name, value) in defaults {
            let param = self
                .init_params
                .iter_mut()
                .find(|param| param.name == name)
                .ok_or_else(|| invalid_parameter_error!(name, type_name, "registry"))?;
            param.default = Some(value.clone());
        }
        Ok(self)
    }

    fn validate(&self) -> WikiqaResult<()> {
        if self.type_name.is_empty() {
            return Err(schema_error!("node type name must not be empty", "registry"));
        }
        if self.outgoing_edges == 0 {
            return Err(schema_error!(
                format!("node type '{}' declares no outgoing edges", self.type_name),
                "registry"
            ));
        }

        for (mode, names) in [
            ("run", self.run_params),
            ("run_batch", self.run_batch_params),
        ] {
            let mut seen = HashSet::new();
            for name in names {
                if name.is_empty() || *name == DEBUG_TRACE || !seen.insert(*name) {
                    return Err(schema_error!(
                        format!(
                            "node type '{}' declares an unusable {} parameter '{}'",
                            self.type_name, mode, name
                        ),
                        "registry"
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        for param in &self.init_params {
            if param.name.is_empty() || !seen.insert(param.name) {
                return Err(schema_error!(
                    format!(
                        "node type '{}' declares an unusable construction parameter '{}'",
                        self.type_name, param.name
                    ),
                    "registry"
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("type_name", &self.type_name)
            .field("init_params", &self.init_params)
            .field("run_params", &self.run_params)
            .field("run_batch_params", &self.run_batch_params)
            .field("outgoing_edges", &self.outgoing_edges)
            .finish()
    }
}

/// Type name to descriptor lookup
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    descriptors: HashMap<String, Arc<NodeDescriptor>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type. Registering a name twice replaces the earlier
    /// entry.
    pub fn register<N: NodeType>(&mut self) -> WikiqaResult<()> {
        self.register_descriptor(NodeDescriptor::of::<N>())
    }

    /// Register a node type whose construction defaults are overridden
    pub fn register_with_defaults<N: NodeType>(
        &mut self,
        defaults: &Map<String, Value>,
    ) -> WikiqaResult<()> {
        self.register_descriptor(NodeDescriptor::of::<N>().with_defaults(defaults)?)
    }

    pub fn register_descriptor(&mut self, descriptor: NodeDescriptor) -> WikiqaResult<()> {
        descriptor.validate()?;
        let type_name = descriptor.type_name;
        if self
            .descriptors
            .insert(type_name.to_string(), Arc::new(descriptor))
            .is_some()
        {
            warn!(node_type = type_name, "Node type registered twice, keeping the latest");
        } else {
            debug!(node_type = type_name, "Registered node type");
        }
        Ok(())
    }

    /// Descriptor registered under `type_name`
    pub fn get_subclass(&self, type_name: &str) -> WikiqaResult<Arc<NodeDescriptor>> {
        self.descriptors.get(type_name).cloned().ok_or_else(|| {
            schema_error!(
                format!("Node type with the name '{}' not found.", type_name),
                "registry"
            )
        })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.descriptors.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Construct a `type_name` instance from keyword arguments
    pub fn load_from_args(
        &self,
        type_name: &str,
        params: ComponentParams,
    ) -> WikiqaResult<Arc<Component>> {
        let descriptor = self.get_subclass(type_name)?;
        instantiate(descriptor, params)
    }

    /// Construct from positional arguments, matched against the declared
    /// construction parameters in order
    pub fn load_from_positional(
        &self,
        type_name: &str,
        args: Vec<ParamValue>,
    ) -> WikiqaResult<Arc<Component>> {
        let descriptor = self.get_subclass(type_name)?;
        if args.len() > descriptor.init_params.len() {
            return Err(invalid_parameter_error!(
                format!("positional argument #{}", descriptor.init_params.len() + 1),
                type_name,
                "registry"
            ));
        }
        let params = descriptor
            .init_params
            .iter()
            .zip(args)
            .map(|(param, value)| (param.name.to_string(), value))
            .collect();
        instantiate(descriptor, params)
    }

    /// Construct the component called `name` from a pipeline config,
    /// resolving parameters that name other components first.
    ///
    /// Without a config, `name` is taken as a type name and built with no
    /// arguments.
    pub fn load_from_pipeline_config(
        &self,
        config: Option<&PipelineConfig>,
        name: &str,
    ) -> WikiqaResult<Arc<Component>> {
        match config {
            None => self.load_from_args(name, ComponentParams::new()),
            Some(config) => {
                self.load_definition(config, name, &mut Vec::new(), &mut HashMap::new())
            }
        }
    }

    /// Construct several components from one config. A component that is
    /// listed here and also referenced by another component's parameters
    /// is built once and shared.
    pub fn load_many_from_pipeline_config<'a>(
        &self,
        config: &PipelineConfig,
        names: impl IntoIterator<Item = &'a str>,
    ) -> WikiqaResult<Vec<Arc<Component>>> {
        let mut built = HashMap::new();
        names
            .into_iter()
            .map(|name| self.load_definition(config, name, &mut Vec::new(), &mut built))
            .collect()
    }

    fn load_definition(
        &self,
        config: &PipelineConfig,
        name: &str,
        resolving: &mut Vec<String>,
        built: &mut HashMap<String, Arc<Component>>,
    ) -> WikiqaResult<Arc<Component>> {
        if let Some(component) = built.get(name) {
            return Ok(Arc::clone(component));
        }

        let components = config.components.as_ref().ok_or_else(|| {
            integrity_error!(
                "Pipeline config does not contain a 'components' key",
                "registry"
            )
        })?;
        let definition = components
            .iter()
            .find(|component| component.name == name)
            .ok_or_else(|| {
                integrity_error!(
                    format!("Component '{}' is not defined in the pipeline config", name),
                    "registry"
                )
            })?;

        if resolving.iter().any(|pending| pending == name) {
            resolving.push(name.to_string());
            return Err(integrity_error!(
                format!(
                    "Component references form a cycle: {}",
                    resolving.join(" -> ")
                ),
                "registry"
            ));
        }
        resolving.push(name.to_string());

        let known: HashSet<&str> = components.iter().map(|c| c.name.as_str()).collect();
        let mut params = ComponentParams::new();
        for (key, value) in &definition.params {
            let resolved = match value.as_str() {
                Some(reference) if known.contains(reference) => {
                    ParamValue::Component(self.load_definition(
                        config, reference, resolving, built,
                    )?)
                }
                _ => ParamValue::Value(value.clone()),
            };
            params.insert(key.clone(), resolved);
        }
        resolving.pop();

        let component = self.load_from_args(&definition.component_type, params)?;
        component.set_name(name)?;
        debug!(
            component = name,
            node_type = %definition.component_type,
            "Loaded component from pipeline config"
        );
        built.insert(name.to_string(), Arc::clone(&component));
        Ok(component)
    }
}

fn instantiate(
    descriptor: Arc<NodeDescriptor>,
    params: ComponentParams,
) -> WikiqaResult<Arc<Component>> {
    if let Some(unknown) = params
        .keys()
        .find(|key| descriptor.init_param(key).is_none())
    {
        return Err(invalid_parameter_error!(
            unknown,
            descriptor.type_name,
            "registry"
        ));
    }

    let node = {
        let args = InitArgs::new(descriptor.type_name, &params, &descriptor.init_params);
        (descriptor.factory)(&args)?
    };
    // Captured after construction so nested constructions never leak in.
    Ok(Arc::new(Component::new(node, descriptor, params)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::params_from_json;
    use crate::state::{NodeOutput, RunArgs};
    use crate::testing::{test_registry, Reader, Retriever};
    use async_trait::async_trait;
    use serde_json::json;
    use wikiqa_core::WikiqaError;

    struct Misdeclared;

    #[async_trait]
    impl Node for Misdeclared {
        async fn run(&self, _args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
            Ok((NodeOutput::new(), crate::state::edge(1)))
        }

        async fn run_batch(&self, _args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
            Ok((NodeOutput::new(), crate::state::edge(1)))
        }
    }

    impl NodeType for Misdeclared {
        const TYPE_NAME: &'static str = "Misdeclared";
        const RUN_PARAMS: &'static [&'static str] = &["query", "query"];
        const RUN_BATCH_PARAMS: &'static [&'static str] = &["_debug"];

        fn from_args(_args: &InitArgs<'_>) -> WikiqaResult<Self> {
            Ok(Misdeclared)
        }
    }

    /// Registered under an existing type name
    struct ReplacementEcho;

    #[async_trait]
    impl Node for ReplacementEcho {
        async fn run(&self, _args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
            Ok((NodeOutput::new(), crate::state::edge(1)))
        }

        async fn run_batch(&self, _args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
            Ok((NodeOutput::new(), crate::state::edge(1)))
        }
    }

    impl NodeType for ReplacementEcho {
        const TYPE_NAME: &'static str = "Echo";
        const RUN_PARAMS: &'static [&'static str] = &["documents"];
        const RUN_BATCH_PARAMS: &'static [&'static str] = &["documents"];

        fn from_args(_args: &InitArgs<'_>) -> WikiqaResult<Self> {
            Ok(ReplacementEcho)
        }
    }

    /// Builds its own retriever while being constructed
    struct Wrapper {
        inner: Arc<Component>,
    }

    #[async_trait]
    impl Node for Wrapper {
        async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
            self.inner.node().run(args).await
        }

        async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
            self.inner.node().run_batch(args).await
        }
    }

    impl NodeType for Wrapper {
        const TYPE_NAME: &'static str = "Wrapper";
        const RUN_PARAMS: &'static [&'static str] = &["query"];
        const RUN_BATCH_PARAMS: &'static [&'static str] = &["queries"];

        fn init_params() -> Vec<InitParam> {
            vec![InitParam::optional("label", "plain")]
        }

        fn from_args(_args: &InitArgs<'_>) -> WikiqaResult<Self> {
            let inner = test_registry().load_from_args(
                "Retriever",
                params_from_json(json!({"top_k": 1}).as_object().unwrap().clone()),
            )?;
            Ok(Wrapper { inner })
        }
    }

    fn config(yaml: &str) -> PipelineConfig {
        PipelineConfig::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn test_get_subclass() {
        let registry = test_registry();

        let descriptor = registry.get_subclass("Retriever").unwrap();
        assert_eq!(descriptor.type_name, "Retriever");
        assert_eq!(descriptor.run_params, Retriever::RUN_PARAMS);

        match registry.get_subclass("DoesNotExist") {
            Err(WikiqaError::Schema { message, .. }) => assert!(message.contains("DoesNotExist")),
            other => panic!("expected Schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = test_registry();
        registry.register::<ReplacementEcho>().unwrap();

        let descriptor = registry.get_subclass("Echo").unwrap();
        assert_eq!(descriptor.run_params, &["documents"]);
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_rejects_unusable_declarations() {
        let mut registry = NodeRegistry::new();
        assert!(matches!(
            registry.register::<Misdeclared>(),
            Err(WikiqaError::Schema { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_keyword_capture_and_get_params() {
        let registry = test_registry();
        let component = registry
            .load_from_args(
                "Retriever",
                params_from_json(json!({"top_k": 10, "index": "wiki"}).as_object().unwrap().clone()),
            )
            .unwrap();

        assert_eq!(component.component_type(), "Retriever");
        assert_eq!(component.config().params.len(), 2);

        // top_k equals its default and is left out
        let params = component.get_params(false);
        assert_eq!(params.len(), 1);
        assert_eq!(params["index"], ParamValue::Value(json!("wiki")));

        let all = component.get_params(true);
        assert_eq!(all["top_k"], ParamValue::Value(json!(10)));
        assert_eq!(all["index"], ParamValue::Value(json!("wiki")));
    }

    #[test]
    fn test_defaults_backfilled_for_omitted_params() {
        let registry = test_registry();
        let component = registry
            .load_from_args("Retriever", ComponentParams::new())
            .unwrap();

        assert!(component.get_params(false).is_empty());
        let all = component.get_params(true);
        assert_eq!(all["top_k"], ParamValue::Value(json!(10)));
        assert_eq!(all["index"], ParamValue::Value(json!("document")));
    }

    #[test]
    fn test_positional_matches_keyword_capture() {
        let registry = test_registry();
        let positional = registry
            .load_from_positional("Retriever", vec![json!(3).into(), json!("wiki").into()])
            .unwrap();
        let keyword = registry
            .load_from_args(
                "Retriever",
                params_from_json(json!({"top_k": 3, "index": "wiki"}).as_object().unwrap().clone()),
            )
            .unwrap();

        assert_eq!(positional.config().params, keyword.config().params);
    }

    #[test]
    fn test_too_many_positional_args() {
        let registry = test_registry();
        let result = registry.load_from_positional(
            "Retriever",
            vec![json!(3).into(), json!("wiki").into(), json!(true).into()],
        );
        assert!(matches!(result, Err(WikiqaError::InvalidParameter { .. })));
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let registry = test_registry();
        let result = registry.load_from_args(
            "Retriever",
            params_from_json(json!({"top_p": 3}).as_object().unwrap().clone()),
        );
        match result {
            Err(WikiqaError::InvalidParameter {
                parameter, node, ..
            }) => {
                assert_eq!(parameter, "top_p");
                assert_eq!(node, "Retriever");
            }
            other => panic!("expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_pipeline_config_resolves_references() {
        let registry = test_registry();
        let config = config(
            r#"
components:
  - name: MyRetriever
    type: Retriever
    params:
      top_k: 2
  - name: MyReader
    type: Reader
    params:
      retriever: MyRetriever
      model: MyRetriever-like
"#,
        );

        let reader = registry
            .load_from_pipeline_config(Some(&config), "MyReader")
            .unwrap();

        assert_eq!(reader.name(), Some("MyReader"));
        assert_eq!(reader.component_type(), Reader::TYPE_NAME);
        let nested = reader.utilized_components();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].name(), Some("MyRetriever"));
        assert_eq!(
            nested[0].get_params(false)["top_k"],
            ParamValue::Value(json!(2))
        );
        // only exact name matches are treated as references
        assert_eq!(
            reader.config().params["model"],
            ParamValue::Value(json!("MyRetriever-like"))
        );
    }

    #[test]
    fn test_nested_construction_is_captured_separately() {
        let mut registry = test_registry();
        registry.register::<Wrapper>().unwrap();

        let outer = registry
            .load_from_args(
                "Wrapper",
                params_from_json(json!({"label": "outer"}).as_object().unwrap().clone()),
            )
            .unwrap();

        let config = outer.config();
        assert_eq!(config.component_type, "Wrapper");
        assert_eq!(config.params.len(), 1);
        assert_eq!(config.params["label"], ParamValue::Value(json!("outer")));
        assert!(outer.utilized_components().is_empty());
    }

    #[test]
    fn test_registered_defaults_override_declared_ones() {
        let mut registry = NodeRegistry::new();
        let defaults = json!({"index": "wiki"}).as_object().unwrap().clone();
        registry.register_with_defaults::<Retriever>(&defaults).unwrap();

        let component = registry
            .load_from_args("Retriever", ComponentParams::new())
            .unwrap();
        let all = component.get_params(true);
        assert_eq!(all["index"], ParamValue::Value(json!("wiki")));
        assert_eq!(all["top_k"], ParamValue::Value(json!(10)));

        let unknown = json!({"top_p": 1}).as_object().unwrap().clone();
        assert!(matches!(
            registry.register_with_defaults::<Retriever>(&unknown),
            Err(WikiqaError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_shared_component_built_once() {
        let registry = test_registry();
        let config = config(
            r#"
components:
  - name: MyRetriever
    type: Retriever
  - name: MyReader
    type: Reader
    params:
      retriever: MyRetriever
"#,
        );

        let loaded = registry
            .load_many_from_pipeline_config(&config, ["MyRetriever", "MyReader"])
            .unwrap();

        let nested = loaded[1].utilized_components();
        assert!(Arc::ptr_eq(&loaded[0], &nested[0]));

        // separate calls still build separate instances
        let again = registry
            .load_from_pipeline_config(Some(&config), "MyRetriever")
            .unwrap();
        assert!(!Arc::ptr_eq(&loaded[0], &again));
    }

    #[test]
    fn test_pipeline_config_integrity_errors() {
        let registry = test_registry();

        let no_components = config("pipelines: []");
        assert!(matches!(
            registry.load_from_pipeline_config(Some(&no_components), "Retriever"),
            Err(WikiqaError::ConfigurationIntegrity { .. })
        ));

        let missing_record = config("components: [{name: A, type: Retriever}]");
        assert!(matches!(
            registry.load_from_pipeline_config(Some(&missing_record), "B"),
            Err(WikiqaError::ConfigurationIntegrity { .. })
        ));
    }

    #[test]
    fn test_pipeline_config_reference_cycle() {
        let registry = test_registry();
        let cyclic = config(
            r#"
components:
  - name: A
    type: Reader
    params:
      retriever: B
  - name: B
    type: Reader
    params:
      retriever: A
"#,
        );

        match registry.load_from_pipeline_config(Some(&cyclic), "A") {
            Err(WikiqaError::ConfigurationIntegrity { message, .. }) => {
                assert!(message.contains("A -> B -> A"));
            }
            other => panic!("expected ConfigurationIntegrity, got {:?}", other),
        }
    }

    #[test]
    fn test_without_config_name_is_a_type() {
        let registry = test_registry();
        let component = registry.load_from_pipeline_config(None, "Retriever").unwrap();

        assert_eq!(component.component_type(), "Retriever");
        assert_eq!(component.name(), None);
        assert_eq!(component.label(), "Retriever");
    }

    #[test]
    fn test_name_is_set_once() {
        let registry = test_registry();
        let component = registry.load_from_args("Echo", ComponentParams::new()).unwrap();

        component.set_name("First").unwrap();
        component.set_name("First").unwrap();
        assert!(component.set_name("Second").is_err());
        assert_eq!(component.name(), Some("First"));
    }
}
