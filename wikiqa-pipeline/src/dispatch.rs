//! Argument routing between the pipeline state and a node's entry points
//!
//! Every node invocation goes through [`Component::dispatch_run`] or
//! [`Component::dispatch_run_batch`]. The dispatch layer hands the node only
//! the fields its entry point declares, applies `params` overrides, records
//! debug data and carries unconsumed fields forward to the next node.

use crate::component::Component;
use crate::node::RunMode;
use crate::state::{
    DebugTrace, NodeDebugInfo, NodeOutput, Params, PipelineState, RunArgs, DEBUG, DEBUG_TRACE,
    PARAMS,
};
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use wikiqa_core::{invalid_parameter_error, validation_error, WikiqaResult};

impl Component {
    /// Dispatch the state to this node's `run`
    pub async fn dispatch_run(&self, state: &PipelineState) -> WikiqaResult<(PipelineState, String)> {
        self.dispatch(RunMode::Single, state).await
    }

    /// Dispatch the state to this node's `run_batch`
    pub async fn dispatch_run_batch(
        &self,
        state: &PipelineState,
    ) -> WikiqaResult<(PipelineState, String)> {
        self.dispatch(RunMode::Batch, state).await
    }

    #[instrument(skip(self, state), fields(node = %self.label()))]
    async fn dispatch(
        &self,
        mode: RunMode,
        state: &PipelineState,
    ) -> WikiqaResult<(PipelineState, String)> {
        let node_name = self.label().to_string();
        let arguments = state.to_fields()?;
        let params: Params = state.params.clone().unwrap_or_default();
        let signature = self.descriptor().signature(mode);

        let run_params = self.collect_overrides(&node_name, &params, signature)?;

        let run_inputs: Map<String, Value> = arguments
            .iter()
            .filter(|(key, _)| signature.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut call_args = run_inputs;
        call_args.extend(run_params);

        let args = RunArgs::new(node_name.clone(), call_args.clone());
        let (NodeOutput {
            state: mut produced,
            runtime_debug,
        }, edge) = match mode {
            RunMode::Single => self.node().run(args).await?,
            RunMode::Batch => self.node().run_batch(args).await?,
        };
        produced.debug = None;
        produced.params = None;
        // a trace written as a plain field is treated as runtime debug data
        let emitted = produced.extra.remove(DEBUG_TRACE);
        let runtime_debug = runtime_debug.or(emitted);
        let mut output = produced.to_fields()?;

        let mut debug_info = NodeDebugInfo::default();
        if self.debug() {
            let mut input = call_args;
            input.insert(DEBUG.to_string(), Value::Bool(true));
            debug_info.input = Some(input);
            debug_info.output = Some(output.clone());
        }
        if let Some(runtime) = runtime_debug.filter(is_truthy) {
            debug_info.runtime = Some(runtime);
        }

        let mut trace: DebugTrace = state.debug.clone().unwrap_or_default();
        if !debug_info.is_empty() {
            trace.insert(node_name.clone(), debug_info);
        }
        if !trace.is_empty() {
            output.insert(DEBUG_TRACE.to_string(), serde_json::to_value(&trace)?);
        }

        for (key, value) in arguments {
            output.entry(key).or_insert(value);
        }
        output.insert(PARAMS.to_string(), Value::Object(params));

        debug!(edge = %edge, "Node finished");
        Ok((PipelineState::from_fields(output)?, edge))
    }

    /// Overrides that apply to this node: global entries named after a
    /// declared parameter, then the entries under the node's own name.
    /// A `debug` flag under the node's name is consumed and kept on the
    /// component.
    fn collect_overrides(
        &self,
        node_name: &str,
        params: &Params,
        signature: &[&str],
    ) -> WikiqaResult<Map<String, Value>> {
        let mut global = Map::new();
        let mut targeted = Map::new();

        for (key, value) in params {
            if key == node_name {
                let Value::Object(node_params) = value else {
                    return Err(validation_error!(
                        format!("params for the node '{}' must be a mapping", node_name),
                        key,
                        "dispatch"
                    ));
                };
                let mut node_params = node_params.clone();
                if let Some(flag) = node_params.remove(DEBUG) {
                    self.set_debug(is_truthy(&flag));
                }
                if let Some(unknown) = node_params
                    .keys()
                    .find(|name| !signature.contains(&name.as_str()))
                {
                    return Err(invalid_parameter_error!(unknown, node_name, "dispatch"));
                }
                targeted.extend(node_params);
            } else if signature.contains(&key.as_str()) {
                global.insert(key.clone(), value.clone());
            }
        }

        global.extend(targeted);
        Ok(global)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
