use super::Workspace;
use crate::output::print_json;
use anyhow::Context;
use flowvar_core::{ActionArgs, ActionKind, Dispatcher, Outcome};
use std::path::Path;

/// Action arguments as given on the command line.
#[derive(Debug, Default)]
pub struct RunInput {
    /// Full host argument object; flags below override its fields.
    pub args_json: Option<String>,
    pub variable: Option<String>,
    pub value: Option<String>,
    pub boolean_value: Option<String>,
    pub expression: Option<String>,
}

impl RunInput {
    fn into_args(self) -> anyhow::Result<ActionArgs> {
        let mut args = match self.args_json {
            Some(raw) => serde_json::from_str::<ActionArgs>(&raw)
                .context("--args is not a valid action argument object")?,
            None => ActionArgs::default(),
        };
        if let Some(name) = self.variable {
            args.variable = Some(flowvar_core::VariableRef::named(name));
        }
        // Flag values are text, as a flow editor would send them.
        if let Some(value) = self.value {
            args.value = Some(serde_json::Value::String(value));
        }
        if let Some(b) = self.boolean_value {
            args.boolean_value = Some(b);
        }
        if let Some(e) = self.expression {
            args.expression = Some(e);
        }
        Ok(args)
    }
}

pub fn run(root: &Path, action: &str, input: RunInput, json: bool) -> anyhow::Result<()> {
    let kind: ActionKind = action.parse()?;
    let args = input.into_args()?;
    let ws = Workspace::open(root)?;
    let dispatcher = Dispatcher::for_store(ws.store.clone())
        .with_noop_logging(ws.config.dispatch.log_noops);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt
        .block_on(async {
            let outcome = dispatcher.run(kind, &args).await?;
            if outcome.is_updated() {
                ws.store.save_snapshot(&ws.variables_path).await?;
            }
            Ok::<_, flowvar_core::FlowvarError>(outcome)
        })
        .with_context(|| format!("{kind} failed"))?;

    if json {
        return print_json(&outcome);
    }
    match &outcome {
        Outcome::Updated { variable } => {
            println!("updated: {} = {}", variable.name, variable.value)
        }
        Outcome::NoOp { reason } => println!("no-op: {reason}"),
    }
    Ok(())
}
