use super::Workspace;
use crate::output::print_variables;
use flowvar_core::{ActionKind, Dispatcher};
use std::path::Path;

pub fn run(root: &Path, action: &str, query: Option<&str>, json: bool) -> anyhow::Result<()> {
    let kind: ActionKind = action.parse()?;
    let ws = Workspace::open(root)?;
    let dispatcher = Dispatcher::for_store(ws.store.clone());

    let rt = tokio::runtime::Runtime::new()?;
    let found = rt.block_on(dispatcher.autocomplete(kind, query.unwrap_or("")));
    print_variables(&found, json)
}
