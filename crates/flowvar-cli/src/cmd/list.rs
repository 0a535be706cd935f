use super::Workspace;
use crate::output::print_variables;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let rt = tokio::runtime::Runtime::new()?;
    let variables = rt.block_on(ws.store.snapshot());
    print_variables(&variables, json)
}
