use crate::output::{print_json, print_table};
use flowvar_core::ActionKind;

pub fn run(json: bool) -> anyhow::Result<()> {
    if json {
        #[derive(serde::Serialize)]
        struct ActionInfo {
            id: ActionKind,
            required_type: Option<flowvar_core::VariableType>,
        }

        let infos: Vec<ActionInfo> = ActionKind::all()
            .iter()
            .map(|&id| ActionInfo {
                id,
                required_type: id.required_type(),
            })
            .collect();
        return print_json(&infos);
    }

    let rows = ActionKind::all()
        .iter()
        .map(|k| {
            vec![
                k.to_string(),
                k.required_type()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "any".to_string()),
            ]
        })
        .collect();
    print_table(&["ACTION", "VARIABLE TYPE"], rows);
    Ok(())
}
