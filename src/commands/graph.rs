use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use zabbix::{Client, Graph};

use super::{connect, load_config, state_path};
use crate::Context;
use crate::cli::GraphCommand;
use crate::config::GraphDecl;
use crate::state::ZlinkState;
use crate::ui;

pub fn run(ctx: &Context, cmd: GraphCommand) -> Result<()> {
    match cmd {
        GraphCommand::Apply { name } => apply(ctx, name.as_deref()),
        GraphCommand::Show { id } => show(ctx, &id),
        GraphCommand::Delete { name } => delete(ctx, &name),
    }
}

/// What apply did to one graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Created(String),
    Updated(String),
    /// Recorded in state but gone from the server
    Recreated(String),
}

impl Applied {
    pub fn id(&self) -> &str {
        match self {
            Self::Created(id) | Self::Updated(id) | Self::Recreated(id) => id,
        }
    }
}

/// Create or update one graph and record its id
pub fn apply_graph(client: &Client, decl: &GraphDecl, state: &mut ZlinkState) -> Result<Applied> {
    let known = state.graphs.get(&decl.name).cloned();

    let applied = match known {
        Some(id) if client.graph_get(&id)?.is_some() => {
            client.graphs_update(&[decl.to_graph(Some(id.clone()))])?;
            Applied::Updated(id)
        }
        Some(id) => {
            log::warn!("Graph {} ({}) no longer exists; re-creating", decl.name, id);
            Applied::Recreated(create(client, decl)?)
        }
        None => Applied::Created(create(client, decl)?),
    };

    state
        .graphs
        .insert(decl.name.clone(), applied.id().to_string());
    Ok(applied)
}

fn create(client: &Client, decl: &GraphDecl) -> Result<String> {
    client
        .graphs_create(&[decl.to_graph(None)])?
        .into_iter()
        .next()
        .with_context(|| format!("graph.create returned no id for {}", decl.name))
}

/// Delete a recorded graph; a graph already gone counts as deleted
pub fn delete_graph(client: &Client, name: &str, state: &mut ZlinkState) -> Result<String> {
    let id = state
        .graphs
        .get(name)
        .cloned()
        .with_context(|| format!("Graph '{name}' has not been applied"))?;

    match client.graphs_delete(std::slice::from_ref(&id)) {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            log::info!("Graph {} ({}) was already deleted", name, id);
        }
        Err(e) => return Err(e.into()),
    }

    state.graphs.remove(name);
    Ok(id)
}

fn apply(ctx: &Context, name: Option<&str>) -> Result<()> {
    let config = load_config(ctx)?;
    config.validate_graphs()?;
    let graphs: Vec<&GraphDecl> = match name {
        Some(name) => vec![
            config
                .find_graph(name)
                .with_context(|| format!("No graph named '{name}'"))?,
        ],
        None => config.graph.iter().collect(),
    };

    if graphs.is_empty() {
        ui::info("No graph declared");
        return Ok(());
    }

    let state_path = state_path()?;
    let mut state = ZlinkState::load(&state_path)?;
    let client = connect(&config.server)?;

    ui::header("Graphs");
    let mut failed = 0;
    for decl in graphs {
        match apply_graph(&client, decl, &mut state) {
            Ok(Applied::Created(id)) => {
                println!("  {} {} {}", "+".green(), decl.name, format!("({id})").dimmed());
            }
            Ok(Applied::Updated(id)) => {
                println!("  {} {} {}", "~".yellow(), decl.name, format!("({id})").dimmed());
            }
            Ok(Applied::Recreated(id)) => {
                println!(
                    "  {} {} {} {}",
                    "+".green(),
                    decl.name,
                    format!("({id})").dimmed(),
                    "re-created".yellow()
                );
            }
            Err(e) => {
                failed += 1;
                ui::error(&format!("{}: {:#}", decl.name, e));
            }
        }
    }

    state.touch(&state_path)?;

    if failed > 0 {
        bail!("{failed} graph(s) failed to apply");
    }
    Ok(())
}

fn show(ctx: &Context, id: &str) -> Result<()> {
    let config = load_config(ctx)?;
    let client = connect(&config.server)?;

    let graph = client
        .graph_get(id)?
        .with_context(|| format!("Graph {id} not found"))?;
    display_graph(&graph);
    Ok(())
}

fn delete(ctx: &Context, name: &str) -> Result<()> {
    let config = load_config(ctx)?;
    let state_path = state_path()?;
    let mut state = ZlinkState::load(&state_path)?;
    let client = connect(&config.server)?;

    let id = delete_graph(&client, name, &mut state)?;
    state.touch(&state_path)?;
    ui::success(&format!("Deleted graph '{name}' ({id})"));
    Ok(())
}

fn display_graph(graph: &Graph) {
    ui::header(&graph.name);
    ui::kv("Id", graph.graph_id.as_deref().unwrap_or("-"));
    ui::kv("Type", graph.graph_type.as_str());
    ui::kv("Size", &format!("{}x{}", graph.width, graph.height));
    ui::kv("Y axis", &format!("{} .. {}", graph.yaxismin, graph.yaxismax));
    ui::kv(
        "Percentiles",
        &format!("{} / {}", graph.percent_left, graph.percent_right),
    );

    let flags: Vec<&str> = [
        (graph.show_work_period, "work period"),
        (graph.show_triggers, "triggers"),
        (graph.show_legend, "legend"),
        (graph.show_3d, "3d"),
    ]
    .into_iter()
    .filter_map(|(on, label)| on.then_some(label))
    .collect();
    ui::kv("Shows", &flags.join(", "));

    ui::section(&format!("Items ({})", graph.items.len()));
    for item in &graph.items {
        println!(
            "  {:<10} #{} {} {}",
            item.item_id,
            item.color,
            item.draw_type.as_str(),
            item.y_axis_side.as_str().dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphItemDecl;
    use serde_json::json;
    use zabbix::{Credentials, MockTransport};

    fn client(mock: &MockTransport) -> Client {
        let mut client = Client::with_transport(Box::new(mock.clone()));
        client
            .authenticate(&Credentials::Token("secret".to_string()))
            .unwrap();
        client
    }

    fn decl() -> GraphDecl {
        toml::from_str::<GraphDecl>(
            r#"
name = "CPU load"

[[graph_items]]
item_id = "23296"
color = "1A7C11"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_first_apply_creates_and_records() {
        let mock = MockTransport::new();
        mock.respond("graph.create", json!({"graphids": ["512"]}));
        let mut state = ZlinkState::default();

        let applied = apply_graph(&client(&mock), &decl(), &mut state).unwrap();

        assert_eq!(applied, Applied::Created("512".to_string()));
        assert_eq!(state.graphs["CPU load"], "512");
        let params = &mock.requests()[0].params;
        assert_eq!(params[0]["name"], "CPU load");
        assert_eq!(params[0]["gitems"][0]["itemid"], "23296");
    }

    #[test]
    fn test_known_graph_is_updated() {
        let mock = MockTransport::new();
        mock.respond(
            "graph.get",
            json!([{
                "graphid": "512",
                "name": "CPU load",
                "width": "900",
                "height": "200",
                "yaxismin": "0.0000",
                "yaxismax": "100.0000",
                "percent_left": "0.0000",
                "percent_right": "0.0000",
                "graphtype": "0",
                "show_work_period": "1",
                "show_triggers": "1",
                "show_legend": "1",
                "show_3d": "0",
                "gitems": []
            }]),
        );
        mock.respond("graph.update", json!({"graphids": ["512"]}));
        let mut state = ZlinkState::default();
        state.graphs.insert("CPU load".to_string(), "512".to_string());

        let mut graph = decl();
        graph.graph_items.push(GraphItemDecl {
            item_id: "23297".to_string(),
            ..graph.graph_items[0].clone()
        });
        let applied = apply_graph(&client(&mock), &graph, &mut state).unwrap();

        assert_eq!(applied, Applied::Updated("512".to_string()));
        let update = &mock.requests()[1];
        assert_eq!(update.method, "graph.update");
        assert_eq!(update.params[0]["graphid"], "512");
        assert_eq!(update.params[0]["gitems"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_graph_missing_remotely_is_recreated() {
        let mock = MockTransport::new();
        mock.respond("graph.get", json!([]));
        mock.respond("graph.create", json!({"graphids": ["600"]}));
        let mut state = ZlinkState::default();
        state.graphs.insert("CPU load".to_string(), "512".to_string());

        let applied = apply_graph(&client(&mock), &decl(), &mut state).unwrap();

        assert_eq!(applied, Applied::Recreated("600".to_string()));
        assert_eq!(state.graphs["CPU load"], "600");
    }

    #[test]
    fn test_delete_tolerates_missing_graph() {
        let mock = MockTransport::new();
        mock.fail(
            "graph.delete",
            -32500,
            "Application error.",
            "No permissions to referred object or it does not exist!",
        );
        let mut state = ZlinkState::default();
        state.graphs.insert("CPU load".to_string(), "512".to_string());

        let id = delete_graph(&client(&mock), "CPU load", &mut state).unwrap();

        assert_eq!(id, "512");
        assert!(state.graphs.is_empty());
    }

    #[test]
    fn test_delete_other_errors_keep_state() {
        let mock = MockTransport::new();
        mock.fail("graph.delete", -32500, "Application error.", "database locked");
        let mut state = ZlinkState::default();
        state.graphs.insert("CPU load".to_string(), "512".to_string());

        assert!(delete_graph(&client(&mock), "CPU load", &mut state).is_err());
        assert_eq!(state.graphs["CPU load"], "512");
    }

    #[test]
    fn test_delete_unknown_name_fails() {
        let mock = MockTransport::new();
        let mut state = ZlinkState::default();
        assert!(delete_graph(&client(&mock), "nope", &mut state).is_err());
        assert!(mock.requests().is_empty());
    }
}
