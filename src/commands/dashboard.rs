use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use zabbix::{Client, Dashboard, WidgetContent};

use super::graph::Applied;
use super::{connect, load_config, state_path};
use crate::Context;
use crate::cli::DashboardCommand;
use crate::config::DashboardDecl;
use crate::state::ZlinkState;
use crate::ui;

pub fn run(ctx: &Context, cmd: DashboardCommand) -> Result<()> {
    match cmd {
        DashboardCommand::Apply { name } => apply(ctx, name.as_deref()),
        DashboardCommand::Show { id } => show(ctx, &id),
        DashboardCommand::Delete { name } => delete(ctx, &name),
    }
}

/// Create or update one dashboard and record its id
pub fn apply_dashboard(
    client: &Client,
    decl: &DashboardDecl,
    state: &mut ZlinkState,
) -> Result<Applied> {
    let known = state.dashboards.get(&decl.name).cloned();

    let applied = match known {
        Some(id) if client.dashboard_get(&id)?.is_some() => {
            client.dashboards_update(&[decl.to_dashboard(Some(id.clone()))?])?;
            Applied::Updated(id)
        }
        Some(id) => {
            log::warn!("Dashboard {} ({}) no longer exists; re-creating", decl.name, id);
            Applied::Recreated(create(client, decl)?)
        }
        None => Applied::Created(create(client, decl)?),
    };

    state
        .dashboards
        .insert(decl.name.clone(), applied.id().to_string());
    Ok(applied)
}

fn create(client: &Client, decl: &DashboardDecl) -> Result<String> {
    client
        .dashboards_create(&[decl.to_dashboard(None)?])?
        .into_iter()
        .next()
        .with_context(|| format!("dashboard.create returned no id for {}", decl.name))
}

/// Delete a recorded dashboard; one already gone counts as deleted
pub fn delete_dashboard(client: &Client, name: &str, state: &mut ZlinkState) -> Result<String> {
    let id = state
        .dashboards
        .get(name)
        .cloned()
        .with_context(|| format!("Dashboard '{name}' has not been applied"))?;

    match client.dashboards_delete(std::slice::from_ref(&id)) {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            log::info!("Dashboard {} ({}) was already deleted", name, id);
        }
        Err(e) => return Err(e.into()),
    }

    state.dashboards.remove(name);
    Ok(id)
}

fn apply(ctx: &Context, name: Option<&str>) -> Result<()> {
    let config = load_config(ctx)?;
    config.validate_dashboards()?;
    let dashboards: Vec<&DashboardDecl> = match name {
        Some(name) => vec![
            config
                .find_dashboard(name)
                .with_context(|| format!("No dashboard named '{name}'"))?,
        ],
        None => config.dashboard.iter().collect(),
    };

    if dashboards.is_empty() {
        ui::info("No dashboard declared");
        return Ok(());
    }

    let state_path = state_path()?;
    let mut state = ZlinkState::load(&state_path)?;
    let client = connect(&config.server)?;

    ui::header("Dashboards");
    let mut failed = 0;
    for decl in dashboards {
        match apply_dashboard(&client, decl, &mut state) {
            Ok(applied) => {
                let (symbol, note) = match &applied {
                    Applied::Created(_) => ("+".green(), String::new()),
                    Applied::Updated(_) => ("~".yellow(), String::new()),
                    Applied::Recreated(_) => ("+".green(), " re-created".to_string()),
                };
                println!(
                    "  {} {} {}{}",
                    symbol,
                    decl.name,
                    format!("({})", applied.id()).dimmed(),
                    note.yellow()
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
        bail!("{failed} dashboard(s) failed to apply");
    }
    Ok(())
}

fn show(ctx: &Context, id: &str) -> Result<()> {
    let config = load_config(ctx)?;
    let client = connect(&config.server)?;

    let dashboard = client
        .dashboard_get(id)?
        .with_context(|| format!("Dashboard {id} not found"))?;
    display_dashboard(&dashboard);
    Ok(())
}

fn delete(ctx: &Context, name: &str) -> Result<()> {
    let config = load_config(ctx)?;
    let state_path = state_path()?;
    let mut state = ZlinkState::load(&state_path)?;
    let client = connect(&config.server)?;

    let id = delete_dashboard(&client, name, &mut state)?;
    state.touch(&state_path)?;
    ui::success(&format!("Deleted dashboard '{name}' ({id})"));
    Ok(())
}

fn display_dashboard(dashboard: &Dashboard) {
    ui::header(&dashboard.name);
    ui::kv("Id", dashboard.dashboard_id.as_deref().unwrap_or("-"));
    ui::kv("Owner", dashboard.owner.as_deref().unwrap_or("-"));

    for page in &dashboard.pages {
        let title = if page.name.is_empty() {
            "(unnamed page)"
        } else {
            page.name.as_str()
        };
        ui::section(&format!("{} ({}s)", title, page.display_period));

        for widget in &page.widgets {
            let detail = match widget.content() {
                WidgetContent::Graph { graph_id } => format!("graph {graph_id}"),
                WidgetContent::PlainText { text } => text,
                WidgetContent::Url { url } => url,
                _ => String::new(),
            };
            println!(
                "  {:<14} {:<20} {} {}",
                widget.kind.as_str(),
                widget.name,
                format!(
                    "@{},{} {}x{}",
                    widget.x, widget.y, widget.width, widget.height
                )
                .dimmed(),
                detail
            );
        }
    }
}
