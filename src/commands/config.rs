use anyhow::Result;
use colored::Colorize;
use linkset::ChildKind;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::{ZlinkConfig, field_name};
use crate::paths;
use crate::state::ZlinkState;
use crate::ui;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Validate => validate(ctx),
        ConfigCommand::Path => path(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    let path = paths::config_file(ctx.config.as_deref())?;
    let config = ZlinkConfig::load(&path)?;
    let state = ZlinkState::load(&paths::state_file()?)?;

    ui::header("Configuration");
    ui::kv("File", &path.display().to_string());
    let server = if config.server.url.is_empty() {
        "-"
    } else {
        config.server.url.as_str()
    };
    ui::kv("Server", server);
    ui::kv("Auth", config.server.auth_method());
    ui::kv("Timeout", &format!("{}s", config.server.timeout_secs));

    ui::section(&format!("Template links ({})", config.template_link.len()));
    for link in &config.template_link {
        let counts: Vec<String> = ChildKind::all()
            .iter()
            .map(|kind| format!("{} {}", link.declared(*kind).len(), field_name(*kind)))
            .collect();
        let applied = match state.links.get(&link.name) {
            Some(s) if s.template_id == link.template_id => s
                .last_converged
                .map(|t| format!("converged {}", t.format("%Y-%m-%d %H:%M")))
                .unwrap_or_else(|| "not converged".to_string()),
            _ => "never applied".to_string(),
        };
        println!(
            "  {:<20} template {:<8} {}  {}",
            link.name,
            link.template_id,
            counts.join(", "),
            applied.dimmed()
        );
    }

    ui::section(&format!("Graphs ({})", config.graph.len()));
    for graph in &config.graph {
        println!(
            "  {:<20} {} items  {}",
            graph.name,
            graph.graph_items.len(),
            applied_id(state.graphs.get(&graph.name)).dimmed()
        );
    }

    ui::section(&format!("Dashboards ({})", config.dashboard.len()));
    for dashboard in &config.dashboard {
        let widgets: usize = dashboard.page.iter().map(|p| p.widget.len()).sum();
        println!(
            "  {:<20} {} pages, {} widgets  {}",
            dashboard.name,
            dashboard.page.len(),
            widgets,
            applied_id(state.dashboards.get(&dashboard.name)).dimmed()
        );
    }

    Ok(())
}

fn applied_id(id: Option<&String>) -> String {
    id.map_or_else(|| "not applied".to_string(), |id| format!("id {id}"))
}

fn validate(ctx: &Context) -> Result<()> {
    let path = paths::config_file(ctx.config.as_deref())?;
    ui::header("Validating Configuration");
    ui::kv("File", &path.display().to_string());
    println!();

    let config = match ZlinkConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            return Err(e);
        }
    };

    if let Err(e) = config.validate() {
        ui::error(&format!("{e:#}"));
        return Err(e);
    }

    if let Err(e) = config.server.client_config() {
        ui::warn(&format!("{e:#}"));
    }

    ui::success(&format!(
        "{} template links, {} graphs, {} dashboards",
        config.template_link.len(),
        config.graph.len(),
        config.dashboard.len()
    ));
    Ok(())
}

fn path(ctx: &Context) -> Result<()> {
    let config = paths::config_file(ctx.config.as_deref())?;
    let state = paths::state_file()?;

    ui::kv("Config", &config.display().to_string());
    ui::kv("State", &state.display().to_string());
    if !config.exists() {
        ui::dim("Config file does not exist yet");
    }
    Ok(())
}
