//! zlink configuration file
//!
//! A single TOML file declares the server connection and every managed
//! object:
//!
//! ```toml
//! [server]
//! url = "https://zabbix.example.com"
//! user = "Admin"
//!
//! [[template_link]]
//! name = "web"
//! template_id = "10084"
//! items = ["23296", "23297"]
//! triggers = ["13491"]
//! lld_rules = []
//! ```

use anyhow::{Context, Result, bail};
use linkset::{ChildKind, DeclaredSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use zabbix::{
    ClientConfig, Credentials, Dashboard, DashboardPage, DrawType, Graph, GraphItem, GraphType,
    Widget, WidgetContent, WidgetKind, YAxisSide,
};

/// Environment variable holding the server password
pub const ENV_PASSWORD: &str = "ZLINK_PASSWORD";

/// Environment variable holding an API token
pub const ENV_TOKEN: &str = "ZLINK_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZlinkConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub template_link: Vec<TemplateLink>,

    #[serde(default)]
    pub graph: Vec<GraphDecl>,

    #[serde(default)]
    pub dashboard: Vec<DashboardDecl>,
}

impl ZlinkConfig {
    /// Load the config file and apply secrets from the environment
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "Config file not found: {}\nCreate it or pass --config <path>",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;

        config.server.apply_secrets(
            std::env::var(ENV_PASSWORD).ok(),
            std::env::var(ENV_TOKEN).ok(),
        );
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validate every declaration. No remote call is made.
    pub fn validate(&self) -> Result<()> {
        self.validate_links()?;
        for link in &self.template_link {
            link.validate_declared()
                .with_context(|| format!("Invalid template_link '{}'", link.name))?;
        }
        self.validate_graphs()?;
        self.validate_dashboards()
    }

    /// Shape of every template link and uniqueness of names and templates.
    ///
    /// Duplicate ids within a kind are not checked here; the planner skips
    /// only the affected kind.
    pub fn validate_links(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut parents = HashSet::new();
        for link in &self.template_link {
            link.validate()
                .with_context(|| format!("Invalid template_link '{}'", link.name))?;
            if !names.insert(link.name.as_str()) {
                bail!("Duplicate template_link name '{}'", link.name);
            }
            if !parents.insert(link.template_id.as_str()) {
                bail!(
                    "Template {} is managed by more than one template_link",
                    link.template_id
                );
            }
        }
        Ok(())
    }

    pub fn validate_graphs(&self) -> Result<()> {
        let mut names = HashSet::new();
        for graph in &self.graph {
            graph
                .validate()
                .with_context(|| format!("Invalid graph '{}'", graph.name))?;
            if !names.insert(graph.name.as_str()) {
                bail!("Duplicate graph name '{}'", graph.name);
            }
        }
        Ok(())
    }

    pub fn validate_dashboards(&self) -> Result<()> {
        let mut names = HashSet::new();
        for dashboard in &self.dashboard {
            dashboard
                .validate()
                .with_context(|| format!("Invalid dashboard '{}'", dashboard.name))?;
            if !names.insert(dashboard.name.as_str()) {
                bail!("Duplicate dashboard name '{}'", dashboard.name);
            }
        }
        Ok(())
    }

    pub fn find_link(&self, name: &str) -> Option<&TemplateLink> {
        self.template_link.iter().find(|l| l.name == name)
    }

    pub fn find_graph(&self, name: &str) -> Option<&GraphDecl> {
        self.graph.iter().find(|g| g.name == name)
    }

    pub fn find_dashboard(&self, name: &str) -> Option<&DashboardDecl> {
        self.dashboard.iter().find(|d| d.name == name)
    }

    /// Links selected by an optional name filter
    pub fn select_links(&self, name: Option<&str>) -> Result<Vec<&TemplateLink>> {
        match name {
            Some(name) => self
                .find_link(name)
                .map(|l| vec![l])
                .with_context(|| format!("No template_link named '{name}'")),
            None => Ok(self.template_link.iter().collect()),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Frontend URL, e.g. `https://zabbix.example.com`
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: None,
            password: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Override secrets with values from the environment, when set
    pub fn apply_secrets(&mut self, password: Option<String>, token: Option<String>) {
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            log::debug!("Using password from {}", ENV_PASSWORD);
            self.password = Some(password);
        }
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            log::debug!("Using API token from {}", ENV_TOKEN);
            self.token = Some(token);
        }
    }

    /// A token wins over user and password
    pub fn credentials(&self) -> Result<Credentials> {
        if let Some(token) = &self.token {
            return Ok(Credentials::Token(token.clone()));
        }

        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Ok(Credentials::Password {
                user: user.clone(),
                password: password.clone(),
            }),
            (Some(_), None) => bail!(
                "No password for server.user; set server.password or {}",
                ENV_PASSWORD
            ),
            _ => bail!(
                "No credentials; set server.token, {} or server.user with a password",
                ENV_TOKEN
            ),
        }
    }

    pub fn client_config(&self) -> Result<ClientConfig> {
        if self.url.trim().is_empty() {
            bail!("server.url is not set");
        }

        Ok(ClientConfig {
            url: self.url.clone(),
            credentials: self.credentials()?,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }

    /// Which credential source will be used, for display
    pub fn auth_method(&self) -> &'static str {
        match (&self.token, &self.user, &self.password) {
            (Some(_), _, _) => "token",
            (None, Some(_), Some(_)) => "password",
            _ => "none",
        }
    }
}

// ============================================================================
// Template links
// ============================================================================

/// Children linked to one template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateLink {
    pub name: String,

    pub template_id: String,

    #[serde(default)]
    pub items: Vec<String>,

    #[serde(default)]
    pub triggers: Vec<String>,

    #[serde(default)]
    pub lld_rules: Vec<String>,
}

impl TemplateLink {
    /// Ids declared for a kind, in declaration order
    pub fn declared(&self, kind: ChildKind) -> &[String] {
        match kind {
            ChildKind::Item => &self.items,
            ChildKind::Trigger => &self.triggers,
            ChildKind::DiscoveryRule => &self.lld_rules,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("template_link name cannot be empty");
        }
        if self.template_id.trim().is_empty() {
            bail!("template_id cannot be empty");
        }

        for kind in ChildKind::all() {
            if self.declared(*kind).iter().any(|id| id.trim().is_empty()) {
                bail!("{} contains an empty id", field_name(*kind));
            }
        }

        Ok(())
    }

    /// Each id declared at most once per kind
    pub fn validate_declared(&self) -> Result<()> {
        for kind in ChildKind::all() {
            let ids = self.declared(*kind);
            DeclaredSet::from_declared(*kind, ids.iter().map(String::as_str))?;
        }
        Ok(())
    }
}

/// Config key for a kind's id list
pub fn field_name(kind: ChildKind) -> &'static str {
    match kind {
        ChildKind::Item => "items",
        ChildKind::Trigger => "triggers",
        ChildKind::DiscoveryRule => "lld_rules",
    }
}

// ============================================================================
// Graphs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDecl {
    pub name: String,

    #[serde(default = "default_graph_width")]
    pub width: u32,

    #[serde(default = "default_graph_height")]
    pub height: u32,

    #[serde(default = "default_yaxismin")]
    pub yaxismin: String,

    #[serde(default = "default_yaxismax")]
    pub yaxismax: String,

    #[serde(default = "default_true")]
    pub show_work_period: bool,

    #[serde(default = "default_true")]
    pub show_triggers: bool,

    #[serde(default = "default_true")]
    pub show_legend: bool,

    #[serde(default)]
    pub show_3d: bool,

    #[serde(default = "default_percent")]
    pub percent_left: String,

    #[serde(default = "default_percent")]
    pub percent_right: String,

    #[serde(rename = "type", default)]
    pub graph_type: GraphType,

    #[serde(default)]
    pub graph_items: Vec<GraphItemDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphItemDecl {
    pub item_id: String,

    /// Hex RGB without the leading `#`
    pub color: String,

    #[serde(default = "default_calc_fnc")]
    pub calc_fnc: u8,

    #[serde(rename = "type", default)]
    pub item_type: u8,

    #[serde(default)]
    pub draw_type: DrawType,

    #[serde(default)]
    pub yaxisside: YAxisSide,
}

fn default_graph_width() -> u32 {
    900
}

fn default_graph_height() -> u32 {
    200
}

fn default_yaxismin() -> String {
    "0".to_string()
}

fn default_yaxismax() -> String {
    "100".to_string()
}

fn default_percent() -> String {
    "0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_calc_fnc() -> u8 {
    2
}

impl GraphDecl {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("graph name cannot be empty");
        }
        if self.graph_items.is_empty() {
            bail!("graph needs at least one graph_items entry");
        }
        for item in &self.graph_items {
            if item.item_id.trim().is_empty() {
                bail!("graph item has an empty item_id");
            }
            if item.color.len() != 6 || !item.color.chars().all(|c| c.is_ascii_hexdigit()) {
                bail!(
                    "graph item {} has color '{}'; expected six hex digits",
                    item.item_id,
                    item.color
                );
            }
        }
        Ok(())
    }

    /// Wire model, optionally carrying the remote id for an update
    pub fn to_graph(&self, graph_id: Option<String>) -> Graph {
        let mut graph = Graph::new(&self.name);
        graph.graph_id = graph_id;
        graph.width = self.width;
        graph.height = self.height;
        graph.yaxismin = self.yaxismin.clone();
        graph.yaxismax = self.yaxismax.clone();
        graph.percent_left = self.percent_left.clone();
        graph.percent_right = self.percent_right.clone();
        graph.graph_type = self.graph_type;
        graph.show_work_period = self.show_work_period;
        graph.show_triggers = self.show_triggers;
        graph.show_legend = self.show_legend;
        graph.show_3d = self.show_3d;

        for decl in &self.graph_items {
            let mut item = GraphItem::new(&decl.item_id, &decl.color);
            item.calc_fnc = decl.calc_fnc;
            item.item_type = decl.item_type;
            item.draw_type = decl.draw_type;
            item.y_axis_side = decl.yaxisside;
            graph = graph.with_item(item);
        }
        graph
    }
}

// ============================================================================
// Dashboards
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardDecl {
    pub name: String,

    /// Owner user id; the server assigns the API user when omitted
    #[serde(default)]
    pub owner_userid: Option<String>,

    #[serde(default)]
    pub page: Vec<PageDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDecl {
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_display_period")]
    pub display_period: u32,

    #[serde(default)]
    pub widget: Vec<WidgetDecl>,
}

fn default_display_period() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetDecl {
    #[serde(rename = "type")]
    pub kind: WidgetKind,

    #[serde(default)]
    pub name: String,

    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,

    #[serde(default)]
    pub graph_id: Option<String>,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

impl WidgetDecl {
    /// Typed payload, rejecting fields that do not belong to the widget type
    pub fn content(&self) -> Result<WidgetContent> {
        let payload = [
            ("graph_id", &self.graph_id),
            ("text", &self.text),
            ("url", &self.url),
        ];
        let expected = match self.kind {
            WidgetKind::Graph => Some("graph_id"),
            WidgetKind::PlainText => Some("text"),
            WidgetKind::Url => Some("url"),
            _ => None,
        };

        for (field, value) in payload {
            if value.is_some() && Some(field) != expected {
                bail!(
                    "{} widget '{}' does not take '{}'",
                    self.kind.as_str(),
                    self.name,
                    field
                );
            }
        }

        let value = |v: &Option<String>| v.clone().unwrap_or_default();
        Ok(match self.kind {
            WidgetKind::Graph => WidgetContent::Graph {
                graph_id: value(&self.graph_id),
            },
            WidgetKind::PlainText => WidgetContent::PlainText {
                text: value(&self.text),
            },
            WidgetKind::Url => WidgetContent::Url {
                url: value(&self.url),
            },
            WidgetKind::Clock => WidgetContent::Clock,
            WidgetKind::Sysmap => WidgetContent::Sysmap,
            WidgetKind::TriggerInfo => WidgetContent::TriggerInfo,
            WidgetKind::TriggerOver => WidgetContent::TriggerOver,
            WidgetKind::ProblemsBySv => WidgetContent::ProblemsBySv,
            WidgetKind::Problems => WidgetContent::Problems,
        })
    }
}

impl DashboardDecl {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("dashboard name cannot be empty");
        }
        if self.page.is_empty() {
            bail!("dashboard needs at least one page");
        }
        for page in &self.page {
            for widget in &page.widget {
                widget.content()?;
                if widget.width == 0 || widget.height == 0 {
                    bail!("widget '{}' has zero width or height", widget.name);
                }
            }
        }
        Ok(())
    }

    /// Wire model, optionally carrying the remote id for an update
    pub fn to_dashboard(&self, dashboard_id: Option<String>) -> Result<Dashboard> {
        let mut dashboard = Dashboard::new(&self.name);
        dashboard.dashboard_id = dashboard_id;
        dashboard.owner = self.owner_userid.clone();

        for decl in &self.page {
            let mut page = DashboardPage::new(&decl.name);
            page.display_period = decl.display_period;
            for widget in &decl.widget {
                let content = widget.content()?;
                page.widgets.push(
                    Widget::new(&widget.name, &content).at(
                        widget.x,
                        widget.y,
                        widget.width,
                        widget.height,
                    ),
                );
            }
            dashboard.pages.push(page);
        }
        Ok(dashboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
url = "https://zabbix.example.com"
user = "Admin"
password = "zabbix"

[[template_link]]
name = "web"
template_id = "10084"
items = ["23296", "23297"]
triggers = ["13491"]

[[graph]]
name = "CPU load"
type = "stacked"

[[graph.graph_items]]
item_id = "23296"
color = "1A7C11"
draw_type = "bold_line"

[[dashboard]]
name = "Overview"

[[dashboard.page]]
name = "main"

[[dashboard.page.widget]]
type = "graph"
name = "CPU"
x = 0
y = 0
width = 12
height = 5
graph_id = "512"

[[dashboard.page.widget]]
type = "clock"
x = 12
y = 0
width = 4
height = 5
"#;

    fn parse(content: &str) -> ZlinkConfig {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn test_sample_parses_with_defaults() {
        let config = parse(SAMPLE);
        config.validate().unwrap();

        assert_eq!(config.server.timeout_secs, 30);
        let link = config.find_link("web").unwrap();
        assert!(link.lld_rules.is_empty());
        assert_eq!(link.declared(ChildKind::Trigger), ["13491"]);

        let graph = config.find_graph("CPU load").unwrap();
        assert_eq!(graph.width, 900);
        assert_eq!(graph.yaxismax, "100");
        assert!(graph.show_legend);
        assert!(!graph.show_3d);
        assert_eq!(graph.graph_type, GraphType::Stacked);
        assert_eq!(graph.graph_items[0].calc_fnc, 2);
        assert_eq!(graph.graph_items[0].yaxisside, YAxisSide::Left);

        let page = &config.find_dashboard("Overview").unwrap().page[0];
        assert_eq!(page.display_period, 30);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ZlinkConfig::load(&path).unwrap();
        assert_eq!(config.template_link.len(), 1);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ZlinkConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_duplicate_declared_id_is_rejected() {
        let mut config = parse(SAMPLE);
        config.template_link[0].items.push("23296".to_string());

        let err = format!("{:#}", config.validate().unwrap_err());
        assert!(err.contains("Invalid template_link 'web'"));
        assert!(err.contains("23296"));
    }

    #[test]
    fn test_duplicate_declared_id_passes_link_checks() {
        let mut config = parse(SAMPLE);
        config.template_link[0].triggers.push("13491".to_string());
        config.template_link[0].triggers.push("13491".to_string());

        config.validate_links().unwrap();
        assert!(config.template_link[0].validate_declared().is_err());
    }

    #[test]
    fn test_sections_validate_independently() {
        let mut config = parse(SAMPLE);
        config.graph[0].graph_items[0].color = "zz".to_string();

        config.validate_links().unwrap();
        config.validate_dashboards().unwrap();
        assert!(config.validate_graphs().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_template_in_two_links_is_rejected() {
        let mut config = parse(SAMPLE);
        let mut other = config.template_link[0].clone();
        other.name = "web-2".to_string();
        config.template_link.push(other);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_graph_without_items_is_rejected() {
        let mut config = parse(SAMPLE);
        config.graph[0].graph_items.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_color_is_rejected() {
        let mut config = parse(SAMPLE);
        config.graph[0].graph_items[0].color = "#1A7C11".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_widget_field_must_match_type() {
        let mut config = parse(SAMPLE);
        config.dashboard[0].page[0].widget[1].url = Some("https://example.com".to_string());

        let err = format!("{:#}", config.validate().unwrap_err());
        assert!(err.contains("does not take 'url'"));
    }

    #[test]
    fn test_env_secrets_win() {
        let mut server = parse(SAMPLE).server;
        server.apply_secrets(Some("from-env".to_string()), None);
        assert_eq!(
            server.credentials().unwrap(),
            Credentials::Password {
                user: "Admin".to_string(),
                password: "from-env".to_string(),
            }
        );

        server.apply_secrets(Some(String::new()), Some("tok".to_string()));
        assert_eq!(server.password.as_deref(), Some("from-env"));
        assert_eq!(
            server.credentials().unwrap(),
            Credentials::Token("tok".to_string())
        );
        assert_eq!(server.auth_method(), "token");
    }

    #[test]
    fn test_missing_credentials() {
        let server = ServerConfig {
            url: "https://zbx".to_string(),
            user: Some("Admin".to_string()),
            ..ServerConfig::default()
        };
        assert!(server.credentials().is_err());
        assert!(ServerConfig::default().client_config().is_err());
    }

    #[test]
    fn test_graph_conversion() {
        let config = parse(SAMPLE);
        let graph = config.graph[0].to_graph(Some("512".to_string()));

        assert_eq!(graph.graph_id.as_deref(), Some("512"));
        assert_eq!(graph.items.len(), 1);
        assert_eq!(graph.items[0].draw_type, DrawType::BoldLine);
        assert_eq!(graph.items[0].color, "1A7C11");
    }

    #[test]
    fn test_dashboard_conversion() {
        let config = parse(SAMPLE);
        let dashboard = config.dashboard[0].to_dashboard(None).unwrap();

        assert_eq!(dashboard.owner, None);
        let widgets = &dashboard.pages[0].widgets;
        assert_eq!(
            widgets[0].content(),
            WidgetContent::Graph {
                graph_id: "512".to_string()
            }
        );
        assert_eq!(widgets[1].kind, WidgetKind::Clock);
        assert!(widgets[1].fields.is_empty());
        assert_eq!((widgets[1].x, widgets[1].width), (12, 4));
    }
}
