//! Dashboard models and `dashboard.*` verbs
//!
//! Widgets carry a flat `{type, name, value}` field list on the wire.
//! [`WidgetContent`] is the typed view of those fields; convert at the
//! boundary with [`WidgetContent::to_fields`] and [`WidgetContent::from_fields`].

use crate::client::{Client, ids_from_result};
use crate::error::{Error, Result};
use crate::object::ObjectKind;
use crate::wire::{self, WireCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// Field type code for a reference to a graph
const FIELD_GRAPH: i32 = 0;
/// Field type code for a string value
const FIELD_STRING: i32 = 1;

/// Widget type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Graph,
    Clock,
    Sysmap,
    PlainText,
    TriggerInfo,
    TriggerOver,
    ProblemsBySv,
    Problems,
    Url,
}

impl WidgetKind {
    pub fn all() -> &'static [WidgetKind] {
        &[
            Self::Graph,
            Self::Clock,
            Self::Sysmap,
            Self::PlainText,
            Self::TriggerInfo,
            Self::TriggerOver,
            Self::ProblemsBySv,
            Self::Problems,
            Self::Url,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Clock => "clock",
            Self::Sysmap => "sysmap",
            Self::PlainText => "plain_text",
            Self::TriggerInfo => "trigger_info",
            Self::TriggerOver => "trigger_over",
            Self::ProblemsBySv => "problems_by_sv",
            Self::Problems => "problems",
            Self::Url => "url",
        }
    }
}

impl WireCode for WidgetKind {
    fn code(&self) -> i32 {
        match self {
            Self::Graph => 0,
            Self::Clock => 1,
            Self::Sysmap => 2,
            Self::PlainText => 3,
            Self::TriggerInfo => 4,
            Self::TriggerOver => 5,
            Self::ProblemsBySv => 8,
            Self::Problems => 9,
            Self::Url => 10,
        }
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Graph),
            1 => Some(Self::Clock),
            2 => Some(Self::Sysmap),
            3 => Some(Self::PlainText),
            4 => Some(Self::TriggerInfo),
            5 => Some(Self::TriggerOver),
            8 => Some(Self::ProblemsBySv),
            9 => Some(Self::Problems),
            10 => Some(Self::Url),
            _ => None,
        }
    }
}

impl FromStr for WidgetKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown widget type: {s}"))
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw widget field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetField {
    #[serde(rename = "type", with = "wire::numeric")]
    pub field_type: i32,
    pub name: String,
    pub value: Value,
}

impl WidgetField {
    fn new(field_type: i32, name: &str, value: &str) -> Self {
        Self {
            field_type,
            name: name.to_string(),
            value: Value::String(value.to_string()),
        }
    }
}

/// Typed widget payload, keyed by widget kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetContent {
    Graph { graph_id: String },
    PlainText { text: String },
    Url { url: String },
    Clock,
    Sysmap,
    TriggerInfo,
    TriggerOver,
    ProblemsBySv,
    Problems,
}

impl WidgetContent {
    pub fn kind(&self) -> WidgetKind {
        match self {
            Self::Graph { .. } => WidgetKind::Graph,
            Self::PlainText { .. } => WidgetKind::PlainText,
            Self::Url { .. } => WidgetKind::Url,
            Self::Clock => WidgetKind::Clock,
            Self::Sysmap => WidgetKind::Sysmap,
            Self::TriggerInfo => WidgetKind::TriggerInfo,
            Self::TriggerOver => WidgetKind::TriggerOver,
            Self::ProblemsBySv => WidgetKind::ProblemsBySv,
            Self::Problems => WidgetKind::Problems,
        }
    }

    /// Flatten into wire fields. Empty values produce no field.
    pub fn to_fields(&self) -> Vec<WidgetField> {
        match self {
            Self::Graph { graph_id } if !graph_id.is_empty() => {
                vec![WidgetField::new(FIELD_GRAPH, "graphid", graph_id)]
            }
            Self::PlainText { text } if !text.is_empty() => {
                vec![WidgetField::new(FIELD_STRING, "text", text)]
            }
            Self::Url { url } if !url.is_empty() => {
                vec![WidgetField::new(FIELD_STRING, "url", url)]
            }
            _ => Vec::new(),
        }
    }

    /// Read the typed payload back from wire fields. Unknown fields are ignored.
    pub fn from_fields(kind: WidgetKind, fields: &[WidgetField]) -> Self {
        let find = |name: &str| {
            fields
                .iter()
                .find(|f| f.name == name)
                .and_then(|f| crate::client::id_string(&f.value))
                .unwrap_or_default()
        };

        match kind {
            WidgetKind::Graph => Self::Graph {
                graph_id: find("graphid"),
            },
            WidgetKind::PlainText => Self::PlainText { text: find("text") },
            WidgetKind::Url => Self::Url { url: find("url") },
            WidgetKind::Clock => Self::Clock,
            WidgetKind::Sysmap => Self::Sysmap,
            WidgetKind::TriggerInfo => Self::TriggerInfo,
            WidgetKind::TriggerOver => Self::TriggerOver,
            WidgetKind::ProblemsBySv => Self::ProblemsBySv,
            WidgetKind::Problems => Self::Problems,
        }
    }
}

/// A widget as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(rename = "widgetid", default, skip_serializing_if = "Option::is_none")]
    pub widget_id: Option<String>,
    #[serde(rename = "type", with = "wire::code")]
    pub kind: WidgetKind,
    #[serde(default)]
    pub name: String,
    #[serde(with = "wire::numeric")]
    pub x: u32,
    #[serde(with = "wire::numeric")]
    pub y: u32,
    #[serde(with = "wire::numeric")]
    pub width: u32,
    #[serde(with = "wire::numeric")]
    pub height: u32,
    #[serde(with = "wire::numeric", default)]
    pub view_mode: u8,
    #[serde(default)]
    pub fields: Vec<WidgetField>,
}

impl Widget {
    pub fn new(name: impl Into<String>, content: &WidgetContent) -> Self {
        Self {
            widget_id: None,
            kind: content.kind(),
            name: name.into(),
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            view_mode: 0,
            fields: content.to_fields(),
        }
    }

    pub fn at(mut self, x: u32, y: u32, width: u32, height: u32) -> Self {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self
    }

    pub fn content(&self) -> WidgetContent {
        WidgetContent::from_fields(self.kind, &self.fields)
    }
}

fn default_display_period() -> u32 {
    30
}

/// One page of a dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardPage {
    #[serde(
        rename = "dashboard_pageid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub page_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(with = "wire::numeric", default = "default_display_period")]
    pub display_period: u32,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

impl DashboardPage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            page_id: None,
            name: name.into(),
            display_period: default_display_period(),
            widgets: Vec::new(),
        }
    }
}

/// A dashboard as sent to and returned by `dashboard.*`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    #[serde(rename = "dashboardid", default, skip_serializing_if = "Option::is_none")]
    pub dashboard_id: Option<String>,
    pub name: String,
    #[serde(rename = "userid", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub pages: Vec<DashboardPage>,
}

impl Dashboard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            dashboard_id: None,
            name: name.into(),
            owner: None,
            pages: Vec::new(),
        }
    }
}

impl Client {
    pub fn dashboards_get(&self, params: Value) -> Result<Vec<Dashboard>> {
        self.call(&ObjectKind::Dashboard.method("get"), params)
    }

    /// Fetch one dashboard with its pages; `None` if it does not exist.
    pub fn dashboard_get(&self, dashboard_id: &str) -> Result<Option<Dashboard>> {
        let mut dashboards = self.dashboards_get(json!({
            "dashboardids": [dashboard_id],
            "output": "extend",
            "selectPages": "extend",
        }))?;

        match dashboards.len() {
            0 => Ok(None),
            1 => Ok(dashboards.pop()),
            n => Err(Error::InvalidResponse(format!(
                "expected one dashboard with id {dashboard_id}, got {n}"
            ))),
        }
    }

    /// Create dashboards; returns the new ids in input order.
    pub fn dashboards_create(&self, dashboards: &[Dashboard]) -> Result<Vec<String>> {
        let result: Value = self.call(&ObjectKind::Dashboard.method("create"), dashboards)?;
        let ids = ids_from_result(&result, ObjectKind::Dashboard.ids_key());
        if ids.len() != dashboards.len() {
            return Err(Error::InvalidResponse(format!(
                "number of created dashboard ids ({}) does not match input dashboards ({})",
                ids.len(),
                dashboards.len()
            )));
        }
        log::debug!("Created dashboards {:?}", ids);
        Ok(ids)
    }

    pub fn dashboards_update(&self, dashboards: &[Dashboard]) -> Result<()> {
        if let Some(d) = dashboards.iter().find(|d| d.dashboard_id.is_none()) {
            return Err(Error::Other(format!("dashboard {} has no id to update", d.name)));
        }
        let _: Value = self.call(&ObjectKind::Dashboard.method("update"), dashboards)?;
        Ok(())
    }

    pub fn dashboards_delete(&self, dashboard_ids: &[String]) -> Result<()> {
        self.delete_objects(ObjectKind::Dashboard, dashboard_ids)?;
        Ok(())
    }
}
