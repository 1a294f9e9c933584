//! Graph models and `graph.*` verbs

use crate::client::{Client, ids_from_result};
use crate::error::{Error, Result};
use crate::object::ObjectKind;
use crate::wire::{self, WireCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// Graph layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphType {
    #[default]
    Normal,
    Stacked,
    Pie,
    Exploded,
}

impl GraphType {
    pub fn all() -> &'static [GraphType] {
        &[Self::Normal, Self::Stacked, Self::Pie, Self::Exploded]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Stacked => "stacked",
            Self::Pie => "pie",
            Self::Exploded => "exploded",
        }
    }
}

impl WireCode for GraphType {
    fn code(&self) -> i32 {
        match self {
            Self::Normal => 0,
            Self::Stacked => 1,
            Self::Pie => 2,
            Self::Exploded => 3,
        }
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Stacked),
            2 => Some(Self::Pie),
            3 => Some(Self::Exploded),
            _ => None,
        }
    }
}

impl FromStr for GraphType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown graph type: {s}"))
    }
}

impl fmt::Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a graph item's series is drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawType {
    #[default]
    Line,
    FilledRegion,
    BoldLine,
    Dot,
    DashedLine,
    GradientLine,
}

impl DrawType {
    pub fn all() -> &'static [DrawType] {
        &[
            Self::Line,
            Self::FilledRegion,
            Self::BoldLine,
            Self::Dot,
            Self::DashedLine,
            Self::GradientLine,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::FilledRegion => "filled_region",
            Self::BoldLine => "bold_line",
            Self::Dot => "dot",
            Self::DashedLine => "dashed_line",
            Self::GradientLine => "gradient_line",
        }
    }
}

impl WireCode for DrawType {
    fn code(&self) -> i32 {
        match self {
            Self::Line => 0,
            Self::FilledRegion => 1,
            Self::BoldLine => 2,
            Self::Dot => 3,
            Self::DashedLine => 4,
            Self::GradientLine => 5,
        }
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Line),
            1 => Some(Self::FilledRegion),
            2 => Some(Self::BoldLine),
            3 => Some(Self::Dot),
            4 => Some(Self::DashedLine),
            5 => Some(Self::GradientLine),
            _ => None,
        }
    }
}

impl FromStr for DrawType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown draw type: {s}"))
    }
}

impl fmt::Display for DrawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Y axis a graph item is plotted against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YAxisSide {
    #[default]
    Left,
    Right,
}

impl YAxisSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl WireCode for YAxisSide {
    fn code(&self) -> i32 {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            _ => None,
        }
    }
}

impl FromStr for YAxisSide {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(format!("unknown y axis side: {other}")),
        }
    }
}

impl fmt::Display for YAxisSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One series on a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphItem {
    #[serde(rename = "itemid")]
    pub item_id: String,
    pub color: String,
    /// Aggregation function; 2 is average
    #[serde(with = "wire::numeric", default = "default_calc_fnc")]
    pub calc_fnc: u8,
    #[serde(rename = "type", with = "wire::numeric", default)]
    pub item_type: u8,
    #[serde(rename = "drawtype", with = "wire::code", default)]
    pub draw_type: DrawType,
    #[serde(rename = "yaxisside", with = "wire::code", default)]
    pub y_axis_side: YAxisSide,
}

fn default_calc_fnc() -> u8 {
    2
}

impl GraphItem {
    pub fn new(item_id: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            color: color.into(),
            calc_fnc: default_calc_fnc(),
            item_type: 0,
            draw_type: DrawType::default(),
            y_axis_side: YAxisSide::default(),
        }
    }
}

/// A graph as sent to and returned by `graph.*`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(rename = "graphid", default, skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,
    pub name: String,
    #[serde(with = "wire::numeric")]
    pub width: u32,
    #[serde(with = "wire::numeric")]
    pub height: u32,
    #[serde(with = "wire::text")]
    pub yaxismin: String,
    #[serde(with = "wire::text")]
    pub yaxismax: String,
    #[serde(with = "wire::text")]
    pub percent_left: String,
    #[serde(with = "wire::text")]
    pub percent_right: String,
    #[serde(rename = "graphtype", with = "wire::code")]
    pub graph_type: GraphType,
    #[serde(with = "wire::flag")]
    pub show_work_period: bool,
    #[serde(with = "wire::flag")]
    pub show_triggers: bool,
    #[serde(with = "wire::flag")]
    pub show_legend: bool,
    #[serde(with = "wire::flag")]
    pub show_3d: bool,
    #[serde(rename = "gitems", default)]
    pub items: Vec<GraphItem>,
}

impl Graph {
    /// A graph with the frontend's usual defaults
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph_id: None,
            name: name.into(),
            width: 900,
            height: 200,
            yaxismin: "0".to_string(),
            yaxismax: "100".to_string(),
            percent_left: "0".to_string(),
            percent_right: "0".to_string(),
            graph_type: GraphType::Normal,
            show_work_period: true,
            show_triggers: true,
            show_legend: true,
            show_3d: false,
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: GraphItem) -> Self {
        self.items.push(item);
        self
    }
}

impl Client {
    pub fn graphs_get(&self, params: Value) -> Result<Vec<Graph>> {
        self.call(&ObjectKind::Graph.method("get"), params)
    }

    /// Fetch one graph with its items; `None` if it does not exist.
    pub fn graph_get(&self, graph_id: &str) -> Result<Option<Graph>> {
        let mut graphs = self.graphs_get(json!({
            "graphids": [graph_id],
            "output": "extend",
            "selectGraphItems": "extend",
        }))?;

        match graphs.len() {
            0 => Ok(None),
            1 => Ok(graphs.pop()),
            n => Err(Error::InvalidResponse(format!(
                "expected one graph with id {graph_id}, got {n}"
            ))),
        }
    }

    /// Create graphs; returns the new ids in input order.
    pub fn graphs_create(&self, graphs: &[Graph]) -> Result<Vec<String>> {
        let result: Value = self.call(&ObjectKind::Graph.method("create"), graphs)?;
        let ids = ids_from_result(&result, ObjectKind::Graph.ids_key());
        if ids.len() != graphs.len() {
            return Err(Error::InvalidResponse(format!(
                "number of created graph ids ({}) does not match input graphs ({})",
                ids.len(),
                graphs.len()
            )));
        }
        log::debug!("Created graphs {:?}", ids);
        Ok(ids)
    }

    pub fn graphs_update(&self, graphs: &[Graph]) -> Result<()> {
        if let Some(graph) = graphs.iter().find(|g| g.graph_id.is_none()) {
            return Err(Error::Other(format!("graph {} has no id to update", graph.name)));
        }
        let _: Value = self.call(&ObjectKind::Graph.method("update"), graphs)?;
        Ok(())
    }

    pub fn graphs_delete(&self, graph_ids: &[String]) -> Result<()> {
        self.delete_objects(ObjectKind::Graph, graph_ids)?;
        Ok(())
    }
}
