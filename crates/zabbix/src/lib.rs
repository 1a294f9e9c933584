//! # zabbix
//!
//! Blocking client for the Zabbix JSON-RPC API.
//!
//! This crate provides:
//! - Authentication with an API token or `user.login`
//! - Generic id listing and deletion for items, triggers and discovery rules
//! - Typed graph and dashboard models with their `get`/`create`/`update`/`delete` verbs
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use zabbix::{Client, ClientConfig, Credentials, Graph, GraphItem, ObjectKind};
//!
//! let client = Client::connect(&ClientConfig {
//!     url: "https://zabbix.example.com".to_string(),
//!     credentials: Credentials::Token("2f6d...".to_string()),
//!     timeout: Duration::from_secs(30),
//! })?;
//!
//! let items = client.object_ids(
//!     ObjectKind::Item,
//!     serde_json::json!({"hostids": "10084", "inherited": true}),
//! )?;
//! println!("{} inherited items", items.len());
//!
//! let graph = Graph::new("CPU load").with_item(GraphItem::new("23296", "1A7C11"));
//! let ids = client.graphs_create(&[graph])?;
//! # Ok::<(), zabbix::Error>(())
//! ```

pub mod client;
pub mod dashboard;
pub mod error;
pub mod graph;
pub mod object;
pub mod wire;

pub use client::{Client, ClientConfig, Credentials, HttpTransport, MockTransport, Transport};
pub use dashboard::{Dashboard, DashboardPage, Widget, WidgetContent, WidgetField, WidgetKind};
pub use error::{Error, ErrorCategory, Result};
pub use graph::{DrawType, Graph, GraphItem, GraphType, YAxisSide};
pub use object::ObjectKind;
pub use wire::WireCode;
