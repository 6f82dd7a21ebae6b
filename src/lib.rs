//! Prometheus metrics exporter for Zabbix proxy instances.
//!
//! This crate reads operational counters straight out of a Zabbix proxy's
//! embedded SQLite database and exposes them as gauge metrics on an HTTP
//! `/metrics` endpoint for Prometheus to scrape.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  proxy database  │────>│    Collector    │────>│   HTTP Server   │
//! │  (SQLite, RO)    │     │  (per scrape)   │     │   (/metrics)    │
//! └──────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Every scrape opens a fresh read-only connection, runs a fixed set of
//! queries, and streams one metric family per query. Nothing is cached
//! between scrapes; each response is a point-in-time snapshot.
//!
//! # Usage
//!
//! Run the exporter binary next to a Zabbix proxy:
//!
//! ```bash
//! zabbix-proxy-exporter --proxy-config /etc/zabbix/zabbix_proxy.conf
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for the exporter's own options. The
//! database location and instance hostname come from the proxy's
//! configuration file, see [`proxy::ProxySettings`].

pub mod collector;
pub mod config;
pub mod exposition;
pub mod http;
pub mod proxy;

pub use collector::{MetricFamily, ProxyCollector, Sample, SharedCollector};
pub use config::ExporterConfig;
pub use http::HttpServer;
pub use proxy::ProxySettings;
