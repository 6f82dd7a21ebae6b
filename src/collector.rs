//! The collection engine: one scrape, one database connection, five queries.

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::proxy::ProxySettings;

/// Label carried by every sample, identifying the proxy instance.
const HOST_LABEL: &str = "host";

/// A named group of gauge samples, ready for exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: &'static str,
    pub help: &'static str,
    pub samples: Vec<Sample>,
}

/// A single labeled gauge value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Label key-value pairs, instance identity first.
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

/// The shape of the query backing a metric family.
enum Query {
    /// One row, one (possibly NULL) count. NULL yields an empty family.
    Scalar(&'static str),
    /// `(grouping key, count)` rows, one sample per row with the key
    /// attached under `label`.
    Grouped {
        sql: &'static str,
        label: &'static str,
    },
}

struct MetricDef {
    name: &'static str,
    help: &'static str,
    query: Query,
}

/// The five families produced per cycle, in emission order.
const METRICS: [MetricDef; 5] = [
    MetricDef {
        name: "zbx_proxy_history",
        help: "Number of collected values awaiting upload to the Zabbix server",
        query: Query::Scalar(
            "SELECT max(id) - (SELECT nextid FROM ids WHERE table_name = 'proxy_history' LIMIT 1) \
             FROM proxy_history",
        ),
    },
    MetricDef {
        name: "zbx_proxy_hosts",
        help: "Number of hosts monitored by this proxy",
        query: Query::Scalar("SELECT count(*) FROM hosts WHERE status = 0"),
    },
    MetricDef {
        name: "zbx_items_value_type",
        help: "Number of items grouped by value type",
        query: Query::Grouped {
            sql: "SELECT value_type, count(*) FROM items GROUP BY value_type",
            label: "value_type",
        },
    },
    MetricDef {
        name: "zbx_items_by_type",
        help: "Number of items grouped by item type",
        query: Query::Grouped {
            sql: "SELECT type, count(*) FROM items GROUP BY type",
            label: "type",
        },
    },
    MetricDef {
        name: "zbx_enabled_items",
        help: "Number of enabled items",
        query: Query::Scalar("SELECT count(*) FROM items WHERE status = 0"),
    },
];

/// Stateless metric collector for one proxy database.
///
/// Each [`collect`](ProxyCollector::collect) call runs an independent cycle
/// with its own read-only connection, so concurrent scrapes never share a
/// handle. The only state is the immutable settings captured at startup.
#[derive(Debug, Clone)]
pub struct ProxyCollector {
    db_path: PathBuf,
    hostname: String,
}

/// Shareable collector handle for the HTTP layer.
pub type SharedCollector = Arc<ProxyCollector>;

impl ProxyCollector {
    pub fn new(settings: ProxySettings) -> Self {
        Self {
            db_path: settings.db_path,
            hostname: settings.hostname,
        }
    }

    /// Run one collection cycle, streaming each family as soon as it is
    /// complete. A family produced early is never lost to a failure later
    /// in the cycle.
    ///
    /// Failures stay inside the cycle: an unopenable database yields an
    /// empty stream, a failed query yields that family with no samples.
    /// The caller only ever sees fewer metrics, never an error.
    pub fn collect(&self) -> mpsc::Receiver<MetricFamily> {
        let (tx, rx) = mpsc::channel(METRICS.len());
        let collector = self.clone();
        tokio::spawn(async move { collector.run_cycle(tx).await });
        rx
    }

    /// Check that the database can be opened, for readiness probes.
    pub async fn probe(&self) -> bool {
        match self.open().await {
            Ok(conn) => {
                let _ = conn.close().await;
                true
            }
            Err(_) => false,
        }
    }

    async fn run_cycle(&self, tx: mpsc::Sender<MetricFamily>) {
        debug!(db = %self.db_path.display(), "starting collection cycle");

        let mut conn = match self.open().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(
                    db = %self.db_path.display(),
                    error = %err,
                    "cannot open proxy database, skipping cycle"
                );
                return;
            }
        };

        for def in &METRICS {
            let samples = match self.run_query(&mut conn, &def.query).await {
                Ok(samples) => samples,
                Err(err) => {
                    warn!(metric = def.name, error = %err, "query failed, emitting empty family");
                    Vec::new()
                }
            };
            let family = MetricFamily {
                name: def.name,
                help: def.help,
                samples,
            };
            if tx.send(family).await.is_err() {
                // Receiver is gone; stop querying but still close below.
                break;
            }
        }

        if let Err(err) = conn.close().await {
            debug!(error = %err, "error closing proxy database");
        }
        debug!(db = %self.db_path.display(), "collection cycle done");
    }

    async fn open(&self) -> Result<SqliteConnection, sqlx::Error> {
        // Read-only: the proxy process owns the schema and writes to it
        // concurrently; we must never take a write lock.
        SqliteConnectOptions::new()
            .filename(&self.db_path)
            .read_only(true)
            .connect()
            .await
    }

    async fn run_query(
        &self,
        conn: &mut SqliteConnection,
        query: &Query,
    ) -> Result<Vec<Sample>, sqlx::Error> {
        match query {
            Query::Scalar(sql) => {
                let value: Option<i64> = sqlx::query_scalar(sql).fetch_one(&mut *conn).await?;
                Ok(value.map(|v| self.sample(None, v)).into_iter().collect())
            }
            Query::Grouped { sql, label } => {
                let rows: Vec<(i64, i64)> = sqlx::query_as(sql).fetch_all(&mut *conn).await?;
                Ok(rows
                    .into_iter()
                    .map(|(key, count)| self.sample(Some((*label, key.to_string())), count))
                    .collect())
            }
        }
    }

    fn sample(&self, group: Option<(&'static str, String)>, value: i64) -> Sample {
        let mut labels = vec![(HOST_LABEL, self.hostname.clone())];
        labels.extend(group);
        Sample {
            labels,
            value: value as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_collector() -> ProxyCollector {
        ProxyCollector::new(ProxySettings {
            db_path: PathBuf::from("/tmp/proxy.db"),
            hostname: "proxy01".to_string(),
        })
    }

    #[test]
    fn test_scalar_sample_carries_host_label() {
        let collector = make_collector();
        let sample = collector.sample(None, 42);

        assert_eq!(sample.labels, vec![("host", "proxy01".to_string())]);
        assert_eq!(sample.value, 42.0);
    }

    #[test]
    fn test_grouped_sample_carries_grouping_label() {
        let collector = make_collector();
        let sample = collector.sample(Some(("value_type", "3".to_string())), 7);

        assert_eq!(
            sample.labels,
            vec![
                ("host", "proxy01".to_string()),
                ("value_type", "3".to_string()),
            ]
        );
        assert_eq!(sample.value, 7.0);
    }

    #[test]
    fn test_negative_values_pass_through() {
        // A backlog pointer past max(id) is a diagnostic signal, not an
        // error, and must not be clamped.
        let collector = make_collector();
        let sample = collector.sample(None, -95);

        assert_eq!(sample.value, -95.0);
    }

    #[test]
    fn test_metric_definitions_are_stable() {
        let names: Vec<&str> = METRICS.iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            vec![
                "zbx_proxy_history",
                "zbx_proxy_hosts",
                "zbx_items_value_type",
                "zbx_items_by_type",
                "zbx_enabled_items",
            ]
        );
    }
}
