//! PostgreSQL connection layer.
//!
//! [`Endpoint`] describes where to connect; [`PgSession`] owns a pooled
//! connection set and implements both [`SourceSession`] and
//! [`TargetSession`] on top of the COPY protocol.

mod tls;

pub use tls::{SslMode, TlsBuilder};

use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::{SinkExt, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_postgres::config::Host;
use tokio_postgres::{Config as PgConfig, CopyInSink, NoTls};
use tracing::{debug, info, warn};

use crate::conduit::{ConduitReader, ConduitWriter};
use crate::config::DatabaseConfig;
use crate::error::{CopyError, Result};
use crate::session::{SourceSession, TargetSession};

/// Connections per pool. One table copy holds one connection per side.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

const COLUMNS_QUERY: &str = r#"
    SELECT column_name
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position
"#;

static SSLMODE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"sslmode=([A-Za-z-]+)").expect("sslmode pattern is valid"));

/// Where and how to connect to one database.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Driver configuration (host, port, credentials).
    pub pg: PgConfig,
    /// Requested TLS behaviour, including verify modes the driver lacks.
    pub ssl_mode: SslMode,
}

impl Endpoint {
    /// Parse a key/value (`host=.. dbname=..`) or URL connection string.
    ///
    /// `verify-ca`, `verify-full` and `allow` are accepted for `sslmode`
    /// even though tokio-postgres does not parse them.
    pub fn from_connection_string(conn: &str) -> Result<Self> {
        let requested = match SSLMODE_PARAM.captures(conn) {
            Some(caps) => Some(SslMode::parse(&caps[1])?),
            None => None,
        };

        let normalized = match requested {
            Some(mode) => SSLMODE_PARAM
                .replace(conn, format!("sslmode={}", mode.driver_keyword()).as_str())
                .into_owned(),
            None => conn.to_string(),
        };

        let pg = PgConfig::from_str(&normalized)
            .map_err(|e| CopyError::Config(format!("failed to parse connection string: {}", e)))?;
        let ssl_mode = requested.unwrap_or_else(|| SslMode::from_driver_mode(pg.get_ssl_mode()));

        Ok(Self { pg, ssl_mode })
    }

    /// Build from a configuration file section.
    pub fn from_database_config(db: &DatabaseConfig) -> Result<Self> {
        let ssl_mode = SslMode::parse(&db.ssl_mode)?;

        let mut pg = PgConfig::new();
        pg.host(&db.host);
        pg.port(db.port);
        pg.dbname(&db.database);
        pg.user(&db.username);
        if !db.password.is_empty() {
            pg.password(&db.password);
        }
        pg.ssl_mode(ssl_mode.driver_mode());

        Ok(Self { pg, ssl_mode })
    }

    /// `host:port/dbname` with no credentials, safe to log.
    pub fn describe(&self) -> String {
        #[allow(unreachable_patterns)]
        let hosts: Vec<String> = self
            .pg
            .get_hosts()
            .iter()
            .map(|h| match h {
                Host::Tcp(name) => name.clone(),
                other => format!("{:?}", other),
            })
            .collect();
        let port = self
            .pg
            .get_ports()
            .first()
            .copied()
            .unwrap_or(5432);
        format!(
            "{}:{}/{}",
            hosts.join(","),
            port,
            self.pg.get_dbname().unwrap_or_default()
        )
    }
}

/// Pooled PostgreSQL connections for one side of a copy.
pub struct PgSession {
    pool: Pool,
    label: &'static str,
    description: String,
}

impl PgSession {
    /// Create a pool for `endpoint` and verify it with a ping.
    ///
    /// `label` ("source" / "target") is used in logs and error context.
    pub async fn connect(endpoint: &Endpoint, label: &'static str) -> Result<Self> {
        Self::connect_with_max(endpoint, label, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Like [`PgSession::connect`] with an explicit pool size.
    pub async fn connect_with_max(
        endpoint: &Endpoint,
        label: &'static str,
        max_conns: usize,
    ) -> Result<Self> {
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match TlsBuilder::new(endpoint.ssl_mode).build()? {
            None => {
                warn!("{} database TLS is disabled. Credentials will be transmitted in plaintext.", label);
                let mgr = Manager::from_config(endpoint.pg.clone(), NoTls, mgr_config);
                Pool::builder(mgr).max_size(max_conns).build()
            }
            Some(tls) => {
                let mgr = Manager::from_config(endpoint.pg.clone(), tls, mgr_config);
                Pool::builder(mgr).max_size(max_conns).build()
            }
        }
        .map_err(|e| CopyError::pool(e, format!("creating {} pool", label)))?;

        let client = pool
            .get()
            .await
            .map_err(|e| CopyError::pool(e, format!("connecting to {} database", label)))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| CopyError::pool(e, format!("pinging {} database", label)))?;

        let description = endpoint.describe();
        info!(database = %description, "{} database connection established", label);

        Ok(Self {
            pool,
            label,
            description,
        })
    }

    /// Close all connections.
    pub fn close(&self) {
        self.pool.close();
        info!(database = %self.description, "{} database connection closed", self.label);
    }
}

#[async_trait]
impl SourceSession for PgSession {
    async fn table_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let full_name = format!("{}.{}", schema, table);
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CopyError::catalog(&full_name, e))?;

        let rows = client
            .query(COLUMNS_QUERY, &[&schema, &table])
            .await
            .map_err(|e| CopyError::catalog(&full_name, e))?;

        let columns: Vec<String> = rows.iter().map(|row| row.get::<_, String>(0)).collect();
        debug!("Found {} catalog columns for {}", columns.len(), full_name);
        Ok(columns)
    }

    async fn copy_out(&self, statement: &str, writer: &mut ConduitWriter) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CopyError::extraction(format!("acquiring source connection: {}", e)))?;

        let stream = client
            .copy_out(statement)
            .await
            .map_err(CopyError::extraction)?;
        futures::pin_mut!(stream);

        let mut bytes_out = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(CopyError::extraction)?;
            bytes_out += chunk.len() as u64;
            writer.write(chunk).await?;
        }

        Ok(bytes_out)
    }
}

#[async_trait]
impl TargetSession for PgSession {
    async fn execute(&self, statement: &str) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CopyError::pool(e, format!("getting {} connection", self.label)))?;

        Ok(client.execute(statement, &[]).await?)
    }

    async fn copy_in(&self, statement: &str, reader: &mut ConduitReader) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| CopyError::load(format!("acquiring target connection: {}", e)))?;

        let sink: CopyInSink<Bytes> = client
            .copy_in(statement)
            .await
            .map_err(CopyError::load)?;
        futures::pin_mut!(sink);

        // Returning early drops the sink unfinished, which aborts the COPY.
        while let Some(chunk) = reader.read().await? {
            sink.send(chunk).await.map_err(CopyError::load)?;
        }

        sink.finish().await.map_err(CopyError::load)
    }
}
