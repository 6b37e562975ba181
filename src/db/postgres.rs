use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row as PgRow};
use tracing::{trace, warn};

use super::driver::{Driver, Row};
use crate::ast::{CompiledQuery, Value};
use crate::error::DriverError;

type Param = Box<dyn ToSql + Sync + Send>;

/// [`Driver`] backed by a `tokio-postgres` client.
///
/// Values are bound using the parameter types PostgreSQL reports for the
/// prepared statement, so an `Int` bound to an `int4` column is sent as an
/// `i32`.
pub struct PostgresDriver {
    client: Client,
}

impl PostgresDriver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect without TLS. The connection task is spawned on the current
    /// tokio runtime.
    pub async fn connect(conn_string: &str) -> Result<Self, DriverError> {
        let timeout = Duration::from_secs(15);
        let (client, connection) =
            tokio::time::timeout(timeout, tokio_postgres::connect(conn_string, NoTls))
                .await
                .map_err(|_| DriverError::msg("Connection timed out after 15s"))??;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection error");
            }
        });
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Driver for PostgresDriver {
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Row>, DriverError> {
        let stmt = self.client.prepare(&query.sql).await?;

        let params = stmt
            .params()
            .iter()
            .zip(&query.bindings)
            .map(|(ty, value)| encode_param(value, ty))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let rows = self.client.query(&stmt, &refs).await?;
        trace!(rows = rows.len(), "postgres query returned");
        rows.iter().map(decode_row).collect()
    }
}

/// Convert a bound value into something `tokio-postgres` can serialize as
/// `ty`.
fn encode_param(value: &Value, ty: &Type) -> Result<Param, DriverError> {
    let param: Param = match value {
        Value::Null => null_param(ty),
        Value::Bool(b) => Box::new(*b),
        Value::Int(i) => match *ty {
            Type::INT2 => Box::new(
                i16::try_from(*i).map_err(|_| DriverError::msg(format!("{i} out of range for int2")))?,
            ),
            Type::INT4 => Box::new(
                i32::try_from(*i).map_err(|_| DriverError::msg(format!("{i} out of range for int4")))?,
            ),
            Type::FLOAT4 => Box::new(*i as f32),
            Type::FLOAT8 => Box::new(*i as f64),
            _ => Box::new(*i),
        },
        Value::Float(f) => match *ty {
            Type::FLOAT4 => Box::new(*f as f32),
            _ => Box::new(*f),
        },
        Value::Text(s) => Box::new(s.clone()),
        Value::Bytes(b) => Box::new(b.clone()),
        Value::Date(d) => Box::new(*d),
        Value::Time(t) => Box::new(*t),
        Value::Timestamp(ts) => match *ty {
            Type::TIMESTAMPTZ => Box::new(ts.and_utc()),
            _ => Box::new(*ts),
        },
        Value::Json(j) => Box::new(j.clone()),
    };
    Ok(param)
}

/// `NULL` still has to be typed for the wire protocol.
fn null_param(ty: &Type) -> Param {
    match *ty {
        Type::BOOL => Box::new(None::<bool>),
        Type::INT2 => Box::new(None::<i16>),
        Type::INT4 => Box::new(None::<i32>),
        Type::INT8 => Box::new(None::<i64>),
        Type::FLOAT4 => Box::new(None::<f32>),
        Type::FLOAT8 => Box::new(None::<f64>),
        Type::BYTEA => Box::new(None::<Vec<u8>>),
        Type::DATE => Box::new(None::<NaiveDate>),
        Type::TIME => Box::new(None::<NaiveTime>),
        Type::TIMESTAMP => Box::new(None::<NaiveDateTime>),
        Type::TIMESTAMPTZ => Box::new(None::<DateTime<Utc>>),
        Type::JSON | Type::JSONB => Box::new(None::<serde_json::Value>),
        _ => Box::new(None::<String>),
    }
}

fn decode_row(row: &PgRow) -> Result<Row, DriverError> {
    let fields = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| extract_value(row, idx, col.name(), col.type_()).map(|v| (col.name(), v)))
        .collect::<Result<Vec<_>, DriverError>>()?;
    Ok(Row::from_pairs(fields))
}

/// Whether `extract_value` has a Rust type for this column.
fn is_decodable(pg_type: &Type) -> bool {
    matches!(
        *pg_type,
        Type::BOOL
            | Type::INT2
            | Type::INT4
            | Type::INT8
            | Type::FLOAT4
            | Type::FLOAT8
            | Type::BYTEA
            | Type::DATE
            | Type::TIME
            | Type::TIMESTAMP
            | Type::TIMESTAMPTZ
            | Type::JSON
            | Type::JSONB
    ) || <String as FromSql<'_>>::accepts(pg_type)
}

fn undecodable(column: &str, pg_type: &Type) -> DriverError {
    DriverError::msg(format!(
        "column `{column}` has type {pg_type}, which cannot be decoded; cast it to text or float8 in the query"
    ))
}

fn extract_value(row: &PgRow, idx: usize, column: &str, pg_type: &Type) -> Result<Value, DriverError> {
    fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Result<Option<T>, DriverError> {
        Ok(row.try_get::<_, Option<T>>(idx)?)
    }

    if !is_decodable(pg_type) {
        return Err(undecodable(column, pg_type));
    }

    let value = match *pg_type {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT4 => get::<i32>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::Int),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(|v| Value::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Float),
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        Type::DATE => get::<NaiveDate>(row, idx)?.map(Value::Date),
        Type::TIME => get::<NaiveTime>(row, idx)?.map(Value::Time),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.map(Value::Timestamp),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx)?.map(|v| Value::Timestamp(v.naive_utc())),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?.map(Value::Json),
        // Text-like types
        _ => get::<String>(row, idx)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}
