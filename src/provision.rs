//! Idempotent database creation over an [`Opener`]

use crate::driver::Opener;
use crate::protocol::constants::sqlstate;
use crate::{Error, Result};

/// Create each database in `names` that does not exist yet
///
/// Statements run on one handle to `maintenance_db`. A database that already
/// exists is skipped; any other failure stops provisioning and is returned.
/// Returns the names that were actually created.
///
/// # Examples
///
/// ```no_run
/// # async fn example(opener: fraiseql_tunnel::TunnelOpener<fraiseql_tunnel::PgDriver>) -> fraiseql_tunnel::Result<()> {
/// use fraiseql_tunnel::provision::ensure_databases;
///
/// let created = ensure_databases(&opener, "postgres", ["concourse", "uaa", "credhub"]).await?;
/// println!("created: {:?}", created);
/// # Ok(())
/// # }
/// ```
pub async fn ensure_databases<O, I, S>(opener: &O, maintenance_db: &str, names: I) -> Result<Vec<String>>
where
    O: Opener,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let db = opener.open(maintenance_db)?;
    let mut created = Vec::new();

    for name in names {
        let name = name.as_ref();
        let sql = format!("CREATE DATABASE {}", quote_identifier(name)?);
        match db.execute(&sql).await {
            Ok(_) => {
                tracing::info!(database = name, "database created");
                created.push(name.to_string());
            }
            Err(e) if e.sqlstate() == Some(sqlstate::DUPLICATE_DATABASE) => {
                tracing::debug!(database = name, "database already exists");
            }
            Err(e) => {
                if let Err(close_err) = db.close().await {
                    tracing::debug!(error = %close_err, "close after failed provisioning");
                }
                return Err(e);
            }
        }
    }

    db.close().await?;
    Ok(created)
}

/// Quote `name` as a Postgres identifier
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::Config("identifier must not be empty".into()));
    }
    if name.contains('\0') {
        return Err(Error::Config(format!(
            "identifier '{}' contains a NUL byte",
            name.escape_default()
        )));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Connector, Database, Driver, DriverConnection, ExecResult};
    use crate::protocol::ErrorFields;
    use futures::future::BoxFuture;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct ScriptedDriver {
        executed: Arc<Mutex<Vec<String>>>,
    }

    struct ScriptedConnection {
        executed: Arc<Mutex<Vec<String>>>,
    }

    impl Driver for ScriptedDriver {
        type Connection = ScriptedConnection;

        fn open<'a>(&'a self, _: &'a str) -> BoxFuture<'a, Result<ScriptedConnection>> {
            let executed = Arc::clone(&self.executed);
            Box::pin(async move { Ok(ScriptedConnection { executed }) })
        }
    }

    impl DriverConnection for ScriptedConnection {
        fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<ExecResult>> {
            Box::pin(async move {
                self.executed.lock().unwrap().push(sql.to_string());
                if sql.contains("\"uaa\"") {
                    return Err(Error::Sql(ErrorFields {
                        severity: Some("ERROR".into()),
                        code: Some("42P04".into()),
                        message: Some("database \"uaa\" already exists".into()),
                        ..Default::default()
                    }));
                }
                if sql.contains("\"forbidden\"") {
                    return Err(Error::Sql(ErrorFields {
                        code: Some("42501".into()),
                        message: Some("permission denied to create database".into()),
                        ..Default::default()
                    }));
                }
                Ok(ExecResult::new(vec!["CREATE DATABASE".into()]))
            })
        }

        fn close(self) -> BoxFuture<'static, Result<()>> {
            Box::pin(async { Ok(()) })
        }

        fn is_broken(&self) -> bool {
            false
        }
    }

    struct ScriptedOpener {
        driver: Arc<ScriptedDriver>,
    }

    impl Opener for ScriptedOpener {
        type Driver = ScriptedDriver;

        fn open(&self, name: &str) -> Result<Database<ScriptedDriver>> {
            Ok(Database::new(
                name,
                Connector::new(Arc::clone(&self.driver), format!("postgres://h/{}", name)),
            ))
        }

        fn close(&self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn opener() -> ScriptedOpener {
        ScriptedOpener {
            driver: Arc::new(ScriptedDriver::default()),
        }
    }

    #[tokio::test]
    async fn test_existing_database_is_skipped() {
        let opener = opener();
        let created = ensure_databases(&opener, "postgres", ["concourse", "uaa", "credhub"])
            .await
            .unwrap();

        assert_eq!(created, vec!["concourse", "credhub"]);
        let executed = opener.driver.executed.lock().unwrap().clone();
        assert_eq!(
            executed,
            vec![
                "CREATE DATABASE \"concourse\"",
                "CREATE DATABASE \"uaa\"",
                "CREATE DATABASE \"credhub\"",
            ]
        );
    }

    #[tokio::test]
    async fn test_other_errors_stop_provisioning() {
        let opener = opener();
        let err = ensure_databases(&opener, "postgres", ["forbidden", "credhub"])
            .await
            .unwrap_err();

        assert_eq!(err.sqlstate(), Some("42501"));
        assert_eq!(opener.driver.executed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("uaa").unwrap(), "\"uaa\"");
        assert_eq!(quote_identifier("we\"ird").unwrap(), "\"we\"\"ird\"");
        assert!(quote_identifier("").is_err());
        assert!(quote_identifier("a\0b").is_err());
    }
}
