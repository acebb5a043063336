//! Connection handling for the `SQLite` repository.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Acquires the connection lock, recovering from poison.
///
/// A panic inside a previous critical section leaves the connection itself
/// usable, so the inner value is taken over and a warning is logged.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection for a maintenance run.
///
/// - **WAL mode** so readers outside the run are not blocked
/// - **NORMAL synchronous**
/// - **`busy_timeout`** of 5 seconds for lock contention
/// - **foreign keys off**: the repository tables carry no declared foreign
///   keys, and orphaned rows must stay loadable
///
/// # Errors
///
/// Returns [`Error::Repository`] if a pragma cannot be applied.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row ("wal" or "memory"), so its result is ignored
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(|e| Error::repository("configure_connection", e))?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .map_err(|e| Error::repository("configure_connection", e))?;
    conn.pragma_update(None, "foreign_keys", "OFF")
        .map_err(|e| Error::repository("configure_connection", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_lock_success() {
        let mutex = Mutex::new(42);
        let guard = acquire_lock(&mutex);
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_acquire_lock_recovers_from_poison() {
        let mutex = Arc::new(Mutex::new(0));
        let poisoner = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the mutex");
        })
        .join();

        assert!(mutex.is_poisoned());
        let mut guard = acquire_lock(&mutex);
        *guard += 1;
        assert_eq!(*guard, 1);
    }

    #[test]
    fn test_configure_connection() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();

        let timeout: i64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000);
    }
}
