//! Table of open connections.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use vox_core::ConnId;

use crate::connection::ClientConnection;

/// Open connections indexed by id.
pub struct ConnectionTable {
    connections: RwLock<HashMap<ConnId, Arc<ClientConnection>>>,
}

impl ConnectionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by id. Returns the removed connection.
    pub async fn remove(&self, id: &ConnId) -> Option<Arc<ClientConnection>> {
        self.connections.write().await.remove(id)
    }

    /// Look up a connection by id.
    pub async fn get(&self, id: &ConnId) -> Option<Arc<ClientConnection>> {
        self.connections.read().await.get(id).cloned()
    }

    /// Number of open connections.
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Close every connection.
    pub async fn close_all(&self) {
        for conn in self.connections.read().await.values() {
            conn.close();
        }
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_connection(id: &str) -> Arc<ClientConnection> {
        let (tx, _rx) = mpsc::channel(4);
        Arc::new(ClientConnection::with_id(ConnId::from(id), tx))
    }

    #[tokio::test]
    async fn add_get_remove() {
        let table = ConnectionTable::new();
        table.add(make_connection("conn_a")).await;
        table.add(make_connection("conn_b")).await;
        assert_eq!(table.count().await, 2);

        let id = ConnId::from("conn_a");
        assert!(table.get(&id).await.is_some());
        assert!(table.remove(&id).await.is_some());
        assert!(table.get(&id).await.is_none());
        assert!(table.remove(&id).await.is_none());
        assert_eq!(table.count().await, 1);
    }

    #[tokio::test]
    async fn close_all_signals_each_connection() {
        let table = ConnectionTable::new();
        let a = make_connection("conn_a");
        table.add(Arc::clone(&a)).await;
        table.close_all().await;
        assert!(a.is_closed());
    }
}
