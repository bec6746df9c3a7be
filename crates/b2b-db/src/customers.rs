//! PostgreSQL customer store.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgListener, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use b2b_core::{
    check_picture_count, defaults, new_v7, Customer, CustomerFields, CustomerPatch, CustomerStore,
    DeleteOutcome, Error, EventActor, EventBus, OwnerId, RecordEvent, Result,
};

const CUSTOMER_COLUMNS: &str = "id, owner_id, first_name, last_name, street_address, city, \
     state, zip, email, phone, notes, pictures, created_at, updated_at";

/// Payload sent on the change channel so other processes can refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeNotice {
    /// Store instance that made the change.
    pub source: Uuid,
    pub owner: OwnerId,
}

/// PostgreSQL implementation of [`CustomerStore`].
pub struct PgCustomerStore {
    pool: PgPool,
    events: Arc<EventBus>,
    max_pictures: usize,
    instance: Uuid,
}

impl PgCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_max_pictures(pool, defaults::MAX_PICTURES)
    }

    pub fn with_max_pictures(pool: PgPool, max_pictures: usize) -> Self {
        Self {
            pool,
            events: Arc::new(EventBus::default()),
            max_pictures,
            instance: Uuid::new_v4(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Identifies this store's own notifications on the change channel.
    pub fn instance_id(&self) -> Uuid {
        self.instance
    }

    /// Start forwarding change notifications from other processes onto this
    /// store's event bus.
    pub async fn listen_for_remote_changes(&self) -> Result<PgChangeListener> {
        PgChangeListener::start(&self.pool, self.events.clone(), self.instance).await
    }

    async fn notify(&self, tx: &mut Transaction<'_, Postgres>, owner: &OwnerId) -> Result<()> {
        let payload = serde_json::to_string(&ChangeNotice {
            source: self.instance,
            owner: owner.clone(),
        })?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(defaults::CHANGE_CHANNEL)
            .bind(payload)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

fn customer_from_row(row: &PgRow) -> Result<Customer> {
    let owner: String = row.try_get("owner_id")?;
    Ok(Customer {
        id: row.try_get("id")?,
        owner: OwnerId::new(owner)?,
        fields: CustomerFields {
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            street_address: row.try_get("street_address")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            zip: row.try_get("zip")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            notes: row.try_get("notes")?,
        },
        pictures: row.try_get("pictures")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CustomerStore for PgCustomerStore {
    async fn list(&self, owner: &OwnerId) -> Result<Vec<Customer>> {
        let start = Instant::now();
        let rows = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        let customers = rows.iter().map(customer_from_row).collect::<Result<Vec<_>>>()?;
        debug!(
            subsystem = "store",
            component = "pg_customers",
            op = "list",
            owner = %owner,
            result_count = customers.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Listed customers"
        );
        Ok(customers)
    }

    async fn get(&self, owner: &OwnerId, id: Uuid) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE owner_id = $1 AND id = $2"
        ))
        .bind(owner.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn create(
        &self,
        owner: &OwnerId,
        fields: CustomerFields,
        pictures: Vec<String>,
    ) -> Result<Uuid> {
        check_picture_count(pictures.len(), self.max_pictures)?;
        let id = new_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO customer (id, owner_id, first_name, last_name, street_address, city, \
             state, zip, email, phone, notes, pictures, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)",
        )
        .bind(id)
        .bind(owner.as_str())
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.street_address)
        .bind(&fields.city)
        .bind(&fields.state)
        .bind(&fields.zip)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.notes)
        .bind(&pictures)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        self.notify(&mut tx, owner).await?;
        tx.commit().await?;

        info!(
            subsystem = "store",
            component = "pg_customers",
            op = "create",
            owner = %owner,
            customer_id = %id,
            "Customer created"
        );
        self.events.emit(RecordEvent::CustomerCreated {
            owner: owner.clone(),
            customer_id: id,
        });
        Ok(id)
    }

    async fn patch(&self, owner: &OwnerId, id: Uuid, patch: CustomerPatch) -> Result<Customer> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE owner_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(owner.as_str())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::CustomerNotFound(id))?;

        let mut customer = customer_from_row(&row)?;
        patch.apply_to(&mut customer, Utc::now(), self.max_pictures)?;

        let f = &customer.fields;
        sqlx::query(
            "UPDATE customer SET first_name = $3, last_name = $4, street_address = $5, \
             city = $6, state = $7, zip = $8, email = $9, phone = $10, notes = $11, \
             pictures = $12, updated_at = $13 WHERE owner_id = $1 AND id = $2",
        )
        .bind(owner.as_str())
        .bind(id)
        .bind(&f.first_name)
        .bind(&f.last_name)
        .bind(&f.street_address)
        .bind(&f.city)
        .bind(&f.state)
        .bind(&f.zip)
        .bind(&f.email)
        .bind(&f.phone)
        .bind(&f.notes)
        .bind(&customer.pictures)
        .bind(customer.updated_at)
        .execute(&mut *tx)
        .await?;
        self.notify(&mut tx, owner).await?;
        tx.commit().await?;

        debug!(
            subsystem = "store",
            component = "pg_customers",
            op = "patch",
            owner = %owner,
            customer_id = %id,
            pictures = customer.pictures.len(),
            "Customer patched"
        );
        self.events.emit(RecordEvent::CustomerUpdated {
            owner: owner.clone(),
            customer_id: id,
        });
        Ok(customer)
    }

    async fn delete(&self, owner: &OwnerId, id: Uuid) -> Result<DeleteOutcome> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM customer WHERE owner_id = $1 AND id = $2")
            .bind(owner.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(DeleteOutcome::AlreadyAbsent);
        }
        self.notify(&mut tx, owner).await?;
        tx.commit().await?;

        info!(
            subsystem = "store",
            component = "pg_customers",
            op = "delete",
            owner = %owner,
            customer_id = %id,
            "Customer deleted"
        );
        self.events.emit(RecordEvent::CustomerDeleted {
            owner: owner.clone(),
            customer_id: id,
        });
        Ok(DeleteOutcome::Removed)
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    fn max_pictures(&self) -> usize {
        self.max_pictures
    }
}

// =============================================================================
// CROSS-PROCESS CHANGES
// =============================================================================

/// Background task forwarding `customer_changes` notifications made by other
/// store instances into a local event bus. Stops when dropped.
pub struct PgChangeListener {
    task: JoinHandle<()>,
}

impl PgChangeListener {
    pub async fn start(pool: &PgPool, events: Arc<EventBus>, instance: Uuid) -> Result<Self> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(defaults::CHANGE_CHANNEL).await?;
        info!(
            subsystem = "store",
            component = "pg_listener",
            channel = defaults::CHANGE_CHANNEL,
            "Listening for remote customer changes"
        );

        let task = tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(n) => n,
                    Err(e) => {
                        // PgListener reconnects on the next recv.
                        warn!(subsystem = "store", component = "pg_listener", error = %e, "Notification receive failed");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        continue;
                    }
                };
                match serde_json::from_str::<ChangeNotice>(notification.payload()) {
                    Ok(notice) if notice.source == instance => {}
                    Ok(notice) => {
                        events.emit_as(
                            RecordEvent::OwnerChanged {
                                owner: notice.owner,
                            },
                            EventActor::system(),
                        );
                    }
                    Err(e) => {
                        warn!(
                            subsystem = "store",
                            component = "pg_listener",
                            error = %e,
                            "Ignoring malformed change notification"
                        );
                    }
                }
            }
        });
        Ok(Self { task })
    }
}

impl Drop for PgChangeListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_notice_json() {
        let notice = ChangeNotice {
            source: Uuid::nil(),
            owner: OwnerId::new("u1").unwrap(),
        };
        let json = serde_json::to_string(&notice).unwrap();
        assert_eq!(
            json,
            r#"{"source":"00000000-0000-0000-0000-000000000000","owner":"u1"}"#
        );
        let back: ChangeNotice = serde_json::from_str(&json).unwrap();
        assert_eq!(back, notice);
    }
}
