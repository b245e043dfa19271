//! Orphan resource rows as returned by inventory queries.
//!
//! Rows are mapped by column name. Key columns are required and must not be
//! NULL; descriptive columns may be missing from the projection or NULL.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx_core::decode::Decode;
use sqlx_core::error::Error as SqlxError;
use sqlx_core::row::Row;
use sqlx_core::types::Type;
use sqlx_postgres::{PgRow, Postgres};

/// A row type that can be materialized from an inventory query result.
pub trait InventoryRow: Serialize + Send + Sync + Sized + 'static {
    /// Decodes one row.
    fn from_row(row: &PgRow) -> Result<Self, SqlxError>;
}

/// Column accessors over a [`PgRow`].
struct Columns<'r> {
    row: &'r PgRow,
}

impl<'r> Columns<'r> {
    fn new(row: &'r PgRow) -> Self {
        Self { row }
    }

    /// A key column. Missing columns and NULL values are errors.
    fn required<T>(&self, name: &str) -> Result<T, SqlxError>
    where
        T: Decode<'r, Postgres> + Type<Postgres>,
    {
        self.row.try_get(name)
    }

    /// A descriptive column. Missing columns decode to `None`.
    fn optional<T>(&self, name: &str) -> Result<Option<T>, SqlxError>
    where
        T: Decode<'r, Postgres> + Type<Postgres>,
    {
        match self.row.try_get::<Option<T>, _>(name) {
            Ok(value) => Ok(value),
            Err(SqlxError::ColumnNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// A descriptive text column. Missing columns and NULL decode to `""`.
    fn text(&self, name: &str) -> Result<String, SqlxError> {
        Ok(self.optional::<String>(name)?.unwrap_or_default())
    }

    /// A descriptive timestamp column, with or without time zone.
    fn timestamp(&self, name: &str) -> Result<Option<DateTime<Utc>>, SqlxError> {
        match self.optional::<DateTime<Utc>>(name) {
            Ok(value) => Ok(value),
            Err(SqlxError::ColumnDecode { .. }) => Ok(self
                .optional::<NaiveDateTime>(name)?
                .map(|ts| ts.and_utc())),
            Err(e) => Err(e),
        }
    }
}

/// An AWS EC2 instance identified as orphan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrphanVirtualMachineAws {
    pub name: String,
    pub arch: String,
    pub instance_id: String,
    pub instance_type: String,
    pub state: String,
    pub vpc_id: String,
    pub vpc_name: String,
    pub region_name: String,
    pub account_id: String,
    pub subnet_id: String,
    pub platform: String,
    pub image_id: String,
    pub launch_time: Option<DateTime<Utc>>,
}

impl InventoryRow for OrphanVirtualMachineAws {
    fn from_row(row: &PgRow) -> Result<Self, SqlxError> {
        let c = Columns::new(row);
        Ok(Self {
            name: c.text("name")?,
            arch: c.text("arch")?,
            instance_id: c.required("instance_id")?,
            instance_type: c.text("instance_type")?,
            state: c.text("state")?,
            vpc_id: c.required("vpc_id")?,
            vpc_name: c.text("vpc_name")?,
            region_name: c.required("region_name")?,
            account_id: c.required("account_id")?,
            subnet_id: c.text("subnet_id")?,
            platform: c.text("platform")?,
            image_id: c.text("image_id")?,
            launch_time: c.timestamp("launch_time")?,
        })
    }
}

/// A GCP compute instance identified as orphan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrphanVirtualMachineGcp {
    pub name: String,
    pub hostname: String,
    pub instance_id: i64,
    pub project_id: String,
    pub zone: String,
    pub region: String,
    pub status: String,
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl InventoryRow for OrphanVirtualMachineGcp {
    fn from_row(row: &PgRow) -> Result<Self, SqlxError> {
        let c = Columns::new(row);
        Ok(Self {
            name: c.required("name")?,
            hostname: c.text("hostname")?,
            instance_id: c.required("instance_id")?,
            project_id: c.required("project_id")?,
            zone: c.text("zone")?,
            region: c.text("region")?,
            status: c.text("status")?,
            creation_timestamp: c.timestamp("creation_timestamp")?,
        })
    }
}

/// An Azure virtual machine identified as orphan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrphanVirtualMachineAzure {
    pub name: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub location: String,
    pub provisioning_state: String,
    pub power_state: String,
    pub vm_created_at: Option<DateTime<Utc>>,
}

impl InventoryRow for OrphanVirtualMachineAzure {
    fn from_row(row: &PgRow) -> Result<Self, SqlxError> {
        let c = Columns::new(row);
        Ok(Self {
            name: c.required("name")?,
            subscription_id: c.required("subscription_id")?,
            resource_group: c.required("resource_group")?,
            location: c.required("location")?,
            provisioning_state: c.text("provisioning_state")?,
            power_state: c.text("power_state")?,
            vm_created_at: c.timestamp("vm_created_at")?,
        })
    }
}

/// An OpenStack server identified as orphan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrphanVirtualMachineOpenStack {
    pub name: String,
    pub server_id: String,
    pub project_id: String,
    pub domain: String,
    pub region: String,
    pub availability_zone: String,
    pub status: String,
    pub image_id: String,
    pub server_created_at: Option<DateTime<Utc>>,
}

impl InventoryRow for OrphanVirtualMachineOpenStack {
    fn from_row(row: &PgRow) -> Result<Self, SqlxError> {
        let c = Columns::new(row);
        Ok(Self {
            name: c.required("name")?,
            server_id: c.required("server_id")?,
            project_id: c.required("project_id")?,
            domain: c.text("domain")?,
            region: c.text("region")?,
            availability_zone: c.text("availability_zone")?,
            status: c.text("status")?,
            image_id: c.text("image_id")?,
            server_created_at: c.timestamp("server_created_at")?,
        })
    }
}

/// A GCP public address whose forwarding rule is orphan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrphanPublicAddressGcp {
    /// Name of the forwarding rule.
    pub name: String,
    pub project_id: String,
    pub address: String,
    pub address_type: String,
    pub ip_version: String,
    pub region: String,
    pub description: String,
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl InventoryRow for OrphanPublicAddressGcp {
    fn from_row(row: &PgRow) -> Result<Self, SqlxError> {
        let c = Columns::new(row);
        Ok(Self {
            name: c.required("name")?,
            project_id: c.required("project_id")?,
            address: c.text("address")?,
            address_type: c.text("address_type")?,
            ip_version: c.text("ip_version")?,
            region: c.text("region")?,
            description: c.text("description")?,
            creation_timestamp: c.timestamp("creation_timestamp")?,
        })
    }
}
