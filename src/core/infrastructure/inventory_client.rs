//! The remote side every engine talks to.

use crate::core::domain::{
    error::VcliResult,
    model::{
        event::MigrationEvent,
        inventory_object::{InventoryObject, ManagedObjectRef, ObjectKind},
        operation::OperationSpec,
        tag::{Category, DynamicId, Tag},
        task::{TaskHandle, TaskInfo},
    },
};
use async_trait::async_trait;

/// Remote inventory and tagging service.
///
/// [`ApiClient`](crate::core::infrastructure::api_client::ApiClient) implements
/// it over HTTP; tests substitute a `mockall` double.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Every object of `kind`, with the given properties collected.
    async fn list_objects(
        &self,
        kind: ObjectKind,
        properties: &[String],
    ) -> VcliResult<Vec<InventoryObject>>;

    /// A fresh property snapshot of one object.
    async fn fetch_object(
        &self,
        reference: &ManagedObjectRef,
        properties: &[String],
    ) -> VcliResult<InventoryObject>;

    /// Starts a mutating operation and returns its task handle.
    async fn submit_operation(
        &self,
        reference: &ManagedObjectRef,
        operation: OperationSpec,
    ) -> VcliResult<TaskHandle>;

    async fn poll_task(&self, handle: &TaskHandle) -> VcliResult<TaskInfo>;

    async fn fetch_events_for_entity(
        &self,
        reference: &ManagedObjectRef,
        event_types: &[String],
    ) -> VcliResult<Vec<MigrationEvent>>;

    async fn list_categories(&self) -> VcliResult<Vec<Category>>;

    async fn list_tags(&self) -> VcliResult<Vec<Tag>>;

    /// Ids of the tags attached to an object.
    async fn list_attached_tags(&self, reference: &ManagedObjectRef) -> VcliResult<Vec<String>>;

    async fn list_attached_objects(&self, tag_id: &str) -> VcliResult<Vec<DynamicId>>;

    async fn attach_tag(&self, tag_id: &str, reference: &ManagedObjectRef) -> VcliResult<()>;

    async fn detach_tag(&self, tag_id: &str, reference: &ManagedObjectRef) -> VcliResult<()>;
}
