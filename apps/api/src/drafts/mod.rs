//! Draft Store: staging area for normalized résumés awaiting review.
//!
//! Every operation is scoped to the owning user. A draft owned by someone
//! else is indistinguishable from one that does not exist: both are
//! `NotFound`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::draft::{DraftRecord, NewDraft};

pub mod handlers;
#[cfg(test)]
pub(crate) mod memory;
pub mod patch;
pub mod postgres;

pub use patch::DraftPatch;
pub use postgres::PgDraftStore;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum DraftStoreError {
    #[error("draft {0} not found")]
    NotFound(i64),

    #[error("invalid draft update: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn first_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: first_page(),
            page_size: default_page_size(),
        }
    }
}

impl Page {
    /// Clamps out-of-range values instead of rejecting them.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftPage {
    pub drafts: Vec<DraftRecord>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

impl DraftPage {
    pub fn new(drafts: Vec<DraftRecord>, total: i64, page: Page) -> Self {
        let size = i64::from(page.page_size);
        Self {
            drafts,
            total,
            page: page.page,
            page_size: page.page_size,
            total_pages: (total + size - 1) / size,
        }
    }
}

/// Storage for drafts. Carried in `AppState` as `Arc<dyn DraftStore>`.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save(&self, owner: Uuid, draft: NewDraft) -> Result<i64, DraftStoreError>;

    /// Owned drafts, newest first.
    async fn list(&self, owner: Uuid, page: Page) -> Result<DraftPage, DraftStoreError>;

    async fn get(&self, id: i64, owner: Uuid) -> Result<DraftRecord, DraftStoreError>;

    /// Applies a review patch. Lists in the patch replace the stored lists
    /// as a whole, in one transaction with the group changes.
    async fn update(
        &self,
        id: i64,
        owner: Uuid,
        patch: DraftPatch,
    ) -> Result<DraftRecord, DraftStoreError>;

    async fn delete(&self, id: i64, owner: Uuid) -> Result<(), DraftStoreError>;

    /// Deletes the owned drafts among `ids`, returning how many were removed.
    async fn delete_many(&self, ids: &[i64], owner: Uuid) -> Result<u64, DraftStoreError>;

    /// Records that the draft became production résumé `resume_id`.
    async fn mark_promoted(
        &self,
        id: i64,
        owner: Uuid,
        resume_id: i64,
    ) -> Result<(), DraftStoreError>;
}
