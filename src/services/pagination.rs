//! Cursor pagination for the list views.
//!
//! Each view keeps a stack of page-start cursors. Moving forward reads
//! strictly after the last record of the current page and pushes the new
//! page's first record; moving back pops and re-reads at or after the new
//! top. A change of query shape starts the view over at page one.

use crate::error::AppResult;
use crate::services::query::ReadPlan;
use crate::store::{Bound, BoundKind, Cursor, Document, DocumentStore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("There is no next page")]
    NoNextPage,

    #[error("Already on the first page")]
    NoPreviousPage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Navigation {
    #[default]
    First,
    Next,
    Prev,
    Reload,
}

/// Result of one navigation.
#[derive(Debug, Clone)]
pub struct PageBatch {
    pub documents: Vec<Document>,
    pub page: usize,
    pub has_more: bool,
    /// Navigation that actually ran; a shape change turns anything into `First`.
    pub navigation: Navigation,
}

/// Pagination state of one view.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    last_record: Option<Cursor>,
    page: usize,
    has_more: bool,
    cursor_stack: Vec<Option<Cursor>>,
    shape: Option<u64>,
}

impl ViewState {
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn depth(&self) -> usize {
        self.cursor_stack.len()
    }

    pub fn last_record(&self) -> Option<&Cursor> {
        self.last_record.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.shape.is_some()
    }

    /// Forget everything; the next read starts at page one.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub async fn navigate(
        &mut self,
        store: &dyn DocumentStore,
        plan: &ReadPlan,
        navigation: Navigation,
    ) -> AppResult<PageBatch> {
        let navigation = if self.shape != Some(plan.shape) {
            if self.is_started() {
                tracing::debug!("{} query changed, restarting at page 1", plan.view);
            }
            Navigation::First
        } else {
            navigation
        };

        match navigation {
            Navigation::First => self.first(store, plan).await,
            Navigation::Next => self.next(store, plan).await,
            Navigation::Prev => self.prev(store, plan).await,
            Navigation::Reload => self.reload(store, plan).await,
        }
    }

    async fn first(&mut self, store: &dyn DocumentStore, plan: &ReadPlan) -> AppResult<PageBatch> {
        let raw = store.query(&plan.store_query(None)).await?;
        self.shape = Some(plan.shape);
        self.page = 1;
        self.cursor_stack = vec![None];
        let documents = self.settle(plan, raw);
        Ok(self.batch(documents, Navigation::First))
    }

    async fn next(&mut self, store: &dyn DocumentStore, plan: &ReadPlan) -> AppResult<PageBatch> {
        let last = match (&self.last_record, self.has_more) {
            (Some(last), true) => last.clone(),
            _ => return Err(PaginationError::NoNextPage.into()),
        };

        let bound = Bound {
            kind: BoundKind::StartAfter,
            cursor: last,
        };
        let raw = store.query(&plan.store_query(Some(bound))).await?;
        let page_start = raw
            .first()
            .map(|doc| Cursor::from_document(doc, plan_order(plan).as_ref(), plan.shape));

        let Some(page_start) = page_start else {
            // Nothing further: stay where we are.
            self.has_more = false;
            return Ok(self.batch(Vec::new(), Navigation::Next));
        };

        let previous_last = self.last_record.clone();
        let documents = self.settle(plan, raw);
        if documents.is_empty() && !self.has_more {
            self.last_record = previous_last;
            return Ok(self.batch(documents, Navigation::Next));
        }

        self.page += 1;
        self.cursor_stack.push(Some(page_start));
        Ok(self.batch(documents, Navigation::Next))
    }

    async fn prev(&mut self, store: &dyn DocumentStore, plan: &ReadPlan) -> AppResult<PageBatch> {
        if self.cursor_stack.len() <= 1 {
            return Err(PaginationError::NoPreviousPage.into());
        }

        let top = self.cursor_stack[self.cursor_stack.len() - 2].clone();
        let raw = store.query(&plan.store_query(start_at(top))).await?;

        self.cursor_stack.pop();
        self.page = self.page.saturating_sub(1).max(1);
        let documents = self.settle(plan, raw);
        Ok(self.batch(documents, Navigation::Prev))
    }

    async fn reload(&mut self, store: &dyn DocumentStore, plan: &ReadPlan) -> AppResult<PageBatch> {
        let top = self.cursor_stack.last().cloned().flatten();
        let raw = store.query(&plan.store_query(start_at(top))).await?;
        let documents = self.settle(plan, raw);
        Ok(self.batch(documents, Navigation::Reload))
    }

    /// Trim a fetched batch to the page and record `has_more` and the cursor
    /// the next forward read resumes from.
    fn settle(&mut self, plan: &ReadPlan, mut raw: Vec<Document>) -> Vec<Document> {
        let order = plan_order(plan);
        let cursor_of = |doc: &Document| Cursor::from_document(doc, order.as_ref(), plan.shape);

        if !plan.has_client_filters() {
            self.has_more = raw.len() > plan.page_size;
            raw.truncate(plan.page_size);
            self.last_record = raw.last().map(cursor_of);
            return raw;
        }

        let filled = raw.len() >= plan.fetch_limit();
        let raw_last = raw.last().map(cursor_of);
        let mut rows = plan.apply_client_filters(raw);

        if rows.len() > plan.page_size {
            rows.truncate(plan.page_size);
            self.has_more = true;
            self.last_record = rows.last().map(cursor_of);
        } else {
            // An empty filtered page never offers a next page.
            self.has_more = filled && !rows.is_empty();
            self.last_record = raw_last;
        }
        rows
    }

    fn batch(&self, documents: Vec<Document>, navigation: Navigation) -> PageBatch {
        PageBatch {
            documents,
            page: self.page,
            has_more: self.has_more,
            navigation,
        }
    }
}

fn plan_order(plan: &ReadPlan) -> Option<crate::store::OrderBy> {
    Some(crate::store::OrderBy {
        field: plan.sort.field.clone(),
        direction: plan.sort.direction,
    })
}

fn start_at(cursor: Option<Cursor>) -> Option<Bound> {
    cursor.map(|cursor| Bound {
        kind: BoundKind::StartAt,
        cursor,
    })
}
