// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Bulk operation execution (§6, §8 scenario 6): applies a
//! [`BulkRequest`] against any [`Store`] in order, honouring
//! `stopOnError`.

use crate::error::DocbaseError;
use crate::protocol::{BulkOperation, BulkOperationResult, BulkOperationType, BulkRequest, BulkResponse};
use crate::store::Store;
use std::time::Instant;

/// Runs every operation in `request.operations` against `collection`
/// in `store`, in order. When `stopOnError` is set, the first failing
/// operation halts the remaining ones; they are simply absent from
/// `results` (§6: "aborts the rest on first failure").
pub async fn execute_bulk<S: Store>(store: &S, request: &BulkRequest) -> BulkResponse {
    let start = Instant::now();
    let mut results = Vec::with_capacity(request.operations.len());
    let (mut inserted, mut updated, mut deleted) = (0usize, 0usize, 0usize);
    let mut success = true;

    for (index, op) in request.operations.iter().enumerate() {
        match apply_operation(store, &request.collection, op).await {
            Ok(Outcome::Inserted(id)) => {
                inserted += 1;
                results.push(BulkOperationResult { index, success: true, document_id: Some(id), error_code: None, error_message: None });
            }
            Ok(Outcome::Updated(id)) => {
                updated += 1;
                results.push(BulkOperationResult { index, success: true, document_id: Some(id), error_code: None, error_message: None });
            }
            Ok(Outcome::Deleted(id)) => {
                deleted += 1;
                results.push(BulkOperationResult { index, success: true, document_id: Some(id), error_code: None, error_message: None });
            }
            Ok(Outcome::NotDeleted(id)) => {
                results.push(BulkOperationResult { index, success: true, document_id: Some(id), error_code: None, error_message: None });
            }
            Err(err) => {
                success = false;
                results.push(BulkOperationResult {
                    index,
                    success: false,
                    document_id: op.document_id.clone(),
                    error_code: Some(err.code().to_string()),
                    error_message: Some(err.to_string()),
                });
                if request.stop_on_error {
                    break;
                }
            }
        }
    }

    BulkResponse {
        success,
        total_processed: results.len(),
        inserted_count: inserted,
        updated_count: updated,
        deleted_count: deleted,
        processing_time_ms: start.elapsed().as_millis() as u64,
        results,
    }
}

enum Outcome {
    Inserted(String),
    Updated(String),
    Deleted(String),
    /// Delete targeted a missing document — not an error (§8 boundary
    /// case: "Delete of a missing document returns false without
    /// error"), but no document was actually removed.
    NotDeleted(String),
}

async fn apply_operation<S: Store>(store: &S, collection: &str, op: &BulkOperation) -> Result<Outcome, DocbaseError> {
    match op.operation_type {
        BulkOperationType::Insert => {
            let id = op.document_id.as_ref().ok_or_else(|| DocbaseError::ParseError {
                reason: "insert operation requires documentId".to_string(),
                fragment: "documentId".to_string(),
            })?;
            let data = op.document.clone().unwrap_or_default();
            let doc = store.insert(collection, id, data).await?;
            Ok(Outcome::Inserted(doc.id))
        }
        BulkOperationType::Update => {
            if op.filter.is_some() {
                return Err(DocbaseError::Unsupported { reason: "bulk update by filter is not supported; supply documentId".to_string() });
            }
            let id = op.document_id.as_ref().ok_or_else(|| DocbaseError::ParseError {
                reason: "update operation requires documentId".to_string(),
                fragment: "documentId".to_string(),
            })?;
            let data = op.document.clone().or_else(|| op.update_fields.clone()).unwrap_or_default();
            let doc = store.update(collection, id, data).await?;
            Ok(Outcome::Updated(doc.id))
        }
        BulkOperationType::Delete => {
            let id = op.document_id.as_ref().ok_or_else(|| DocbaseError::ParseError {
                reason: "delete operation requires documentId".to_string(),
                fragment: "documentId".to_string(),
            })?;
            if store.delete(collection, id).await? {
                Ok(Outcome::Deleted(id.clone()))
            } else {
                Ok(Outcome::NotDeleted(id.clone()))
            }
        }
    }
}
