// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Wire-level DTOs (§6): the framing itself (length-prefixed envelope,
//! socket I/O) is a host collaborator, but the JSON shapes that travel
//! inside it are a core data contract, so they live here.

use crate::document::Document;
use crate::error::DocbaseError;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The framing envelope's one-byte message-type discriminant (§6):
/// `4-byte length | 1-byte type | 16-byte correlation id | payload`.
/// Only the discriminant is modelled here — the length prefix and
/// correlation id are framing concerns a host owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    Handshake,
    Ping,
    Pong,
    Authentication,
    Command,
    Response,
    BulkOperation,
    Error,
}

/// A single-document command (§6): `{command, collection, id?,
/// document?, query?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub command: String,
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<IndexMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<serde_json::Value>,
}

/// `{errorCode, errorMessage}` (§6, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: String,
    pub error_message: String,
}

impl ErrorResponse {
    pub fn from_error(err: &DocbaseError) -> Self {
        Self { error_code: err.code().to_string(), error_message: err.to_string() }
    }
}

/// The reply to a [`Command`]. Exactly one of the payload fields is
/// populated, matching whichever command was issued; `error` is
/// populated instead of any payload field on failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl Response {
    pub fn document(doc: Document) -> Self {
        Self { success: true, document: Some(doc), ..Default::default() }
    }

    pub fn documents(docs: Vec<Document>) -> Self {
        Self { success: true, documents: Some(docs), ..Default::default() }
    }

    pub fn error(err: &DocbaseError) -> Self {
        Self { success: false, error: Some(ErrorResponse::from_error(err)), ..Default::default() }
    }
}

/// One entry of a [`BulkRequest`]'s `operations` array (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperationType {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperation {
    #[serde(rename = "type")]
    pub operation_type: BulkOperationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<IndexMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_fields: Option<IndexMap<String, Value>>,
}

/// `{collection, stopOnError, operations}` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    pub collection: String,
    pub stop_on_error: bool,
    pub operations: Vec<BulkOperation>,
}

/// Per-operation outcome within a [`BulkResponse`] (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationResult {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// `{success, totalProcessed, insertedCount, updatedCount,
/// deletedCount, processingTimeMs, results}` (§6, scenario 6 of §8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse {
    pub success: bool,
    pub total_processed: usize,
    pub inserted_count: usize,
    pub updated_count: usize,
    pub deleted_count: usize,
    pub processing_time_ms: u64,
    pub results: Vec<BulkOperationResult>,
}
