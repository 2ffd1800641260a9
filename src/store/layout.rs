// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! On-disk layout for the persistent store (§4.4, §6):
//! `<base>/<collection>/<documentId>.json`.

use std::path::{Path, PathBuf};

/// Characters that pass through into a filename unescaped (§4.4).
fn is_safe_filename_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-' | b':')
}

/// Percent-escapes any byte of `id` outside `[A-Za-z0-9_.\-:]` so the
/// result is always a valid filename, independent of platform.
///
/// The logical id is never mutated by this — it is only used to derive
/// the filename; the file's own JSON body carries the untouched id.
pub fn escape_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for &b in id.as_bytes() {
        if is_safe_filename_byte(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

pub fn collection_dir(base: &Path, collection: &str) -> PathBuf {
    base.join(collection)
}

pub fn document_path(base: &Path, collection: &str, id: &str) -> PathBuf {
    collection_dir(base, collection).join(format!("{}.json", escape_id(id)))
}

/// Temporary path used for the write-then-rename sequence (§4.4). Safe
/// to reuse across writes to the same id because writes within a
/// collection are serialised by the caller's per-collection semaphore.
pub fn temp_document_path(base: &Path, collection: &str, id: &str) -> PathBuf {
    collection_dir(base, collection).join(format!("{}.json.tmp", escape_id(id)))
}
