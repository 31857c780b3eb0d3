//! 最近閉じたファイルのリスト
//!
//! 「最後に閉じたエディタを開き直す」ためだけの小さなLIFOリスト。
//! 追跡するのはピン留めされたファイル背景のクローズのみ。

use crate::document::{DocumentHandle, ResourceDescriptor};
use crate::host::{DocumentHost, RemovalTarget};

/// 閉じたファイルの保持上限。超過時は最古から追い出す
pub const CLOSED_CAPACITY: usize = 20;

/// 閉じたファイルの記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedFile {
    pub resource: ResourceDescriptor,
    /// 閉じた時点のタブ位置。開き直しで同じ位置へ戻す
    pub tab_index: usize,
}

/// 閉じたファイルのリスト（追加はFIFO追い出し、消費はLIFO）
#[derive(Debug)]
pub struct ClosedFileList {
    entries: Vec<ClosedFile>,
    capacity: usize,
}

impl Default for ClosedFileList {
    fn default() -> Self {
        Self::new()
    }
}

impl ClosedFileList {
    pub fn new() -> Self {
        Self::with_capacity(CLOSED_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// ドキュメントが閉じられたときの記録
    ///
    /// ピン留めされていない・置換によって閉じた・ファイル背景を持たない
    /// クローズは追跡しない。
    pub fn on_document_closed(
        &mut self,
        handle: &DocumentHandle,
        tab_index: usize,
        pinned: bool,
        replaced: bool,
    ) {
        if !pinned || replaced {
            return;
        }
        let Some(uri) = handle.file_uri() else {
            return;
        };

        // 同一ファイルの古い記録は置き換える
        self.entries.retain(|entry| entry.resource.uri() != &uri);
        self.entries.push(ClosedFile {
            resource: ResourceDescriptor::new(uri),
            tab_index,
        });

        while self.entries.len() > self.capacity {
            self.entries.remove(0);
        }
    }

    /// 開き直し候補を取り出す
    ///
    /// 現在アクティブグループで開かれているファイルは読み飛ばして破棄し、
    /// 開かれていない最初の記録を返す。全件が開いているならNone。
    pub fn pop_reopen_candidate(&mut self, host: &dyn DocumentHost) -> Option<ClosedFile> {
        while let Some(candidate) = self.entries.pop() {
            if !host.is_open_in_active_group(candidate.resource.uri()) {
                return Some(candidate);
            }
        }
        None
    }

    /// 対象に一致する記録を除去する
    pub fn remove(&mut self, target: &RemovalTarget<'_>) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !target.matches_uri(entry.resource.uri()));
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
