//! 直近使用履歴
//!
//! back/forward スタックとは独立した、クイックオープン用の
//! 最近使用順リスト。活性化のたびに先頭へ移動し、同一ドキュメントは
//! 重複させない。永続化されるのはリソース記述子のみ。

pub mod closed;
pub mod exclusion;

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::document::DocumentHandle;
use crate::error::{Result, StorageError};
use crate::event::Subscription;
use crate::history::exclusion::ExclusionFilter;
use crate::host::RemovalTarget;
use crate::storage::WorkspaceStorage;

pub use closed::{ClosedFile, ClosedFileList, CLOSED_CAPACITY};

/// 履歴の保持上限
pub const HISTORY_CAPACITY: usize = 200;

/// ワークスペーススコープの永続化キー
pub const STORAGE_KEY: &str = "history.entries";

/// 永続化スキーマの1レコード
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(rename = "resourceJSON")]
    resource: String,
}

struct RecencyEntry {
    handle: DocumentHandle,
    /// 解決済み入力の破棄購読。履歴の表示は一時的なものなので、
    /// 破棄時はリソースへの置き換えではなく単純に脱落させる
    _dispose: Option<Subscription>,
}

struct HistoryInner {
    /// 先頭が最新
    entries: Vec<RecencyEntry>,
    capacity: usize,
    /// 遅延ロードのメモ化フラグ
    loaded: bool,
    filter: ExclusionFilter,
    storage: Rc<dyn WorkspaceStorage>,
}

/// 直近使用履歴本体
#[derive(Clone)]
pub struct RecencyHistory {
    inner: Rc<RefCell<HistoryInner>>,
}

impl RecencyHistory {
    pub fn new(storage: Rc<dyn WorkspaceStorage>) -> Self {
        Self::with_capacity(storage, HISTORY_CAPACITY)
    }

    pub fn with_capacity(storage: Rc<dyn WorkspaceStorage>, capacity: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HistoryInner {
                entries: Vec::new(),
                capacity,
                loaded: false,
                filter: ExclusionFilter::empty(),
                storage,
            })),
        }
    }

    /// ドキュメントの活性化を記録する
    ///
    /// 表示名を持たない・除外対象のドキュメントは黙って読み飛ばす。
    pub fn record_activation(&self, handle: &DocumentHandle) {
        if handle.name().is_none() {
            return;
        }
        self.ensure_loaded();
        if self.inner.borrow().filter.excludes(handle) {
            return;
        }

        let subscription = self.subscribe_disposal(handle);
        let mut inner = self.inner.borrow_mut();
        inner.entries.retain(|entry| !entry.handle.matches(handle));
        inner.entries.insert(
            0,
            RecencyEntry {
                handle: handle.clone(),
                _dispose: subscription,
            },
        );
        let capacity = inner.capacity;
        inner.entries.truncate(capacity);
    }

    /// 履歴の防御的コピーを返す（初回アクセスで永続状態をロード）
    pub fn history(&self) -> Vec<DocumentHandle> {
        self.ensure_loaded();
        self.inner
            .borrow()
            .entries
            .iter()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// 対象に一致するエントリを除去する
    pub fn remove(&self, target: &RemovalTarget<'_>) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.entries.len();
        inner.entries.retain(|entry| !target.matches(&entry.handle));
        inner.entries.len() != before
    }

    /// 履歴を空へ戻す
    ///
    /// 遅延ロードが旧状態を復活させないよう、永続側も空にする。
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.entries.clear();
        inner.loaded = false;
        inner.storage.store(STORAGE_KEY, "[]");
    }

    /// 除外フィルタを差し替える
    ///
    /// 実効パターンが変わった場合のみ再フィルタし、真を返す。除外は
    /// 既存エントリを落とすだけで、遡って追加されることはない。
    pub fn set_exclusions(&self, filter: ExclusionFilter) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.filter.same_patterns(&filter) {
            return false;
        }
        inner.entries.retain(|entry| !filter.excludes(&entry.handle));
        inner.filter = filter;
        true
    }

    /// 履歴を永続化する（シャットダウン時に一度だけ呼ばれる）
    ///
    /// 解決済み入力のエントリは再起動を跨いで安定とは限らないため
    /// 黙って落とす。
    pub fn save(&self) -> Result<()> {
        let inner = self.inner.borrow();
        if !inner.loaded {
            // 一度も触れていなければ既存の永続状態を上書きしない
            return Ok(());
        }

        let stored: Vec<StoredEntry> = inner
            .entries
            .iter()
            .filter_map(|entry| entry.handle.as_resource())
            .map(|resource| StoredEntry {
                resource: resource.uri().to_string(),
            })
            .collect();

        let serialized =
            serde_json::to_string(&stored).map_err(|err| StorageError::Serialize {
                message: err.to_string(),
            })?;
        inner.storage.store(STORAGE_KEY, &serialized);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ensure_loaded();
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_loaded(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.loaded {
            return;
        }
        inner.loaded = true;

        let Some(raw) = inner.storage.get(STORAGE_KEY) else {
            return;
        };
        let stored: Vec<StoredEntry> = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(err) => {
                // 任意機能である履歴の喪失が起動を妨げてはならない
                log::warn!("discarding malformed history state: {err}");
                return;
            }
        };

        for record in stored {
            let uri = match Url::parse(&record.resource) {
                Ok(uri) => uri,
                Err(err) => {
                    log::warn!("skipping unparsable history entry '{}': {err}", record.resource);
                    continue;
                }
            };
            let handle = DocumentHandle::from_uri(uri);
            if inner.filter.excludes(&handle) {
                continue;
            }
            // セッション中の記録を優先し、永続分は後ろへ足す
            if inner.entries.iter().any(|entry| entry.handle.matches(&handle)) {
                continue;
            }
            if inner.entries.len() >= inner.capacity {
                break;
            }
            inner.entries.push(RecencyEntry {
                handle,
                _dispose: None,
            });
        }
    }

    fn subscribe_disposal(&self, handle: &DocumentHandle) -> Option<Subscription> {
        let DocumentHandle::Input(input) = handle else {
            return None;
        };
        let signal = input.dispose_signal()?;
        let id = input.id();
        let weak = Rc::downgrade(&self.inner);
        Some(signal.subscribe(move |_| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner
                .borrow_mut()
                .entries
                .retain(|entry| entry.handle.input_id() != Some(id));
        }))
    }
}
