//! ナビゲーションスタック
//!
//! 訪問した（ドキュメント・選択位置）対の有界列。ブラウザ履歴と同様の
//! back/forward 移動、途中からの追加による先行履歴の破棄、新規活動の
//! 合体/置換判定を担う。
//!
//! # 状態機械
//!
//! スタックは Idle / Navigating の2状態を持ち、遷移は `navigate` の
//! 入口と出口でのみ起きる。Navigating の間はイベント起因の追加・置換が
//! すべて抑止される（スタックを辿ること自体が新規エントリを積んでは
//! ならない）。フラグは open の成否双方で対称に戻される。

pub mod state;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::document::{ChangeOrigin, DocumentHandle, Selection};
use crate::error::Result;
use crate::event::Subscription;
use crate::host::{DocumentHost, OpenRequest, RemovalTarget};
use crate::stack::state::{same_selection, TextEditorState, COALESCE_WINDOW};

/// スタック容量。超過時は最古のエントリを追い出す
pub const STACK_CAPACITY: usize = 20;

/// 記録された1つのナビゲーション地点
struct StackEntry {
    handle: DocumentHandle,
    selection: Option<Selection>,
    recorded_at: Instant,
    /// 解決済み入力の破棄購読。エントリのドロップで自動解除
    _dispose: Option<Subscription>,
}

struct StackInner {
    entries: Vec<StackEntry>,
    /// 現在位置。スタックが空のときに限りNone
    index: Option<usize>,
    /// 直前位置（last コマンド用）。構造的なフィルタ変更でNoneへ戻る
    last_index: Option<usize>,
    /// 再入ガード（Navigating状態）
    navigating: bool,
    /// 最新のエディタ状態スナップショット
    current_state: Option<TextEditorState>,
    capacity: usize,
    coalesce_window: Duration,
}

impl StackInner {
    fn set_index(&mut self, new_index: usize) {
        self.last_index = self.index;
        self.index = Some(new_index);
    }

    fn remove_where(&mut self, target: &RemovalTarget<'_>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !target.matches(&entry.handle));
        if self.entries.len() == before {
            return false;
        }
        // フィルタ後は末尾を現在位置とし、直前位置は破棄する
        self.index = self.entries.len().checked_sub(1);
        self.last_index = None;
        true
    }
}

/// ナビゲーションスタック本体
///
/// `Rc` ベースの共有ハンドル。クローンは同一のスタックを指す。
#[derive(Clone)]
pub struct NavigationStack {
    inner: Rc<RefCell<StackInner>>,
}

impl NavigationStack {
    pub fn new() -> Self {
        Self::with_capacity(STACK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StackInner {
                entries: Vec::new(),
                index: None,
                last_index: None,
                navigating: false,
                current_state: None,
                capacity,
                coalesce_window: COALESCE_WINDOW,
            })),
        }
    }

    /// アクティブエディタの切り替わりを記録する
    pub fn handle_editor_change(&self, state: TextEditorState) {
        {
            let mut inner = self.inner.borrow_mut();
            let navigating = inner.navigating;
            inner.current_state = Some(state.clone());
            if navigating {
                // スタック起因の活性化。記録せず状態のみ更新
                return;
            }
        }
        self.add(state.handle().clone(), state.selection());
    }

    /// カーソル位置の変化を有意性判定つきで記録する
    pub fn handle_selection_change(&self, candidate: TextEditorState, origin: ChangeOrigin) {
        let justified = {
            let inner = self.inner.borrow();
            match &inner.current_state {
                Some(previous) => previous.justifies_new_push_state(&candidate, origin),
                None => true,
            }
        };

        if justified {
            self.add(candidate.handle().clone(), candidate.selection());
        } else {
            self.replace(candidate.handle().clone(), candidate.selection());
        }
        self.inner.borrow_mut().current_state = Some(candidate);
    }

    /// エントリを追加する（条件を満たせば現在エントリを置換）
    pub fn add(&self, handle: DocumentHandle, selection: Option<Selection>) {
        self.add_or_replace(handle, selection, false);
    }

    /// 現在エントリを無条件に置き換える
    ///
    /// 同一論理位置のより精密な状態が後から届いた場合に使う。
    pub fn replace(&self, handle: DocumentHandle, selection: Option<Selection>) {
        self.add_or_replace(handle, selection, true);
    }

    fn add_or_replace(
        &self,
        handle: DocumentHandle,
        selection: Option<Selection>,
        force_replace: bool,
    ) {
        if self.inner.borrow().navigating {
            return;
        }

        // ファイル背景の入力は、破棄後も生き残るリソース記述子として積む
        let handle = handle.prefer_resource();

        let replace_at = {
            let inner = self.inner.borrow();
            match inner.index {
                Some(index) if force_replace => Some(index),
                Some(index) => {
                    let current = &inner.entries[index];
                    let mergeable = current.handle.matches(&handle)
                        && (same_selection(current.selection, selection)
                            || current.recorded_at.elapsed() < inner.coalesce_window);
                    mergeable.then_some(index)
                }
                None => None,
            }
        };

        let entry = StackEntry {
            _dispose: self.subscribe_disposal(&handle),
            handle,
            selection,
            recorded_at: Instant::now(),
        };

        let mut inner = self.inner.borrow_mut();
        match replace_at {
            Some(index) => {
                // 旧エントリの破棄購読はドロップで解除される
                inner.entries[index] = entry;
            }
            None => {
                if let Some(index) = inner.index {
                    // 途中から新規に進んだら先の履歴は破棄（ブランチ放棄）
                    inner.entries.truncate(index + 1);
                }
                inner.entries.push(entry);
                let new_index = inner.entries.len() - 1;
                inner.set_index(new_index);

                if inner.entries.len() > inner.capacity {
                    inner.entries.remove(0);
                    inner.index = inner.index.and_then(|i| i.checked_sub(1));
                    inner.last_index = inner.last_index.and_then(|i| i.checked_sub(1));
                }
            }
        }
    }

    /// ひとつ前のエントリへ移動して開く
    ///
    /// `across_documents` が真なら現在ドキュメントと同じエントリの連続を
    /// 飛ばす。先頭では何もしない。
    pub fn back(&self, host: &mut dyn DocumentHost, across_documents: bool) -> Result<bool> {
        let moved = {
            let mut inner = self.inner.borrow_mut();
            let Some(index) = inner.index else {
                return Ok(false);
            };
            let target = if across_documents {
                previous_of_other_document(&inner.entries, index)
            } else {
                index.checked_sub(1)
            };
            match target {
                Some(target) => {
                    inner.set_index(target);
                    true
                }
                None => false,
            }
        };

        if !moved {
            return Ok(false);
        }
        self.navigate(host, !across_documents)
    }

    /// ひとつ先のエントリへ移動して開く
    pub fn forward(&self, host: &mut dyn DocumentHost, across_documents: bool) -> Result<bool> {
        let moved = {
            let mut inner = self.inner.borrow_mut();
            let Some(index) = inner.index else {
                return Ok(false);
            };
            let target = if across_documents {
                next_of_other_document(&inner.entries, index)
            } else if index + 1 < inner.entries.len() {
                Some(index + 1)
            } else {
                None
            };
            match target {
                Some(target) => {
                    inner.set_index(target);
                    true
                }
                None => false,
            }
        };

        if !moved {
            return Ok(false);
        }
        self.navigate(host, !across_documents)
    }

    /// 直前位置へ跳ぶ。未設定ならbackと同じ振る舞い
    pub fn last(&self, host: &mut dyn DocumentHost) -> Result<bool> {
        let target = self.inner.borrow().last_index;
        match target {
            Some(target) => {
                self.inner.borrow_mut().set_index(target);
                self.navigate(host, true)
            }
            None => self.back(host, false),
        }
    }

    pub fn can_go_back(&self) -> bool {
        let inner = self.inner.borrow();
        matches!(inner.index, Some(index) if index > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        let inner = self.inner.borrow();
        matches!(inner.index, Some(index) if index + 1 < inner.entries.len())
    }

    pub fn can_go_last(&self) -> bool {
        self.inner.borrow().last_index.is_some() || self.can_go_back()
    }

    /// 対象に一致するエントリをすべて除去する
    pub fn remove(&self, target: &RemovalTarget<'_>) -> bool {
        self.inner.borrow_mut().remove_where(target)
    }

    /// スタックを空へ戻す
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.entries.clear();
        inner.index = None;
        inner.last_index = None;
        inner.current_state = None;
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.inner.borrow().index
    }

    pub fn last_index(&self) -> Option<usize> {
        self.inner.borrow().last_index
    }

    pub fn is_navigating(&self) -> bool {
        self.inner.borrow().navigating
    }

    /// 記録内容の読み取り専用スナップショット
    pub fn entries(&self) -> Vec<(DocumentHandle, Option<Selection>)> {
        self.inner
            .borrow()
            .entries
            .iter()
            .map(|entry| (entry.handle.clone(), entry.selection))
            .collect()
    }

    /// 現在位置のエントリを開く。再入ガードはここでのみ張られる
    fn navigate(&self, host: &mut dyn DocumentHost, restore_selection: bool) -> Result<bool> {
        let request = {
            let mut inner = self.inner.borrow_mut();
            let Some(index) = inner.index else {
                return Ok(false);
            };
            let entry = &inner.entries[index];
            let request = OpenRequest {
                handle: entry.handle.clone(),
                selection: if restore_selection { entry.selection } else { None },
                pinned: false,
                tab_index: None,
                reveal: true,
            };
            inner.navigating = true;
            request
        };

        let result = host.open_editor(request);
        // 成否に関わらずIdleへ戻す。戻し忘れは記録の恒久停止を意味する
        self.inner.borrow_mut().navigating = false;

        match result {
            Ok(()) => Ok(true),
            Err(err) => {
                log::warn!("navigation failed: {err}");
                Err(err.into())
            }
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
            if inner.borrow_mut().remove_where(&RemovalTarget::Input(id)) {
                log::debug!("removed disposed input {id} from navigation stack");
            }
        }))
    }

    /// テスト用：現在エントリの記録時刻を過去へずらす
    #[cfg(test)]
    pub(crate) fn age_current_entry(&self, by: Duration) {
        let mut inner = self.inner.borrow_mut();
        if let Some(index) = inner.index {
            inner.entries[index].recorded_at = Instant::now() - by;
        }
    }
}

impl Default for NavigationStack {
    fn default() -> Self {
        Self::new()
    }
}

fn previous_of_other_document(entries: &[StackEntry], index: usize) -> Option<usize> {
    let current = &entries[index].handle;
    (0..index).rev().find(|&i| !entries[i].handle.matches(current))
}

fn next_of_other_document(entries: &[StackEntry], index: usize) -> Option<usize> {
    let current = &entries[index].handle;
    (index + 1..entries.len()).find(|&i| !entries[i].handle.matches(current))
}
