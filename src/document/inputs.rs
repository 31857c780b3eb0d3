//! 参照実装のエディタ入力
//!
//! ホスト組み込みの出発点とテストの双方で使う最小実装。
//! 実際のワークベンチはタブやビューの状態を抱えたより重い入力を
//! 実装することになる。

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use url::Url;

use crate::document::{ChangeOrigin, EditorInput, InputId, Selection, SelectionEvent};
use crate::event::Signal;

/// 入力idの払い出しカウンタ
static NEXT_INPUT_ID: AtomicU64 = AtomicU64::new(1);

fn next_input_id() -> InputId {
    NEXT_INPUT_ID.fetch_add(1, Ordering::SeqCst)
}

/// ファイルを背景に持つ入力
pub struct FileInput {
    id: InputId,
    uri: Url,
    disposed: Cell<bool>,
    dispose_signal: Signal<()>,
    selection_signal: Signal<SelectionEvent>,
}

impl FileInput {
    pub fn new(uri: Url) -> Rc<Self> {
        Rc::new(Self {
            id: next_input_id(),
            uri,
            disposed: Cell::new(false),
            dispose_signal: Signal::new(),
            selection_signal: Signal::new(),
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// 入力を破棄し、購読者へ通知する（冪等）
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.dispose_signal.emit(&());
    }

    /// カーソル位置の変化をホストに代わって通知する
    pub fn notify_selection_changed(&self, selection: Option<Selection>, origin: ChangeOrigin) {
        self.selection_signal.emit(&SelectionEvent { selection, origin });
    }
}

impl EditorInput for FileInput {
    fn id(&self) -> InputId {
        self.id
    }

    fn name(&self) -> Option<String> {
        self.uri
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(|s| s.to_string())
    }

    fn file_uri(&self) -> Option<Url> {
        Some(self.uri.clone())
    }

    fn dispose_signal(&self) -> Option<&Signal<()>> {
        Some(&self.dispose_signal)
    }

    fn selection_signal(&self) -> Option<&Signal<SelectionEvent>> {
        Some(&self.selection_signal)
    }
}

/// ファイルを持たない一時入力（無題バッファ等）
pub struct ScratchInput {
    id: InputId,
    name: Option<String>,
    disposed: Cell<bool>,
    dispose_signal: Signal<()>,
    selection_signal: Signal<SelectionEvent>,
}

impl ScratchInput {
    pub fn named(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            id: next_input_id(),
            name: Some(name.into()),
            disposed: Cell::new(false),
            dispose_signal: Signal::new(),
            selection_signal: Signal::new(),
        })
    }

    /// 表示名を持たない入力。履歴には記録されない
    pub fn unnamed() -> Rc<Self> {
        Rc::new(Self {
            id: next_input_id(),
            name: None,
            disposed: Cell::new(false),
            dispose_signal: Signal::new(),
            selection_signal: Signal::new(),
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.dispose_signal.emit(&());
    }

    pub fn notify_selection_changed(&self, selection: Option<Selection>, origin: ChangeOrigin) {
        self.selection_signal.emit(&SelectionEvent { selection, origin });
    }
}

impl EditorInput for ScratchInput {
    fn id(&self) -> InputId {
        self.id
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn file_uri(&self) -> Option<Url> {
        None
    }

    fn dispose_signal(&self) -> Option<&Signal<()>> {
        Some(&self.dispose_signal)
    }

    fn selection_signal(&self) -> Option<&Signal<SelectionEvent>> {
        Some(&self.selection_signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_ids_are_unique() {
        let a = ScratchInput::named("a");
        let b = ScratchInput::named("b");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_dispose_emits_once() {
        let input = FileInput::new(Url::parse("file:///tmp/a.txt").unwrap());
        let count = Rc::new(Cell::new(0));

        let count_clone = Rc::clone(&count);
        let _sub = input
            .dispose_signal()
            .unwrap()
            .subscribe(move |_| count_clone.set(count_clone.get() + 1));

        input.dispose();
        input.dispose();

        assert_eq!(count.get(), 1);
        assert!(input.is_disposed());
    }

    #[test]
    fn test_unnamed_scratch_has_no_name() {
        let input = ScratchInput::unnamed();
        assert!(input.name().is_none());
        assert!(input.file_uri().is_none());
    }
}
