//! 選択変化の有意性判定
//!
//! カーソル移動のたびにスタックへ積むとノイズになり、積まなければ
//! 本物のナビゲーションを失う。その境界を引く比較器。

use std::time::Duration;

use crate::document::{ChangeOrigin, DocumentHandle, Selection};

/// 新規エントリに値する行距離のしきい値
///
/// チューニング値であって正しさの不変条件ではない。矢印キーや
/// キーストローク単位の移動を除きつつ、遠方シンボルへのジャンプは
/// 拾えるよう選ばれている。
pub const SIGNIFICANT_LINE_DISTANCE: u32 = 10;

/// 連続した変化を同一エントリへ合体させる時間窓
///
/// この間隔未満で届く変化は人間の操作ではなくプログラム的な
/// カーソルジャンプの可能性が高い、という経験則。
pub const COALESCE_WINDOW: Duration = Duration::from_millis(300);

/// エディタ状態スナップショット
///
/// カーソル変化イベントごとに生成される不変の比較オブジェクト。
/// スタックは最新のスナップショットのみを保持する。
#[derive(Debug, Clone)]
pub struct TextEditorState {
    handle: DocumentHandle,
    selection: Option<Selection>,
}

impl TextEditorState {
    pub fn new(handle: DocumentHandle, selection: Option<Selection>) -> Self {
        Self { handle, selection }
    }

    pub fn handle(&self) -> &DocumentHandle {
        &self.handle
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// 候補状態が新しいスタックエントリに値するか
    ///
    /// 偽を返した場合、呼び出し側は追加ではなく置換を行うべき。
    pub fn justifies_new_push_state(
        &self,
        candidate: &TextEditorState,
        origin: ChangeOrigin,
    ) -> bool {
        // 明示的なナビゲーション意図は合体より常に優先
        if origin == ChangeOrigin::Navigation {
            return true;
        }

        // ドキュメントが変わったなら常に新規
        if !self.handle.matches(&candidate.handle) {
            return true;
        }

        // 不明な状態は合体しない
        let (Some(previous), Some(next)) = (self.selection, candidate.selection) else {
            return true;
        };

        previous.top_line().abs_diff(next.top_line()) >= SIGNIFICANT_LINE_DISTANCE
    }
}

/// 選択の同一判定（両者なしも同一とみなす）
pub(crate) fn same_selection(a: Option<Selection>, b: Option<Selection>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_start_line(&b),
        _ => false,
    }
}
