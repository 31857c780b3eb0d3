//! 履歴サービス
//!
//! ホストのイベントをナビゲーションスタックと直近使用履歴へ配る
//! 統合層。アクティブドキュメントの切り替え検知、カーソル購読の
//! スコープ管理、ファイル削除・設定変化への反応、シャットダウン時の
//! 永続化を担う。

use std::rc::Rc;

use crate::document::{DocumentHandle, Selection};
use crate::error::Result;
use crate::event::Subscription;
use crate::history::closed::ClosedFileList;
use crate::history::exclusion::ExclusionFilter;
use crate::history::RecencyHistory;
use crate::host::{
    ConfigurationProvider, DocumentHost, FileChangesEvent, GroupId, OpenRequest,
    RecentlyOpenedRegistry, RemovalTarget,
};
use crate::stack::state::TextEditorState;
use crate::stack::NavigationStack;
use crate::storage::WorkspaceStorage;

/// アクティブエディタ変更イベントの内容
#[derive(Debug, Clone)]
pub struct ActiveEditorContext {
    pub handle: DocumentHandle,
    pub group: GroupId,
    pub selection: Option<Selection>,
}

/// エディタクローズイベントの内容
#[derive(Debug, Clone)]
pub struct ClosedEditorContext {
    pub handle: DocumentHandle,
    pub tab_index: usize,
    pub pinned: bool,
    /// 置換によって閉じられた場合は真（開き直しの対象にしない）
    pub replaced: bool,
}

/// 履歴サービス本体
///
/// 協調者は構築時に明示的に注入する。ナビゲーション操作はホストを
/// 引数で受け取る（アンビエントな参照は持たない）。
pub struct HistoryService {
    stack: NavigationStack,
    recency: RecencyHistory,
    closed: ClosedFileList,
    config: Rc<dyn ConfigurationProvider>,
    recently_opened: Option<Rc<dyn RecentlyOpenedRegistry>>,
    /// 直近に通知された（ドキュメント・グループ位置）の対
    last_active: Option<(DocumentHandle, GroupId)>,
    /// アクティブドキュメントのカーソル購読。次の切り替えで解除
    cursor_subscription: Option<Subscription>,
}

impl HistoryService {
    pub fn new(
        storage: Rc<dyn WorkspaceStorage>,
        config: Rc<dyn ConfigurationProvider>,
    ) -> Self {
        let recency = RecencyHistory::new(storage);
        recency.set_exclusions(ExclusionFilter::from_scopes(&config.search_exclusions()));

        Self {
            stack: NavigationStack::new(),
            recency,
            closed: ClosedFileList::new(),
            config,
            recently_opened: None,
            last_active: None,
            cursor_subscription: None,
        }
    }

    /// ウィンドウ横断レジストリへの通知を有効にする
    pub fn with_recently_opened(mut self, registry: Rc<dyn RecentlyOpenedRegistry>) -> Self {
        self.recently_opened = Some(registry);
        self
    }

    /// アクティブエディタの変更通知
    ///
    /// 同一ドキュメント・同一グループ位置の冗長な通知は捨てる。
    /// 本物の変更では前のカーソル購読を解除し、履歴とスタックへ通知し、
    /// 新しい入力がカーソル変化シグナルを公開していれば次の変更まで
    /// 購読する。
    pub fn handle_active_editor_change(&mut self, context: ActiveEditorContext) {
        if let Some((last_handle, last_group)) = &self.last_active {
            if last_handle.matches(&context.handle) && *last_group == context.group {
                return;
            }
        }

        // 前のドキュメントの購読は全経路で確実に解除される（RAII）
        self.cursor_subscription = None;
        self.last_active = Some((context.handle.clone(), context.group));

        self.recency.record_activation(&context.handle);

        let state = TextEditorState::new(context.handle.clone(), context.selection);
        self.stack.handle_editor_change(state);

        if let DocumentHandle::Input(input) = &context.handle {
            if let Some(signal) = input.selection_signal() {
                let stack = self.stack.clone();
                let handle = context.handle.clone();
                self.cursor_subscription = Some(signal.subscribe(move |event| {
                    stack.handle_selection_change(
                        TextEditorState::new(handle.clone(), event.selection),
                        event.origin,
                    );
                }));
            }
        }
    }

    /// エディタが閉じられたときの通知
    pub fn handle_editor_closed(&mut self, context: ClosedEditorContext) {
        self.closed.on_document_closed(
            &context.handle,
            context.tab_index,
            context.pinned,
            context.replaced,
        );
    }

    /// バッチ化されたファイル変化への反応（削除のみ対象）
    pub fn handle_file_changes(&mut self, event: &FileChangesEvent) {
        if !event.has_deletions() {
            return;
        }
        let target = RemovalTarget::FileDeleted(event);
        self.stack.remove(&target);
        self.recency.remove(&target);
        self.closed.remove(&target);
        // ファイルイベント由来の除去はウィンドウ横断レジストリへ通知しない
    }

    /// 設定変化への反応
    ///
    /// 除外式の実効値が変わったときだけ直近使用履歴を再フィルタする。
    /// ナビゲーションスタックには決して触れない。
    pub fn handle_configuration_change(&mut self) {
        let filter = ExclusionFilter::from_scopes(&self.config.search_exclusions());
        if self.recency.set_exclusions(filter) {
            log::debug!("search exclusions changed, recency history refiltered");
        }
    }

    /// シャットダウン通知。直近使用履歴を同期的に永続化する
    pub fn handle_shutdown(&self) {
        if let Err(err) = self.recency.save() {
            log::warn!("failed to persist recency history: {err}");
        }
    }

    /// ひとつ前の記録位置へ戻る
    pub fn back(&mut self, host: &mut dyn DocumentHost, across_documents: bool) -> Result<bool> {
        self.stack.back(host, across_documents)
    }

    /// ひとつ先の記録位置へ進む
    pub fn forward(
        &mut self,
        host: &mut dyn DocumentHost,
        across_documents: bool,
    ) -> Result<bool> {
        self.stack.forward(host, across_documents)
    }

    /// 直前位置へ跳ぶ
    pub fn last(&mut self, host: &mut dyn DocumentHost) -> Result<bool> {
        self.stack.last(host)
    }

    /// 最後に閉じたファイルを開き直す
    ///
    /// 現在開かれているファイルの記録は読み飛ばす。開ける記録がなければ
    /// 何もせず偽を返す。
    pub fn reopen_last_closed(&mut self, host: &mut dyn DocumentHost) -> Result<bool> {
        let Some(candidate) = self.closed.pop_reopen_candidate(host) else {
            return Ok(false);
        };

        let request = OpenRequest {
            handle: DocumentHandle::Resource(candidate.resource.clone()),
            selection: None,
            pinned: true,
            tab_index: Some(candidate.tab_index),
            reveal: true,
        };
        if let Err(err) = host.open_editor(request) {
            log::warn!("failed to reopen {}: {err}", candidate.resource.uri());
            return Err(err.into());
        }
        Ok(true)
    }

    /// 直近使用履歴の防御的コピー
    pub fn history(&self) -> Vec<DocumentHandle> {
        self.recency.history()
    }

    /// ドキュメントを全履歴から除去する
    ///
    /// リソース記述子による除去のみウィンドウ横断レジストリへ通知する
    /// （解決済み入力由来の除去は通知しない）。
    pub fn remove(&mut self, handle: &DocumentHandle) {
        let target = RemovalTarget::Handle(handle);
        self.stack.remove(&target);
        self.recency.remove(&target);
        self.closed.remove(&target);

        if let (Some(registry), Some(resource)) = (&self.recently_opened, handle.as_resource()) {
            registry.remove_recently_opened(resource.uri());
        }
    }

    /// スタック・履歴・閉じたファイルのすべてを空へ戻す
    pub fn clear(&mut self) {
        self.stack.clear();
        self.recency.clear();
        self.closed.clear();
        self.last_active = None;
        self.cursor_subscription = None;
    }

    /// ナビゲーションスタックへの読み取りアクセス
    pub fn stack(&self) -> &NavigationStack {
        &self.stack
    }

    pub fn can_go_back(&self) -> bool {
        self.stack.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.stack.can_go_forward()
    }

    pub fn can_go_last(&self) -> bool {
        self.stack.can_go_last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ChangeOrigin, EditorInput, FileInput, ScratchInput};
    use crate::error::NavigationError;
    use crate::host::{ExclusionScope, FileChange, FileChangeKind};
    use crate::storage::MemoryStorage;
    use std::cell::RefCell;
    use url::Url;

    struct StubHost {
        opened: Vec<OpenRequest>,
        open_uris: Vec<Url>,
    }

    impl StubHost {
        fn new() -> Self {
            Self {
                opened: Vec::new(),
                open_uris: Vec::new(),
            }
        }
    }

    impl DocumentHost for StubHost {
        fn open_editor(&mut self, request: OpenRequest) -> std::result::Result<(), NavigationError> {
            self.opened.push(request);
            Ok(())
        }

        fn active_editor(&self) -> Option<(DocumentHandle, GroupId)> {
            None
        }

        fn is_open_in_active_group(&self, uri: &Url) -> bool {
            self.open_uris.contains(uri)
        }
    }

    #[derive(Default)]
    struct StubConfig {
        scopes: RefCell<Vec<ExclusionScope>>,
    }

    impl ConfigurationProvider for StubConfig {
        fn search_exclusions(&self) -> Vec<ExclusionScope> {
            self.scopes.borrow().clone()
        }
    }

    #[derive(Default)]
    struct StubRegistry {
        removed: RefCell<Vec<Url>>,
    }

    impl RecentlyOpenedRegistry for StubRegistry {
        fn remove_recently_opened(&self, uri: &Url) {
            self.removed.borrow_mut().push(uri.clone());
        }
    }

    fn uri(path: &str) -> Url {
        Url::parse(&format!("file:///ws/{path}")).unwrap()
    }

    fn doc(path: &str) -> DocumentHandle {
        DocumentHandle::from_uri(uri(path))
    }

    fn service() -> HistoryService {
        HistoryService::new(Rc::new(MemoryStorage::new()), Rc::new(StubConfig::default()))
    }

    fn activate(service: &mut HistoryService, handle: DocumentHandle, group: GroupId) {
        service.handle_active_editor_change(ActiveEditorContext {
            handle,
            group,
            selection: None,
        });
    }

    #[test]
    fn test_redundant_activation_is_deduplicated() {
        let mut service = service();

        activate(&mut service, doc("a.rs"), 0);
        activate(&mut service, doc("a.rs"), 0);

        assert_eq!(service.stack().len(), 1);
        assert_eq!(service.history().len(), 1);
    }

    #[test]
    fn test_same_document_in_other_group_is_genuine_change() {
        let mut service = service();

        activate(&mut service, doc("a.rs"), 0);
        activate(&mut service, doc("a.rs"), 1);

        // 履歴は同一ドキュメントなので1件のまま
        assert_eq!(service.history().len(), 1);
    }

    #[test]
    fn test_cursor_subscription_scoped_to_active_document() {
        let mut service = service();

        let first = FileInput::new(uri("a.rs"));
        let second = FileInput::new(uri("b.rs"));

        activate(&mut service, DocumentHandle::from_input(first.clone()), 0);
        assert_eq!(first.selection_signal().unwrap().listener_count(), 1);

        activate(&mut service, DocumentHandle::from_input(second.clone()), 0);

        // 前のドキュメントの購読は解除され、新しい方だけが残る
        assert_eq!(first.selection_signal().unwrap().listener_count(), 0);
        assert_eq!(second.selection_signal().unwrap().listener_count(), 1);
    }

    #[test]
    fn test_cursor_events_drive_stack_classification() {
        let mut service = service();
        let input = FileInput::new(uri("a.rs"));

        service.handle_active_editor_change(ActiveEditorContext {
            handle: DocumentHandle::from_input(input.clone()),
            group: 0,
            selection: Some(Selection::caret(0, 0)),
        });
        assert_eq!(service.stack().len(), 1);

        // 有意なジャンプ（合体時間窓の外で）
        service.stack().age_current_entry(std::time::Duration::from_secs(1));
        input.notify_selection_changed(Some(Selection::caret(100, 0)), ChangeOrigin::User);
        assert_eq!(service.stack().len(), 2);

        // 小さな移動は置換に留まる
        service.stack().age_current_entry(std::time::Duration::from_secs(1));
        input.notify_selection_changed(Some(Selection::caret(103, 0)), ChangeOrigin::User);
        assert_eq!(service.stack().len(), 2);
    }

    #[test]
    fn test_service_drop_unsubscribes_cursor_listener() {
        let input = FileInput::new(uri("a.rs"));

        {
            let mut service = service();
            activate(&mut service, DocumentHandle::from_input(input.clone()), 0);
            assert_eq!(input.selection_signal().unwrap().listener_count(), 1);
        }

        assert_eq!(input.selection_signal().unwrap().listener_count(), 0);
    }

    #[test]
    fn test_file_deletion_removes_from_all_collections() {
        let mut service = service();

        activate(&mut service, doc("src/a.rs"), 0);
        activate(&mut service, doc("docs/b.md"), 0);
        service.handle_editor_closed(ClosedEditorContext {
            handle: doc("src/c.rs"),
            tab_index: 0,
            pinned: true,
            replaced: false,
        });

        service.handle_file_changes(&FileChangesEvent::new(vec![FileChange {
            uri: uri("src"),
            kind: FileChangeKind::Deleted,
        }]));

        assert_eq!(service.stack().len(), 1);
        assert_eq!(service.history().len(), 1);

        let mut host = StubHost::new();
        // src/c.rs の記録は消えているので開き直す対象がない
        assert!(!service.reopen_last_closed(&mut host).unwrap());
    }

    #[test]
    fn test_modification_events_are_ignored() {
        let mut service = service();
        activate(&mut service, doc("a.rs"), 0);

        service.handle_file_changes(&FileChangesEvent::new(vec![FileChange {
            uri: uri("a.rs"),
            kind: FileChangeKind::Modified,
        }]));

        assert_eq!(service.stack().len(), 1);
        assert_eq!(service.history().len(), 1);
    }

    #[test]
    fn test_configuration_change_refilters_recency_only() {
        let config = Rc::new(StubConfig::default());
        let mut service =
            HistoryService::new(Rc::new(MemoryStorage::new()), config.clone());

        activate(&mut service, doc("trace.log"), 0);
        activate(&mut service, doc("main.rs"), 1);
        assert_eq!(service.history().len(), 2);
        assert_eq!(service.stack().len(), 2);

        *config.scopes.borrow_mut() = vec![ExclusionScope {
            root: None,
            patterns: vec!["**/*.log".to_string()],
        }];
        service.handle_configuration_change();

        // 除外は直近使用履歴のみに作用し、スタックには作用しない
        assert_eq!(service.history().len(), 1);
        assert_eq!(service.stack().len(), 2);
    }

    #[test]
    fn test_shutdown_persists_history() {
        let storage: Rc<MemoryStorage> = Rc::new(MemoryStorage::new());

        {
            let mut service =
                HistoryService::new(storage.clone(), Rc::new(StubConfig::default()));
            activate(&mut service, doc("a.rs"), 0);
            service.handle_shutdown();
        }

        let reloaded =
            HistoryService::new(storage, Rc::new(StubConfig::default()));
        let entries = reloaded.history();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].matches(&doc("a.rs")));
    }

    #[test]
    fn test_remove_notifies_registry_for_resources_only() {
        let registry = Rc::new(StubRegistry::default());
        let mut service = HistoryService::new(
            Rc::new(MemoryStorage::new()),
            Rc::new(StubConfig::default()),
        )
        .with_recently_opened(registry.clone());

        let scratch = DocumentHandle::from_input(ScratchInput::named("untitled"));
        activate(&mut service, scratch.clone(), 0);
        activate(&mut service, doc("a.rs"), 1);

        service.remove(&scratch);
        assert!(registry.removed.borrow().is_empty());

        service.remove(&doc("a.rs"));
        assert_eq!(registry.removed.borrow().as_slice(), &[uri("a.rs")]);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut service = service();

        activate(&mut service, doc("a.rs"), 0);
        activate(&mut service, doc("b.rs"), 0);
        service.handle_editor_closed(ClosedEditorContext {
            handle: doc("c.rs"),
            tab_index: 0,
            pinned: true,
            replaced: false,
        });

        service.clear();

        assert!(service.stack().is_empty());
        assert!(service.history().is_empty());
        let mut host = StubHost::new();
        assert!(!service.reopen_last_closed(&mut host).unwrap());
    }

    #[test]
    fn test_reopen_last_closed_opens_pinned_at_recorded_index() {
        let mut service = service();
        service.handle_editor_closed(ClosedEditorContext {
            handle: doc("a.rs"),
            tab_index: 3,
            pinned: true,
            replaced: false,
        });

        let mut host = StubHost::new();
        assert!(service.reopen_last_closed(&mut host).unwrap());

        let request = host.opened.last().unwrap();
        assert!(request.handle.matches(&doc("a.rs")));
        assert!(request.pinned);
        assert_eq!(request.tab_index, Some(3));
    }
}
