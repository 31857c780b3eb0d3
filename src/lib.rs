//! rireki - ドキュメントワークベンチ向けナビゲーション履歴エンジン
//!
//! 訪問したドキュメントと選択位置を追跡し、ブラウザ風のback/forward
//! 移動と、クイックオープン用の直近使用リストを提供する。エディタUIや
//! タブ管理は持たず、ホストとは細いインタフェース経由で協調する。

// コアモジュール
pub mod error;
pub mod event;

// データ層
pub mod document;
pub mod storage;

// 履歴層
pub mod stack;
pub mod history;

// 統合層
pub mod host;
pub mod service;

// 公開API
pub use document::{
    ChangeOrigin, DocumentHandle, EditorInput, FileInput, InputId, ResourceDescriptor,
    ScratchInput, Selection, SelectionEvent, TextPosition,
};
pub use error::{HistoryError, NavigationError, Result, StorageError};
pub use history::{RecencyHistory, CLOSED_CAPACITY, HISTORY_CAPACITY};
pub use host::{
    ConfigurationProvider, DocumentHost, ExclusionScope, FileChange, FileChangeKind,
    FileChangesEvent, GroupId, OpenRequest, RecentlyOpenedRegistry, RemovalTarget,
};
pub use service::{ActiveEditorContext, ClosedEditorContext, HistoryService};
pub use stack::state::{TextEditorState, COALESCE_WINDOW, SIGNIFICANT_LINE_DISTANCE};
pub use stack::{NavigationStack, STACK_CAPACITY};
