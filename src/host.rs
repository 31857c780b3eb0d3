//! ホスト連携インタフェース
//!
//! コアが消費する外部協調者の契約。具象APIではなく抽象契約として
//! 定義し、構築時に明示的に注入する（アンビエントなシングルトンは
//! 使わない）。

use url::Url;

use crate::document::{DocumentHandle, InputId, Selection};
use crate::error::NavigationError;

/// エディタグループの位置識別子
pub type GroupId = usize;

/// ドキュメントを開く要求
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub handle: DocumentHandle,
    /// 復元すべき選択位置（ドキュメント跨ぎのナビゲーションでは付与しない）
    pub selection: Option<Selection>,
    pub pinned: bool,
    /// タブ挿入位置。Noneならホストの既定位置
    pub tab_index: Option<usize>,
    /// 開いたエディタをアクティブ化して表示するか
    pub reveal: bool,
}

/// ドキュメントホスト
///
/// 契約：`open_editor` は対応するアクティブ化イベントを自身の戻り前に
/// 配送する（単一スレッドのコールバック順序）。スタックの再入ガードは
/// この契約を前提に open の前後でのみ張られる。
pub trait DocumentHost {
    /// ドキュメントを開く。失敗してもホスト側の状態は壊さないこと
    fn open_editor(&mut self, request: OpenRequest) -> std::result::Result<(), NavigationError>;

    /// 現在アクティブなドキュメントとそのグループ位置
    fn active_editor(&self) -> Option<(DocumentHandle, GroupId)>;

    /// 指定ファイルがアクティブグループで開かれているか
    fn is_open_in_active_group(&self, uri: &Url) -> bool;
}

/// ワークスペースルート単位の除外パターン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionScope {
    /// Noneはルートに紐付かないグローバルスコープ
    pub root: Option<Url>,
    pub patterns: Vec<String>,
}

/// 設定プロバイダ
///
/// 検索除外のglob式をワークスペースルート単位で提供する。設定変化は
/// ホストが `HistoryService::handle_configuration_change` を呼ぶことで
/// 反映される。
pub trait ConfigurationProvider {
    fn search_exclusions(&self) -> Vec<ExclusionScope>;
}

/// ウィンドウ横断の「最近開いた項目」レジストリ
pub trait RecentlyOpenedRegistry {
    fn remove_recently_opened(&self, uri: &Url);
}

/// ファイル変化の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

/// 単一のファイル変化
#[derive(Debug, Clone)]
pub struct FileChange {
    pub uri: Url,
    pub kind: FileChangeKind,
}

/// バッチ化されたファイル変化イベント
///
/// コアが反応するのは削除（移動元を含む）のみ。
#[derive(Debug, Clone, Default)]
pub struct FileChangesEvent {
    pub changes: Vec<FileChange>,
}

impl FileChangesEvent {
    pub fn new(changes: Vec<FileChange>) -> Self {
        Self { changes }
    }

    pub fn has_deletions(&self) -> bool {
        self.changes
            .iter()
            .any(|change| change.kind == FileChangeKind::Deleted)
    }

    /// 指定URIが削除の影響を受けるか
    ///
    /// 削除されたURIそのもの、または削除されたディレクトリ配下を対象とする。
    pub fn affects_deleted(&self, uri: &Url) -> bool {
        self.changes
            .iter()
            .filter(|change| change.kind == FileChangeKind::Deleted)
            .any(|change| is_equal_or_parent(uri, &change.uri))
    }
}

/// `candidate` が `parent` と同一、またはその配下にあるか
fn is_equal_or_parent(candidate: &Url, parent: &Url) -> bool {
    if candidate == parent {
        return true;
    }
    if candidate.scheme() != parent.scheme() || candidate.host_str() != parent.host_str() {
        return false;
    }
    let parent_path = parent.path().trim_end_matches('/');
    candidate.path().starts_with(parent_path)
        && candidate.path().as_bytes().get(parent_path.len()) == Some(&b'/')
}

/// 除去対象の指定
///
/// ドキュメント参照そのもの、入力id、リソースURI、削除イベントの
/// いずれでも指定できる。存在しない対象の除去は常に何もしない。
#[derive(Debug, Clone, Copy)]
pub enum RemovalTarget<'a> {
    Handle(&'a DocumentHandle),
    Input(InputId),
    Resource(&'a Url),
    FileDeleted(&'a FileChangesEvent),
}

impl RemovalTarget<'_> {
    pub fn matches(&self, handle: &DocumentHandle) -> bool {
        match self {
            RemovalTarget::Handle(target) => target.matches(handle),
            RemovalTarget::Input(id) => handle.input_id() == Some(*id),
            RemovalTarget::Resource(uri) => handle.matches_uri(uri),
            RemovalTarget::FileDeleted(event) => match handle.file_uri() {
                Some(uri) => event.affects_deleted(&uri),
                None => false,
            },
        }
    }

    pub fn matches_uri(&self, uri: &Url) -> bool {
        match self {
            RemovalTarget::Handle(target) => target.matches_uri(uri),
            RemovalTarget::Input(_) => false,
            RemovalTarget::Resource(target) => *target == uri,
            RemovalTarget::FileDeleted(event) => event.affects_deleted(uri),
        }
    }
}
