//! ドキュメント参照モデル
//!
//! 履歴が追跡する対象は「ホストが所有する解決済み入力」か
//! 「URIベースの軽量リソース記述子」のいずれか。比較・永続化の
//! ロジックはすべてこのタグ付きユニオンへのディスパッチで行う。

use std::fmt;
use std::rc::Rc;

use url::Url;

use crate::event::Signal;

pub mod inputs;

pub use inputs::{FileInput, ScratchInput};

/// ホスト定義のドキュメント識別子
pub type InputId = u64;

/// 選択変化の由来
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// 通常のカーソル移動・編集に伴う変化
    User,
    /// 明示的なナビゲーション意図を持つ変化（定義ジャンプ等）
    Navigation,
}

/// カーソル位置変化イベント
#[derive(Debug, Clone, Copy)]
pub struct SelectionEvent {
    pub selection: Option<Selection>,
    pub origin: ChangeOrigin,
}

/// テキスト上の位置（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub line: u32,
    pub column: u32,
}

impl TextPosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// 選択範囲
///
/// 開始位置のみ必須。終端を持たない場合は単なるカーソル位置を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: TextPosition,
    pub end: Option<TextPosition>,
}

impl Selection {
    /// カーソルのみの選択
    pub fn caret(line: u32, column: u32) -> Self {
        Self {
            start: TextPosition::new(line, column),
            end: None,
        }
    }

    /// 範囲を持つ選択
    pub fn range(start: TextPosition, end: TextPosition) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// 意図的に粗い同一判定：開始行番号のみを比較する（桁は無視）
    pub fn same_start_line(&self, other: &Selection) -> bool {
        self.start.line == other.start.line
    }

    /// 開始行と終端行のうち小さい方
    pub fn top_line(&self) -> u32 {
        match self.end {
            Some(end) => self.start.line.min(end.line),
            None => self.start.line,
        }
    }
}

/// 解決済みエディタ入力のケイパビリティ集合
///
/// ホストが実装する。identity はホスト定義、破棄通知と選択変化通知は
/// 任意ケイパビリティ（提供しない入力も正当）。
pub trait EditorInput {
    /// ホスト定義の同一性識別子
    fn id(&self) -> InputId;

    /// 表示名。持たない入力は履歴に記録されない
    fn name(&self) -> Option<String>;

    /// ファイルを背景に持つ場合、そのURI
    fn file_uri(&self) -> Option<Url>;

    /// 破棄通知シグナル
    fn dispose_signal(&self) -> Option<&Signal<()>> {
        None
    }

    /// カーソル位置変化シグナル
    fn selection_signal(&self) -> Option<&Signal<SelectionEvent>> {
        None
    }
}

/// URIベースのリソース記述子
///
/// 常に有効で、永続化に適した形。同一判定は正規化済みURI文字列の
/// 等価比較（`Url` の等価比較はシリアライズ形の比較に一致する）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    uri: Url,
}

impl ResourceDescriptor {
    pub fn new(uri: Url) -> Self {
        Self { uri }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// パス終端のセグメントを表示名として返す
    pub fn name(&self) -> Option<String> {
        self.uri
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(|s| s.to_string())
    }
}

/// ドキュメント参照
///
/// 解決済み入力かリソース記述子のいずれか。永続化できるのは
/// リソース記述子のみ。
#[derive(Clone)]
pub enum DocumentHandle {
    /// ホスト所有の解決済み入力（後に破棄されうる）
    Input(Rc<dyn EditorInput>),
    /// URIベースの軽量参照
    Resource(ResourceDescriptor),
}

impl DocumentHandle {
    pub fn from_input(input: Rc<dyn EditorInput>) -> Self {
        DocumentHandle::Input(input)
    }

    pub fn from_uri(uri: Url) -> Self {
        DocumentHandle::Resource(ResourceDescriptor::new(uri))
    }

    /// 表示名
    pub fn name(&self) -> Option<String> {
        match self {
            DocumentHandle::Input(input) => input.name(),
            DocumentHandle::Resource(resource) => resource.name(),
        }
    }

    /// 背景ファイルのURI
    pub fn file_uri(&self) -> Option<Url> {
        match self {
            DocumentHandle::Input(input) => input.file_uri(),
            DocumentHandle::Resource(resource) => Some(resource.uri().clone()),
        }
    }

    /// 永続化可能な形。解決済み入力は永続化対象外
    pub fn as_resource(&self) -> Option<&ResourceDescriptor> {
        match self {
            DocumentHandle::Input(_) => None,
            DocumentHandle::Resource(resource) => Some(resource),
        }
    }

    /// ファイルを背景に持つ入力をリソース記述子へ置き換える
    ///
    /// スタックが入力の破棄後も有効なエントリを保持するための変換。
    pub fn prefer_resource(self) -> DocumentHandle {
        match &self {
            DocumentHandle::Input(input) => match input.file_uri() {
                Some(uri) => DocumentHandle::from_uri(uri),
                None => self,
            },
            DocumentHandle::Resource(_) => self,
        }
    }

    /// ドキュメント同一性の判定
    ///
    /// * 入力同士：ホスト定義のidの等価
    /// * リソース同士：正規化済みURIの等価
    /// * 入力とリソース：入力の背景ファイルURIが記述子のURIと等しい場合に真
    pub fn matches(&self, other: &DocumentHandle) -> bool {
        match (self, other) {
            (DocumentHandle::Input(a), DocumentHandle::Input(b)) => a.id() == b.id(),
            (DocumentHandle::Resource(a), DocumentHandle::Resource(b)) => a == b,
            (DocumentHandle::Input(input), DocumentHandle::Resource(resource))
            | (DocumentHandle::Resource(resource), DocumentHandle::Input(input)) => {
                input.file_uri().as_ref() == Some(resource.uri())
            }
        }
    }

    /// 指定URIのドキュメントかどうか
    pub fn matches_uri(&self, uri: &Url) -> bool {
        match self {
            DocumentHandle::Input(input) => input.file_uri().as_ref() == Some(uri),
            DocumentHandle::Resource(resource) => resource.uri() == uri,
        }
    }

    /// 入力変種のidを返す（リソースはNone）
    pub fn input_id(&self) -> Option<InputId> {
        match self {
            DocumentHandle::Input(input) => Some(input.id()),
            DocumentHandle::Resource(_) => None,
        }
    }
}

impl fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentHandle::Input(input) => f
                .debug_struct("Input")
                .field("id", &input.id())
                .field("name", &input.name())
                .finish(),
            DocumentHandle::Resource(resource) => f
                .debug_struct("Resource")
                .field("uri", &resource.uri().as_str())
                .finish(),
        }
    }
}
