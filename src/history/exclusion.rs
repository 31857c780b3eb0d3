//! 履歴の除外フィルタ
//!
//! 検索除外設定から導出したglob集合で履歴への記録を抑止する。
//! ワークスペースルート単位のスコープを持ち、ルート配下のエントリは
//! ルート相対パスで、それ以外はURIパスで照合する。

use globset::{Glob, GlobSet, GlobSetBuilder};
use url::Url;

use crate::document::DocumentHandle;
use crate::host::ExclusionScope;

struct CompiledScope {
    root: Option<Url>,
    set: GlobSet,
}

/// コンパイル済みの除外フィルタ
///
/// 実効パターン集合の変化検知のため、元の式をフィンガープリントとして
/// 保持する。
pub struct ExclusionFilter {
    scopes: Vec<CompiledScope>,
    fingerprint: Vec<ExclusionScope>,
}

impl ExclusionFilter {
    /// 何も除外しないフィルタ
    pub fn empty() -> Self {
        Self {
            scopes: Vec::new(),
            fingerprint: Vec::new(),
        }
    }

    /// 設定スコープからフィルタを構築する
    ///
    /// 不正なglob式は警告を出して読み飛ばす（設定ミスで履歴全体を
    /// 止めない）。
    pub fn from_scopes(scopes: &[ExclusionScope]) -> Self {
        let mut compiled = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let mut builder = GlobSetBuilder::new();
            let mut any = false;
            for pattern in &scope.patterns {
                match Glob::new(pattern) {
                    Ok(glob) => {
                        builder.add(glob);
                        any = true;
                    }
                    Err(err) => {
                        log::warn!("skipping invalid exclude pattern '{pattern}': {err}");
                    }
                }
            }
            if !any {
                continue;
            }
            match builder.build() {
                Ok(set) => compiled.push(CompiledScope {
                    root: scope.root.clone(),
                    set,
                }),
                Err(err) => {
                    log::warn!("failed to build exclude set: {err}");
                }
            }
        }
        Self {
            scopes: compiled,
            fingerprint: scopes.to_vec(),
        }
    }

    /// 実効パターンが同じかどうか（再フィルタ要否の判定に使う）
    pub fn same_patterns(&self, other: &ExclusionFilter) -> bool {
        self.fingerprint == other.fingerprint
    }

    /// ドキュメントが除外対象か
    ///
    /// URIを持たないドキュメントは除外されない。
    pub fn excludes(&self, handle: &DocumentHandle) -> bool {
        match handle.file_uri() {
            Some(uri) => self.excludes_uri(&uri),
            None => false,
        }
    }

    pub fn excludes_uri(&self, uri: &Url) -> bool {
        self.scopes.iter().any(|scope| {
            let candidate = match &scope.root {
                Some(root) => match root_relative(root, uri) {
                    Some(relative) => relative,
                    None => return false, // ルート外はこのスコープの対象外
                },
                None => uri.path().trim_start_matches('/').to_string(),
            };
            scope.set.is_match(&candidate)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// `uri` が `root` 配下ならルート相対パスを返す
fn root_relative(root: &Url, uri: &Url) -> Option<String> {
    if root.scheme() != uri.scheme() || root.host_str() != uri.host_str() {
        return None;
    }
    let root_path = root.path().trim_end_matches('/');
    let path = uri.path();
    if !path.starts_with(root_path) || path.as_bytes().get(root_path.len()) != Some(&b'/') {
        return None;
    }
    Some(path[root_path.len() + 1..].to_string())
}
