//! 統合テスト共通のモックホスト
#![allow(dead_code)]

use std::collections::HashSet;

use rireki::{DocumentHandle, DocumentHost, GroupId, NavigationError, OpenRequest};
use url::Url;

/// 開く要求を記録するだけのホスト実装
pub struct MockHost {
    pub opened: Vec<OpenRequest>,
    pub open_uris: HashSet<String>,
    pub fail_next_open: bool,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            opened: Vec::new(),
            open_uris: HashSet::new(),
            fail_next_open: false,
        }
    }

    pub fn mark_open(&mut self, uri: &Url) {
        self.open_uris.insert(uri.to_string());
    }

    pub fn last_opened_uri(&self) -> Option<Url> {
        self.opened
            .last()
            .and_then(|request| request.handle.file_uri())
    }
}

impl DocumentHost for MockHost {
    fn open_editor(&mut self, request: OpenRequest) -> Result<(), NavigationError> {
        if self.fail_next_open {
            self.fail_next_open = false;
            return Err(NavigationError::OpenFailed {
                name: request.handle.name().unwrap_or_default(),
                reason: "mock host refused".to_string(),
            });
        }
        self.opened.push(request);
        Ok(())
    }

    fn active_editor(&self) -> Option<(DocumentHandle, GroupId)> {
        None
    }

    fn is_open_in_active_group(&self, uri: &Url) -> bool {
        self.open_uris.contains(&uri.to_string())
    }
}

pub fn ws_uri(path: &str) -> Url {
    Url::parse(&format!("file:///workspace/{path}")).unwrap()
}

pub fn ws_doc(path: &str) -> DocumentHandle {
    DocumentHandle::from_uri(ws_uri(path))
}
