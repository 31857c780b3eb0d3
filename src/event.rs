//! イベント通知システム
//!
//! 単一スレッド前提の軽量なリスナー登録・配信機構。
//! 購読は `Subscription` のドロップで自動解除される。

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// リスナーの一意識別子
pub type ListenerId = usize;

type Callback<T> = Box<dyn FnMut(&T)>;

struct ListenerEntry<T> {
    id: ListenerId,
    /// 配信中は一時的に取り出されるため Option
    callback: Option<Callback<T>>,
}

struct SignalInner<T> {
    listeners: Vec<ListenerEntry<T>>,
    next_id: ListenerId,
}

impl<T> SignalInner<T> {
    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|entry| entry.id != id);
        self.listeners.len() != before
    }
}

/// イベントシグナル
///
/// 配信中のリスナー追加・解除を許容する。配信中に追加されたリスナーは
/// 次回の配信から呼び出され、配信中に解除されたリスナーは以降
/// 呼び出されない。
pub struct Signal<T> {
    inner: Rc<RefCell<SignalInner<T>>>,
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// リスナーを登録し、解除ハンドルを返す
    pub fn subscribe(&self, callback: impl FnMut(&T) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push(ListenerEntry {
                id,
                callback: Some(Box::new(callback)),
            });
            id
        };

        let weak: Weak<RefCell<SignalInner<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().remove(id);
                }
            })),
        }
    }

    /// 登録済みの全リスナーへイベントを配信
    pub fn emit(&self, payload: &T) {
        // 配信開始時点のリスナーのみを対象とする
        let ids: Vec<ListenerId> = {
            let inner = self.inner.borrow();
            inner.listeners.iter().map(|entry| entry.id).collect()
        };

        for id in ids {
            // コールバックを取り出してから借用を解放し、再入に備える
            let callback = {
                let mut inner = self.inner.borrow_mut();
                inner
                    .listeners
                    .iter_mut()
                    .find(|entry| entry.id == id)
                    .and_then(|entry| entry.callback.take())
            };

            let Some(mut callback) = callback else {
                continue; // 配信中に解除された
            };
            callback(payload);

            let mut inner = self.inner.borrow_mut();
            if let Some(entry) = inner.listeners.iter_mut().find(|entry| entry.id == id) {
                entry.callback = Some(callback);
            }
        }
    }

    /// 登録中のリスナー数
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// 購読ハンドル
///
/// ドロップ時に自動でリスナー登録を解除する。シグナル本体が先に
/// 破棄されていた場合は何もしない。
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// 明示的に購読を解除
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_emit() {
        let signal: Signal<u32> = Signal::new();
        let received = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&received);
        let _sub = signal.subscribe(move |value| sink.borrow_mut().push(*value));

        signal.emit(&1);
        signal.emit(&2);

        assert_eq!(*received.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_drop_cancels_subscription() {
        let signal: Signal<u32> = Signal::new();
        let received = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&received);
        let sub = signal.subscribe(move |value| sink.borrow_mut().push(*value));
        assert_eq!(signal.listener_count(), 1);

        drop(sub);
        assert_eq!(signal.listener_count(), 0);

        signal.emit(&1);
        assert!(received.borrow().is_empty());
    }

    #[test]
    fn test_cancel_during_emit() {
        // 配信中に自分自身を解除しても他のリスナーへの配信は継続する
        let signal: Signal<()> = Signal::new();
        let holder: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(RefCell::new(0));

        let holder_clone = Rc::clone(&holder);
        let first = signal.subscribe(move |_| {
            if let Some(sub) = holder_clone.borrow_mut().take() {
                sub.cancel();
            }
        });
        *holder.borrow_mut() = Some(first);

        let count_clone = Rc::clone(&count);
        let _second = signal.subscribe(move |_| *count_clone.borrow_mut() += 1);

        signal.emit(&());
        assert_eq!(*count.borrow(), 1);
        assert_eq!(signal.listener_count(), 1);

        // 解除済みリスナーは再配信されない
        signal.emit(&());
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_subscribe_during_emit_deferred() {
        let signal: Signal<()> = Signal::new();
        let count = Rc::new(RefCell::new(0));

        let signal_clone = signal.clone();
        let count_clone = Rc::clone(&count);
        let subs: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));
        let subs_clone = Rc::clone(&subs);
        let _sub = signal.subscribe(move |_| {
            let inner_count = Rc::clone(&count_clone);
            let new_sub = signal_clone.subscribe(move |_| *inner_count.borrow_mut() += 1);
            subs_clone.borrow_mut().push(new_sub);
        });

        // 配信中に追加されたリスナーは同一配信では呼ばれない
        signal.emit(&());
        assert_eq!(*count.borrow(), 0);

        signal.emit(&());
        assert_eq!(*count.borrow(), 1);
    }
}
