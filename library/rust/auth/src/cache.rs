//! TTL 付きの単一フライト（single-flight）キャッシュ。
//!
//! discovery ドキュメントと JWKS の両方がこの型を使う。
//! 同時に更新が必要になっても上流への取得は常に 1 本だけになり、
//! 待機していた呼び出しは成功・失敗を問わず同じ結果を共有する。
//! 取得処理は `tokio::spawn` したタスク内でロックを保持したまま実行するため、
//! 呼び出し元のリクエストがキャンセルされても取得は完了まで進む。

use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::error::AuthError;

/// Snapshot はある時点で取得したキャッシュ値と取得時刻の組。
///
/// 値と取得時刻は常に一緒に読み出されるため、両者が食い違うことはない。
#[derive(Debug)]
pub struct Snapshot<T> {
    value: Arc<T>,
    fetched_at: Instant,
    generation: u64,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
            generation: self.generation,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    /// 取得からの経過時間。
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// 保存ごとに単調増加する世代番号。強制再取得の重複排除に使う。
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// キャッシュ対象の種別。取得失敗時のエラー種別を決める。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheKind {
    Discovery,
    KeySet,
}

impl CacheKind {
    fn name(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::KeySet => "jwks",
        }
    }

    fn unavailable(self, detail: String) -> AuthError {
        match self {
            Self::Discovery => AuthError::DiscoveryUnavailable(detail),
            Self::KeySet => AuthError::JwksUnavailable(detail),
        }
    }
}

struct Inner<T> {
    kind: CacheKind,
    ttl: Duration,
    entry: RwLock<Option<Snapshot<T>>>,
    refresh: Arc<Mutex<()>>,
    generation: AtomicU64,
    /// 完了した取得の回数（成功・失敗の両方を数える）
    attempts: AtomicU64,
    /// 直近の取得が失敗していればそのエラー
    last_failure: RwLock<Option<AuthError>>,
}

impl<T> Inner<T> {
    /// 取得結果を反映する。失敗時は TTL 切れのエントリだけを破棄する。
    ///
    /// 更新ロックを保持したまま呼ぶこと。
    async fn store(&self, result: Result<T, AuthError>) -> Result<Snapshot<T>, AuthError> {
        *self.last_failure.write().await = result.as_ref().err().cloned();
        let stored = self.apply(result).await;
        self.attempts.fetch_add(1, Ordering::AcqRel);
        stored
    }

    async fn apply(&self, result: Result<T, AuthError>) -> Result<Snapshot<T>, AuthError> {
        let mut entry = self.entry.write().await;
        match result {
            Ok(value) => {
                let snapshot = Snapshot {
                    value: Arc::new(value),
                    fetched_at: Instant::now(),
                    generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
                };
                *entry = Some(snapshot.clone());
                debug!(
                    cache = self.kind.name(),
                    generation = snapshot.generation,
                    "cache refreshed"
                );
                Ok(snapshot)
            }
            Err(err) => {
                if entry.as_ref().is_some_and(|s| s.age() >= self.ttl) {
                    *entry = None;
                    warn!(
                        cache = self.kind.name(),
                        error = %err,
                        "refresh failed, discarded expired entry"
                    );
                } else {
                    warn!(cache = self.kind.name(), error = %err, "refresh failed");
                }
                Err(err)
            }
        }
    }
}

/// RefreshingCache は TTL と単一フライト更新を備えた単一エントリのキャッシュ。
pub(crate) struct RefreshingCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for RefreshingCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> RefreshingCache<T> {
    pub(crate) fn new(kind: CacheKind, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                ttl,
                entry: RwLock::new(None),
                refresh: Arc::new(Mutex::new(())),
                generation: AtomicU64::new(0),
                attempts: AtomicU64::new(0),
                last_failure: RwLock::new(None),
            }),
        }
    }

    /// 現在のエントリ（TTL 切れを含む）。
    pub(crate) async fn current(&self) -> Option<Snapshot<T>> {
        self.inner.entry.read().await.clone()
    }

    async fn fresh(&self) -> Option<Snapshot<T>> {
        self.current()
            .await
            .filter(|s| s.age() < self.inner.ttl)
    }

    /// TTL 内のエントリを返す。なければ `fetch` を単一フライトで実行して更新する。
    pub(crate) async fn get<F, Fut>(&self, fetch: F) -> Result<Snapshot<T>, AuthError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AuthError>> + Send + 'static,
    {
        if let Some(snapshot) = self.fresh().await {
            return Ok(snapshot);
        }
        let ttl = self.inner.ttl;
        self.refresh_unless(move |s| s.age() < ttl, fetch).await
    }

    /// TTL を無視して再取得する。
    ///
    /// `observed` は呼び出し元が最後に見た世代番号。待機中に別の呼び出しが
    /// それより新しい世代を保存していれば、再取得せずにそれを返す。
    pub(crate) async fn force_refresh<F, Fut>(
        &self,
        observed: Option<u64>,
        fetch: F,
    ) -> Result<Snapshot<T>, AuthError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AuthError>> + Send + 'static,
    {
        self.refresh_unless(
            move |s| observed.is_none_or(|seen| s.generation > seen),
            fetch,
        )
        .await
    }

    async fn refresh_unless<P, F, Fut>(
        &self,
        satisfied: P,
        fetch: F,
    ) -> Result<Snapshot<T>, AuthError>
    where
        P: Fn(&Snapshot<T>) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AuthError>> + Send + 'static,
    {
        let ticket = self.inner.attempts.load(Ordering::Acquire);
        let permit = Arc::clone(&self.inner.refresh).lock_owned().await;

        // 待機中に別の呼び出しが更新を終えていればそれを使う
        if let Some(snapshot) = self.current().await {
            if satisfied(&snapshot) {
                return Ok(snapshot);
            }
        }
        // 待機中に完了した取得が失敗していれば、再取得せずにそのエラーを共有する
        if self.inner.attempts.load(Ordering::Acquire) != ticket {
            if let Some(err) = self.inner.last_failure.read().await.clone() {
                debug!(cache = self.inner.kind.name(), "sharing failed refresh with waiter");
                return Err(err);
            }
        }

        let inner = Arc::clone(&self.inner);
        let fetching = fetch();
        let task = tokio::spawn(async move {
            let _permit = permit;
            let result = fetching.await;
            inner.store(result).await
        });

        match task.await {
            Ok(result) => result,
            Err(err) => {
                error!(cache = self.inner.kind.name(), error = %err, "refresh task aborted");
                Err(self
                    .inner
                    .kind
                    .unavailable(format!("refresh task aborted: {err}")))
            }
        }
    }
}
