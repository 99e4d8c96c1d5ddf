use async_trait::async_trait;

use crate::domain::entity::{NewProduct, Product};

/// 同じ SKU の商品が既に存在する場合に create が返すエラー。
#[derive(Debug, thiserror::Error)]
#[error("product with sku {0:?} already exists")]
pub struct DuplicateSku(pub String);

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_all(&self) -> anyhow::Result<Vec<Product>>;
    async fn find_by_sku(&self, sku: &str) -> anyhow::Result<Option<Product>>;
    /// 商品を採番して保存する。SKU が重複する場合は [`DuplicateSku`] を返す。
    async fn create(&self, product: &NewProduct) -> anyhow::Result<Product>;
}
