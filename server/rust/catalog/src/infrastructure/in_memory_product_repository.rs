use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::entity::{NewProduct, Product};
use crate::domain::repository::product_repository::DuplicateSku;
use crate::domain::repository::ProductRepository;

/// InMemoryProductRepository はプロセス内メモリに商品を保持するリポジトリ。
/// ID は 1 から連番で採番する。
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<Vec<Product>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初期データを持つリポジトリを生成する。
    pub fn with_products(products: Vec<NewProduct>) -> Self {
        let products = products
            .into_iter()
            .zip(1u64..)
            .map(|(p, id)| Product {
                id,
                sku: p.sku,
                name: p.name,
            })
            .collect();
        Self {
            products: RwLock::new(products),
        }
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_all(&self) -> anyhow::Result<Vec<Product>> {
        Ok(self.products.read().await.clone())
    }

    async fn find_by_sku(&self, sku: &str) -> anyhow::Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| p.sku == sku).cloned())
    }

    async fn create(&self, product: &NewProduct) -> anyhow::Result<Product> {
        let mut products = self.products.write().await;
        if products.iter().any(|p| p.sku == product.sku) {
            return Err(DuplicateSku(product.sku.clone()).into());
        }
        let id = products.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let created = Product {
            id,
            sku: product.sku.clone(),
            name: product.name.clone(),
        };
        products.push(created.clone());
        Ok(created)
    }
}
