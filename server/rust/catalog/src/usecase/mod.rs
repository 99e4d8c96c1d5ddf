pub mod create_product;
pub mod list_products;

pub use create_product::{CreateProductError, CreateProductInput, CreateProductUseCase};
pub use list_products::{ListProductsError, ListProductsUseCase};
