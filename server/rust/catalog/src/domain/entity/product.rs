use serde::{Deserialize, Serialize};

pub const SKU_MAX_LEN: usize = 64;
pub const NAME_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub sku: String,
    pub name: String,
}

/// NewProduct は採番前の商品を表す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
}

impl NewProduct {
    /// 前後の空白を除去し、長さ制約を検証して NewProduct を生成する。
    pub fn new(sku: &str, name: &str) -> Result<Self, String> {
        let sku = sku.trim();
        let name = name.trim();
        check_len("sku", sku, SKU_MAX_LEN)?;
        check_len("name", name, NAME_MAX_LEN)?;
        Ok(Self {
            sku: sku.to_string(),
            name: name.to_string(),
        })
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len == 0 {
        return Err(format!("{field} must not be empty"));
    }
    if len > max {
        return Err(format!("{field} must be at most {max} characters, got {len}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_product_trims() {
        let p = NewProduct::new("  SKU-001 ", " Demo product ").unwrap();
        assert_eq!(p.sku, "SKU-001");
        assert_eq!(p.name, "Demo product");
    }

    #[test]
    fn test_new_product_rejects_empty() {
        assert!(NewProduct::new("", "name").unwrap_err().contains("sku"));
        assert!(NewProduct::new("SKU", "   ").unwrap_err().contains("name"));
    }

    #[test]
    fn test_new_product_length_limits() {
        assert!(NewProduct::new(&"a".repeat(64), "n").is_ok());
        assert!(NewProduct::new(&"a".repeat(65), "n").is_err());
        assert!(NewProduct::new("s", &"ü".repeat(255)).is_ok());
        assert!(NewProduct::new("s", &"ü".repeat(256)).is_err());
    }
}
