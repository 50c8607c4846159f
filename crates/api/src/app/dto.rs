use axum::http::StatusCode;
use serde::Deserialize;

use shardcat_catalog::NewProduct;
use shardcat_core::{CategoryId, Price, ProductId, SupplierId};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSupplierRequest {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub contact_info: String,
}

/// Prices travel as decimal text (`"25.00"`) so no float is ever involved.
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    pub stock_quantity: i64,
    pub category_id: i64,
    pub supplier_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub price: String,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

/// `GET /products?min=..&max=..`. Both bounds or neither.
#[derive(Debug, Default, Deserialize)]
pub struct PriceRangeQuery {
    pub min: Option<String>,
    pub max: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub limit: Option<u32>,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_product_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"))
}

pub fn parse_category_id(raw: i64) -> Result<CategoryId, axum::response::Response> {
    CategoryId::new(raw).map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub fn parse_supplier_id(raw: i64) -> Result<SupplierId, axum::response::Response> {
    SupplierId::new(raw).map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub fn parse_price(raw: &str) -> Result<Price, axum::response::Response> {
    raw.parse()
        .map_err(|e: shardcat_core::DomainError| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_price", e.to_string())
        })
}

impl CreateProductRequest {
    pub fn into_new_product(self) -> Result<NewProduct, axum::response::Response> {
        Ok(NewProduct {
            price: parse_price(&self.price)?,
            category_id: parse_category_id(self.category_id)?,
            supplier_id: parse_supplier_id(self.supplier_id)?,
            name: self.name,
            description: self.description,
            stock_quantity: self.stock_quantity,
        })
    }
}

impl PriceRangeQuery {
    /// `Ok(None)` when no range was given.
    pub fn bounds(&self) -> Result<Option<(Price, Price)>, axum::response::Response> {
        match (&self.min, &self.max) {
            (None, None) => Ok(None),
            (Some(min), Some(max)) => Ok(Some((parse_price(min)?, parse_price(max)?))),
            _ => Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "both min and max are required for a price range",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_requires_both_bounds() {
        let q = PriceRangeQuery { min: Some("1".into()), max: None };
        assert!(q.bounds().is_err());
        assert!(PriceRangeQuery::default().bounds().unwrap().is_none());

        let q = PriceRangeQuery { min: Some("1".into()), max: Some("2.50".into()) };
        let (min, max) = q.bounds().unwrap().unwrap();
        assert_eq!((min.cents(), max.cents()), (100, 250));
    }

    #[test]
    fn product_request_parses_into_domain_input() {
        let req = CreateProductRequest {
            name: "Mouse".into(),
            description: String::new(),
            price: "19.99".into(),
            stock_quantity: 100,
            category_id: 1,
            supplier_id: 1,
        };
        let input = req.into_new_product().unwrap();
        assert_eq!(input.price.cents(), 1999);
        assert_eq!(input.category_id.get(), 1);
    }

    #[test]
    fn bad_ids_and_prices_are_rejected() {
        assert!(parse_product_id("nope").is_err());
        assert!(parse_category_id(0).is_err());
        assert!(parse_price("1.999").is_err());
    }
}
