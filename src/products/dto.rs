use serde::Deserialize;

use super::repo_types::{NewProduct, ProductPatch, DEFAULT_CATEGORY};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    #[serde(default)]
    pub name: String,
    pub price: Option<f64>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub stock: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub stock: Option<i32>,
}

fn check_price(price: f64) -> Result<f64, AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::bad_request("Price must be a non-negative number"));
    }
    Ok(price)
}

fn check_stock(stock: i32) -> Result<i32, AppError> {
    if stock < 0 {
        return Err(AppError::bad_request("Stock must be a non-negative integer"));
    }
    Ok(stock)
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CreateProductRequest {
    pub fn validate(self) -> Result<NewProduct, AppError> {
        let name = self.name.trim().to_string();
        let Some(price) = self.price.filter(|_| !name.is_empty()) else {
            return Err(AppError::bad_request("Name and price are required"));
        };
        Ok(NewProduct {
            name,
            price: check_price(price)?,
            image: non_blank(self.image),
            category: non_blank(self.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            stock: check_stock(self.stock.unwrap_or(0))?,
        })
    }
}

impl UpdateProductRequest {
    pub fn validate(self) -> Result<ProductPatch, AppError> {
        let name = match self.name {
            Some(n) if n.trim().is_empty() => {
                return Err(AppError::bad_request("Name cannot be empty"))
            }
            other => other.map(|n| n.trim().to_string()),
        };
        Ok(ProductPatch {
            name,
            price: self.price.map(check_price).transpose()?,
            // an empty string clears the image
            image: self.image.map(|v| non_blank(Some(v))),
            category: non_blank(self.category),
            stock: self.stock.map(check_stock).transpose()?,
        })
    }
}
