//! Canonical food record model and normalization from provider payloads

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::providers::fdc::FdcFood;
use crate::providers::off::OffProduct;

/// Provenance of a food record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    /// USDA FoodData Central (bulk list + details)
    Bulk,
    /// Open Food Facts (barcode catalog)
    Barcode,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Bulk => "BULK",
            Source::Barcode => "BARCODE",
        }
    }
}

impl ToSql for Source {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Source {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "BULK" => Ok(Source::Bulk),
            "BARCODE" => Ok(Source::Barcode),
            other => Err(FromSqlError::Other(
                format!("unknown source tag: {}", other).into(),
            )),
        }
    }
}

/// A single named nutrient amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrient {
    pub name: String,
    pub amount: f64,
}

/// Canonical food product record, source-agnostic
///
/// The `id` is the FDC native identifier rendered as a decimal string, or
/// `"OFF_" + code` for Open Food Facts records. The prefix keeps the two id
/// spaces from colliding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodRecord {
    pub id: String,
    pub description: String,
    pub brand_owner: String,
    pub barcode: String,
    pub source: Source,
    pub ingredients: String,
    pub nutrients: Vec<Nutrient>,
}

impl FoodRecord {
    /// Normalize an FDC detail payload into the canonical shape.
    ///
    /// Total: every raw field decodes to an empty/zero default when absent.
    /// A payload without a native id yields an empty `id`; the ingestion and
    /// lookup paths filter such payloads out before persisting.
    pub fn from_bulk(food: &FdcFood) -> Self {
        FoodRecord {
            id: food.fdc_id.map(|id| id.to_string()).unwrap_or_default(),
            description: food.description.clone(),
            brand_owner: food.brand_owner.clone(),
            barcode: food.gtin_upc.clone(),
            source: Source::Bulk,
            ingredients: food.ingredients.clone(),
            nutrients: food
                .food_nutrients
                .iter()
                .map(|n| Nutrient {
                    name: n.nutrient.name.clone(),
                    amount: n.amount,
                })
                .collect(),
        }
    }

    /// Normalize an Open Food Facts product into the canonical shape.
    ///
    /// The nutriments map carries mixed-typed values; only numeric entries
    /// are kept, everything else is dropped silently.
    pub fn from_barcode(product: &OffProduct) -> Self {
        FoodRecord {
            id: format!("OFF_{}", product.code),
            description: product.product_name.clone(),
            brand_owner: product.brands.clone(),
            barcode: product.code.clone(),
            source: Source::Barcode,
            ingredients: product.ingredients_text.clone(),
            nutrients: product
                .nutriments
                .iter()
                .filter_map(|(name, value)| {
                    value.as_f64().map(|amount| Nutrient {
                        name: name.clone(),
                        amount,
                    })
                })
                .collect(),
        }
    }
}

#[cfg(test)]
pub use tests::make_test_food;
