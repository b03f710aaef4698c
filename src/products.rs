// 🛒 Product Dashboard - shop stats, sales charts and price simulation

use crate::assumptions::ElasticityTable;
use crate::entities::Product;
use crate::error::{AppError, AppResult};
use crate::finance::{check_window, days_before};
use crate::forecast::round2;
use chrono::{Duration, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const LOW_STOCK_THRESHOLD: i64 = 10;
pub const SUPPLEMENTS_CATEGORY: &str = "Supplements";
const DEFAULT_CATEGORY_COLOR: &str = "#3b82f6";

/// Window of sales history used to decide whether category elasticity applies
const ELASTICITY_WINDOW_DAYS: i64 = 180;

// ============================================================================
// OVERVIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStats {
    pub total_products: i64,
    pub total_supplements: i64,
    /// Units sold in completed sales over the last seven days
    pub weekly_sales: i64,
    pub low_stock: i64,
}

pub fn product_stats(conn: &Connection, today: NaiveDate) -> AppResult<ProductStats> {
    let (total_products, low_stock): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN current_stock < ?1 THEN 1 ELSE 0 END), 0)
         FROM product WHERE status = 'active'",
        [LOW_STOCK_THRESHOLD],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let total_supplements: i64 = conn.query_row(
        "SELECT COUNT(*) FROM product p
         JOIN product_category c ON c.category_id = p.category_id
         WHERE c.name = ?1 AND p.status = 'active'",
        [SUPPLEMENTS_CATEGORY],
        |row| row.get(0),
    )?;

    let week_ago = today - Duration::days(7);
    let weekly_sales: i64 = conn.query_row(
        "SELECT COALESCE(SUM(i.quantity), 0) FROM sale_item i
         JOIN sale s ON s.sale_id = i.sale_id
         WHERE s.sale_date >= ?1 AND s.status = 'completed'",
        [week_ago],
        |row| row.get(0),
    )?;

    Ok(ProductStats {
        total_products,
        total_supplements,
        weekly_sales,
        low_stock,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSalesData {
    pub name: String,
    pub sales: i64,
}

/// Best sellers by units in completed sales
pub fn top_sales(conn: &Connection, limit: u32) -> AppResult<Vec<TopSalesData>> {
    let mut stmt = conn.prepare(
        "SELECT p.name, SUM(i.quantity) AS units
         FROM sale_item i
         JOIN sale s ON s.sale_id = i.sale_id
         JOIN product p ON p.product_id = i.product_id
         WHERE s.status = 'completed'
         GROUP BY p.product_id, p.name
         ORDER BY units DESC, p.product_id
         LIMIT ?1",
    )?;

    let rows = stmt
        .query_map([limit], |row| {
            Ok(TopSalesData {
                name: row.get(0)?,
                sales: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    pub name: String,
    pub value: i64,
    pub color: String,
}

/// Active products per category
pub fn category_distribution(conn: &Connection) -> AppResult<Vec<CategoryData>> {
    let mut stmt = conn.prepare(
        "SELECT c.name, COUNT(p.product_id), c.color_code
         FROM product_category c
         JOIN product p ON p.category_id = c.category_id
         WHERE p.status = 'active'
         GROUP BY c.category_id, c.name, c.color_code
         ORDER BY c.category_id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            let color: Option<String> = row.get(2)?;
            Ok(CategoryData {
                name: row.get(0)?,
                value: row.get(1)?,
                color: color.unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesTrendData {
    pub date: NaiveDate,
    /// "Mon".."Sun"
    pub day: String,
    pub sales: i64,
}

/// Units sold per day over the last `days` days, zero-filled
pub fn sales_trend(conn: &Connection, days: u32, today: NaiveDate) -> AppResult<Vec<SalesTrendData>> {
    check_window(days)?;
    if days == 0 {
        return Ok(Vec::new());
    }
    let start = days_before(today, days - 1)?;

    let mut stmt = conn.prepare(
        "SELECT s.sale_date, SUM(i.quantity)
         FROM sale s
         JOIN sale_item i ON i.sale_id = s.sale_id
         WHERE s.sale_date >= ?1 AND s.sale_date <= ?2 AND s.status = 'completed'
         GROUP BY s.sale_date",
    )?;

    let daily = stmt
        .query_map(params![start, today], |row| {
            Ok((row.get::<_, NaiveDate>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;

    Ok(start
        .iter_days()
        .take(days as usize)
        .map(|date| SalesTrendData {
            date,
            day: date.format("%a").to_string(),
            sales: daily.get(&date).copied().unwrap_or(0),
        })
        .collect())
}

// ============================================================================
// PRICE SIMULATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSimulationRequest {
    pub product_id: i64,
    pub price_change_percent: f64,
    #[serde(default)]
    pub bundling_product_id: Option<i64>,
    /// Discount on the bundled product, in percent of its price
    #[serde(default)]
    pub bundling_discount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSimulationResponse {
    pub product_id: i64,
    pub product_name: String,
    pub current_price: f64,
    pub new_price: f64,
    pub current_sales: i64,
    /// Whole units; profit uses the unrounded projection
    pub new_sales: i64,
    pub current_profit: f64,
    /// Includes bundling revenue
    pub new_profit: f64,
    pub profit_change_percent: f64,
    pub sales_change_percent: f64,
    pub elasticity: f64,
    pub bundling_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceImpactData {
    pub price_change_percent: i32,
    pub new_price: f64,
    pub predicted_sales: i64,
    pub predicted_profit: f64,
    pub profit_margin: f64,
}

struct ProductContext {
    product: Product,
    category: Option<String>,
    units_sold: i64,
    elasticity: f64,
}

fn find_product(
    conn: &Connection,
    product_id: i64,
) -> AppResult<Option<(Product, Option<String>)>> {
    let columns = Product::COLUMNS
        .split(", ")
        .map(|c| format!("p.{}", c))
        .collect::<Vec<_>>()
        .join(", ");

    conn.query_row(
        &format!(
            "SELECT {}, c.name FROM product p
             LEFT JOIN product_category c ON c.category_id = p.category_id
             WHERE p.product_id = ?1",
            columns
        ),
        [product_id],
        |row| Ok((Product::from_row(row)?, row.get::<_, Option<String>>(8)?)),
    )
    .optional()
    .map_err(AppError::from)
}

fn load_product(conn: &Connection, product_id: i64) -> AppResult<(Product, Option<String>)> {
    find_product(conn, product_id)?
        .ok_or_else(|| AppError::not_found(format!("product {}", product_id)))
}

fn product_context(
    conn: &Connection,
    product_id: i64,
    elasticity: &ElasticityTable,
    today: NaiveDate,
) -> AppResult<ProductContext> {
    let (product, category) = load_product(conn, product_id)?;

    let units_sold: i64 = conn.query_row(
        "SELECT COALESCE(SUM(i.quantity), 0) FROM sale_item i
         JOIN sale s ON s.sale_id = i.sale_id
         WHERE i.product_id = ?1 AND s.status = 'completed'",
        [product_id],
        |row| row.get(0),
    )?;

    let window_start = today - Duration::days(ELASTICITY_WINDOW_DAYS);
    let history_points: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT s.sale_date) FROM sale_item i
         JOIN sale s ON s.sale_id = i.sale_id
         WHERE i.product_id = ?1 AND s.status = 'completed' AND s.sale_date >= ?2",
        params![product_id, window_start],
        |row| row.get(0),
    )?;

    let elasticity = elasticity.for_product(category.as_deref(), history_points as usize);

    Ok(ProductContext {
        product,
        category,
        units_sold,
        elasticity,
    })
}

/// Projected units after a relative price change
fn projected_units(units: i64, price_change: f64, elasticity: f64) -> f64 {
    (units as f64 * (1.0 + price_change * elasticity)).max(0.0)
}

/// What-if for a price change on one product, with an optional bundle offer
pub fn simulate_price_change(
    conn: &Connection,
    request: &PriceSimulationRequest,
    elasticity: &ElasticityTable,
    today: NaiveDate,
) -> AppResult<PriceSimulationResponse> {
    if !request.price_change_percent.is_finite() || request.price_change_percent <= -100.0 {
        return Err(AppError::invalid_input(
            "priceChangePercent must be a number greater than -100",
        ));
    }

    let ctx = product_context(conn, request.product_id, elasticity, today)?;
    let product = &ctx.product;

    let price_change = request.price_change_percent / 100.0;
    let new_price = product.price * (1.0 + price_change);
    let sales_change = price_change * ctx.elasticity;
    let new_sales = projected_units(ctx.units_sold, price_change, ctx.elasticity);

    let current_profit = product.margin_per_unit() * ctx.units_sold as f64;
    let new_profit = (new_price - product.cost_price) * new_sales;
    let profit_change_percent = if current_profit > 0.0 {
        (new_profit - current_profit) / current_profit * 100.0
    } else {
        0.0
    };

    // An unknown bundle product contributes nothing
    let bundling_revenue = match (request.bundling_product_id, request.bundling_discount) {
        (Some(bundle_id), Some(discount)) if discount > 0.0 => find_product(conn, bundle_id)?
            .map(|(bundle, _)| {
                bundle.price * (discount / 100.0) * new_sales * elasticity.bundling_take_rate
            })
            .unwrap_or(0.0),
        _ => 0.0,
    };

    tracing::debug!(
        product_id = product.product_id,
        category = ?ctx.category,
        elasticity = ctx.elasticity,
        "simulated price change"
    );

    Ok(PriceSimulationResponse {
        product_id: product.product_id,
        product_name: product.name.clone(),
        current_price: product.price,
        new_price,
        current_sales: ctx.units_sold,
        new_sales: new_sales as i64,
        current_profit,
        new_profit: new_profit + bundling_revenue,
        profit_change_percent,
        sales_change_percent: sales_change * 100.0,
        elasticity: ctx.elasticity,
        bundling_revenue,
    })
}

/// Profit curve for price changes from -20% to +20% in 5% steps.
/// Empty for an unknown product.
pub fn price_impact_chart(
    conn: &Connection,
    product_id: i64,
    elasticity: &ElasticityTable,
    today: NaiveDate,
) -> AppResult<Vec<PriceImpactData>> {
    let ctx = match product_context(conn, product_id, elasticity, today) {
        Ok(ctx) => ctx,
        Err(AppError::NotFound(_)) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let product = &ctx.product;

    Ok((-20..=20)
        .step_by(5)
        .map(|pct| {
            let price_change = pct as f64 / 100.0;
            let new_price = product.price * (1.0 + price_change);
            let units = projected_units(ctx.units_sold, price_change, ctx.elasticity);
            let margin = if new_price > 0.0 {
                (new_price - product.cost_price) / new_price * 100.0
            } else {
                0.0
            };

            PriceImpactData {
                price_change_percent: pct,
                new_price: round2(new_price),
                predicted_sales: units as i64,
                predicted_profit: round2((new_price - product.cost_price) * units),
                profit_margin: round2(margin),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{date, empty_db, seeded_db};

    fn request(product_id: i64, pct: f64) -> PriceSimulationRequest {
        PriceSimulationRequest {
            product_id,
            price_change_percent: pct,
            bundling_product_id: None,
            bundling_discount: None,
        }
    }

    #[test]
    fn test_product_stats() {
        let conn = seeded_db();
        let stats = product_stats(&conn, date(2025, 3, 10)).unwrap();

        assert_eq!(stats.total_products, 2);
        assert_eq!(stats.total_supplements, 1);
        assert_eq!(stats.weekly_sales, 6);
        assert_eq!(stats.low_stock, 1);

        // A week later only the 03-10 sale is inside the window
        assert_eq!(product_stats(&conn, date(2025, 3, 17)).unwrap().weekly_sales, 1);
    }

    #[test]
    fn test_top_sales_and_categories() {
        let conn = seeded_db();

        let top = top_sales(&conn, 5).unwrap();
        assert_eq!(top[0], TopSalesData { name: "Whey Protein".into(), sales: 4 });
        assert_eq!(top[1].sales, 2);

        let categories = category_distribution(&conn).unwrap();
        assert_eq!(categories[0].name, "Supplements");
        assert_eq!(categories[0].color, "#10b981");
        assert_eq!(categories[1].color, DEFAULT_CATEGORY_COLOR);
    }

    #[test]
    fn test_sales_trend_zero_fills() {
        let conn = seeded_db();
        let trend = sales_trend(&conn, 4, date(2025, 3, 10)).unwrap();

        let sales: Vec<i64> = trend.iter().map(|t| t.sales).collect();
        assert_eq!(sales, vec![0, 3, 2, 1]);
        assert_eq!(trend[0].day, "Fri");
        assert_eq!(trend[3].day, "Mon");
    }

    #[test]
    fn test_simulation_thin_history_uses_default_elasticity() {
        let conn = seeded_db();
        let result =
            simulate_price_change(&conn, &request(1, 10.0), &ElasticityTable::default(), date(2025, 3, 10))
                .unwrap();

        assert_eq!(result.product_name, "Whey Protein");
        assert_eq!(result.elasticity, -2.0);
        assert_eq!(result.current_sales, 4);
        assert_eq!(result.new_sales, 3);
        assert!((result.new_price - 55.0).abs() < 1e-9);
        assert!((result.sales_change_percent + 20.0).abs() < 1e-9);
        assert_eq!(result.current_profit, 80.0);
        assert!(result.profit_change_percent.abs() < 1e-9);
        assert_eq!(result.bundling_revenue, 0.0);
    }

    #[test]
    fn test_simulation_category_elasticity_with_history() {
        let conn = seeded_db();
        let mut table = ElasticityTable::default();
        table.min_history_points = 1;

        let result =
            simulate_price_change(&conn, &request(1, 10.0), &table, date(2025, 3, 10)).unwrap();
        assert_eq!(result.elasticity, -2.5);
    }

    #[test]
    fn test_simulation_bundling() {
        let conn = seeded_db();
        let req = PriceSimulationRequest {
            bundling_product_id: Some(2),
            bundling_discount: Some(50.0),
            ..request(1, 10.0)
        };

        let result =
            simulate_price_change(&conn, &req, &ElasticityTable::default(), date(2025, 3, 10))
                .unwrap();

        // 20 * 50% * 3.2 units * 30% take rate
        assert!((result.bundling_revenue - 9.6).abs() < 1e-9);
        assert!((result.new_profit - (80.0 + 9.6)).abs() < 1e-6);
    }

    #[test]
    fn test_simulation_sales_never_negative() {
        let conn = seeded_db();
        let result =
            simulate_price_change(&conn, &request(1, 80.0), &ElasticityTable::default(), date(2025, 3, 10))
                .unwrap();

        assert_eq!(result.new_sales, 0);
        assert_eq!(result.profit_change_percent, -100.0);
    }

    #[test]
    fn test_simulation_errors() {
        let conn = empty_db();
        let err =
            simulate_price_change(&conn, &request(7, 10.0), &ElasticityTable::default(), date(2025, 3, 10))
                .unwrap_err();
        assert_eq!(err.status_code(), 404);

        let err = simulate_price_change(
            &seeded_db(),
            &request(1, -150.0),
            &ElasticityTable::default(),
            date(2025, 3, 10),
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_price_impact_chart() {
        let conn = seeded_db();
        let chart = price_impact_chart(&conn, 1, &ElasticityTable::default(), date(2025, 3, 10)).unwrap();

        assert_eq!(chart.len(), 9);
        assert_eq!(chart[0].price_change_percent, -20);
        assert_eq!(chart[8].price_change_percent, 20);
        assert_eq!(chart[4].new_price, 50.0);
        assert_eq!(chart[4].predicted_sales, 4);
        assert_eq!(chart[4].predicted_profit, 80.0);
        assert_eq!(chart[4].profit_margin, 40.0);

        assert!(price_impact_chart(&conn, 999, &ElasticityTable::default(), date(2025, 3, 10))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_simulation_unknown_bundle_adds_nothing() {
        let conn = seeded_db();
        let req = PriceSimulationRequest {
            bundling_product_id: Some(999),
            bundling_discount: Some(50.0),
            ..request(1, 10.0)
        };

        let result =
            simulate_price_change(&conn, &req, &ElasticityTable::default(), date(2025, 3, 10))
                .unwrap();
        assert_eq!(result.bundling_revenue, 0.0);
        assert!((result.new_profit - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_sales_trend_rejects_long_window() {
        let conn = seeded_db();
        let err = sales_trend(&conn, u32::MAX, date(2025, 3, 10)).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(sales_trend(&conn, 366, date(2025, 3, 10)).unwrap().len(), 366);
    }
}
