//! Availability Calculator
//!
//! Read-only sufficiency and capacity checks over the bill-of-materials.
//! Everything here is side-effect free and safe to call concurrently; the
//! write paths (reservation create, deduction conversion) re-run the same
//! evaluation inside their own transactions.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::db::DbPool;
use crate::entities::{
    order_reservation::{self, Entity as OrderReservationEntity},
    product::{self, Entity as ProductEntity},
    product_recipe::{self, Entity as ProductRecipeEntity},
    warehouse_item,
};
use crate::errors::ServiceError;

/// Capacity ceiling for products without a bill of materials. Such products
/// (externally sourced goods) are not constrained by warehouse stock, but the
/// ceiling stays finite so downstream arithmetic never overflows.
pub const UNCONSTRAINED_AVAILABILITY: i32 = 1_000_000;

/// A requested (product, quantity) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// Per-ingredient breakdown of a single-product check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientAvailability {
    pub warehouse_item_id: i64,
    pub name: String,
    /// Total units required for the requested quantity.
    pub required: i64,
    pub on_hand: i32,
    /// Units held by active reservations across all orders.
    pub reserved: i64,
    pub sufficient: bool,
    pub optional: bool,
}

/// Result of a single-product availability check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub product_id: i64,
    pub product_name: Option<String>,
    pub available: bool,
    /// Largest quantity of this product fulfillable right now.
    pub max_quantity: i32,
    pub ingredients: Vec<IngredientAvailability>,
}

impl AvailabilityResult {
    fn unavailable(product_id: i64, product_name: Option<String>) -> Self {
        Self {
            product_id,
            product_name,
            available: false,
            max_quantity: 0,
            ingredients: Vec::new(),
        }
    }
}

/// Why a batch request cannot be (fully) satisfied, as data. Formatting for
/// humans happens at the presentation boundary via `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortfallKind {
    ProductNotFound,
    ProductDisabled,
    InsufficientStock,
    /// Not a shortfall: the same product appeared more than once in a batch
    /// and the quantities were merged. Usually a client-side bug.
    DuplicateRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortfallReason {
    pub product_id: i64,
    pub product_name: Option<String>,
    pub requested: i32,
    pub max_available: i32,
    pub kind: ShortfallKind,
}

impl ShortfallReason {
    /// Duplicate-request warnings never make a batch unavailable.
    pub fn is_blocking(&self) -> bool {
        self.kind != ShortfallKind::DuplicateRequest
    }
}

impl fmt::Display for ShortfallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match &self.product_name {
            Some(name) => format!("'{}'", name),
            None => format!("#{}", self.product_id),
        };
        match self.kind {
            ShortfallKind::ProductNotFound => write!(f, "product {} not found", label),
            ShortfallKind::ProductDisabled => write!(f, "product {} is disabled", label),
            ShortfallKind::InsufficientStock => write!(
                f,
                "product {}: requested {}, can fulfill at most {}",
                label, self.requested, self.max_available
            ),
            ShortfallKind::DuplicateRequest => write!(
                f,
                "product {} requested multiple times; quantities merged into {}",
                label, self.requested
            ),
        }
    }
}

/// Result of a batch availability check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAvailabilityResult {
    /// True only if every requested product is available at its quantity.
    pub available: bool,
    pub results: Vec<AvailabilityResult>,
    pub warnings: Vec<ShortfallReason>,
}

impl BatchAvailabilityResult {
    /// Joins the blocking warnings into one human-readable line, for error
    /// messages raised by the write paths.
    pub fn shortfall_summary(&self) -> String {
        self.warnings
            .iter()
            .filter(|w| w.is_blocking())
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Merges duplicate product ids by summing quantities. Returns the coalesced
/// requests keyed by product id and the ids that appeared more than once.
pub(crate) fn coalesce_requests(items: &[ItemRequest]) -> (BTreeMap<i64, i32>, Vec<i64>) {
    let mut merged: BTreeMap<i64, i32> = BTreeMap::new();
    let mut duplicates = Vec::new();

    for item in items {
        match merged.get_mut(&item.product_id) {
            Some(total) => {
                *total = total.saturating_add(item.quantity);
                if !duplicates.contains(&item.product_id) {
                    duplicates.push(item.product_id);
                }
            }
            None => {
                merged.insert(item.product_id, item.quantity);
            }
        }
    }

    (merged, duplicates)
}

/// Sums active reservations per warehouse item, across all orders.
pub(crate) async fn load_reserved_quantities<C: ConnectionTrait>(
    db: &C,
    item_ids: &[i64],
) -> Result<HashMap<i64, i64>, ServiceError> {
    if item_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let reservations = OrderReservationEntity::find()
        .filter(order_reservation::Column::WarehouseItemId.is_in(item_ids.to_vec()))
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

    let mut reserved: HashMap<i64, i64> = HashMap::new();
    for row in reservations {
        *reserved.entry(row.warehouse_item_id).or_insert(0) += row.quantity as i64;
    }

    Ok(reserved)
}

/// Loads the non-deleted recipe lines for the given products, joined with
/// their warehouse items.
pub(crate) async fn load_recipe_lines<C: ConnectionTrait>(
    db: &C,
    product_ids: &[i64],
) -> Result<Vec<(product_recipe::Model, warehouse_item::Model)>, ServiceError> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = ProductRecipeEntity::find()
        .find_also_related(warehouse_item::Entity)
        .filter(product_recipe::Column::ProductId.is_in(product_ids.to_vec()))
        .filter(product_recipe::Column::IsDeleted.eq(false))
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

    rows.into_iter()
        .map(|(line, item)| {
            let item = item.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Recipe line {} references missing warehouse item {}",
                    line.id, line.warehouse_item_id
                ))
            })?;
            Ok((line, item))
        })
        .collect()
}

/// BOM-expands a set of coalesced (product, quantity) requests into total
/// required units per warehouse item. Optional lines are skipped; the result
/// is ordered by warehouse item id.
pub(crate) async fn expand_requirements<C: ConnectionTrait>(
    db: &C,
    requests: &BTreeMap<i64, i32>,
) -> Result<BTreeMap<i64, i64>, ServiceError> {
    let product_ids: Vec<i64> = requests.keys().copied().collect();
    let lines = load_recipe_lines(db, &product_ids).await?;

    let mut required: BTreeMap<i64, i64> = BTreeMap::new();
    for (line, _item) in &lines {
        if line.is_optional {
            continue;
        }
        let Some(&quantity) = requests.get(&line.product_id) else {
            continue;
        };
        *required.entry(line.warehouse_item_id).or_insert(0) +=
            line.quantity_per_unit as i64 * quantity as i64;
    }

    Ok(required)
}

/// Evaluates one product against its recipe lines and the current
/// reservation totals. Pure; all inputs are preloaded.
pub(crate) fn evaluate_product(
    prod: &product::Model,
    lines: &[(product_recipe::Model, warehouse_item::Model)],
    reserved: &HashMap<i64, i64>,
    requested: i32,
) -> AvailabilityResult {
    if !prod.is_enabled {
        return AvailabilityResult::unavailable(prod.id, Some(prod.name.clone()));
    }

    // Products without a BOM are not capacity-constrained by the warehouse.
    if lines.is_empty() {
        return AvailabilityResult {
            product_id: prod.id,
            product_name: Some(prod.name.clone()),
            available: requested <= UNCONSTRAINED_AVAILABILITY,
            max_quantity: UNCONSTRAINED_AVAILABILITY,
            ingredients: Vec::new(),
        };
    }

    let mut ingredients = Vec::with_capacity(lines.len());
    let mut max_quantity = UNCONSTRAINED_AVAILABILITY as i64;
    let mut all_sufficient = true;

    for (line, item) in lines {
        let reserved_qty = reserved.get(&item.id).copied().unwrap_or(0);
        let effective = item.quantity as i64 - reserved_qty;
        let required = line.quantity_per_unit as i64 * requested as i64;
        let sufficient = line.is_optional || effective >= required;

        if !line.is_optional {
            all_sufficient &= sufficient;
            // Integer floor division; fractional producible units are not a
            // meaningful concept here.
            let line_max = (effective / line.quantity_per_unit as i64).max(0);
            max_quantity = max_quantity.min(line_max);
        }

        ingredients.push(IngredientAvailability {
            warehouse_item_id: item.id,
            name: item.name.clone(),
            required,
            on_hand: item.quantity,
            reserved: reserved_qty,
            sufficient,
            optional: line.is_optional,
        });
    }

    let max_quantity = max_quantity.clamp(0, UNCONSTRAINED_AVAILABILITY as i64) as i32;

    AvailabilityResult {
        product_id: prod.id,
        product_name: Some(prod.name.clone()),
        available: all_sufficient && max_quantity >= requested,
        max_quantity,
        ingredients,
    }
}

/// Single-product check against an arbitrary connection (pool or open
/// transaction).
pub(crate) async fn check_product_on<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
    quantity: i32,
) -> Result<AvailabilityResult, ServiceError> {
    let Some(prod) = ProductEntity::find_by_id(product_id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
    else {
        return Ok(AvailabilityResult::unavailable(product_id, None));
    };

    let lines = load_recipe_lines(db, &[product_id]).await?;
    let item_ids: Vec<i64> = lines.iter().map(|(_, item)| item.id).collect();
    let reserved = load_reserved_quantities(db, &item_ids).await?;

    Ok(evaluate_product(&prod, &lines, &reserved, quantity))
}

/// Batch check against an arbitrary connection. All products, recipe lines
/// and reservation totals are loaded up front, then the per-product logic is
/// replayed against the cached maps.
pub(crate) async fn check_batch_on<C: ConnectionTrait>(
    db: &C,
    items: &[ItemRequest],
) -> Result<BatchAvailabilityResult, ServiceError> {
    for item in items {
        if item.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Requested quantity for product {} must be positive, got {}",
                item.product_id, item.quantity
            )));
        }
    }

    let (requests, duplicates) = coalesce_requests(items);
    let mut warnings: Vec<ShortfallReason> = Vec::new();

    for product_id in &duplicates {
        warn!(product_id, "Duplicate product in batch availability request");
        warnings.push(ShortfallReason {
            product_id: *product_id,
            product_name: None,
            requested: requests[product_id],
            max_available: 0,
            kind: ShortfallKind::DuplicateRequest,
        });
    }

    let product_ids: Vec<i64> = requests.keys().copied().collect();

    let products: HashMap<i64, product::Model> = ProductEntity::find()
        .filter(product::Column::Id.is_in(product_ids.clone()))
        .all(db)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let all_lines = load_recipe_lines(db, &product_ids).await?;
    let mut lines_by_product: HashMap<i64, Vec<(product_recipe::Model, warehouse_item::Model)>> =
        HashMap::new();
    for (line, item) in all_lines {
        lines_by_product
            .entry(line.product_id)
            .or_default()
            .push((line, item));
    }

    let mut item_ids: Vec<i64> = lines_by_product
        .values()
        .flatten()
        .map(|(_, item)| item.id)
        .collect();
    item_ids.sort_unstable();
    item_ids.dedup();
    let reserved = load_reserved_quantities(db, &item_ids).await?;

    let empty: Vec<(product_recipe::Model, warehouse_item::Model)> = Vec::new();
    let mut results = Vec::with_capacity(requests.len());
    let mut available = true;

    for (&product_id, &quantity) in &requests {
        let Some(prod) = products.get(&product_id) else {
            warnings.push(ShortfallReason {
                product_id,
                product_name: None,
                requested: quantity,
                max_available: 0,
                kind: ShortfallKind::ProductNotFound,
            });
            available = false;
            results.push(AvailabilityResult::unavailable(product_id, None));
            continue;
        };

        if !prod.is_enabled {
            warnings.push(ShortfallReason {
                product_id,
                product_name: Some(prod.name.clone()),
                requested: quantity,
                max_available: 0,
                kind: ShortfallKind::ProductDisabled,
            });
            available = false;
            results.push(AvailabilityResult::unavailable(
                product_id,
                Some(prod.name.clone()),
            ));
            continue;
        }

        let lines = lines_by_product.get(&product_id).unwrap_or(&empty);
        let result = evaluate_product(prod, lines, &reserved, quantity);
        if !result.available {
            warnings.push(ShortfallReason {
                product_id,
                product_name: Some(prod.name.clone()),
                requested: quantity,
                max_available: result.max_quantity,
                kind: ShortfallKind::InsufficientStock,
            });
            available = false;
        }
        results.push(result);
    }

    Ok(BatchAvailabilityResult {
        available,
        results,
        warnings,
    })
}

/// Service facade over the read-only availability checks.
#[derive(Clone)]
pub struct AvailabilityService {
    db_pool: Arc<DbPool>,
}

impl AvailabilityService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Checks whether `quantity` units of a product can be fulfilled right
    /// now, with a per-ingredient breakdown.
    #[instrument(skip(self))]
    pub async fn check_availability(
        &self,
        product_id: i64,
        quantity: i32,
    ) -> Result<AvailabilityResult, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Requested quantity must be positive, got {}",
                quantity
            )));
        }

        check_product_on(&*self.db_pool, product_id, quantity).await
    }

    /// Checks a whole cart in one pass. Duplicate product ids are merged and
    /// reported as warnings.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn check_batch_availability(
        &self,
        items: &[ItemRequest],
    ) -> Result<BatchAvailabilityResult, ServiceError> {
        check_batch_on(&*self.db_pool, items).await
    }
}
