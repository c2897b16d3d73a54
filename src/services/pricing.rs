use crate::errors::AppError;
use crate::models::OptionSnapshot;

/// Total = base * headcount + sum of option line items. A product without a
/// base price ("quote on request") yields no total at all, never zero.
///
/// Checked arithmetic throughout: a product may declare no `max_people`, so
/// headcount is unbounded and an absurd request must come back as a
/// validation error, not a wrapped or panicking total.
pub fn compose(
    base_price: Option<i64>,
    people_count: i64,
    options: &[OptionSnapshot],
) -> Result<Option<i64>, AppError> {
    let Some(base) = base_price else {
        return Ok(None);
    };

    let mut total = base
        .checked_mul(people_count)
        .ok_or_else(price_out_of_range)?;
    for option in options {
        let line = option
            .unit_price
            .checked_mul(option.quantity)
            .ok_or_else(price_out_of_range)?;
        total = total.checked_add(line).ok_or_else(price_out_of_range)?;
    }
    Ok(Some(total))
}

fn price_out_of_range() -> AppError {
    AppError::Validation("total price is out of range".to_string())
}

/// Headcount must be positive and inside the product's declared bounds.
/// Out-of-range values are rejected, never clamped.
pub fn check_people_bounds(
    people_count: i64,
    min_people: Option<i64>,
    max_people: Option<i64>,
) -> Result<(), AppError> {
    if people_count < 1 {
        return Err(AppError::Validation(
            "people_count must be at least 1".to_string(),
        ));
    }
    if let Some(min) = min_people {
        if people_count < min {
            return Err(AppError::Validation(format!(
                "people_count {people_count} is below the minimum of {min} for this product"
            )));
        }
    }
    if let Some(max) = max_people {
        if people_count > max {
            return Err(AppError::Validation(format!(
                "people_count {people_count} exceeds the maximum of {max} for this product"
            )));
        }
    }
    Ok(())
}
