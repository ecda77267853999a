//! Return quantity restriction.
//!
//! When a picking type has `restrict_return_qty` set, a return line may not ask
//! for more than the originating move delivered minus what has already been
//! returned against it (returns of returns included). The check runs at two
//! points: when a line quantity is edited, and again when the wizard is
//! submitted. Only the second one is authoritative: edits can skip the check,
//! and other returns may have been completed since the wizard was opened.

use std::collections::HashSet;

use tracing::{debug, warn};

use warehouse_core::{DomainError, Quantity};

use crate::error::{ReturnError, ReturnResult};
use crate::picking::PickingId;
use crate::return_wizard::{ReturnLine, ReturnWizard};
use crate::stock_move::MoveId;
use crate::store::{PickingDispatcher, StockStore};

/// Done quantity of every done move whose return chain leads back to `move_id`.
///
/// Follows the chain transitively; a move reached twice is counted once.
/// Returns of returns (re-deliveries) are subtracted like any other return.
pub fn returned_quantity<S: StockStore + ?Sized>(store: &S, move_id: MoveId) -> ReturnResult<Quantity> {
    let mut visited = HashSet::from([move_id]);
    let mut pending = vec![move_id];
    let mut returned = Quantity::ZERO;

    while let Some(current) = pending.pop() {
        for child in store.moves_returning(current)? {
            let child_id = child.id_typed();
            if !visited.insert(child_id) {
                continue;
            }
            if child.is_done() {
                returned += child.quantity();
            }
            pending.push(child_id);
        }
    }

    Ok(returned)
}

/// Quantity still returnable against `move_id`: delivered minus returned.
///
/// May be zero or negative when the move was fully or over-returned (e.g.
/// while the restriction was off).
pub fn available_return_quantity<S: StockStore + ?Sized>(
    store: &S,
    move_id: MoveId,
) -> ReturnResult<Quantity> {
    let (_, origin) = store.find_move(move_id)?;
    let delivered = origin.delivered_quantity();
    let returned = returned_quantity(store, move_id)?;
    let available = delivered - returned;

    debug!(
        move_id = %move_id,
        delivered = delivered.units(),
        returned = returned.units(),
        available = available.units(),
        "computed available return quantity"
    );
    Ok(available)
}

/// Check one return line against the restriction of its picking type.
///
/// Negative quantities are refused whatever the picking type; lines asking
/// for nothing always pass.
pub fn on_quantity_change<S: StockStore + ?Sized>(store: &S, line: &ReturnLine) -> ReturnResult<()> {
    let requested = line.quantity();
    if requested.is_negative() {
        return Err(DomainError::validation("return quantity cannot be negative").into());
    }
    if requested.is_zero() {
        return Ok(());
    }

    let picking_type = store.picking_type_of_move(line.move_id())?;
    if !picking_type.restrict_return_qty() {
        return Ok(());
    }

    let available = available_return_quantity(store, line.move_id())?;
    if requested > available {
        warn!(
            move_id = %line.move_id(),
            product_id = %line.product_id(),
            requested = requested.units(),
            available = available.units(),
            "return quantity exceeds available quantity"
        );
        return Err(ReturnError::QuantityExceedsAvailable {
            product_id: line.product_id(),
            move_id: line.move_id(),
            requested,
            available,
        });
    }
    Ok(())
}

/// Submit the wizard: re-check every line against current stock, then create
/// the returns through the standard flow.
///
/// One violating line rejects the whole submission before anything is written.
pub fn create_returns<S>(store: &mut S, wizard: &ReturnWizard) -> ReturnResult<Vec<PickingId>>
where
    S: StockStore + PickingDispatcher + ?Sized,
{
    for line in wizard.lines() {
        on_quantity_change(&*store, line)?;
    }
    Ok(wizard.create_returns_unchecked(store)?)
}
