//! End-to-end return flows: deliver goods, then return them through the wizard.

use warehouse_core::Quantity;
use warehouse_stock::{
    CreatePicking, InMemoryStock, LocationId, MoveId, NewMove, PickingId, PickingState,
    PickingType, PickingTypeCode, PickingTypeId, ProductId, ReturnError, ReturnWizard, StockStore,
    on_quantity_change,
};

struct Delivery {
    stock: InMemoryStock,
    picking_type_id: PickingTypeId,
    picking_id: PickingId,
    move_id: MoveId,
}

/// Deliver 20 units of one product to a customer and validate the picking.
fn deliver_twenty() -> Delivery {
    warehouse_observability::init();

    let stock = InMemoryStock::new();
    let picking_type_id = PickingTypeId::generate();
    stock
        .register_picking_type(PickingType::new(
            picking_type_id,
            "Delivery Orders",
            PickingTypeCode::Outgoing,
        ))
        .unwrap();

    let cmd = CreatePicking::new(picking_type_id, LocationId::generate(), LocationId::generate())
        .with_move(NewMove::new(ProductId::generate(), 20));
    let move_id = cmd.moves[0].move_id;
    let picking_id = stock.create_picking(cmd).unwrap();

    stock.action_confirm(picking_id).unwrap();
    stock.action_assign(picking_id).unwrap();
    stock.set_move_quantity(picking_id, move_id, 20).unwrap();
    stock.button_validate(picking_id).unwrap();

    Delivery {
        stock,
        picking_type_id,
        picking_id,
        move_id,
    }
}

fn open_wizard(d: &Delivery) -> ReturnWizard {
    ReturnWizard::for_picking(&d.stock, d.picking_id).unwrap()
}

fn line_quantity(wiz: &ReturnWizard, move_id: MoveId) -> Quantity {
    wiz.line(move_id).unwrap().quantity()
}

#[test]
fn return_not_allowed_beyond_delivered_quantity() {
    let d = deliver_twenty();
    d.stock.set_restrict_return_qty(d.picking_type_id, true).unwrap();

    let mut wiz = open_wizard(&d);
    assert_eq!(line_quantity(&wiz, d.move_id), Quantity::new(20));

    wiz.line_mut(d.move_id).unwrap().set_quantity(30);
    let err = d.stock.create_returns(&wiz).unwrap_err();
    assert!(matches!(err, ReturnError::QuantityExceedsAvailable { .. }));
    assert_eq!(d.stock.picking_count().unwrap(), 1);

    wiz.line_mut(d.move_id).unwrap().set_quantity(20);
    let ids = d.stock.create_returns(&wiz).unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(d.stock.picking_count().unwrap(), 2);
}

#[test]
fn return_without_restriction_keeps_requested_quantity() {
    let d = deliver_twenty();
    d.stock.set_restrict_return_qty(d.picking_type_id, false).unwrap();

    let mut wiz = open_wizard(&d);
    assert_eq!(line_quantity(&wiz, d.move_id), Quantity::new(20));

    wiz.line_mut(d.move_id).unwrap().set_quantity(30);
    let ids = d.stock.create_returns(&wiz).unwrap();
    assert_eq!(line_quantity(&wiz, d.move_id), Quantity::new(30));

    let ret = d.stock.picking(ids[0]).unwrap();
    assert_eq!(ret.moves()[0].product_uom_qty(), Quantity::new(30));
    assert_eq!(ret.moves()[0].origin_returned_move_id(), Some(d.move_id));
}

#[test]
fn multiple_return() {
    let d = deliver_twenty();
    d.stock.set_restrict_return_qty(d.picking_type_id, true).unwrap();

    let mut wiz = open_wizard(&d);
    wiz.line_mut(d.move_id).unwrap().set_quantity(10);
    let returned_id = d.stock.create_returns(&wiz).unwrap()[0];
    assert_eq!(d.stock.picking(returned_id).unwrap().state(), PickingState::Confirmed);

    // The pending return already lowers the default.
    let wiz = open_wizard(&d);
    assert_eq!(line_quantity(&wiz, d.move_id), Quantity::new(10));

    d.stock.button_validate(returned_id).unwrap();
    let mut wiz = open_wizard(&d);
    assert_eq!(line_quantity(&wiz, d.move_id), Quantity::new(10));

    // Raw assignment goes through; the edit check has to be triggered.
    wiz.line_mut(d.move_id).unwrap().set_quantity(80);
    let err = on_quantity_change(&d.stock, wiz.line(d.move_id).unwrap()).unwrap_err();
    match err {
        ReturnError::QuantityExceedsAvailable {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, Quantity::new(80));
            assert_eq!(available, Quantity::new(10));
        }
        other => panic!("expected QuantityExceedsAvailable, got {other:?}"),
    }

    // Submission catches it regardless.
    assert!(d.stock.create_returns(&wiz).is_err());
}

#[test]
fn multiple_return_without_restriction() {
    let d = deliver_twenty();
    d.stock.set_restrict_return_qty(d.picking_type_id, false).unwrap();

    let mut wiz = open_wizard(&d);
    wiz.line_mut(d.move_id).unwrap().set_quantity(10);
    let returned_id = d.stock.create_returns(&wiz).unwrap()[0];

    let wiz = open_wizard(&d);
    assert_eq!(line_quantity(&wiz, d.move_id), Quantity::new(10));

    d.stock.button_validate(returned_id).unwrap();
    let mut wiz = open_wizard(&d);
    assert_eq!(line_quantity(&wiz, d.move_id), Quantity::new(10));

    wiz.update_line_quantity(&d.stock, d.move_id, 80).unwrap();
    assert_eq!(line_quantity(&wiz, d.move_id), Quantity::new(80));
}

#[test]
fn checked_edit_rejects_and_keeps_previous_quantity() {
    let d = deliver_twenty();
    d.stock.set_restrict_return_qty(d.picking_type_id, true).unwrap();

    let mut wiz = open_wizard(&d);
    let err = wiz.update_line_quantity(&d.stock, d.move_id, 21).unwrap_err();
    assert!(err.to_string().contains("requested 21, available 20"));
    assert_eq!(line_quantity(&wiz, d.move_id), Quantity::new(20));
}

#[test]
fn return_pickings_are_journaled() {
    let d = deliver_twenty();
    d.stock.set_restrict_return_qty(d.picking_type_id, true).unwrap();

    let wiz = open_wizard(&d);
    let ids = d.stock.create_returns(&wiz).unwrap();

    let journal = d.stock.journal().unwrap();
    let last_two: Vec<&str> = journal[journal.len() - 2..]
        .iter()
        .map(|e| e.event_type())
        .collect();
    assert_eq!(last_two, vec!["stock.picking.created", "stock.picking.confirmed"]);
    assert!(
        journal[journal.len() - 2..]
            .iter()
            .all(|e| e.aggregate_id() == ids[0].0)
    );
}
