//! Stock pickings and the return quantity restriction.
//!
//! Pickings are event-sourced aggregates kept in a [`store::StockStore`]; the
//! return wizard creates reverse pickings from done ones, and
//! [`restrict`] keeps returns within what was actually delivered when the
//! picking type asks for it.

pub mod error;
pub mod picking;
pub mod picking_type;
pub mod restrict;
pub mod return_wizard;
pub mod stock_move;
pub mod store;

pub use error::{ReturnError, ReturnResult};
pub use picking::{
    AssignPicking, CancelPicking, ConfirmPicking, CreatePicking, MoveDone, MoveQuantitySet,
    Picking, PickingAssigned, PickingCancelled, PickingCommand, PickingConfirmed, PickingCreated,
    PickingEvent, PickingId, PickingState, PickingValidated, SetMoveQuantity, ValidatePicking,
};
pub use picking_type::{PickingType, PickingTypeCode, PickingTypeId};
pub use restrict::{available_return_quantity, create_returns, on_quantity_change, returned_quantity};
pub use return_wizard::{ReturnLine, ReturnWizard};
pub use stock_move::{LocationId, MoveId, MoveState, NewMove, ProductId, StockMove};
pub use store::{InMemoryStock, PickingDispatcher, StockBook, StockStore};
