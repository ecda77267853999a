//! Stock moves: one product quantity travelling inside a picking.

use serde::{Deserialize, Serialize};

use warehouse_core::{Entity, Quantity, domain_id};

domain_id!(
    /// Stock move identifier (unique across all pickings).
    MoveId
);

domain_id!(
    /// Product identifier.
    ProductId
);

domain_id!(
    /// Stock location identifier.
    LocationId
);

/// Move lifecycle, mirroring the owning picking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveState {
    Draft,
    Confirmed,
    Assigned,
    Done,
    Cancelled,
}

/// A stock move as held by its picking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMove {
    id: MoveId,
    product_id: ProductId,
    /// Demand.
    product_uom_qty: Quantity,
    /// Done quantity; meaningful once the move is done.
    quantity: Quantity,
    state: MoveState,
    /// Move this one reverses, when created by a return.
    origin_returned_move_id: Option<MoveId>,
}

impl StockMove {
    pub(crate) fn from_new(new: &NewMove) -> Self {
        Self {
            id: new.move_id,
            product_id: new.product_id,
            product_uom_qty: new.product_uom_qty,
            quantity: Quantity::ZERO,
            state: MoveState::Draft,
            origin_returned_move_id: new.origin_returned_move_id,
        }
    }

    pub fn id_typed(&self) -> MoveId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_uom_qty(&self) -> Quantity {
        self.product_uom_qty
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn state(&self) -> MoveState {
        self.state
    }

    pub fn origin_returned_move_id(&self) -> Option<MoveId> {
        self.origin_returned_move_id
    }

    pub fn is_done(&self) -> bool {
        self.state == MoveState::Done
    }

    /// Quantity actually moved: the done quantity of a done move, zero otherwise.
    pub fn delivered_quantity(&self) -> Quantity {
        if self.is_done() {
            self.quantity
        } else {
            Quantity::ZERO
        }
    }

    /// Quantity this move will move or has moved; zero when cancelled.
    pub(crate) fn committed_quantity(&self) -> Quantity {
        match self.state {
            MoveState::Done => self.quantity,
            MoveState::Cancelled => Quantity::ZERO,
            _ => self.product_uom_qty,
        }
    }

    pub(crate) fn set_state(&mut self, state: MoveState) {
        self.state = state;
    }

    pub(crate) fn set_quantity(&mut self, quantity: Quantity) {
        self.quantity = quantity;
    }
}

impl Entity for StockMove {
    type Id = MoveId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Move to be created with a picking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMove {
    pub move_id: MoveId,
    pub product_id: ProductId,
    pub product_uom_qty: Quantity,
    pub origin_returned_move_id: Option<MoveId>,
}

impl NewMove {
    pub fn new(product_id: ProductId, product_uom_qty: impl Into<Quantity>) -> Self {
        Self {
            move_id: MoveId::generate(),
            product_id,
            product_uom_qty: product_uom_qty.into(),
            origin_returned_move_id: None,
        }
    }

    /// Mark this move as the return of `origin`.
    pub fn returning(mut self, origin: MoveId) -> Self {
        self.origin_returned_move_id = Some(origin);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_quantity_counts_only_done_moves() {
        let new = NewMove::new(ProductId::generate(), 20);
        let mut m = StockMove::from_new(&new);
        m.set_quantity(Quantity::new(20));
        assert_eq!(m.delivered_quantity(), Quantity::ZERO);

        m.set_state(MoveState::Done);
        assert_eq!(m.delivered_quantity(), Quantity::new(20));
    }

    #[test]
    fn committed_quantity_follows_state() {
        let mut m = StockMove::from_new(&NewMove::new(ProductId::generate(), 10));
        assert_eq!(m.committed_quantity(), Quantity::new(10));

        m.set_state(MoveState::Cancelled);
        assert_eq!(m.committed_quantity(), Quantity::ZERO);
    }
}
