//! Return wizard: the transient form used to send delivered goods back.
//!
//! This is the platform's standard behaviour: default quantities, unchecked
//! field edits and the plain creation of the return picking. The quantity
//! restriction layered on top lives in [`crate::restrict`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use warehouse_core::{DomainError, DomainResult, ExpectedVersion, Quantity};

use crate::error::ReturnResult;
use crate::picking::{ConfirmPicking, CreatePicking, PickingCommand, PickingId, PickingState};
use crate::restrict;
use crate::stock_move::{MoveId, MoveState, NewMove, ProductId};
use crate::store::{PickingDispatcher, StockStore};

/// One returnable move of the source picking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    move_id: MoveId,
    product_id: ProductId,
    quantity: Quantity,
}

impl ReturnLine {
    pub fn new(move_id: MoveId, product_id: ProductId, quantity: impl Into<Quantity>) -> Self {
        Self {
            move_id,
            product_id,
            quantity: quantity.into(),
        }
    }

    pub fn move_id(&self) -> MoveId {
        self.move_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Raw field assignment; runs no check.
    pub fn set_quantity(&mut self, quantity: impl Into<Quantity>) {
        self.quantity = quantity.into();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnWizard {
    picking_id: PickingId,
    lines: Vec<ReturnLine>,
}

impl ReturnWizard {
    /// Open the wizard on a done picking.
    ///
    /// Each line defaults to the done quantity minus every return already
    /// created against the move that is not cancelled, done or not.
    pub fn for_picking<S: StockStore + ?Sized>(store: &S, picking_id: PickingId) -> DomainResult<Self> {
        let picking = store.picking(picking_id)?;
        if picking.state() != PickingState::Done {
            return Err(DomainError::validation("you may only return done pickings"));
        }

        let mut lines = Vec::with_capacity(picking.moves().len());
        for m in picking.moves().iter().filter(|m| m.state() == MoveState::Done) {
            let already: Quantity = store
                .moves_returning(m.id_typed())?
                .iter()
                .map(|r| r.committed_quantity())
                .sum();
            let default = (m.quantity() - already).max(Quantity::ZERO);
            lines.push(ReturnLine::new(m.id_typed(), m.product_id(), default));
        }

        Ok(Self { picking_id, lines })
    }

    pub fn picking_id(&self) -> PickingId {
        self.picking_id
    }

    pub fn lines(&self) -> &[ReturnLine] {
        &self.lines
    }

    pub fn line(&self, move_id: MoveId) -> Option<&ReturnLine> {
        self.lines.iter().find(|l| l.move_id == move_id)
    }

    pub fn line_mut(&mut self, move_id: MoveId) -> Option<&mut ReturnLine> {
        self.lines.iter_mut().find(|l| l.move_id == move_id)
    }

    /// Edit a line's quantity the way the form does: the quantity check runs
    /// first and the value is committed only if it passes.
    pub fn update_line_quantity<S: StockStore + ?Sized>(
        &mut self,
        store: &S,
        move_id: MoveId,
        quantity: impl Into<Quantity>,
    ) -> ReturnResult<()> {
        let line = self
            .line_mut(move_id)
            .ok_or_else(|| DomainError::not_found(format!("return line for move {move_id}")))?;
        let mut candidate = line.clone();
        candidate.set_quantity(quantity);
        restrict::on_quantity_change(store, &candidate)?;
        *line = candidate;
        Ok(())
    }

    /// Create the return picking for all non-zero lines, without any quantity
    /// restriction. Swaps the source locations, links every new move to the
    /// move it reverses and confirms the picking.
    pub fn create_returns_unchecked<S>(&self, store: &mut S) -> DomainResult<Vec<PickingId>>
    where
        S: StockStore + PickingDispatcher + ?Sized,
    {
        let source = store.picking(self.picking_id)?;
        let type_id = source
            .picking_type_id()
            .ok_or_else(|| DomainError::invariant("source picking has no type"))?;
        let return_type = store.picking_type(type_id)?.return_picking_type_id();
        let (Some(from), Some(to)) = (source.location_id(), source.location_dest_id()) else {
            return Err(DomainError::invariant("source picking has no locations"));
        };

        let mut cmd = CreatePicking::new(return_type, to, from).returning(self.picking_id);
        for line in self.lines.iter().filter(|l| !l.quantity.is_zero()) {
            if source.find_move(line.move_id).is_none() {
                return Err(DomainError::invariant(format!(
                    "move {} does not belong to picking {}",
                    line.move_id, self.picking_id
                )));
            }
            cmd = cmd.with_move(NewMove::new(line.product_id, line.quantity).returning(line.move_id));
        }
        if cmd.moves.is_empty() {
            return Err(DomainError::validation(
                "please specify at least one non-zero quantity",
            ));
        }

        let return_id = cmd.picking_id;
        store.dispatch(ExpectedVersion::Exact(0), PickingCommand::CreatePicking(cmd))?;
        store.dispatch(
            ExpectedVersion::Exact(1),
            PickingCommand::ConfirmPicking(ConfirmPicking {
                picking_id: return_id,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(
            source_picking_id = %self.picking_id,
            return_picking_id = %return_id,
            "return picking created"
        );
        Ok(vec![return_id])
    }
}
