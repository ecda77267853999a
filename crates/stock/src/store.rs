//! Stock store: the record of picking types, pickings and their moves.
//!
//! Reads go through [`StockStore`], writes through [`PickingDispatcher`]. The
//! in-memory implementation runs every write inside [`InMemoryStock::transaction`]:
//! the closure works on a private copy of the books that replaces the shared
//! copy only if it returns `Ok`, so a failed operation leaves no trace. The
//! copy covers current state and indexes only; committed events are appended
//! to a separate journal, so a write costs time proportional to the live
//! pickings, not to the event history.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use chrono::Utc;
use tracing::{debug, info};

use warehouse_core::{Aggregate, AggregateRoot, DomainError, DomainResult, ExpectedVersion, Quantity};
use warehouse_events::EventEnvelope;

use crate::error::ReturnResult;
use crate::picking::{
    AssignPicking, CancelPicking, ConfirmPicking, CreatePicking, Picking, PickingCommand,
    PickingEvent, PickingId, SetMoveQuantity, ValidatePicking,
};
use crate::picking_type::{PickingType, PickingTypeId};
use crate::return_wizard::ReturnWizard;
use crate::stock_move::{MoveId, StockMove};

/// Read access to stock records.
pub trait StockStore {
    fn picking_type(&self, id: PickingTypeId) -> DomainResult<PickingType>;

    fn picking(&self, id: PickingId) -> DomainResult<Picking>;

    /// Locate a move and the picking that owns it.
    fn find_move(&self, id: MoveId) -> DomainResult<(PickingId, StockMove)>;

    /// Moves created as direct returns of `id`, in any state.
    fn moves_returning(&self, id: MoveId) -> DomainResult<Vec<StockMove>>;

    /// Picking type governing the picking that owns `move_id`.
    fn picking_type_of_move(&self, move_id: MoveId) -> DomainResult<PickingType> {
        let (picking_id, _) = self.find_move(move_id)?;
        let picking = self.picking(picking_id)?;
        let type_id = picking
            .picking_type_id()
            .ok_or_else(|| DomainError::invariant(format!("picking {picking_id} has no type")))?;
        self.picking_type(type_id)
    }
}

/// Write access: run a command against one picking.
pub trait PickingDispatcher {
    /// Load the picking, check `expected` against its version, handle the
    /// command and commit the resulting events.
    fn dispatch(
        &mut self,
        expected: ExpectedVersion,
        command: PickingCommand,
    ) -> DomainResult<Vec<EventEnvelope<PickingEvent>>>;
}

/// The books: current picking state, lookup indexes and the events recorded
/// since the last commit.
#[derive(Debug, Clone, Default)]
pub struct StockBook {
    picking_types: HashMap<PickingTypeId, PickingType>,
    pickings: HashMap<PickingId, Picking>,
    move_index: HashMap<MoveId, PickingId>,
    returns_index: HashMap<MoveId, Vec<MoveId>>,
    journal: Vec<EventEnvelope<PickingEvent>>,
}

impl StockBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_picking_type(&mut self, picking_type: PickingType) -> DomainResult<()> {
        let id = picking_type.id_typed();
        if self.picking_types.contains_key(&id) {
            return Err(DomainError::conflict(format!("picking type {id} already exists")));
        }
        self.picking_types.insert(id, picking_type);
        Ok(())
    }

    pub fn set_restrict_return_qty(&mut self, id: PickingTypeId, restrict: bool) -> DomainResult<()> {
        let picking_type = self
            .picking_types
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("picking type {id}")))?;
        picking_type.set_restrict_return_qty(restrict);
        Ok(())
    }

    /// Events recorded on this book that have not been committed yet.
    pub fn journal(&self) -> &[EventEnvelope<PickingEvent>] {
        &self.journal
    }

    fn take_journal(&mut self) -> Vec<EventEnvelope<PickingEvent>> {
        std::mem::take(&mut self.journal)
    }

    pub fn picking_count(&self) -> usize {
        self.pickings.len()
    }

    /// Cross-aggregate references a new picking makes must already exist.
    fn check_references(&self, cmd: &CreatePicking) -> DomainResult<()> {
        if !self.picking_types.contains_key(&cmd.picking_type_id) {
            return Err(DomainError::not_found(format!(
                "picking type {}",
                cmd.picking_type_id
            )));
        }
        if let Some(source) = cmd.return_of {
            if !self.pickings.contains_key(&source) {
                return Err(DomainError::not_found(format!("picking {source}")));
            }
        }
        for m in &cmd.moves {
            if self.move_index.contains_key(&m.move_id) {
                return Err(DomainError::conflict(format!("move {} already exists", m.move_id)));
            }
            if let Some(origin) = m.origin_returned_move_id {
                if !self.move_index.contains_key(&origin) {
                    return Err(DomainError::not_found(format!("move {origin}")));
                }
            }
        }
        Ok(())
    }

    fn index(&mut self, event: &PickingEvent) {
        if let PickingEvent::PickingCreated(e) = event {
            for m in &e.moves {
                self.move_index.insert(m.move_id, e.picking_id);
                if let Some(origin) = m.origin_returned_move_id {
                    self.returns_index.entry(origin).or_default().push(m.move_id);
                }
            }
        }
    }
}

impl StockStore for StockBook {
    fn picking_type(&self, id: PickingTypeId) -> DomainResult<PickingType> {
        self.picking_types
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("picking type {id}")))
    }

    fn picking(&self, id: PickingId) -> DomainResult<Picking> {
        self.pickings
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("picking {id}")))
    }

    fn find_move(&self, id: MoveId) -> DomainResult<(PickingId, StockMove)> {
        let picking_id = self
            .move_index
            .get(&id)
            .copied()
            .ok_or_else(|| DomainError::not_found(format!("move {id}")))?;
        let stock_move = self
            .pickings
            .get(&picking_id)
            .and_then(|p| p.find_move(id))
            .cloned()
            .ok_or_else(|| DomainError::invariant(format!("move index out of sync for {id}")))?;
        Ok((picking_id, stock_move))
    }

    fn moves_returning(&self, id: MoveId) -> DomainResult<Vec<StockMove>> {
        let Some(children) = self.returns_index.get(&id) else {
            return Ok(Vec::new());
        };
        children
            .iter()
            .map(|child| self.find_move(*child).map(|(_, m)| m))
            .collect()
    }
}

impl PickingDispatcher for StockBook {
    fn dispatch(
        &mut self,
        expected: ExpectedVersion,
        command: PickingCommand,
    ) -> DomainResult<Vec<EventEnvelope<PickingEvent>>> {
        let picking_id = command.picking_id();
        let mut picking = self
            .pickings
            .get(&picking_id)
            .cloned()
            .unwrap_or_else(|| Picking::empty(picking_id));

        expected.check(picking.version())?;
        if let PickingCommand::CreatePicking(cmd) = &command {
            self.check_references(cmd)?;
        }

        let events = picking.handle(&command)?;
        let mut committed = Vec::with_capacity(events.len());
        for event in events {
            picking.apply(&event);
            self.index(&event);
            let envelope =
                EventEnvelope::record(picking_id.0, Picking::AGGREGATE_TYPE, picking.version(), event);
            debug!(
                picking_id = %picking_id,
                event_type = envelope.event_type(),
                sequence_number = envelope.sequence_number(),
                "picking event committed"
            );
            self.journal.push(envelope.clone());
            committed.push(envelope);
        }

        self.pickings.insert(picking_id, picking);
        Ok(committed)
    }
}

/// Shared in-memory stock store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStock {
    book: RwLock<StockBook>,
    journal: RwLock<Vec<EventEnvelope<PickingEvent>>>,
}

impl InMemoryStock {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, StockBook>> {
        self.book
            .read()
            .map_err(|_| DomainError::conflict("stock store lock poisoned"))
    }

    /// Run `f` against a working copy of the books; commit only on success.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut StockBook) -> Result<T, E>,
        E: From<DomainError>,
    {
        let mut guard = self
            .book
            .write()
            .map_err(|_| DomainError::conflict("stock store lock poisoned"))?;
        let mut working = guard.clone();
        let out = f(&mut working)?;
        let committed = working.take_journal();
        *guard = working;
        self.journal
            .write()
            .map_err(|_| DomainError::conflict("stock journal lock poisoned"))?
            .extend(committed);
        Ok(out)
    }

    pub fn register_picking_type(&self, picking_type: PickingType) -> DomainResult<()> {
        self.transaction(|book| book.register_picking_type(picking_type))
    }

    pub fn set_restrict_return_qty(&self, id: PickingTypeId, restrict: bool) -> DomainResult<()> {
        self.transaction(|book| book.set_restrict_return_qty(id, restrict))?;
        info!(picking_type_id = %id, restrict, "return quantity restriction updated");
        Ok(())
    }

    pub fn dispatch(
        &self,
        expected: ExpectedVersion,
        command: PickingCommand,
    ) -> DomainResult<Vec<EventEnvelope<PickingEvent>>> {
        self.transaction(|book| book.dispatch(expected, command))
    }

    pub fn create_picking(&self, cmd: CreatePicking) -> DomainResult<PickingId> {
        let picking_id = cmd.picking_id;
        self.dispatch(ExpectedVersion::Exact(0), PickingCommand::CreatePicking(cmd))?;
        Ok(picking_id)
    }

    pub fn action_confirm(&self, picking_id: PickingId) -> DomainResult<()> {
        self.dispatch(
            ExpectedVersion::Any,
            PickingCommand::ConfirmPicking(ConfirmPicking {
                picking_id,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn action_assign(&self, picking_id: PickingId) -> DomainResult<()> {
        self.dispatch(
            ExpectedVersion::Any,
            PickingCommand::AssignPicking(AssignPicking {
                picking_id,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn set_move_quantity(
        &self,
        picking_id: PickingId,
        move_id: MoveId,
        quantity: impl Into<Quantity>,
    ) -> DomainResult<()> {
        self.dispatch(
            ExpectedVersion::Any,
            PickingCommand::SetMoveQuantity(SetMoveQuantity {
                picking_id,
                move_id,
                quantity: quantity.into(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn button_validate(&self, picking_id: PickingId) -> DomainResult<()> {
        self.dispatch(
            ExpectedVersion::Any,
            PickingCommand::ValidatePicking(ValidatePicking {
                picking_id,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(picking_id = %picking_id, "picking validated");
        Ok(())
    }

    pub fn action_cancel(&self, picking_id: PickingId) -> DomainResult<()> {
        self.dispatch(
            ExpectedVersion::Any,
            PickingCommand::CancelPicking(CancelPicking {
                picking_id,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Submit a return wizard with the quantity restriction enforced,
    /// atomically with respect to other writers of this store.
    pub fn create_returns(&self, wizard: &ReturnWizard) -> ReturnResult<Vec<PickingId>> {
        self.transaction(|book| crate::restrict::create_returns(book, wizard))
    }

    pub fn journal(&self) -> DomainResult<Vec<EventEnvelope<PickingEvent>>> {
        let journal = self
            .journal
            .read()
            .map_err(|_| DomainError::conflict("stock journal lock poisoned"))?;
        Ok(journal.clone())
    }

    pub fn picking_count(&self) -> DomainResult<usize> {
        Ok(self.read()?.picking_count())
    }
}

impl StockStore for InMemoryStock {
    fn picking_type(&self, id: PickingTypeId) -> DomainResult<PickingType> {
        self.read()?.picking_type(id)
    }

    fn picking(&self, id: PickingId) -> DomainResult<Picking> {
        self.read()?.picking(id)
    }

    fn find_move(&self, id: MoveId) -> DomainResult<(PickingId, StockMove)> {
        self.read()?.find_move(id)
    }

    fn moves_returning(&self, id: MoveId) -> DomainResult<Vec<StockMove>> {
        self.read()?.moves_returning(id)
    }
}
