use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{Aggregate, AggregateRoot, DomainError, Quantity, domain_id};
use warehouse_events::Event;

use crate::picking_type::PickingTypeId;
use crate::stock_move::{LocationId, MoveId, MoveState, NewMove, StockMove};

domain_id!(
    /// Picking (transfer document) identifier.
    PickingId
);

/// Picking status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickingState {
    Draft,
    Confirmed,
    Assigned,
    Done,
    Cancelled,
}

impl PickingState {
    fn move_state(self) -> MoveState {
        match self {
            PickingState::Draft => MoveState::Draft,
            PickingState::Confirmed => MoveState::Confirmed,
            PickingState::Assigned => MoveState::Assigned,
            PickingState::Done => MoveState::Done,
            PickingState::Cancelled => MoveState::Cancelled,
        }
    }
}

/// Aggregate root: Picking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picking {
    id: PickingId,
    picking_type_id: Option<PickingTypeId>,
    location_id: Option<LocationId>,
    location_dest_id: Option<LocationId>,
    state: PickingState,
    moves: Vec<StockMove>,
    return_of: Option<PickingId>,
    version: u64,
    created: bool,
}

impl Picking {
    pub const AGGREGATE_TYPE: &'static str = "stock.picking";

    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PickingId) -> Self {
        Self {
            id,
            picking_type_id: None,
            location_id: None,
            location_dest_id: None,
            state: PickingState::Draft,
            moves: Vec::new(),
            return_of: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PickingId {
        self.id
    }

    pub fn picking_type_id(&self) -> Option<PickingTypeId> {
        self.picking_type_id
    }

    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn location_dest_id(&self) -> Option<LocationId> {
        self.location_dest_id
    }

    pub fn state(&self) -> PickingState {
        self.state
    }

    pub fn moves(&self) -> &[StockMove] {
        &self.moves
    }

    pub fn find_move(&self, move_id: MoveId) -> Option<&StockMove> {
        self.moves.iter().find(|m| m.id_typed() == move_id)
    }

    /// Source picking when this picking was created by a return.
    pub fn return_of(&self) -> Option<PickingId> {
        self.return_of
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    fn find_move_mut(&mut self, move_id: MoveId) -> Option<&mut StockMove> {
        self.moves.iter_mut().find(|m| m.id_typed() == move_id)
    }

    fn set_state(&mut self, state: PickingState) {
        self.state = state;
        let move_state = state.move_state();
        for m in &mut self.moves {
            m.set_state(move_state);
        }
    }
}

impl AggregateRoot for Picking {
    type Id = PickingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePicking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePicking {
    pub picking_id: PickingId,
    pub picking_type_id: PickingTypeId,
    pub location_id: LocationId,
    pub location_dest_id: LocationId,
    pub return_of: Option<PickingId>,
    pub moves: Vec<NewMove>,
    pub occurred_at: DateTime<Utc>,
}

impl CreatePicking {
    pub fn new(
        picking_type_id: PickingTypeId,
        location_id: LocationId,
        location_dest_id: LocationId,
    ) -> Self {
        Self {
            picking_id: PickingId::generate(),
            picking_type_id,
            location_id,
            location_dest_id,
            return_of: None,
            moves: Vec::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_move(mut self, new_move: NewMove) -> Self {
        self.moves.push(new_move);
        self
    }

    pub fn returning(mut self, source: PickingId) -> Self {
        self.return_of = Some(source);
        self
    }
}

/// Command: ConfirmPicking (`draft → confirmed`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPicking {
    pub picking_id: PickingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignPicking (`confirmed → assigned`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignPicking {
    pub picking_id: PickingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetMoveQuantity (record the done quantity of one move).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMoveQuantity {
    pub picking_id: PickingId,
    pub move_id: MoveId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ValidatePicking (mark the transfer done).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatePicking {
    pub picking_id: PickingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPicking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPicking {
    pub picking_id: PickingId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickingCommand {
    CreatePicking(CreatePicking),
    ConfirmPicking(ConfirmPicking),
    AssignPicking(AssignPicking),
    SetMoveQuantity(SetMoveQuantity),
    ValidatePicking(ValidatePicking),
    CancelPicking(CancelPicking),
}

impl PickingCommand {
    pub fn picking_id(&self) -> PickingId {
        match self {
            PickingCommand::CreatePicking(c) => c.picking_id,
            PickingCommand::ConfirmPicking(c) => c.picking_id,
            PickingCommand::AssignPicking(c) => c.picking_id,
            PickingCommand::SetMoveQuantity(c) => c.picking_id,
            PickingCommand::ValidatePicking(c) => c.picking_id,
            PickingCommand::CancelPicking(c) => c.picking_id,
        }
    }
}

/// Event: PickingCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickingCreated {
    pub picking_id: PickingId,
    pub picking_type_id: PickingTypeId,
    pub location_id: LocationId,
    pub location_dest_id: LocationId,
    pub return_of: Option<PickingId>,
    pub moves: Vec<NewMove>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PickingConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickingConfirmed {
    pub picking_id: PickingId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PickingAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickingAssigned {
    pub picking_id: PickingId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MoveQuantitySet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveQuantitySet {
    pub picking_id: PickingId,
    pub move_id: MoveId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Final done quantity of one move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDone {
    pub move_id: MoveId,
    pub quantity: Quantity,
}

/// Event: PickingValidated.
///
/// Carries the done quantity of every move, so stock projections never need
/// to replay the quantity edits that preceded validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickingValidated {
    pub picking_id: PickingId,
    pub moves: Vec<MoveDone>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PickingCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickingCancelled {
    pub picking_id: PickingId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickingEvent {
    PickingCreated(PickingCreated),
    PickingConfirmed(PickingConfirmed),
    PickingAssigned(PickingAssigned),
    MoveQuantitySet(MoveQuantitySet),
    PickingValidated(PickingValidated),
    PickingCancelled(PickingCancelled),
}

impl Event for PickingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PickingEvent::PickingCreated(_) => "stock.picking.created",
            PickingEvent::PickingConfirmed(_) => "stock.picking.confirmed",
            PickingEvent::PickingAssigned(_) => "stock.picking.assigned",
            PickingEvent::MoveQuantitySet(_) => "stock.picking.move_quantity_set",
            PickingEvent::PickingValidated(_) => "stock.picking.validated",
            PickingEvent::PickingCancelled(_) => "stock.picking.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PickingEvent::PickingCreated(e) => e.occurred_at,
            PickingEvent::PickingConfirmed(e) => e.occurred_at,
            PickingEvent::PickingAssigned(e) => e.occurred_at,
            PickingEvent::MoveQuantitySet(e) => e.occurred_at,
            PickingEvent::PickingValidated(e) => e.occurred_at,
            PickingEvent::PickingCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Picking {
    type Command = PickingCommand;
    type Event = PickingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PickingEvent::PickingCreated(e) => {
                self.id = e.picking_id;
                self.picking_type_id = Some(e.picking_type_id);
                self.location_id = Some(e.location_id);
                self.location_dest_id = Some(e.location_dest_id);
                self.return_of = e.return_of;
                self.moves = e.moves.iter().map(StockMove::from_new).collect();
                self.state = PickingState::Draft;
                self.created = true;
            }
            PickingEvent::PickingConfirmed(_) => self.set_state(PickingState::Confirmed),
            PickingEvent::PickingAssigned(_) => self.set_state(PickingState::Assigned),
            PickingEvent::MoveQuantitySet(e) => {
                if let Some(m) = self.find_move_mut(e.move_id) {
                    m.set_quantity(e.quantity);
                }
            }
            PickingEvent::PickingValidated(e) => {
                for done in &e.moves {
                    if let Some(m) = self.find_move_mut(done.move_id) {
                        m.set_quantity(done.quantity);
                    }
                }
                self.set_state(PickingState::Done);
            }
            PickingEvent::PickingCancelled(_) => self.set_state(PickingState::Cancelled),
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PickingCommand::CreatePicking(cmd) => self.handle_create(cmd),
            PickingCommand::ConfirmPicking(cmd) => self.handle_confirm(cmd),
            PickingCommand::AssignPicking(cmd) => self.handle_assign(cmd),
            PickingCommand::SetMoveQuantity(cmd) => self.handle_set_quantity(cmd),
            PickingCommand::ValidatePicking(cmd) => self.handle_validate(cmd),
            PickingCommand::CancelPicking(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Picking {
    fn ensure_exists(&self, picking_id: PickingId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("picking {picking_id}")));
        }
        if self.id != picking_id {
            return Err(DomainError::invariant("picking_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePicking) -> Result<Vec<PickingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("picking already exists"));
        }
        if cmd.moves.is_empty() {
            return Err(DomainError::validation("picking needs at least one move"));
        }

        let mut seen = HashSet::with_capacity(cmd.moves.len());
        for m in &cmd.moves {
            if m.product_uom_qty <= Quantity::ZERO {
                return Err(DomainError::validation("move demand must be positive"));
            }
            if !seen.insert(m.move_id) {
                return Err(DomainError::validation(format!(
                    "duplicate move id {}",
                    m.move_id
                )));
            }
        }

        Ok(vec![PickingEvent::PickingCreated(PickingCreated {
            picking_id: cmd.picking_id,
            picking_type_id: cmd.picking_type_id,
            location_id: cmd.location_id,
            location_dest_id: cmd.location_dest_id,
            return_of: cmd.return_of,
            moves: cmd.moves.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmPicking) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_exists(cmd.picking_id)?;
        if self.state != PickingState::Draft {
            return Err(DomainError::invariant("only draft pickings can be confirmed"));
        }
        Ok(vec![PickingEvent::PickingConfirmed(PickingConfirmed {
            picking_id: cmd.picking_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign(&self, cmd: &AssignPicking) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_exists(cmd.picking_id)?;
        if self.state != PickingState::Confirmed {
            return Err(DomainError::invariant(
                "only confirmed pickings can be reserved",
            ));
        }
        Ok(vec![PickingEvent::PickingAssigned(PickingAssigned {
            picking_id: cmd.picking_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_quantity(&self, cmd: &SetMoveQuantity) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_exists(cmd.picking_id)?;
        if matches!(self.state, PickingState::Done | PickingState::Cancelled) {
            return Err(DomainError::invariant(
                "cannot change quantities of a done or cancelled picking",
            ));
        }
        if cmd.quantity.is_negative() {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        if self.find_move(cmd.move_id).is_none() {
            return Err(DomainError::not_found(format!(
                "move {} in picking {}",
                cmd.move_id, cmd.picking_id
            )));
        }
        Ok(vec![PickingEvent::MoveQuantitySet(MoveQuantitySet {
            picking_id: cmd.picking_id,
            move_id: cmd.move_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Drafts are confirmed on the fly; moves without a recorded quantity are
    /// done for their full demand.
    fn handle_validate(&self, cmd: &ValidatePicking) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_exists(cmd.picking_id)?;
        if matches!(self.state, PickingState::Done | PickingState::Cancelled) {
            return Err(DomainError::invariant(
                "only pending pickings can be validated",
            ));
        }

        let moves = self
            .moves
            .iter()
            .map(|m| MoveDone {
                move_id: m.id_typed(),
                quantity: if m.quantity().is_zero() {
                    m.product_uom_qty()
                } else {
                    m.quantity()
                },
            })
            .collect();

        Ok(vec![PickingEvent::PickingValidated(PickingValidated {
            picking_id: cmd.picking_id,
            moves,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelPicking) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_exists(cmd.picking_id)?;
        match self.state {
            PickingState::Done => Err(DomainError::invariant("cannot cancel a done picking")),
            PickingState::Cancelled => Ok(vec![]),
            _ => Ok(vec![PickingEvent::PickingCancelled(PickingCancelled {
                picking_id: cmd.picking_id,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock_move::ProductId;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_picking(demand: i64) -> (Picking, MoveId) {
        let cmd = CreatePicking::new(
            PickingTypeId::generate(),
            LocationId::generate(),
            LocationId::generate(),
        )
        .with_move(NewMove::new(ProductId::generate(), demand));
        let move_id = cmd.moves[0].move_id;

        let mut picking = Picking::empty(cmd.picking_id);
        let events = picking
            .handle(&PickingCommand::CreatePicking(cmd))
            .unwrap();
        picking.apply(&events[0]);
        (picking, move_id)
    }

    fn run(picking: &mut Picking, cmd: PickingCommand) -> Result<(), DomainError> {
        for event in picking.handle(&cmd)? {
            picking.apply(&event);
        }
        Ok(())
    }

    #[test]
    fn create_emits_picking_created_with_draft_moves() {
        let (picking, move_id) = created_picking(20);
        assert_eq!(picking.state(), PickingState::Draft);
        assert_eq!(picking.version(), 1);

        let m = picking.find_move(move_id).unwrap();
        assert_eq!(m.state(), MoveState::Draft);
        assert_eq!(m.product_uom_qty(), Quantity::new(20));
        assert_eq!(m.quantity(), Quantity::ZERO);
    }

    #[test]
    fn create_rejects_empty_and_non_positive_moves() {
        let empty = CreatePicking::new(
            PickingTypeId::generate(),
            LocationId::generate(),
            LocationId::generate(),
        );
        let picking = Picking::empty(empty.picking_id);
        let err = picking
            .handle(&PickingCommand::CreatePicking(empty.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let zero = empty.with_move(NewMove::new(ProductId::generate(), 0));
        let err = picking
            .handle(&PickingCommand::CreatePicking(zero))
            .unwrap_err();
        assert_eq!(err, DomainError::validation("move demand must be positive"));
    }

    #[test]
    fn full_lifecycle_marks_moves_done_with_recorded_quantity() {
        let (mut picking, move_id) = created_picking(20);
        let picking_id = picking.id_typed();

        run(
            &mut picking,
            PickingCommand::ConfirmPicking(ConfirmPicking { picking_id, occurred_at: test_time() }),
        )
        .unwrap();
        run(
            &mut picking,
            PickingCommand::AssignPicking(AssignPicking { picking_id, occurred_at: test_time() }),
        )
        .unwrap();
        run(
            &mut picking,
            PickingCommand::SetMoveQuantity(SetMoveQuantity {
                picking_id,
                move_id,
                quantity: Quantity::new(18),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        run(
            &mut picking,
            PickingCommand::ValidatePicking(ValidatePicking { picking_id, occurred_at: test_time() }),
        )
        .unwrap();

        assert_eq!(picking.state(), PickingState::Done);
        let m = picking.find_move(move_id).unwrap();
        assert!(m.is_done());
        assert_eq!(m.delivered_quantity(), Quantity::new(18));
        assert_eq!(picking.version(), 5);
    }

    #[test]
    fn validate_without_quantities_uses_demand() {
        let (mut picking, move_id) = created_picking(7);
        let picking_id = picking.id_typed();
        run(
            &mut picking,
            PickingCommand::ValidatePicking(ValidatePicking { picking_id, occurred_at: test_time() }),
        )
        .unwrap();
        assert_eq!(picking.find_move(move_id).unwrap().quantity(), Quantity::new(7));
    }

    #[test]
    fn done_picking_cannot_be_cancelled_or_revalidated() {
        let (mut picking, _) = created_picking(5);
        let picking_id = picking.id_typed();
        run(
            &mut picking,
            PickingCommand::ValidatePicking(ValidatePicking { picking_id, occurred_at: test_time() }),
        )
        .unwrap();

        let err = run(
            &mut picking,
            PickingCommand::CancelPicking(CancelPicking { picking_id, occurred_at: test_time() }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let err = run(
            &mut picking,
            PickingCommand::ValidatePicking(ValidatePicking { picking_id, occurred_at: test_time() }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn assign_requires_confirmation() {
        let (picking, _) = created_picking(5);
        let err = picking
            .handle(&PickingCommand::AssignPicking(AssignPicking {
                picking_id: picking.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::invariant("only confirmed pickings can be reserved"));
    }

    #[test]
    fn commands_on_unknown_picking_are_not_found() {
        let picking = Picking::empty(PickingId::generate());
        let err = picking
            .handle(&PickingCommand::ConfirmPicking(ConfirmPicking {
                picking_id: picking.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
