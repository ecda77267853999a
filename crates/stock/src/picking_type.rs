//! Operation types: the configuration every picking is created under.

use serde::{Deserialize, Serialize};

use warehouse_core::{Entity, domain_id};

domain_id!(
    /// Picking type identifier.
    PickingTypeId
);

/// What kind of transfer a picking type performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickingTypeCode {
    Incoming,
    Outgoing,
    Internal,
}

/// Configuration entity shared by all pickings of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickingType {
    id: PickingTypeId,
    name: String,
    code: PickingTypeCode,
    /// Limit returns to what was delivered minus what was already returned.
    restrict_return_qty: bool,
    /// Type used for pickings created by the return wizard (self if unset).
    return_picking_type_id: Option<PickingTypeId>,
}

impl PickingType {
    pub fn new(id: PickingTypeId, name: impl Into<String>, code: PickingTypeCode) -> Self {
        Self {
            id,
            name: name.into(),
            code,
            restrict_return_qty: false,
            return_picking_type_id: None,
        }
    }

    pub fn with_restricted_returns(mut self, restrict: bool) -> Self {
        self.restrict_return_qty = restrict;
        self
    }

    pub fn with_return_picking_type(mut self, return_type: PickingTypeId) -> Self {
        self.return_picking_type_id = Some(return_type);
        self
    }

    pub fn id_typed(&self) -> PickingTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> PickingTypeCode {
        self.code
    }

    pub fn restrict_return_qty(&self) -> bool {
        self.restrict_return_qty
    }

    pub fn set_restrict_return_qty(&mut self, restrict: bool) {
        self.restrict_return_qty = restrict;
    }

    /// Picking type that returns of this type's pickings are created under.
    pub fn return_picking_type_id(&self) -> PickingTypeId {
        self.return_picking_type_id.unwrap_or(self.id)
    }
}

impl Entity for PickingType {
    type Id = PickingTypeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
