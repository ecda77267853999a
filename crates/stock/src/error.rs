use thiserror::Error;

use warehouse_core::{DomainError, Quantity};

use crate::stock_move::{MoveId, ProductId};

/// Failure of a return-wizard edit or submission.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReturnError {
    /// The requested return quantity exceeds what is left to return on the
    /// originating move. Always surfaced to the user; nothing was written.
    #[error(
        "cannot return more quantity than was delivered minus what has already been returned \
         (product {product_id}: requested {requested}, available {available})"
    )]
    QuantityExceedsAvailable {
        product_id: ProductId,
        move_id: MoveId,
        requested: Quantity,
        available: Quantity,
    },

    /// Platform-level failure (unknown picking, illegal transition, ...).
    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type ReturnResult<T> = Result<T, ReturnError>;
