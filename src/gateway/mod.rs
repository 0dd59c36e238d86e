//! Order submission boundary.
//!
//! The state machine re-attempts an untouched stage on the next tick after
//! any failure, so implementations must be safe to retry with an equivalent
//! request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::models::{OrderAck, OrderRequest};

pub trait OrderGateway: Send + Sync {
    /// Submit an order intent. `Err` (transport failure) and
    /// `Ok(accepted = false)` (explicit rejection) are treated identically
    /// by callers: the stage does not advance and the same comparison runs
    /// again next tick.
    fn submit_order(&self, order: &OrderRequest) -> anyhow::Result<OrderAck>;
}

/// Paper gateway: accepts every order, keeps a record of what was submitted.
///
/// Doubles as the dry-run execution path for the binary and as the
/// recording gateway in tests (the reject toggle simulates broker failures).
#[derive(Default)]
pub struct PaperGateway {
    orders: Mutex<Vec<OrderRequest>>,
    rejecting: AtomicBool,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every submission is rejected (and not recorded).
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// All accepted orders, in submission order.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().expect("order log poisoned").clone()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().expect("order log poisoned").len()
    }
}

impl OrderGateway for PaperGateway {
    fn submit_order(&self, order: &OrderRequest) -> anyhow::Result<OrderAck> {
        if self.rejecting.load(Ordering::SeqCst) {
            tracing::warn!(
                instrument = %order.instrument,
                side = %order.side,
                qty = order.quantity,
                "paper gateway rejecting order"
            );
            return Ok(OrderAck {
                order_id: order.id,
                accepted: false,
            });
        }

        tracing::info!(
            instrument = %order.instrument,
            side = %order.side,
            qty = order.quantity,
            ref_price = order.reference_price,
            product = %order.product,
            "paper order filled"
        );

        self.orders
            .lock()
            .expect("order log poisoned")
            .push(order.clone());

        Ok(OrderAck {
            order_id: order.id,
            accepted: true,
        })
    }
}
