//! Per-operation circuit breaking and time limiting.
//!
//! Every service operation runs through a [`Guard`]: the breaker decides whether
//! the call may start, the time limiter bounds how long it may take, and the
//! outcome is fed back into the breaker.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::config::ResilienceConfig;

/// Logical operation families, one breaker each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindAll,
    FindById,
    FindByIdentityDni,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::FindAll,
        Operation::FindById,
        Operation::FindByIdentityDni,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::FindAll => "find_all",
            Operation::FindById => "find_by_id",
            Operation::FindByIdentityDni => "find_by_identity_dni",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Why a guarded call produced no value.
#[derive(Debug, thiserror::Error)]
pub enum GuardError<E> {
    /// The breaker is open; the call was never started.
    #[error("circuit '{0}' is open")]
    Rejected(&'static str),
    /// The call exceeded the time limit and was abandoned.
    #[error("call timed out after {0:?}")]
    TimedOut(Duration),
    /// The call itself failed.
    #[error("{0}")]
    Inner(E),
}

/// A circuit breaker paired with a time limit.
pub struct Guard {
    breaker: CircuitBreaker,
    time_limit: Duration,
}

impl Guard {
    pub fn new(name: &'static str, config: &ResilienceConfig) -> Self {
        Self {
            breaker: CircuitBreaker::from_config(name, config),
            time_limit: config.time_limit,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Runs `fut` under the breaker and the time limit.
    ///
    /// Errors for which `is_failure` returns false are handed back to the caller
    /// without counting against the breaker. A timeout drops `fut`.
    pub async fn call_with<T, E, F, P>(&self, is_failure: P, fut: F) -> Result<T, GuardError<E>>
    where
        F: Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        let permit = self
            .breaker
            .acquire()
            .map_err(|_| GuardError::Rejected(self.breaker.name()))?;

        match tokio::time::timeout(self.time_limit, fut).await {
            Ok(Ok(value)) => {
                permit.success();
                Ok(value)
            }
            Ok(Err(e)) => {
                if is_failure(&e) {
                    permit.failure();
                } else {
                    permit.success();
                }
                Err(GuardError::Inner(e))
            }
            Err(_) => {
                permit.failure();
                Err(GuardError::TimedOut(self.time_limit))
            }
        }
    }
}

/// One [`Guard`] per [`Operation`], built at startup.
pub struct Resilience {
    find_all: Guard,
    find_by_id: Guard,
    find_by_identity_dni: Guard,
    create: Guard,
    update: Guard,
    delete: Guard,
}

impl Resilience {
    pub fn new(config: &ResilienceConfig) -> Self {
        Self {
            find_all: Guard::new(Operation::FindAll.name(), config),
            find_by_id: Guard::new(Operation::FindById.name(), config),
            find_by_identity_dni: Guard::new(Operation::FindByIdentityDni.name(), config),
            create: Guard::new(Operation::Create.name(), config),
            update: Guard::new(Operation::Update.name(), config),
            delete: Guard::new(Operation::Delete.name(), config),
        }
    }

    pub fn guard(&self, operation: Operation) -> &Guard {
        match operation {
            Operation::FindAll => &self.find_all,
            Operation::FindById => &self.find_by_id,
            Operation::FindByIdentityDni => &self.find_by_identity_dni,
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        }
    }

    /// Snapshot of every breaker, keyed by operation name.
    pub fn states(&self) -> BTreeMap<&'static str, CircuitState> {
        Operation::ALL
            .iter()
            .map(|op| (op.name(), self.guard(*op).state()))
            .collect()
    }
}
