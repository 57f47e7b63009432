//! Monthly cost policy and the budget ledger that enforces the programme
//! ceiling.
//!
//! Allocations are whole currency units. Each multiplier term is rounded
//! on its own before summing, so a wage of 1320 with a 0.30 sibling
//! multiplier contributes exactly 396 per sibling.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

const DEFAULT_MINIMUM_WAGE: u32 = 1_320;
const DEFAULT_SPECIAL_NEEDS_MULTIPLIER: f64 = 0.50;
const DEFAULT_SIBLING_MULTIPLIER: f64 = 0.30;
const DEFAULT_BUDGET_CEILING: u64 = 500_000;

/// Tunable rates for computing a placement's monthly allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostPolicy {
    /// Base monthly amount paid for every active placement.
    pub minimum_wage: u32,
    /// Fraction of the wage added when the child has special needs.
    pub special_needs_multiplier: f64,
    /// Fraction of the wage added per sibling placed with the same family.
    pub sibling_multiplier: f64,
    /// Total monthly budget available across all placements.
    pub budget_ceiling: u64,
}

impl Default for CostPolicy {
    fn default() -> Self {
        Self {
            minimum_wage: DEFAULT_MINIMUM_WAGE,
            special_needs_multiplier: DEFAULT_SPECIAL_NEEDS_MULTIPLIER,
            sibling_multiplier: DEFAULT_SIBLING_MULTIPLIER,
            budget_ceiling: DEFAULT_BUDGET_CEILING,
        }
    }
}

impl CostPolicy {
    /// Monthly allocation for one placement: wage, plus a special-needs
    /// supplement, plus one sibling supplement per co-placed sibling.
    pub fn monthly_allocation(&self, has_special_needs: bool, siblings_placed: u32) -> u32 {
        let wage = self.minimum_wage;
        let mut total = wage;
        if has_special_needs {
            total += scaled(wage, self.special_needs_multiplier);
        }
        total += scaled(wage, self.sibling_multiplier) * siblings_placed;
        total
    }
}

fn scaled(wage: u32, multiplier: f64) -> u32 {
    (f64::from(wage) * multiplier).round() as u32
}

/// Budget failure raised when a reservation would exceed the ceiling.
#[derive(Debug, thiserror::Error)]
pub enum BudgetError {
    #[error("monthly allocation of {requested} exceeds remaining budget of {available}")]
    InsufficientBudget { requested: u64, available: u64 },
}

/// Running total of committed monthly allocations, checked against the
/// programme ceiling. Reservations happen before the placement commit and
/// are rolled back if the commit fails.
#[derive(Debug)]
pub struct BudgetLedger {
    ceiling: u64,
    allocated: Mutex<u64>,
}

impl BudgetLedger {
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling,
            allocated: Mutex::new(0),
        }
    }

    fn allocated_guard(&self) -> MutexGuard<'_, u64> {
        match self.allocated.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Commits `amount` of monthly budget and returns the balance left
    /// after the reservation, or fails without changing the ledger when
    /// the ceiling would be exceeded.
    pub fn reserve(&self, amount: u64) -> Result<u64, BudgetError> {
        let mut allocated = self.allocated_guard();
        let available = self.ceiling.saturating_sub(*allocated);
        if amount > available {
            return Err(BudgetError::InsufficientBudget {
                requested: amount,
                available,
            });
        }
        *allocated += amount;
        Ok(self.ceiling.saturating_sub(*allocated))
    }

    /// Returns `amount` to the pool. Releasing more than is allocated
    /// clamps to zero rather than underflowing.
    pub fn release(&self, amount: u64) {
        let mut allocated = self.allocated_guard();
        *allocated = allocated.saturating_sub(amount);
    }

    pub fn allocated(&self) -> u64 {
        *self.allocated_guard()
    }

    pub fn available(&self) -> u64 {
        self.ceiling.saturating_sub(self.allocated())
    }
}

/// Cost policy plus the ledger it draws from, shared by the lifecycle
/// service and anything else that prices placements.
#[derive(Debug)]
pub struct CostAllocator {
    policy: CostPolicy,
    ledger: BudgetLedger,
}

impl CostAllocator {
    pub fn new(policy: CostPolicy) -> Self {
        let ledger = BudgetLedger::new(policy.budget_ceiling);
        Self { policy, ledger }
    }

    pub fn policy(&self) -> &CostPolicy {
        &self.policy
    }

    pub fn monthly_allocation(&self, has_special_needs: bool, siblings_placed: u32) -> u32 {
        self.policy
            .monthly_allocation(has_special_needs, siblings_placed)
    }

    pub fn reserve(&self, amount: u32) -> Result<u64, BudgetError> {
        self.ledger.reserve(u64::from(amount))
    }

    pub fn release(&self, amount: u32) {
        self.ledger.release(u64::from(amount));
    }

    pub fn allocated(&self) -> u64 {
        self.ledger.allocated()
    }

    pub fn available(&self) -> u64 {
        self.ledger.available()
    }
}

impl Default for CostAllocator {
    fn default() -> Self {
        Self::new(CostPolicy::default())
    }
}
