use crate::domain::model::{ClientAccount, Role};

/// Outcome of the admission check. Denials carry the usage numbers so the
/// boundary can build a precise quota-exceeded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    Denied { used: u64, limit: u64, remaining: u64 },
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

/// Pure quota gate. No side effects: the counter only moves when the ledger
/// records a successful attempt, so a rejected or crashed request never
/// consumes quota. Two concurrent calls from the same account can both pass
/// before either increment lands; that soft limit is the documented
/// trade-off.
pub fn try_admit(account: &ClientAccount, requested_units: u64) -> Admission {
    if account.role == Role::Unlimited {
        return Admission::Granted;
    }

    let remaining = account.usage_limit.saturating_sub(account.usage_count);
    if remaining >= requested_units {
        Admission::Granted
    } else {
        Admission::Denied {
            used: account.usage_count,
            limit: account.usage_limit,
            remaining,
        }
    }
}
