use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use thiserror::Error;

use super::{Cents, Transaction, TransactionId, User, UserId, split_evenly};

/// Net balance per user: positive = net creditor, negative = net debtor.
/// Keyed by a BTreeMap so iteration order is stable across runs.
pub type NetBalances = BTreeMap<UserId, Cents>;

/// One row of a settlement plan: `debtor` pays `creditor` `amount_cents`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SettlementTransfer {
    pub debtor: UserId,
    pub creditor: UserId,
    pub amount_cents: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("invalid transaction {id}: {reason}")]
    InvalidTransaction { id: TransactionId, reason: String },

    #[error("balances do not sum to zero (off by {residual} cents)")]
    UnbalancedLedger { residual: Cents },
}

impl SettlementError {
    fn invalid(id: TransactionId, reason: impl Into<String>) -> Self {
        SettlementError::InvalidTransaction {
            id,
            reason: reason.into(),
        }
    }
}

/// Compute net balances for a snapshot of transactions.
///
/// Every user appearing in any transaction (as payer or participant) gets an
/// entry, zero-initialized. A shared expense of amount A among participant
/// set S credits the payer with A and debits each member of S their equal
/// share; the payer's own share, if any, nets out. Shares are split with
/// [`split_evenly`], remainder cents going to the lowest user ids, so the
/// contributions of a shared expense sum to exactly zero. Income credits the
/// payer and is never split. A personal expense creates no debt.
///
/// The function never mutates its inputs and returns either a complete
/// result or an error, so calling it twice on the same snapshot yields
/// identical results.
pub fn compute_net_balances(
    users: &[User],
    transactions: &[Transaction],
) -> Result<NetBalances, SettlementError> {
    let known: BTreeSet<UserId> = users.iter().map(|u| u.id).collect();
    let mut balances = NetBalances::new();

    for tx in transactions {
        if tx.amount_cents <= 0 {
            return Err(SettlementError::invalid(
                tx.id,
                format!("amount must be positive, got {}", tx.amount_cents),
            ));
        }
        if !known.contains(&tx.payer) {
            return Err(SettlementError::invalid(
                tx.id,
                format!("unknown payer {}", tx.payer),
            ));
        }
        balances.entry(tx.payer).or_insert(0);

        match &tx.shared_with {
            None => {
                if tx.flow.is_income() {
                    *balances.get_mut(&tx.payer).unwrap() += tx.amount_cents;
                }
                // A personal expense creates no debt.
            }
            Some(participants) => {
                if tx.flow.is_income() {
                    return Err(SettlementError::invalid(tx.id, "income cannot be shared"));
                }
                // Participant sets are sets: duplicates collapse, and the
                // sorted order fixes where remainder cents land.
                let participants: BTreeSet<UserId> = participants.iter().copied().collect();
                if participants.is_empty() {
                    return Err(SettlementError::invalid(
                        tx.id,
                        "shared transaction with empty participant set",
                    ));
                }
                if let Some(unknown) = participants.iter().find(|id| !known.contains(id)) {
                    return Err(SettlementError::invalid(
                        tx.id,
                        format!("unknown participant {}", unknown),
                    ));
                }

                let shares = split_evenly(tx.amount_cents, participants.len());
                *balances.get_mut(&tx.payer).unwrap() += tx.amount_cents;
                for (participant, share) in participants.iter().zip(shares) {
                    *balances.entry(*participant).or_insert(0) -= share;
                }
            }
        }
    }

    Ok(balances)
}

/// Reduce net balances to a minimal set of transfers that zeroes them all.
///
/// Greedy matching: repeatedly pair the largest creditor with the largest
/// debtor and transfer the smaller of the two magnitudes. Each round zeroes
/// at least one balance, so N users with nonzero balance settle in at most
/// N-1 transfers. Ties on magnitude break by ascending user id.
///
/// Fails with [`SettlementError::UnbalancedLedger`] when the balances do not
/// sum to exactly zero; that indicates a caller bug (e.g. feeding income
/// credits into a debt settlement), not a user error.
pub fn settle(balances: &NetBalances) -> Result<Vec<SettlementTransfer>, SettlementError> {
    let residual: Cents = balances.values().sum();
    if residual != 0 {
        return Err(SettlementError::UnbalancedLedger { residual });
    }

    // Max-heaps ordered by (magnitude, then lowest id first).
    let mut creditors: BinaryHeap<(Cents, Reverse<UserId>)> = BinaryHeap::new();
    let mut debtors: BinaryHeap<(Cents, Reverse<UserId>)> = BinaryHeap::new();
    for (&user, &balance) in balances {
        match balance {
            b if b > 0 => creditors.push((b, Reverse(user))),
            b if b < 0 => debtors.push((-b, Reverse(user))),
            _ => {}
        }
    }

    let mut transfers = Vec::new();
    while let (Some((credit, Reverse(creditor))), Some((debt, Reverse(debtor)))) =
        (creditors.pop(), debtors.pop())
    {
        let amount = credit.min(debt);
        transfers.push(SettlementTransfer {
            debtor,
            creditor,
            amount_cents: amount,
        });
        if credit > amount {
            creditors.push((credit - amount, Reverse(creditor)));
        }
        if debt > amount {
            debtors.push((debt - amount, Reverse(debtor)));
        }
    }
    debug_assert!(creditors.is_empty() && debtors.is_empty());

    Ok(transfers)
}
