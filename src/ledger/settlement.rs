//! Suggest the transfers that settle a group.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use log::{debug, error};

use crate::error::LedgerError;
use crate::money::Money;
use crate::types::{Transfer, UserId};

/// Get a list of transfers that bring every balance in `net` to zero.
///
/// Positive balances are owed to the user, negative balances are owed by the
/// user. The algorithm works as follows:
/// - pick the user with the largest debt and the user with the largest credit
///   (ties go to the lowest user id)
/// - the debtor pays the creditor the smaller of the two magnitudes
/// - whoever still has a non-zero balance goes back into the pool
/// - stop when nobody is left
///
/// Each step zeroes at least one user, so there are at most `n - 1`
/// transfers for `n` users with a non-zero balance. Finding the minimum
/// number of transfers is NP-complete; this greedy matching is normally
/// within one transfer of it for small groups.
pub fn suggest_settlements(net: &BTreeMap<UserId, Money>) -> Result<Vec<Transfer>, LedgerError> {
    let total =
        Money::checked_sum(net.values().copied()).ok_or(LedgerError::BalanceOverflow)?;
    if !total.is_zero() {
        error!("Cannot settle balances that sum to {total}: {:?}", net);
        return Err(LedgerError::ImbalancedLedger(format!(
            "balances sum to {total} instead of zero"
        )));
    }

    // Max-heaps on magnitude; `Reverse` on the id makes lower ids win ties.
    let mut debtors: BinaryHeap<(Money, Reverse<UserId>)> = BinaryHeap::new();
    let mut creditors: BinaryHeap<(Money, Reverse<UserId>)> = BinaryHeap::new();
    for (&user, &balance) in net {
        if balance.is_negative() {
            let debt = balance.checked_neg().ok_or(LedgerError::BalanceOverflow)?;
            debtors.push((debt, Reverse(user)));
        } else if balance.is_positive() {
            creditors.push((balance, Reverse(user)));
        }
    }

    let mut result = vec![];

    while let (Some((debt, Reverse(debtor))), Some((credit, Reverse(creditor)))) =
        (debtors.pop(), creditors.pop())
    {
        let amount = std::cmp::min(debt, credit);
        result.push(Transfer::new(debtor, creditor, amount));

        if debt > amount {
            debtors.push((debt - amount, Reverse(debtor)));
        }
        if credit > amount {
            creditors.push((credit - amount, Reverse(creditor)));
        }
    }

    // Both heaps drain together because the balances sum to zero.
    debug!("Suggested {} transfers for {} users", result.len(), net.len());
    Ok(result)
}

/// Apply `transfers` to `net` and return the resulting balances.
///
/// Paying reduces the debt of the sender and the credit of the receiver.
pub fn apply_transfers(
    net: &BTreeMap<UserId, Money>,
    transfers: &[Transfer],
) -> Result<BTreeMap<UserId, Money>, LedgerError> {
    let mut result = net.clone();
    for transfer in transfers {
        let sender = result.entry(transfer.from).or_insert(Money::ZERO);
        *sender = sender
            .checked_add(transfer.amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        let receiver = result.entry(transfer.to).or_insert(Money::ZERO);
        *receiver = receiver
            .checked_sub(transfer.amount)
            .ok_or(LedgerError::BalanceOverflow)?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: UserId = 1;
    const B: UserId = 2;
    const C: UserId = 3;
    const D: UserId = 4;
    const E: UserId = 5;

    fn balances(values: &[(UserId, i64)]) -> BTreeMap<UserId, Money> {
        values
            .iter()
            .map(|&(u, m)| (u, Money::from_minor(m)))
            .collect()
    }

    #[test]
    fn test_one_debtor_two_creditors() -> anyhow::Result<()> {
        let net = balances(&[(A, -1000), (B, 600), (C, 400)]);
        let transfers = suggest_settlements(&net)?;

        assert_eq!(
            transfers,
            vec![
                Transfer::new(A, B, Money::from_minor(600)),
                Transfer::new(A, C, Money::from_minor(400)),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_largest_debt_against_largest_credit() -> anyhow::Result<()> {
        let net = balances(&[(A, -300), (B, -700), (C, 500), (D, 450), (E, 50)]);
        let transfers = suggest_settlements(&net)?;

        assert_eq!(transfers[0], Transfer::new(B, C, Money::from_minor(500)));
        assert_eq!(transfers[1], Transfer::new(A, D, Money::from_minor(300)));
        assert_eq!(transfers[2], Transfer::new(B, D, Money::from_minor(150)));
        assert_eq!(transfers[3], Transfer::new(B, E, Money::from_minor(50)));
        assert_eq!(transfers.len(), 4);
        Ok(())
    }

    #[test]
    fn test_suggestions_settle_everything() -> anyhow::Result<()> {
        let cases = vec![
            balances(&[(A, -1000), (B, 600), (C, 400)]),
            balances(&[(A, -1), (B, -1), (C, -1), (D, 3)]),
            balances(&[(A, 12_345), (B, -6_789), (C, -5_556), (D, 0)]),
            balances(&[(A, -250), (B, 250), (C, -250), (D, 250), (E, 0)]),
            balances(&[]),
        ];

        for net in cases {
            let transfers = suggest_settlements(&net)?;
            let settled = apply_transfers(&net, &transfers)?;
            assert!(
                settled.values().all(|m| m.is_zero()),
                "{net:?} -> {settled:?}"
            );
            assert!(transfers.iter().all(|t| t.amount.is_positive()));
            let non_zero = net.values().filter(|m| !m.is_zero()).count();
            assert!(transfers.len() < non_zero.max(1));
        }
        Ok(())
    }

    #[test]
    fn test_already_settled() -> anyhow::Result<()> {
        let net = balances(&[(A, 0), (B, 0)]);
        assert!(suggest_settlements(&net)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_imbalanced_input() {
        let net = balances(&[(A, -1000), (B, 600), (C, 300)]);
        assert!(matches!(
            suggest_settlements(&net),
            Err(LedgerError::ImbalancedLedger(_))
        ));
    }

    #[test]
    fn test_balance_overflow() {
        let net = balances(&[(A, i64::MAX), (B, 1), (C, -1)]);
        assert_eq!(suggest_settlements(&net), Err(LedgerError::BalanceOverflow));

        let net = balances(&[(A, i64::MIN), (B, i64::MAX), (C, 1)]);
        assert_eq!(suggest_settlements(&net), Err(LedgerError::BalanceOverflow));

        let net = balances(&[(A, i64::MAX), (B, -i64::MAX)]);
        let transfers = [Transfer::new(A, B, Money::from_minor(1))];
        assert_eq!(
            apply_transfers(&net, &transfers),
            Err(LedgerError::BalanceOverflow)
        );
    }
}
