//! Fold the ledger of a group into who owes whom.

use std::collections::{BTreeMap, HashMap};

use log::{debug, error};

use crate::error::LedgerError;
use crate::money::Money;
use crate::types::{BillId, EntryKind, LedgerEntry, UserId};

use super::resolver::Shares;

/// Pairwise debts between the members of a group.
///
/// Each unordered pair of users is stored once, keyed by `(lower id, higher id)`.
/// A positive value means the lower id owes the higher id, a negative value the
/// opposite.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Balances {
    pairs: BTreeMap<(UserId, UserId), Money>,
}

impl Balances {
    pub fn new() -> Balances {
        Balances::default()
    }

    /// Record that `debtor` owes `amount` more to `creditor`. A negative
    /// amount reduces the debt.
    pub fn record_debt(
        &mut self,
        debtor: UserId,
        creditor: UserId,
        amount: Money,
    ) -> Result<(), LedgerError> {
        if debtor == creditor || amount.is_zero() {
            return Ok(());
        }
        let (key, updated) = if debtor < creditor {
            let key = (debtor, creditor);
            (key, self.pair(key).checked_add(amount))
        } else {
            let key = (creditor, debtor);
            (key, self.pair(key).checked_sub(amount))
        };
        self.pairs.insert(key, bounded(updated)?);
        Ok(())
    }

    fn pair(&self, key: (UserId, UserId)) -> Money {
        self.pairs.get(&key).copied().unwrap_or(Money::ZERO)
    }

    /// How much `debtor` owes `creditor`; zero if nothing or if the debt goes
    /// the other way.
    #[cfg(test)]
    pub fn owed(&self, debtor: UserId, creditor: UserId) -> Money {
        let signed = if debtor < creditor {
            self.pairs.get(&(debtor, creditor)).copied()
        } else {
            self.pairs.get(&(creditor, debtor)).map(|&m| -m)
        };
        match signed {
            Some(m) if m.is_positive() => m,
            _ => Money::ZERO,
        }
    }

    /// Every outstanding debt as `(debtor, creditor) -> amount`, with strictly
    /// positive amounts only.
    pub fn pairwise(&self) -> BTreeMap<(UserId, UserId), Money> {
        self.pairs
            .iter()
            .filter(|(_, m)| !m.is_zero())
            .map(|(&(a, b), &m)| {
                if m.is_positive() {
                    ((a, b), m)
                } else {
                    ((b, a), -m)
                }
            })
            .collect()
    }

    /// Net balance per user: positive means the user is owed money, negative
    /// means the user owes money.
    pub fn net(&self) -> Result<BTreeMap<UserId, Money>, LedgerError> {
        let mut net = BTreeMap::new();
        for (&(a, b), &m) in &self.pairs {
            let debtor = net.entry(a).or_insert(Money::ZERO);
            *debtor = bounded(debtor.checked_sub(m))?;
            let creditor = net.entry(b).or_insert(Money::ZERO);
            *creditor = bounded(creditor.checked_add(m))?;
        }
        Ok(net)
    }

    pub fn is_settled(&self) -> bool {
        self.pairs.values().all(|m| m.is_zero())
    }
}

/// Balances must stay negatable, so `i64::MIN` counts as an overflow too.
fn bounded(amount: Option<Money>) -> Result<Money, LedgerError> {
    amount
        .filter(|m| m.checked_neg().is_some())
        .ok_or(LedgerError::BalanceOverflow)
}

/// Compute the balances of a group from its ledger entries.
///
/// For an expense, each participant's share of the linked bill becomes a debt
/// towards the payer; the payer's own share is not a debt. Payments and
/// settlements reduce the payer's debt towards the recipient, possibly
/// reversing it when the payer pays more than owed. The result depends only
/// on the entries, not on their order.
///
/// `bill_shares` must contain the resolved shares of every bill linked by an
/// expense entry.
pub fn aggregate_balances(
    entries: &[LedgerEntry],
    bill_shares: &HashMap<BillId, Shares>,
) -> Result<Balances, LedgerError> {
    let mut balances = Balances::new();

    for entry in entries {
        match &entry.kind {
            EntryKind::Expense { bill_id } => {
                let shares = bill_shares
                    .get(bill_id)
                    .ok_or(LedgerError::UnresolvedBill(*bill_id))?;
                let shares_total = Money::checked_sum(shares.values().copied())
                    .ok_or(LedgerError::BalanceOverflow)?;
                if shares_total != entry.amount {
                    error!(
                        "Expense entry {} records {} but bill {} resolves to {}",
                        entry.id, entry.amount, bill_id, shares_total
                    );
                    return Err(LedgerError::ImbalancedLedger(format!(
                        "expense entry {} records {} but bill {} resolves to {}",
                        entry.id, entry.amount, bill_id, shares_total
                    )));
                }
                for (&participant, &share) in shares {
                    balances.record_debt(participant, entry.payer_id, share)?;
                }
            }
            EntryKind::Payment { recipient_id } | EntryKind::Settlement { recipient_id } => {
                balances.record_debt(*recipient_id, entry.payer_id, entry.amount)?;
            }
        }
    }

    let total = Money::checked_sum(balances.net()?.into_values())
        .ok_or(LedgerError::BalanceOverflow)?;
    if !total.is_zero() {
        error!("Net balances sum to {total} instead of zero: {:?}", balances);
        return Err(LedgerError::ImbalancedLedger(format!(
            "net balances sum to {total}"
        )));
    }

    debug!(
        "Aggregated {} ledger entries into {} debts",
        entries.len(),
        balances.pairwise().len()
    );
    Ok(balances)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use crate::types::NewLedgerEntry;

    use super::*;

    const A: UserId = 1;
    const B: UserId = 2;
    const C: UserId = 3;

    fn entry(id: i64, new_entry: NewLedgerEntry) -> LedgerEntry {
        LedgerEntry::from_new(id, new_entry, DateTime::<Utc>::MIN_UTC)
    }

    fn make_shares() -> HashMap<BillId, Shares> {
        let mut bill_shares = HashMap::new();
        // Bill 100: 3000 split 1000 each.
        bill_shares.insert(
            100,
            Shares::from([
                (A, Money::from_minor(1000)),
                (B, Money::from_minor(1000)),
                (C, Money::from_minor(1000)),
            ]),
        );
        // Bill 200: 1200, C had nothing.
        bill_shares.insert(
            200,
            Shares::from([(A, Money::from_minor(800)), (B, Money::from_minor(400))]),
        );
        bill_shares
    }

    fn make_entries() -> Vec<LedgerEntry> {
        vec![
            entry(
                1,
                NewLedgerEntry::new_expense(1, A, Money::from_minor(3000), 100, "dinner"),
            ),
            entry(
                2,
                NewLedgerEntry::new_expense(1, B, Money::from_minor(1200), 200, "taxi"),
            ),
            entry(
                3,
                NewLedgerEntry::new_payment(1, C, A, Money::from_minor(300), "cash"),
            ),
            entry(
                4,
                NewLedgerEntry::new_settlement(1, B, A, Money::from_minor(100), "transfer"),
            ),
        ]
    }

    #[test]
    fn test_aggregate_balances() -> anyhow::Result<()> {
        let balances = aggregate_balances(&make_entries(), &make_shares())?;

        // B owes A 1000 from the dinner, A owes B 800 from the taxi, B paid 100.
        assert_eq!(balances.owed(B, A), Money::from_minor(100));
        assert_eq!(balances.owed(A, B), Money::ZERO);
        // C owes A 1000 from the dinner and paid 300.
        assert_eq!(balances.owed(C, A), Money::from_minor(700));
        assert_eq!(balances.owed(C, B), Money::ZERO);

        let pairwise = balances.pairwise();
        assert_eq!(pairwise.len(), 2);
        assert_eq!(pairwise[&(B, A)], Money::from_minor(100));
        assert_eq!(pairwise[&(C, A)], Money::from_minor(700));

        let net = balances.net()?;
        assert_eq!(net[&A], Money::from_minor(800));
        assert_eq!(net[&B], Money::from_minor(-100));
        assert_eq!(net[&C], Money::from_minor(-700));
        Ok(())
    }

    #[test]
    fn test_overpayment_reverses_debt() -> anyhow::Result<()> {
        let entries = vec![
            entry(
                1,
                NewLedgerEntry::new_expense(1, B, Money::from_minor(1200), 200, "taxi"),
            ),
            entry(
                2,
                NewLedgerEntry::new_payment(1, A, B, Money::from_minor(1000), "too much"),
            ),
        ];
        let balances = aggregate_balances(&entries, &make_shares())?;

        assert_eq!(balances.owed(A, B), Money::ZERO);
        assert_eq!(balances.owed(B, A), Money::from_minor(200));
        Ok(())
    }

    #[test]
    fn test_aggregation_is_order_independent() -> anyhow::Result<()> {
        let entries = make_entries();
        let expected = aggregate_balances(&entries, &make_shares())?;

        let mut reversed = entries.clone();
        reversed.reverse();
        assert_eq!(aggregate_balances(&reversed, &make_shares())?, expected);

        for shift in 1..entries.len() {
            let mut rotated = entries.clone();
            rotated.rotate_left(shift);
            assert_eq!(aggregate_balances(&rotated, &make_shares())?, expected);
        }

        let mut swapped = entries.clone();
        swapped.swap(0, 3);
        swapped.swap(1, 2);
        assert_eq!(aggregate_balances(&swapped, &make_shares())?, expected);
        Ok(())
    }

    #[test]
    fn test_net_balances_are_zero_sum() -> anyhow::Result<()> {
        let balances = aggregate_balances(&make_entries(), &make_shares())?;
        assert_eq!(
            Money::checked_sum(balances.net()?.into_values()),
            Some(Money::ZERO)
        );
        Ok(())
    }

    #[test]
    fn test_unresolved_bill() {
        let entries = vec![entry(
            1,
            NewLedgerEntry::new_expense(1, A, Money::from_minor(3000), 999, "dinner"),
        )];
        assert_eq!(
            aggregate_balances(&entries, &make_shares()),
            Err(LedgerError::UnresolvedBill(999))
        );
    }

    #[test]
    fn test_expense_amount_must_match_bill() {
        let entries = vec![entry(
            1,
            NewLedgerEntry::new_expense(1, A, Money::from_minor(2999), 100, "dinner"),
        )];
        assert!(matches!(
            aggregate_balances(&entries, &make_shares()),
            Err(LedgerError::ImbalancedLedger(_))
        ));
    }

    #[test]
    fn test_empty_ledger_is_settled() -> anyhow::Result<()> {
        let balances = aggregate_balances(&[], &HashMap::new())?;
        assert!(balances.is_settled());
        assert!(balances.pairwise().is_empty());
        assert!(balances.net()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_balance_overflow() {
        let half = Money::from_minor(i64::MAX / 2 + 1);
        let bill_shares = HashMap::from([
            (100, Shares::from([(B, half)])),
            (200, Shares::from([(B, half)])),
        ]);
        let entries = vec![
            entry(1, NewLedgerEntry::new_expense(1, A, half, 100, "gold")),
            entry(2, NewLedgerEntry::new_expense(1, A, half, 200, "silver")),
        ];
        assert_eq!(
            aggregate_balances(&entries, &bill_shares),
            Err(LedgerError::BalanceOverflow)
        );

        let mut balances = Balances::new();
        assert_eq!(balances.record_debt(A, B, Money::from_minor(i64::MAX)), Ok(()));
        assert_eq!(
            balances.record_debt(B, A, Money::from_minor(i64::MAX)),
            Ok(())
        );
        assert!(balances.is_settled());
        assert_eq!(balances.record_debt(B, A, Money::from_minor(i64::MAX)), Ok(()));
        assert_eq!(
            balances.record_debt(B, A, Money::from_minor(1)),
            Err(LedgerError::BalanceOverflow)
        );
        assert_eq!(balances.owed(B, A), Money::from_minor(i64::MAX));
    }
}
