//! Turn bill items and their share assignments into owed amounts.

use std::collections::BTreeMap;

use log::debug;

use crate::error::LedgerError;
use crate::money::Money;
use crate::types::{Bill, BillItem, ItemAssignment, ItemId, UserId};

/// Owed amount per user.
pub type Shares = BTreeMap<UserId, Money>;

/// Compute how much each assigned user owes for `item`.
///
/// The item cost (`price * quantity`) is split with
/// [`Money::split_by_percentages`], in the order the assignments are given,
/// so the resulting amounts always add up to the item cost. A user assigned
/// more than once receives the sum of their shares.
pub fn resolve_item(item: &BillItem, assignments: &[ItemAssignment]) -> Result<Shares, LedgerError> {
    if assignments.is_empty() {
        return Err(LedgerError::UnassignedItem(item.id));
    }

    let percentages: Vec<u32> = assignments.iter().map(|a| a.share_percentage).collect();
    let total_percentage: u64 = percentages.iter().map(|&p| p as u64).sum();
    if total_percentage != 100 {
        return Err(LedgerError::InvalidShare {
            item_id: item.id,
            total: total_percentage,
        });
    }

    let cost = item_cost(item)?;
    let amounts = cost
        .split_by_percentages(&percentages)
        .ok_or(LedgerError::InvalidShare {
            item_id: item.id,
            total: total_percentage,
        })?;

    let mut shares = Shares::new();
    for (assignment, amount) in assignments.iter().zip(amounts) {
        add_share(&mut shares, assignment.user_id, amount, item.id)?;
    }

    Ok(shares)
}

/// Resolve every item of `bill` and add up what each user owes.
///
/// `assignments` may contain the assignments of all items of the bill, they
/// are matched to items by `item_id`. Once a bill has items, its total must
/// equal the sum of the item costs.
pub fn resolve_bill(
    bill: &Bill,
    items: &[BillItem],
    assignments: &[ItemAssignment],
) -> Result<Shares, LedgerError> {
    let mut shares = Shares::new();
    if items.is_empty() {
        return Ok(shares);
    }

    let mut items_total = Money::ZERO;
    for item in items {
        items_total = items_total
            .checked_add(item_cost(item)?)
            .ok_or(LedgerError::AmountOverflow(item.id))?;
    }
    if items_total != bill.total {
        return Err(LedgerError::BillTotalMismatch {
            expected: bill.total,
            actual: items_total,
        });
    }

    for item in items {
        let item_assignments: Vec<_> = assignments
            .iter()
            .filter(|a| a.item_id == item.id)
            .cloned()
            .collect();
        for (user_id, amount) in resolve_item(item, &item_assignments)? {
            add_share(&mut shares, user_id, amount, item.id)?;
        }
    }

    debug!("Bill {} resolved to {:?}", bill.id, shares);
    Ok(shares)
}

fn add_share(
    shares: &mut Shares,
    user_id: UserId,
    amount: Money,
    item_id: ItemId,
) -> Result<(), LedgerError> {
    let share = shares.entry(user_id).or_insert(Money::ZERO);
    *share = share
        .checked_add(amount)
        .ok_or(LedgerError::AmountOverflow(item_id))?;
    Ok(())
}

fn item_cost(item: &BillItem) -> Result<Money, LedgerError> {
    item.price
        .checked_mul(item.quantity as i64)
        .ok_or(LedgerError::AmountOverflow(item.id))
}
