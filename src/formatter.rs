//! Produce the strings that are printed back to the user.

use std::collections::{BTreeMap, HashMap};

use crate::money::Money;
use crate::types::{Bill, BillItem, EntryKind, ItemAssignment, LedgerEntry, Transfer, User, UserId};

const CURRENCY_SYMBOL: &str = "₦";

/// Maps user IDs to display names.
pub struct Names(HashMap<UserId, String>);

impl Names {
    pub fn new(users: &[User]) -> Names {
        Names(users.iter().map(|u| (u.id, u.name.clone())).collect())
    }

    fn get(&self, user_id: UserId) -> String {
        self.0
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| format!("user#{user_id}"))
    }
}

pub fn format_amount(amount: Money) -> String {
    format!("{CURRENCY_SYMBOL}{amount}")
}

/// One line per outstanding debt, debtors aligned.
pub fn format_debts(debts: &BTreeMap<(UserId, UserId), Money>, names: &Names) -> String {
    if debts.is_empty() {
        return "All clean!".to_string();
    }

    let lines: Vec<_> = debts
        .iter()
        .map(|(&(debtor, creditor), &amount)| (names.get(debtor), names.get(creditor), amount))
        .collect();
    let width = lines.iter().map(|(d, _, _)| d.chars().count()).max().unwrap_or(0);

    lines
        .into_iter()
        .map(|(debtor, creditor, amount)| {
            format!(
                "{debtor:<width$} owes {creditor} {}",
                format_amount(amount)
            )
        })
        .fold(String::new(), |a, b| a + &b + "\n")
}

pub fn format_net_balances(net: &BTreeMap<UserId, Money>, names: &Names) -> String {
    net.iter()
        .filter(|(_, m)| !m.is_zero())
        .map(|(&user, &amount)| {
            let sign = if amount.is_positive() { "+" } else { "-" };
            format!("{}: {sign}{}", names.get(user), format_amount(amount.abs()))
        })
        .fold(String::new(), |a, b| a + &b + "\n")
}

/// What each user owes for an item or a bill.
pub fn format_shares(shares: &BTreeMap<UserId, Money>, names: &Names) -> String {
    shares
        .iter()
        .map(|(&user, &amount)| format!("{}: {}", names.get(user), format_amount(amount)))
        .fold(String::new(), |a, b| a + &b + "\n")
}

/// One line per suggested transfer. Amounts are aligned by padding the senders.
pub fn format_transfers(transfers: &[Transfer], names: &Names) -> String {
    if transfers.is_empty() {
        return "All clean!".to_string();
    }

    let max_sender_length = transfers
        .iter()
        .map(|t| names.get(t.from).chars().count())
        .max()
        .expect("just checked there are transfers!");

    transfers
        .iter()
        .map(|t| {
            format!(
                "{:<width$} -> {} {}",
                names.get(t.from),
                names.get(t.to),
                format_amount(t.amount),
                width = max_sender_length
            )
        })
        .fold(String::new(), |a, b| a + &b + "\n")
}

pub fn format_bill(
    bill: &Bill,
    items: &[BillItem],
    assignments: &[ItemAssignment],
    names: &Names,
) -> String {
    let mut result = format!(
        "Bill {} ({}): {}",
        bill.id,
        bill.status.as_str(),
        format_amount(bill.total)
    );
    if let Some(description) = &bill.description {
        result += &format!(" - {description}");
    }
    result += "\n";

    if items.is_empty() {
        result += "  no items yet\n";
        return result;
    }

    for item in items {
        let item_assignments: Vec<_> = assignments
            .iter()
            .filter(|a| a.item_id == item.id)
            .map(|a| format!("{}/{}", names.get(a.user_id), a.share_percentage))
            .collect();
        let assigned = if item_assignments.is_empty() {
            "unassigned".to_string()
        } else {
            item_assignments.join(" ")
        };
        result += &format!(
            "  [{}] {} {} x{}: {}\n",
            item.id,
            item.name,
            format_amount(item.price),
            item.quantity,
            assigned
        );
    }

    let items_total = items.iter().try_fold(Money::ZERO, |total, i| {
        i.price
            .checked_mul(i.quantity as i64)
            .and_then(|cost| total.checked_add(cost))
    });
    match items_total {
        Some(items_total) if items_total == bill.total => {}
        Some(items_total) => {
            result += &format!(
                "  items add up to {}, bill total is {}\n",
                format_amount(items_total),
                format_amount(bill.total)
            );
        }
        None => {
            result += &format!(
                "  items total is too large to compute, bill total is {}\n",
                format_amount(bill.total)
            );
        }
    }

    result
}

pub fn format_ledger(entries: &[LedgerEntry], names: &Names) -> String {
    if entries.is_empty() {
        return "Nothing to show!".to_string();
    }

    entries
        .iter()
        .map(|e| format_entry(e, names))
        .fold(String::new(), |a, b| a + &b + "\n")
}

fn format_entry(entry: &LedgerEntry, names: &Names) -> String {
    let what = match &entry.kind {
        EntryKind::Expense { bill_id } => format!(
            "{} paid bill {} of {}",
            names.get(entry.payer_id),
            bill_id,
            format_amount(entry.amount)
        ),
        EntryKind::Payment { recipient_id } => format!(
            "{} paid {} {}",
            names.get(entry.payer_id),
            names.get(*recipient_id),
            format_amount(entry.amount)
        ),
        EntryKind::Settlement { recipient_id } => format!(
            "{} settled {} with {}",
            names.get(entry.payer_id),
            format_amount(entry.amount),
            names.get(*recipient_id)
        ),
    };

    let result = format!(
        "{} {}: {}",
        entry.id,
        entry.created_at.format("%Y-%m-%d %H:%M"),
        what
    );
    if entry.description.is_empty() {
        result
    } else {
        format!("{} - {}", result, entry.description)
    }
}

pub fn format_simple_list<T: AsRef<str>>(elements: &[T]) -> String {
    if elements.is_empty() {
        "Nothing to show!".to_string()
    } else {
        elements
            .iter()
            .map(|g| format!("- {}", g.as_ref()))
            .fold(String::new(), |a, b| a + &b + "\n")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::types::{BillStatus, NewLedgerEntry};

    use super::*;

    fn make_names() -> Names {
        Names::new(&[
            User {
                id: 1,
                name: "aa".to_string(),
                payment_account: None,
            },
            User {
                id: 2,
                name: "bbbb".to_string(),
                payment_account: None,
            },
            User {
                id: 3,
                name: "c".to_string(),
                payment_account: None,
            },
        ])
    }

    #[test]
    fn test_format_transfers() {
        let transfers = vec![
            Transfer::new(1, 3, Money::from_minor(3400)),
            Transfer::new(2, 3, Money::from_minor(2112)),
        ];
        let result = format_transfers(&transfers, &make_names());
        assert_eq!(result, "aa   -> c ₦34.00\nbbbb -> c ₦21.12\n");

        assert_eq!(format_transfers(&[], &make_names()), "All clean!");
    }

    #[test]
    fn test_format_debts() {
        let debts = BTreeMap::from([
            ((1, 2), Money::from_minor(100)),
            ((3, 1), Money::from_minor(700)),
        ]);
        let result = format_debts(&debts, &make_names());
        assert_eq!(result, "aa owes bbbb ₦1.00\nc  owes aa ₦7.00\n");
    }

    #[test]
    fn test_format_net_balances() {
        let net = BTreeMap::from([
            (1, Money::from_minor(800)),
            (2, Money::ZERO),
            (3, Money::from_minor(-800)),
        ]);
        let result = format_net_balances(&net, &make_names());
        assert_eq!(result, "aa: +₦8.00\nc: -₦8.00\n");
    }

    #[test]
    fn test_format_shares() {
        let shares = BTreeMap::from([(2, Money::from_minor(1425)), (3, Money::from_minor(1425))]);
        assert_eq!(
            format_shares(&shares, &make_names()),
            "bbbb: ₦14.25\nc: ₦14.25\n"
        );
    }

    #[test]
    fn test_format_bill() {
        let bill = Bill {
            id: 5,
            creator_id: 1,
            group_id: Some(1),
            total: Money::from_minor(1000),
            status: BillStatus::Pending,
            receipt_image: None,
            description: Some("lunch".to_string()),
        };
        let items = vec![
            BillItem::new(1, 5, "Rice", Money::from_minor(500), 1),
            BillItem::new(2, 5, "Soda", Money::from_minor(200), 2),
        ];
        let assignments = vec![ItemAssignment::new(1, 1, 50), ItemAssignment::new(1, 2, 50)];

        let result = format_bill(&bill, &items, &assignments, &make_names());
        assert_eq!(
            result,
            "Bill 5 (pending): ₦10.00 - lunch\n  \
             [1] Rice ₦5.00 x1: aa/50 bbbb/50\n  \
             [2] Soda ₦2.00 x2: unassigned\n  \
             items add up to ₦9.00, bill total is ₦10.00\n"
        );
    }

    #[test]
    fn test_format_bill_items_overflow() {
        let bill = Bill {
            id: 6,
            creator_id: 1,
            group_id: None,
            total: Money::from_minor(100),
            status: BillStatus::Pending,
            receipt_image: None,
            description: None,
        };
        let huge = Money::from_minor(i64::MAX / 2 + 1);
        let items = vec![
            BillItem::new(1, 6, "Gold", huge, 1),
            BillItem::new(2, 6, "Silver", huge, 1),
        ];
        let result = format_bill(&bill, &items, &[], &make_names());
        assert!(result.ends_with("  items total is too large to compute, bill total is ₦1.00\n"));

        // A single item whose quantity overflows is reported the same way.
        let items = vec![BillItem::new(3, 6, "Gold", huge, 2)];
        let result = format_bill(&bill, &items, &[], &make_names());
        assert!(result.contains("[3] Gold"));
        assert!(result.contains("too large to compute"));
    }

    #[test]
    fn test_format_ledger() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let entries = vec![
            LedgerEntry::from_new(
                1,
                NewLedgerEntry::new_expense(1, 1, Money::from_minor(900), 4, "lunch"),
                created_at,
            ),
            LedgerEntry::from_new(
                2,
                NewLedgerEntry::new_payment(1, 2, 1, Money::from_minor(450), ""),
                created_at,
            ),
            LedgerEntry::from_new(
                3,
                NewLedgerEntry::new_settlement(1, 3, 1, Money::from_minor(50), ""),
                created_at,
            ),
        ];
        let result = format_ledger(&entries, &make_names());
        assert_eq!(
            result,
            "1 2024-03-01 12:30: aa paid bill 4 of ₦9.00 - lunch\n\
             2 2024-03-01 12:30: bbbb paid aa ₦4.50\n\
             3 2024-03-01 12:30: c settled ₦0.50 with aa\n"
        );
        assert_eq!(format_ledger(&[], &make_names()), "Nothing to show!");
    }

    #[test]
    fn test_format_simple_list() {
        let elements = vec!["g1", "g2", "g3"];
        let result = format_simple_list(&elements);

        assert_eq!("- g1\n- g2\n- g3\n", result);
    }
}
