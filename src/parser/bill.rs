//! Parse bills, bill items, share assignments and payments.
//!
//! These have a richer syntax than the other commands, so we use nom.
//! Groups are written with a `#` in front (`#flatmates`), users by name.

use nom::{
    bytes::complete::{is_not, tag},
    character::complete::{char, multispace0, multispace1, not_line_ending, one_of, u32},
    combinator::{all_consuming, map, opt, recognize, verify},
    multi::{many1, separated_list1},
    sequence::{preceded, terminated, tuple},
    IResult,
};

use crate::{
    money::Money,
    types::{ParsedItem, ParsedShare},
    validator::is_valid_name,
};

use super::amount::parse_amount;

/// A bill as typed by the user: `[#group] <total> [- description]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedBill {
    pub group: Option<String>,
    pub total: Money,
    pub description: Option<String>,
}

/// A payment as typed by the user: `#group <recipient> <amount> [- description]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedPayment {
    pub group: String,
    pub recipient: String,
    pub amount: Money,
    pub description: Option<String>,
}

pub fn parse_bill(s: &str) -> IResult<&str, ParsedBill> {
    let (s, (group, total, description)) = all_consuming(terminated(
        tuple((
            opt(preceded(multispace0, parse_group_name)),
            parse_amount,
            parse_message,
        )),
        multispace0,
    ))(s)?;

    Ok((
        s,
        ParsedBill {
            group,
            total,
            description: description.map(|d| d.trim().to_string()),
        },
    ))
}

/// Parse a bill item: `<name> <price> [x<quantity>]`.
///
/// The name can be made of several words, each starting with a letter; the
/// quantity defaults to one.
pub fn parse_item(s: &str) -> IResult<&str, ParsedItem> {
    let (s, (name, price, quantity)) = all_consuming(terminated(
        tuple((
            preceded(multispace0, parse_item_name),
            parse_amount,
            opt(preceded(multispace1, preceded(one_of("xX"), u32))),
        )),
        multispace0,
    ))(s)?;

    Ok((s, ParsedItem::new(name, price, quantity.unwrap_or(1))))
}

/// Parse share assignments: `user/percentage [user/percentage...]`.
pub fn parse_shares(s: &str) -> IResult<&str, Vec<ParsedShare>> {
    all_consuming(terminated(
        many1(preceded(
            multispace0,
            map(
                tuple((parse_user_name, preceded(char('/'), u32))),
                |(name, percentage)| ParsedShare::new(&name, percentage),
            ),
        )),
        multispace0,
    ))(s)
}

pub fn parse_payment(s: &str) -> IResult<&str, ParsedPayment> {
    let (s, (group, recipient, amount, description)) = all_consuming(terminated(
        tuple((
            preceded(multispace0, parse_group_name),
            preceded(multispace1, parse_user_name),
            parse_amount,
            parse_message,
        )),
        multispace0,
    ))(s)?;

    Ok((
        s,
        ParsedPayment {
            group,
            recipient,
            amount,
            description: description.map(|d| d.trim().to_string()),
        },
    ))
}

fn parse_group_name(s: &str) -> IResult<&str, String> {
    map(
        preceded(char('#'), verify(is_not(" \t\r\n"), is_valid_name)),
        |name: &str| name.to_lowercase(),
    )(s)
}

/// User names may be written with a leading '@', which is stripped away.
fn parse_user_name(s: &str) -> IResult<&str, String> {
    map(
        preceded(opt(char('@')), verify(is_not(" \t\r\n/"), is_valid_name)),
        |name: &str| name.to_lowercase(),
    )(s)
}

fn parse_item_name(s: &str) -> IResult<&str, &str> {
    fn is_word(word: &str) -> bool {
        word.chars()
            .next()
            .map(|c| c.is_alphabetic())
            .unwrap_or(false)
    }

    recognize(separated_list1(
        multispace1,
        verify(is_not(" \t\r\n"), is_word),
    ))(s)
}

fn parse_message(s: &str) -> IResult<&str, Option<&str>> {
    opt(preceded(multispace0, preceded(tag("- "), not_line_ending)))(s)
}
