//! Ownership tree builder.

use crate::calc::conversion::{cap_price, capitalization_base, safe_allocation_estimate};
use crate::calc::ownership::fully_diluted_shares;
use crate::model::allocation::AllocationType;
use crate::model::cap_table::CapTable;
use crate::model::round::{Round, RoundKind, RoundTerms};
use serde::Serialize;

/// Label shown for derived headroom nodes.
pub const UNALLOCATED_LABEL: &str = "Unallocated";

/// What a tree node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeKind {
    Company,
    Round { kind: RoundKind },
    Allocation { kind: AllocationType },
    Unallocated,
}

/// One node of the ownership hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipNode {
    /// Stable key, unique among siblings.
    pub key: String,
    pub label: String,
    pub kind: NodeKind,
    pub shares: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// SAFE estimates not yet fixed by conversion.
    pub estimated: bool,
    pub children: Vec<OwnershipNode>,
}

impl OwnershipNode {
    fn parent(key: String, label: String, kind: NodeKind, children: Vec<OwnershipNode>) -> Self {
        Self {
            key,
            label,
            kind,
            shares: children.iter().map(|child| child.shares).sum(),
            color: None,
            estimated: children.iter().any(|child| child.estimated),
            children,
        }
    }

    fn leaf(key: String, label: String, kind: NodeKind, shares: u64) -> Self {
        Self {
            key,
            label,
            kind,
            shares,
            color: None,
            estimated: false,
            children: Vec::new(),
        }
    }

    pub fn child(&self, key: &str) -> Option<&OwnershipNode> {
        self.children.iter().find(|child| child.key == key)
    }

    /// Follows `path` from this node; `None` when any key is missing.
    pub fn descend(&self, path: &[String]) -> Option<&OwnershipNode> {
        path.iter()
            .try_fold(self, |node, key| node.child(key.as_str()))
    }
}

/// Builds the company-level ownership tree.
///
/// Pools get an `Unallocated` child for authorized-but-ungranted shares, and
/// the company gets one when authorized shares exceed the fully-diluted count.
pub fn ownership_tree(cap_table: &CapTable) -> OwnershipNode {
    let base = capitalization_base(cap_table);
    let mut children = cap_table
        .rounds
        .iter()
        .map(|round| round_node(cap_table, round, base))
        .collect::<Vec<_>>();

    let headroom = cap_table
        .authorized_shares
        .saturating_sub(fully_diluted_shares(cap_table));
    if headroom > 0 {
        children.push(OwnershipNode::leaf(
            "unallocated".to_string(),
            UNALLOCATED_LABEL.to_string(),
            NodeKind::Unallocated,
            headroom,
        ));
    }

    OwnershipNode::parent(
        "company".to_string(),
        cap_table.company_name.clone(),
        NodeKind::Company,
        children,
    )
}

fn round_node(cap_table: &CapTable, round: &Round, base: u64) -> OwnershipNode {
    let pending_cap_price = match round.terms {
        RoundTerms::Safe {
            valuation_cap,
            conversion: None,
            ..
        } if valuation_cap > 0.0 => Some(cap_price(valuation_cap, base)),
        _ => None,
    };

    let mut children = round
        .allocations
        .iter()
        .map(|allocation| {
            let shares = match pending_cap_price {
                Some(price) => safe_allocation_estimate(allocation, price),
                None => allocation.shares,
            };
            let mut node = OwnershipNode::leaf(
                allocation.id.to_string(),
                cap_table.holder_name(allocation.holder_id).to_string(),
                NodeKind::Allocation {
                    kind: allocation.kind,
                },
                shares,
            );
            node.estimated = pending_cap_price.is_some();
            node
        })
        .collect::<Vec<_>>();

    if let RoundTerms::EquityPool { authorized_size } = round.terms {
        let unallocated = authorized_size.saturating_sub(round.allocated_shares());
        if unallocated > 0 {
            children.push(OwnershipNode::leaf(
                format!("unallocated:{}", round.id),
                UNALLOCATED_LABEL.to_string(),
                NodeKind::Unallocated,
                unallocated,
            ));
        }
    }

    let mut node = OwnershipNode::parent(
        round.id.to_string(),
        round.name.clone(),
        NodeKind::Round {
            kind: round.kind(),
        },
        children,
    );
    node.color = Some(round.color.clone());
    node
}
