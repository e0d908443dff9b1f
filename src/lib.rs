//! Hit counting against IPv4/IPv6 addresses with bounded memory.
//!
//! Addresses are inserted as leaves of a binary prefix tree. Once the number
//! of distinct leaves below a configured checkpoint prefix exceeds that
//! checkpoint's limit, the subtree collapses into a single aggregate leaf
//! which keeps the total hit count and absorbs all further hits in its
//! range. Aggregation loses the identity of individual addresses, never the
//! totals.

pub mod prefix;
pub use prefix::Prefix;

pub mod limits;
pub use limits::PrefixLimits;

pub mod error;
pub use error::TreeError;

pub mod hooks;
pub use hooks::UserDataHooks;

pub mod node;
pub use node::Node;

pub mod tree;
pub use tree::{FamilyTree, Hit, Ipv4Tree, Ipv6Tree};

pub mod iter;
pub use iter::Leafs;

pub mod iptree;
pub use iptree::{IntoNetwork, IpTree, NodeView};
