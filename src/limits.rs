use crate::error::TreeError;

/// Ordered aggregation checkpoints for one family tree.
///
/// Each entry is a `(depth, limit)` pair: once more than `limit` distinct
/// leaves accumulate below the `depth`-bit prefix of an address, the whole
/// subtree collapses into one aggregate at that depth. A limit of 0 turns
/// the checkpoint into a plain boundary that never aggregates; the first
/// and last entries are always such boundaries, and the last entry sits at
/// the family's bit width, where individual host leaves live. The first
/// entry may sit at any depth: the stock tables start at /16 and /32, and
/// a `(0, 0)` entry is accepted but changes nothing, since the root covers
/// depth 0 whether or not the table mentions it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixLimits {
    entries: Vec<(u8, usize)>,
}

impl PrefixLimits {
    pub fn new<I>(entries: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = (u8, usize)>,
    {
        let entries: Vec<(u8, usize)> = entries.into_iter().collect();
        if entries.len() < 2 {
            return Err(TreeError::Misconfigured {
                reason: "need at least the two boundary checkpoints".to_string(),
            });
        }
        for pair in entries.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(TreeError::Misconfigured {
                    reason: format!(
                        "checkpoint depths must increase: /{} is followed by /{}",
                        pair[0].0, pair[1].0
                    ),
                });
            }
        }
        let (first_depth, first_limit) = entries[0];
        if first_limit != 0 {
            return Err(TreeError::Misconfigured {
                reason: format!(
                    "first checkpoint (/{}, {first_limit}) must carry limit 0",
                    first_depth
                ),
            });
        }
        let (last_depth, last_limit) = entries[entries.len() - 1];
        if last_limit != 0 {
            return Err(TreeError::Misconfigured {
                reason: format!(
                    "last checkpoint (/{}, {last_limit}) must carry limit 0",
                    last_depth
                ),
            });
        }
        Ok(Self { entries })
    }

    fn from_table(entries: &[(u8, usize)]) -> Self {
        Self {
            entries: entries.to_vec(),
        }
    }

    /// Stock IPv4 table covering the 0-32 range.
    pub fn ipv4() -> Self {
        Self::from_table(&[(16, 0), (24, 50), (32, 0)])
    }

    /// Stock IPv6 table covering the 0-128 range.
    pub fn ipv6() -> Self {
        Self::from_table(&[
            (32, 0),
            (48, 50),
            (56, 10),
            (64, 5),
            (80, 4),
            (96, 3),
            (112, 2),
            (128, 0),
        ])
    }

    pub fn entries(&self) -> &[(u8, usize)] {
        &self.entries
    }

    /// Depth of the deepest checkpoint; leaves produced by insertion live
    /// here, so it must match the family width.
    pub fn max_depth(&self) -> u8 {
        self.entries.last().map(|e| e.0).unwrap_or(0)
    }

    pub(crate) fn checkpoints_desc(&self) -> impl Iterator<Item = (u8, usize)> + '_ {
        self.entries.iter().rev().copied()
    }
}
